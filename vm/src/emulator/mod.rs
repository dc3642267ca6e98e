mod dispatch;
mod executor;

pub use executor::{InterruptHandle, Simulator};
