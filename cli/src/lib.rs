//! # nios2-run
//!
//! Runs a Nios II or Nios II/DPX ELF executable in the instruction-set
//! simulator. When the program stops instead of exiting, the registers, the
//! branch trace and a backtrace of the stopped program are printed.
//!
//! ## Usage
//! ```sh
//! nios2-run path/to/program.elf
//! nios2-run --steps 100 --json path/to/program.elf
//! ```
//!
//! Simulator defaults come from `NIOS2_SIM_*` environment variables; the
//! command-line flags take precedence.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod command;

pub use command::run::{Report, RunArgs};

pub fn setup_logger() -> tracing::subscriber::DefaultGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
                .with_writer(std::io::stderr)
                .with_file(false)
                .with_line_number(false),
        )
        .with(filter)
        .set_default()
}
