use std::{
    env,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;

mod error;

pub mod sim;

pub use error::Error;
pub use sim::{BtraceMode, SimConfig};

const CARGO_MANIFEST_DIR: &str = env!("CARGO_MANIFEST_DIR");
const CONFIG_ENV_PREFIX: &str = "NIOS2";

/// A configuration section read from `NIOS2_<PREFIX>_*` environment variables.
///
/// Variables are first loaded from the `.config.env` file next to this crate
/// when it exists. Nested keys are separated by `_`, so multi-word fields are
/// spelled without underscores (`NIOS2_SIM_BREAKADDR`).
pub trait Config: DeserializeOwned {
    const PREFIX: &'static str;

    fn from_env() -> Result<Self, Error> {
        let prefix = format!("{}_{}", CONFIG_ENV_PREFIX, Self::PREFIX);
        let result = dotenvy::from_path(config_env_path());

        // a missing file only means nothing was compiled into it.
        match result {
            Err(err) if !err.not_found() => return Err(err.into()),
            _ => {}
        }

        Ok(config::Config::builder()
            .add_source(config::Environment::with_prefix(&prefix).separator("_"))
            .build()?
            .try_deserialize()?)
    }
}

#[doc(hidden)]
pub fn config_env_path() -> PathBuf {
    Path::new(CARGO_MANIFEST_DIR).join(".config.env")
}
