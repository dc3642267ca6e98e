use std::fmt;

#[derive(Debug)]
pub enum Error {
    Config(config::ConfigError),
    DotEnv(dotenvy::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<dotenvy::Error> for Error {
    fn from(err: dotenvy::Error) -> Self {
        Self::DotEnv(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "invalid configuration: {err}"),
            Error::DotEnv(err) => write!(f, "cannot read .config.env: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::DotEnv(err) => Some(err),
        }
    }
}
