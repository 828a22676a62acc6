//! Centralized error type for the plughost umbrella crate.
//!
//! Wraps engine errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] plughost_vst3::HostError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// The engine error, if this is one.
    pub fn as_host(&self) -> Option<&plughost_vst3::HostError> {
        match self {
            Error::Host(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
