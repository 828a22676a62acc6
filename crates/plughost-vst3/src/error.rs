//! Error types for VST3 hosting

use std::path::PathBuf;
use thiserror::Error;

use crate::metadata::PluginId;
use crate::processing::ProcessingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Opening,
    ModuleEntry,
    Factory,
    Instantiation,
    Initialization,
    Connection,
    Setup,
    Activation,
    Editor,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::ModuleEntry => write!(f, "calling module entry"),
            LoadStage::Factory => write!(f, "getting factory"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Initialization => write!(f, "initializing component"),
            LoadStage::Connection => write!(f, "connecting controller"),
            LoadStage::Setup => write!(f, "setting up audio"),
            LoadStage::Activation => write!(f, "activating"),
            LoadStage::Editor => write!(f, "opening editor"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    /// The binary could not be mapped into the process.
    #[error("Plugin load failed at {stage} stage: {path}\n  Reason: {reason}")]
    Load {
        path: PathBuf,
        stage: LoadStage,
        reason: String,
    },

    /// Missing entry points or no usable class. Not retryable.
    #[error("Invalid plugin {path}: {reason}")]
    InvalidPlugin { path: PathBuf, reason: String },

    /// The plugin refused initialization.
    #[error("Plugin error at {stage}: code {code:#x}")]
    Init { stage: LoadStage, code: i32 },

    #[error("Plugin object does not expose {interface}")]
    InterfaceNotFound { interface: &'static str },

    #[error("Cannot {operation} while {state}")]
    State {
        operation: &'static str,
        state: ProcessingState,
    },

    #[error("Processing setup refused at {stage}: {reason}")]
    Setup { stage: LoadStage, reason: String },

    #[error("No loaded plugin with id {0}")]
    NotFound(PluginId),

    #[error("Plugin editor error: {0}")]
    Editor(String),
}

impl HostError {
    /// Whether a fresh attempt can succeed without changing the plugin binary.
    pub fn is_retryable(&self) -> bool {
        match self {
            HostError::InvalidPlugin { .. } | HostError::InterfaceNotFound { .. } => false,
            HostError::State { .. } | HostError::NotFound(_) => false,
            HostError::Load { .. }
            | HostError::Init { .. }
            | HostError::Setup { .. }
            | HostError::Editor(_) => true,
        }
    }

    pub(crate) fn setup(stage: LoadStage, reason: impl Into<String>) -> Self {
        HostError::Setup {
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
