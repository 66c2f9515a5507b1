//! Generation error taxonomy.
//!
//! Every failure of a generation run is one of these variants, and each
//! knows which [`GenerationState`] it stopped the run in.
//!
//! | Variant | Stage | Source |
//! |---|---|---|
//! | `UpstreamModel` | SelectingEvent / ParsingEvent / GeneratingImage | provider error or unusable answer |
//! | `Imaging` | PostProcessing | undecodable image, encoder failure |
//! | `Store` | Persisting | object write failed |
//! | `Timeout` | wherever the run was | wall-clock budget exhausted |
//! | `Internal` | wherever the run was | worker panic, illegal transition |
//!
//! None are retried within a run; the next trigger starts fresh.

use std::time::Duration;

use content::{EventParseError, ImagingError, StoreError};
use thiserror::Error;

use crate::providers::ModelError;
use crate::state_machine::{GenerationState, IllegalTransition};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("upstream model failed during {stage}: {message}")]
    UpstreamModel {
        stage: GenerationState,
        message: String,
    },

    #[error("image post-processing failed: {0}")]
    Imaging(#[from] ImagingError),

    #[error("failed to persist {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("generation timed out after {}s during {stage}", .after.as_secs())]
    Timeout {
        after: Duration,
        stage: GenerationState,
    },

    #[error("internal error during {stage}: {message}")]
    Internal {
        stage: GenerationState,
        message: String,
    },
}

impl GenerationError {
    /// The state the run was in when it failed.
    pub fn stage(&self) -> GenerationState {
        match self {
            Self::UpstreamModel { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Internal { stage, .. } => *stage,
            Self::Imaging(_) => GenerationState::PostProcessing,
            Self::Store { .. } => GenerationState::Persisting,
        }
    }

    pub fn model(stage: GenerationState, err: ModelError) -> Self {
        Self::UpstreamModel {
            stage,
            message: err.to_string(),
        }
    }

    pub fn store(key: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            key: key.into(),
            source,
        }
    }
}

impl From<EventParseError> for GenerationError {
    fn from(err: EventParseError) -> Self {
        Self::UpstreamModel {
            stage: GenerationState::ParsingEvent,
            message: err.to_string(),
        }
    }
}

impl From<IllegalTransition> for GenerationError {
    fn from(err: IllegalTransition) -> Self {
        Self::Internal {
            stage: err.from,
            message: err.to_string(),
        }
    }
}
