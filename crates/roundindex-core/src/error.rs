//! Error types for the roundindex pipeline.

use thiserror::Error;

use crate::entity::{EntityKind, RoundEventState};

/// Infrastructure errors. These stop the indexer.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error for {kind} '{id}': {reason}")]
    Serialization {
        kind: EntityKind,
        id: String,
        reason: String,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

/// Domain failures raised by event handlers.
///
/// The router logs these and moves on to the next event; they never stop
/// the pipeline. Storage failures travel inside [`HandlerError::Indexer`]
/// and are re-raised by the router.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("referenced {kind} '{id}' not found")]
    Missing { kind: EntityKind, id: String },

    #[error("unsupported event shape: {0}")]
    Unsupported(String),

    #[error("round '{round}' in state {state} cannot accept {event}")]
    InvalidTransition {
        round: String,
        state: RoundEventState,
        event: &'static str,
    },

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("malformed parameters: {0}")]
    Malformed(String),

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

impl HandlerError {
    pub fn missing(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::Missing {
            kind,
            id: id.into(),
        }
    }

    /// Returns `true` for failures the router should log and skip.
    pub fn is_soft(&self) -> bool {
        !matches!(self, Self::Indexer(_))
    }
}

/// Errors decoding a flattened 2D parameter array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("sub-array count {0} does not fit in usize")]
    CountOverflow(String),

    #[error("header declares {count} sub-arrays but the array has {len} elements")]
    HeaderTooShort { count: usize, len: usize },

    #[error("offset {offset} of sub-array {index} is out of range (data length {data_len})")]
    OffsetOutOfRange {
        index: usize,
        offset: String,
        data_len: usize,
    },

    #[error("offset of sub-array {index} is smaller than the previous offset")]
    DecreasingOffset { index: usize },
}

impl From<DecodeError> for HandlerError {
    fn from(e: DecodeError) -> Self {
        Self::Malformed(e.to_string())
    }
}
