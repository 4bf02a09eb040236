//! Error types for the sync layer.

use thiserror::Error;

/// Errors that can occur while building, fetching or subscribing to entity queries.
///
/// `Clone` so that the last error can be kept inside published state snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A one-shot query against the remote endpoint failed.
    #[error("remote query failed: {0}")]
    RemoteQuery(String),

    /// A live channel delivered an error instead of a delta batch.
    #[error("remote channel error: {0}")]
    RemoteChannel(String),

    /// The endpoint refused to open a live channel.
    #[error("failed to open channel: {0}")]
    ChannelOpen(String),

    /// An identifier could not be represented in the fixed-width key format.
    #[error("cannot normalize identifier '{input}': {reason}")]
    Normalization { input: String, reason: String },

    /// The query names a model missing from the configured schema.
    #[error("unknown model '{model}' in namespace '{namespace}'")]
    UnknownModel { namespace: String, model: String },

    /// A model record could not be decoded into the requested type.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl SyncError {
    /// Returns `true` if the error originated at the remote endpoint.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteQuery(_) | Self::RemoteChannel(_) | Self::ChannelOpen(_)
        )
    }

    /// Returns `true` if the error is a caller-input fault (bad identifier, bad model name).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::Normalization { .. } | Self::UnknownModel { .. })
    }

    pub(crate) fn normalization(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Normalization {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_are_classified() {
        assert!(SyncError::RemoteQuery("boom".into()).is_remote());
        assert!(SyncError::RemoteChannel("boom".into()).is_remote());
        assert!(!SyncError::Other("boom".into()).is_remote());
    }

    #[test]
    fn normalization_is_caller_error() {
        let err = SyncError::normalization("-1", "negative value");
        assert!(err.is_caller_error());
        assert!(!err.is_remote());
        assert_eq!(
            err.to_string(),
            "cannot normalize identifier '-1': negative value"
        );
    }

    #[test]
    fn serde_error_converts() {
        let err: SyncError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, SyncError::Deserialization(_)));
    }
}
