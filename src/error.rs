use crate::frame::{SessionStatus, StreamId, StreamStatus, Version};

/// A recoverable protocol violation scoped to a single stream.
///
/// The session resets the offending stream with the carried status and
/// keeps going. The stream id and version are attached by the parser when
/// they are known; without them the error can only be logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream error {status}: {reason}")]
pub struct StreamError {
    status: StreamStatus,
    reason: String,
    stream_id: Option<StreamId>,
    version: Option<Version>,
}

impl StreamError {
    pub fn new(status: StreamStatus, reason: impl Into<String>) -> StreamError {
        StreamError {
            status,
            reason: reason.into(),
            stream_id: None,
            version: None,
        }
    }

    pub(crate) fn on_stream(mut self, stream_id: StreamId, version: Option<Version>) -> Self {
        self.stream_id = Some(stream_id);
        self.version = version;
        self
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.stream_id
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }
}

/// A fatal framing violation.
///
/// The session answers with a GO_AWAY carrying the session status and
/// closes the transport; the parser does not recover.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session error {status}: {reason}")]
pub struct SessionError {
    status: SessionStatus,
    reason: String,
}

impl SessionError {
    pub fn new(status: SessionStatus, reason: impl Into<String>) -> SessionError {
        SessionError {
            status,
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors surfaced to callers of the session and stream operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OperationError {
    /// The session has been closed locally.
    #[error("session is closed")]
    Closed,

    /// The stream is no longer accepting frames.
    #[error("stream is closed")]
    StreamClosed,

    /// Unidirectional streams are acknowledged by the wire format but not
    /// implemented.
    #[error("unidirectional streams are not supported")]
    Unidirectional,

    /// The stream id space is exhausted; a new session is needed.
    #[error("stream id space overflowed")]
    OverflowedStreamId,

    /// The status cannot be expressed at the requested protocol version.
    #[error("status {0} has no wire code at version {1}")]
    UnsupportedStatus(StreamStatus, Version),

    /// Frame construction failed.
    #[error(transparent)]
    Stream(#[from] StreamError),
}
