use std::fmt;
use std::sync::{Arc, Weak};

use ntex_bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::error::{OperationError, StreamError};
use crate::frame::{HeadersFlags, HeadersFrame, StreamId, StreamStatus, SynReply, Version};
use crate::message::{DataInfo, HeadersInfo, ReplyInfo};
use crate::session::{guard, Session, SessionInner, StreamFrameListener};
use crate::window::Window;

/// Stream close states.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloseState {
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

/// Shared handle to one logical stream.
#[derive(Clone)]
pub struct StreamRef(pub(crate) Arc<StreamInner>);

pub(crate) struct StreamInner {
    id: StreamId,
    version: Version,
    priority: u8,
    session: Weak<SessionInner>,
    state: Mutex<CloseState>,
    window: Window,
    listener: RwLock<Option<Arc<dyn StreamFrameListener>>>,
    reply_received: Mutex<bool>,
}

impl StreamRef {
    pub(crate) fn new(
        id: StreamId,
        version: Version,
        priority: u8,
        session: Weak<SessionInner>,
        window: i32,
    ) -> StreamRef {
        StreamRef(Arc::new(StreamInner {
            id,
            version,
            priority,
            session,
            state: Mutex::new(CloseState::Open),
            window: Window::new(window),
            listener: RwLock::new(None),
            reply_received: Mutex::new(false),
        }))
    }

    pub fn id(&self) -> StreamId {
        self.0.id
    }

    pub fn version(&self) -> Version {
        self.0.version
    }

    pub fn priority(&self) -> u8 {
        self.0.priority
    }

    pub fn close_state(&self) -> CloseState {
        *self.0.state.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.close_state() == CloseState::Closed
    }

    /// True when either side has sent its FIN.
    pub fn is_half_closed(&self) -> bool {
        !matches!(self.close_state(), CloseState::Open)
    }

    /// Current send window. Only meaningful at v3; v2 has no per-stream
    /// flow control.
    pub fn window_size(&self) -> i32 {
        self.0.window.size()
    }

    // ===== local operations =====

    /// Sends a SYN_REPLY on this stream.
    pub fn reply(&self, info: ReplyInfo) -> Result<(), OperationError> {
        let session = self.session()?;
        let frame = SynReply {
            version: self.0.version,
            stream_id: self.0.id,
            fin: info.close,
            headers: info.headers,
        };
        if info.close {
            self.close_local();
        }
        session.control(Some(self), frame.into())?;
        session.flush();
        if self.is_closed() {
            session.remove_stream(self);
        }
        Ok(())
    }

    /// Sends additional headers on this stream.
    pub fn headers(&self, info: HeadersInfo) -> Result<(), OperationError> {
        let session = self.session()?;
        let mut flags = HeadersFlags::empty();
        if info.close {
            flags |= HeadersFlags::FIN;
        }
        if info.reset_compression {
            flags |= HeadersFlags::RESET_COMPRESSION;
        }
        let frame = HeadersFrame {
            version: self.0.version,
            stream_id: self.0.id,
            flags,
            headers: info.headers,
        };
        if info.close {
            self.close_local();
        }
        session.control(Some(self), frame.into())?;
        session.flush();
        if self.is_closed() {
            session.remove_stream(self);
        }
        Ok(())
    }

    /// Queues payload on this stream. The bytes are drained at flush
    /// time in window sized chunks; the close marker travels with the
    /// last chunk.
    pub fn data(&self, info: DataInfo) -> Result<(), OperationError> {
        if matches!(
            self.close_state(),
            CloseState::HalfClosedLocal | CloseState::Closed
        ) {
            return Err(OperationError::StreamClosed);
        }
        let session = self.session()?;
        session.data(self.clone(), info);
        Ok(())
    }

    fn session(&self) -> Result<Session, OperationError> {
        self.0
            .session
            .upgrade()
            .map(Session::from_inner)
            .ok_or(OperationError::Closed)
    }

    // ===== inbound frame handling =====

    pub(crate) fn set_listener(&self, listener: Option<Arc<dyn StreamFrameListener>>) {
        *self.0.listener.write() = listener;
    }

    fn listener(&self) -> Option<Arc<dyn StreamFrameListener>> {
        self.0.listener.read().clone()
    }

    pub(crate) fn handle_syn(&self, fin: bool) {
        if fin {
            self.close_remote();
        }
    }

    pub(crate) fn handle_reply(&self, frame: SynReply) -> Result<(), StreamError> {
        match self.close_state() {
            CloseState::Open | CloseState::HalfClosedLocal => {}
            CloseState::HalfClosedRemote | CloseState::Closed => {
                return Err(self.reply_error("SYN_REPLY on remotely closed stream"));
            }
        }
        {
            let mut received = self.0.reply_received.lock();
            if *received {
                return Err(self.reply_error("duplicate SYN_REPLY"));
            }
            *received = true;
        }

        if frame.fin {
            self.close_remote();
        }
        if let Some(listener) = self.listener() {
            let info = ReplyInfo::new(frame.headers, frame.fin);
            guard("on_reply", || listener.on_reply(self, &info));
        }
        Ok(())
    }

    fn reply_error(&self, reason: &str) -> StreamError {
        let status = match self.0.version {
            Version::V2 => StreamStatus::ProtocolError,
            Version::V3 => StreamStatus::StreamInUse,
        };
        StreamError::new(status, reason)
    }

    pub(crate) fn handle_headers(&self, frame: HeadersFrame) {
        let fin = frame.is_fin();
        if fin {
            self.close_remote();
        }
        if let Some(listener) = self.listener() {
            let mut info = HeadersInfo::new(frame.headers, fin);
            info.reset_compression = frame.flags.contains(HeadersFlags::RESET_COMPRESSION);
            guard("on_headers", || listener.on_headers(self, &info));
        }
    }

    pub(crate) fn handle_data(&self, fin: bool, payload: Bytes) -> Result<(), StreamError> {
        match self.close_state() {
            CloseState::HalfClosedRemote | CloseState::Closed => {
                return Err(StreamError::new(
                    StreamStatus::ProtocolError,
                    "DATA on remotely closed stream",
                ));
            }
            _ => {}
        }

        if fin {
            self.close_remote();
        }
        if let Some(listener) = self.listener() {
            let info = DataInfo::new(payload, fin);
            guard("on_data", || listener.on_data(self, &info));
        }
        Ok(())
    }

    pub(crate) fn handle_window_update(&self, delta: i32) {
        self.0.window.add(delta);
    }

    pub(crate) fn handle_rst(&self) {
        *self.0.state.lock() = CloseState::Closed;
    }

    // ===== close state transitions =====

    pub(crate) fn close_local(&self) {
        let mut state = self.0.state.lock();
        *state = match *state {
            CloseState::Open => CloseState::HalfClosedLocal,
            CloseState::HalfClosedRemote | CloseState::Closed => CloseState::Closed,
            CloseState::HalfClosedLocal => CloseState::HalfClosedLocal,
        };
    }

    pub(crate) fn close_remote(&self) {
        let mut state = self.0.state.lock();
        *state = match *state {
            CloseState::Open => CloseState::HalfClosedRemote,
            CloseState::HalfClosedLocal | CloseState::Closed => CloseState::Closed,
            CloseState::HalfClosedRemote => CloseState::HalfClosedRemote,
        };
    }

    pub(crate) fn window_sub(&self, len: i32) {
        self.0.window.add(-len);
    }
}

impl fmt::Debug for StreamRef {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Stream")
            .field("id", &self.0.id)
            .field("version", &self.0.version)
            .field("state", &self.close_state())
            .finish()
    }
}
