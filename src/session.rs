use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ntex_bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::codec::{Generator, Parser, ParserListener};
use crate::config::Config;
use crate::consts::STREAM_ID_MASK;
use crate::error::{OperationError, SessionError, StreamError};
use crate::frame::{
    ControlFrame, Data, GoAway, HeadersFrame, Kind, Ping, Reset, SessionStatus, SettingKey,
    Settings, StreamId, StreamStatus, SynReply, SynStream, SynStreamFlags, Version,
};
use crate::message::{
    DataInfo, GoAwayInfo, PingInfo, ReplyInfo, RstInfo, SettingsInfo, SynInfo,
};
use crate::stream::StreamRef;

/// The transport half the session writes into. Implementations submit
/// the buffer and later invoke the completion exactly once, when the
/// write has been taken by the wire.
pub trait Controller: Send + Sync {
    fn write(&self, buffer: Bytes, done: WriteCompletion);
    fn close(&self, graceful: bool);
}

/// Completion handle for one transport write.
pub struct WriteCompletion {
    session: Weak<SessionInner>,
}

impl WriteCompletion {
    pub fn complete(self) {
        if let Some(inner) = self.session.upgrade() {
            Session::from_inner(inner).complete();
        }
    }
}

/// Session-level frame events; the passive counterpart of [`Session`].
/// Every callback has a default no-op body, so implementations carry
/// only the capabilities they care about.
pub trait FrameListener: Send + Sync {
    /// Invoked for every peer-initiated stream; the returned listener is
    /// installed on the new stream.
    fn on_syn(&self, _stream: &StreamRef, _info: &SynInfo) -> Option<Arc<dyn StreamFrameListener>> {
        None
    }
    fn on_rst(&self, _session: &Session, _info: &RstInfo) {}
    fn on_settings(&self, _session: &Session, _info: &SettingsInfo) {}
    fn on_ping(&self, _session: &Session, _info: &PingInfo) {}
    fn on_go_away(&self, _session: &Session, _info: &GoAwayInfo) {}
}

/// Stream lifecycle events.
pub trait SessionListener: Send + Sync {
    fn on_stream_created(&self, _stream: &StreamRef) {}
    fn on_stream_closed(&self, _stream: &StreamRef) {}
}

/// Per-stream frame events.
pub trait StreamFrameListener: Send + Sync {
    fn on_reply(&self, _stream: &StreamRef, _info: &ReplyInfo) {}
    fn on_headers(&self, _stream: &StreamRef, _info: &crate::message::HeadersInfo) {}
    fn on_data(&self, _stream: &StreamRef, _info: &DataInfo) {}
}

/// Listener callbacks must never take the session down; a panicking
/// listener is logged and ignored.
pub(crate) fn guard(what: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::info!("listener panicked while handling {}", what);
    }
}

/// A SPDY session: owns one transport connection and multiplexes all
/// logical streams over it.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    controller: Box<dyn Controller>,
    config: Config,
    streams: DashMap<StreamId, StreamRef>,
    queue: Mutex<Queue>,
    /// Doubles as the session mutex: stream id allocation, header
    /// compression and registration for `syn` share this critical
    /// section, keeping outbound SYN_STREAM ids monotone on the wire and
    /// the compression history in id order.
    generator: Mutex<Generator>,
    parser: Mutex<Parser>,
    stream_ids: AtomicU32,
    ping_ids: AtomicU32,
    last_stream_id: AtomicU32,
    closed: AtomicBool,
    rejected: AtomicBool,
    initial_window: AtomicI32,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
    frame_listener: Option<Arc<dyn FrameListener>>,
}

struct Queue {
    items: VecDeque<FrameBytes>,
    flushing: bool,
}

/// One queued write: either a ready control-frame buffer or a data unit
/// whose buffer is produced lazily at flush time so the current window
/// is observed.
enum FrameBytes {
    Control {
        kind: Kind,
        buffer: Bytes,
        /// GO_AWAY closes the transport after submission; the flag keeps
        /// whether that close is graceful.
        close: Option<bool>,
    },
    Data {
        stream: StreamRef,
        info: DataInfo,
        emitted: usize,
    },
}

impl FrameBytes {
    fn produce(&mut self) -> Option<Bytes> {
        match self {
            FrameBytes::Control { buffer, .. } => Some(buffer.clone()),
            FrameBytes::Data {
                stream,
                info,
                emitted,
            } => {
                let max = if stream.version() == Version::V3 {
                    let window = stream.window_size();
                    if window <= 0 {
                        return None;
                    }
                    window as usize
                } else {
                    // v2 has no per-stream flow control
                    info.available()
                };
                *emitted = std::cmp::min(max, info.available());
                Some(Generator::data(stream.id(), max, info))
            }
        }
    }

    /// Runs right after the buffer went to the transport, not on its
    /// completion.
    fn on_submitted(self, session: &Session) {
        match self {
            FrameBytes::Control { kind, close, .. } => {
                if kind == Kind::GoAway {
                    if let Some(graceful) = close {
                        session.inner.controller.close(graceful);
                    }
                }
            }
            FrameBytes::Data {
                stream,
                info,
                emitted,
            } => {
                stream.window_sub(emitted as i32);
                if !info.is_consumed() {
                    // Window-stalled remainder goes to the back of the
                    // queue; the peer owes us a WINDOW_UPDATE
                    session.enqueue(FrameBytes::Data {
                        stream,
                        info,
                        emitted: 0,
                    });
                } else {
                    if info.is_close() {
                        stream.close_local();
                    }
                    if stream.is_closed() {
                        session.remove_stream(&stream);
                    }
                }
            }
        }
    }
}

impl Session {
    /// Creates a session over `controller`. The parity of
    /// `initial_stream_id` selects the endpoint role: odd ids are
    /// client-initiated, even ids server-initiated.
    pub fn new(
        controller: Box<dyn Controller>,
        initial_stream_id: u32,
        frame_listener: Option<Arc<dyn FrameListener>>,
        config: Config,
    ) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                controller,
                streams: DashMap::new(),
                queue: Mutex::new(Queue {
                    items: VecDeque::new(),
                    flushing: false,
                }),
                generator: Mutex::new(Generator::new()),
                parser: Mutex::new(Parser::new()),
                stream_ids: AtomicU32::new(initial_stream_id),
                ping_ids: AtomicU32::new(initial_stream_id),
                last_stream_id: AtomicU32::new(0),
                closed: AtomicBool::new(false),
                rejected: AtomicBool::new(false),
                initial_window: AtomicI32::new(config.initial_window_size),
                listeners: RwLock::new(Vec::new()),
                frame_listener,
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Session {
        Session { inner }
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.inner.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) {
        self.inner
            .listeners
            .write()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Feeds transport bytes into the session. Must be called from the
    /// transport thread only; frame events and listener callbacks are
    /// dispatched synchronously from here.
    pub fn feed(&self, bytes: &[u8]) {
        let mut parser = self.inner.parser.lock();
        parser.parse(bytes, self);
    }

    /// Opens a new stream by sending a SYN_STREAM.
    pub fn syn(
        &self,
        version: Version,
        info: SynInfo,
        listener: Arc<dyn StreamFrameListener>,
    ) -> Result<StreamRef, OperationError> {
        if info.unidirectional {
            return Err(OperationError::Unidirectional);
        }
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(OperationError::Closed);
        }

        let stream = {
            let mut generator = self.inner.generator.lock();

            let id = self.inner.stream_ids.fetch_add(2, Ordering::AcqRel);
            if id > STREAM_ID_MASK {
                return Err(OperationError::OverflowedStreamId);
            }
            let stream_id = StreamId::new(id);

            let mut flags = SynStreamFlags::empty();
            if info.close {
                flags |= SynStreamFlags::FIN;
            }
            let frame = SynStream {
                version,
                stream_id,
                associated_stream_id: info.associated_stream_id,
                priority: info.priority,
                slot: 0,
                flags,
                headers: info.headers,
            };

            let stream = StreamRef::new(
                stream_id,
                version,
                info.priority,
                Arc::downgrade(&self.inner),
                self.inner.initial_window.load(Ordering::Acquire),
            );
            stream.set_listener(Some(listener));
            self.inner.streams.insert(stream_id, stream.clone());

            match generator.control(&frame.into()) {
                Ok(buffer) => {
                    log::debug!("created {:?}", stream);
                    if info.close {
                        stream.close_local();
                    }
                    self.enqueue(FrameBytes::Control {
                        kind: Kind::SynStream,
                        buffer,
                        close: None,
                    });
                    stream
                }
                Err(e) => {
                    // Unregister quietly; the stream was never announced
                    self.inner.streams.remove(&stream_id);
                    return Err(e);
                }
            }
        };

        self.notify_stream_created(&stream);
        self.flush();
        Ok(stream)
    }

    /// Sends a RST_STREAM. Resetting a registered stream closes and
    /// removes it.
    pub fn rst(&self, version: Version, info: RstInfo) -> Result<(), OperationError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        let frame = Reset::new(version, info.stream_id, info.status);
        self.control(None, frame.into())?;

        if let Some(stream) = self.get_stream(info.stream_id) {
            stream.handle_rst();
            self.remove_stream(&stream);
        }
        self.flush();
        Ok(())
    }

    /// Sends a SETTINGS frame.
    pub fn settings(&self, version: Version, info: SettingsInfo) -> Result<(), OperationError> {
        let frame = Settings {
            version,
            clear_persisted: info.clear_persisted,
            settings: info.settings,
        };
        self.control(None, frame.into())?;
        self.flush();
        Ok(())
    }

    /// Sends a PING, normally to measure round-trip time.
    pub fn ping(&self, version: Version) -> Result<PingInfo, OperationError> {
        let ping_id = self.inner.ping_ids.fetch_add(2, Ordering::AcqRel);
        let frame = Ping::new(version, ping_id);
        self.control(None, frame.into())?;
        self.flush();
        Ok(PingInfo { ping_id })
    }

    /// The streams currently registered with this session.
    pub fn streams(&self) -> Vec<StreamRef> {
        self.inner
            .streams
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Closes the session gracefully: a GO_AWAY is sent unless the peer
    /// already announced one, and its completion closes the transport.
    pub fn go_away(&self, version: Version) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && !self.inner.rejected.load(Ordering::Acquire)
        {
            let frame = GoAway::new(
                version,
                StreamId::new(self.inner.last_stream_id.load(Ordering::Acquire)),
                SessionStatus::Ok,
            );
            self.enqueue_go_away(frame, true);
            self.flush();
        }
    }

    // ===== write queue =====

    pub(crate) fn control(
        &self,
        stream: Option<&StreamRef>,
        frame: ControlFrame,
    ) -> Result<(), OperationError> {
        if let Some(stream) = stream {
            self.update_last_stream_id(stream);
        }
        let kind = frame.kind();
        let buffer = self.inner.generator.lock().control(&frame)?;
        log::debug!("posting {:?}", frame);
        self.enqueue(FrameBytes::Control {
            kind,
            buffer,
            close: None,
        });
        Ok(())
    }

    pub(crate) fn data(&self, stream: StreamRef, info: DataInfo) {
        log::debug!("posting {} data bytes on {:?}", info.len(), stream);
        self.enqueue(FrameBytes::Data {
            stream,
            info,
            emitted: 0,
        });
        self.flush();
    }

    fn enqueue_go_away(&self, frame: GoAway, graceful: bool) {
        match self.inner.generator.lock().control(&frame.into()) {
            Ok(buffer) => self.enqueue(FrameBytes::Control {
                kind: Kind::GoAway,
                buffer,
                close: Some(graceful),
            }),
            Err(e) => log::info!("could not generate GO_AWAY: {}", e),
        }
    }

    fn enqueue(&self, frame_bytes: FrameBytes) {
        self.inner.queue.lock().items.push_back(frame_bytes);
    }

    /// Drains at most one queued write into the transport. Single
    /// flight: while a write is outstanding further calls return at
    /// once, and the write completion triggers the next drain.
    pub fn flush(&self) {
        let mut frame_bytes = {
            let mut queue = self.inner.queue.lock();
            if queue.flushing {
                return;
            }
            match queue.items.pop_front() {
                Some(frame_bytes) => {
                    queue.flushing = true;
                    log::debug!("flushing, {} frame(s) queued", queue.items.len());
                    frame_bytes
                }
                None => return,
            }
        };

        match frame_bytes.produce() {
            Some(buffer) => {
                log::debug!("writing {} frame bytes", buffer.len());
                self.inner.controller.write(
                    buffer,
                    WriteCompletion {
                        session: Arc::downgrade(&self.inner),
                    },
                );
                frame_bytes.on_submitted(self);
            }
            None => {
                // Data unit stalled on a zero window; put it back and
                // give the slot up
                let mut queue = self.inner.queue.lock();
                queue.items.push_back(frame_bytes);
                queue.flushing = false;
            }
        }
    }

    /// Transport write completion; drains the next queued write.
    pub(crate) fn complete(&self) {
        self.inner.queue.lock().flushing = false;
        self.flush();
    }

    // ===== stream registry =====

    fn get_stream(&self, stream_id: StreamId) -> Option<StreamRef> {
        self.inner
            .streams
            .get(&stream_id)
            .map(|entry| entry.value().clone())
    }

    pub(crate) fn remove_stream(&self, stream: &StreamRef) {
        if let Some((_, removed)) = self.inner.streams.remove(&stream.id()) {
            log::debug!("removed {:?}", removed);
            self.notify_stream_closed(&removed);
        }
    }

    fn update_last_stream_id(&self, stream: &StreamRef) {
        if stream.is_closed() {
            let id = stream.id().value();
            // Only peer-initiated streams count towards the GO_AWAY id
            if id % 2 != self.inner.stream_ids.load(Ordering::Relaxed) % 2 {
                self.inner.last_stream_id.fetch_max(id, Ordering::AcqRel);
            }
        }
    }

    // ===== inbound dispatch =====

    fn on_syn_stream(&self, frame: SynStream) {
        let stream_id = frame.stream_id;
        let stream = StreamRef::new(
            stream_id,
            frame.version,
            frame.priority,
            Arc::downgrade(&self.inner),
            self.inner.initial_window.load(Ordering::Acquire),
        );
        log::debug!("opening {:?}", stream);

        let existing = match self.inner.streams.entry(stream_id) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                entry.insert(stream.clone());
                None
            }
        };

        if let Some(existing) = existing {
            log::debug!("detected duplicate {:?}, resetting", existing);
            let _ = self.rst(
                existing.version(),
                RstInfo::new(stream_id, StreamStatus::ProtocolError),
            );
            return;
        }

        stream.handle_syn(frame.is_fin());
        self.notify_stream_created(&stream);

        let info = SynInfo {
            close: frame.is_fin(),
            unidirectional: frame.is_unidirectional(),
            associated_stream_id: frame.associated_stream_id,
            priority: frame.priority,
            headers: frame.headers,
        };
        let listener = self.notify_on_syn(&stream, &info);
        stream.set_listener(listener);

        self.flush();

        // The syn callback may have replied with a FIN already
        if stream.is_closed() {
            self.remove_stream(&stream);
        }
    }

    fn on_syn_reply(&self, frame: SynReply) {
        let stream_id = frame.stream_id;
        match self.get_stream(stream_id) {
            None => {
                let version = self.inner.config.unknown_stream_rst_version;
                let _ = self.rst(version, RstInfo::new(stream_id, StreamStatus::InvalidStream));
            }
            Some(stream) => {
                if let Err(e) = stream.handle_reply(frame) {
                    let _ = self.rst(stream.version(), RstInfo::new(stream_id, e.status()));
                }
                self.flush();
                if stream.is_closed() {
                    self.remove_stream(&stream);
                }
            }
        }
    }

    fn on_rst_stream(&self, frame: Reset) {
        self.notify_on_rst(&RstInfo::new(frame.stream_id, frame.status));
        if let Some(stream) = self.get_stream(frame.stream_id) {
            stream.handle_rst();
            self.remove_stream(&stream);
        }
    }

    fn on_settings(&self, frame: Settings) {
        if let Some(value) = frame.get(SettingKey::INITIAL_WINDOW_SIZE) {
            self.inner
                .initial_window
                .store(value as i32, Ordering::Release);
        }
        let info = SettingsInfo {
            clear_persisted: frame.clear_persisted,
            settings: frame.settings,
        };
        self.notify_on_settings(&info);
        self.flush();
    }

    fn on_ping(&self, frame: Ping) {
        // A ping id with the local parity completed a round-trip; a peer
        // id is echoed back verbatim
        if frame.ping_id % 2 == self.inner.ping_ids.load(Ordering::Relaxed) % 2 {
            self.notify_on_ping(&PingInfo {
                ping_id: frame.ping_id,
            });
        } else if let Err(e) = self.control(None, frame.into()) {
            log::info!("could not echo ping: {}", e);
        }
        self.flush();
    }

    fn on_go_away(&self, frame: GoAway) {
        self.inner.rejected.store(true, Ordering::Release);
        self.notify_on_go_away(&GoAwayInfo {
            last_stream_id: frame.last_stream_id,
            status: frame.status,
        });
        self.flush();
    }

    fn on_headers(&self, frame: HeadersFrame) {
        let stream_id = frame.stream_id;
        match self.get_stream(stream_id) {
            None => {
                let version = self.inner.config.unknown_stream_rst_version;
                let _ = self.rst(version, RstInfo::new(stream_id, StreamStatus::InvalidStream));
            }
            Some(stream) => {
                stream.handle_headers(frame);
                self.flush();
                if stream.is_closed() {
                    self.remove_stream(&stream);
                }
            }
        }
    }

    fn on_window_update(&self, frame: crate::frame::WindowUpdate) {
        if let Some(stream) = self.get_stream(frame.stream_id) {
            stream.handle_window_update(frame.delta);
        }
        self.flush();
    }

    // ===== listener notifications =====

    fn listeners(&self) -> Vec<Arc<dyn SessionListener>> {
        self.inner.listeners.read().clone()
    }

    fn notify_stream_created(&self, stream: &StreamRef) {
        for listener in self.listeners() {
            guard("on_stream_created", || listener.on_stream_created(stream));
        }
    }

    fn notify_stream_closed(&self, stream: &StreamRef) {
        for listener in self.listeners() {
            guard("on_stream_closed", || listener.on_stream_closed(stream));
        }
    }

    fn notify_on_syn(
        &self,
        stream: &StreamRef,
        info: &SynInfo,
    ) -> Option<Arc<dyn StreamFrameListener>> {
        let listener = self.inner.frame_listener.as_ref()?;
        match catch_unwind(AssertUnwindSafe(|| listener.on_syn(stream, info))) {
            Ok(stream_listener) => stream_listener,
            Err(_) => {
                log::info!("listener panicked while handling on_syn");
                None
            }
        }
    }

    fn notify_on_rst(&self, info: &RstInfo) {
        if let Some(listener) = self.inner.frame_listener.as_ref() {
            guard("on_rst", || listener.on_rst(self, info));
        }
    }

    fn notify_on_settings(&self, info: &SettingsInfo) {
        if let Some(listener) = self.inner.frame_listener.as_ref() {
            guard("on_settings", || listener.on_settings(self, info));
        }
    }

    fn notify_on_ping(&self, info: &PingInfo) {
        if let Some(listener) = self.inner.frame_listener.as_ref() {
            guard("on_ping", || listener.on_ping(self, info));
        }
    }

    fn notify_on_go_away(&self, info: &GoAwayInfo) {
        if let Some(listener) = self.inner.frame_listener.as_ref() {
            guard("on_go_away", || listener.on_go_away(self, info));
        }
    }
}

impl ParserListener for Session {
    fn on_control_frame(&self, frame: ControlFrame) {
        log::debug!("processing {:?}", frame);
        match frame {
            ControlFrame::SynStream(frame) => {
                if !self.inner.closed.load(Ordering::Acquire) {
                    self.on_syn_stream(frame);
                }
            }
            ControlFrame::SynReply(frame) => self.on_syn_reply(frame),
            ControlFrame::Reset(frame) => self.on_rst_stream(frame),
            ControlFrame::Settings(frame) => self.on_settings(frame),
            ControlFrame::Noop(_) => {}
            ControlFrame::Ping(frame) => self.on_ping(frame),
            ControlFrame::GoAway(frame) => self.on_go_away(frame),
            ControlFrame::Headers(frame) => self.on_headers(frame),
            ControlFrame::WindowUpdate(frame) => self.on_window_update(frame),
        }
    }

    fn on_data_frame(&self, frame: Data, payload: Bytes) {
        log::debug!("processing {:?}, {} data bytes", frame, payload.len());

        let stream_id = frame.stream_id;
        match self.get_stream(stream_id) {
            None => {
                // No stream, therefore no version; the configured
                // default stands in (the protocol offers no better)
                let version = self.inner.config.unknown_stream_rst_version;
                let _ = self.rst(version, RstInfo::new(stream_id, StreamStatus::InvalidStream));
            }
            Some(stream) => {
                if let Err(e) = stream.handle_data(frame.is_fin(), payload) {
                    let _ = self.rst(stream.version(), RstInfo::new(stream_id, e.status()));
                }
                self.flush();
                if stream.is_closed() {
                    self.update_last_stream_id(&stream);
                    self.remove_stream(&stream);
                }
            }
        }
    }

    fn on_stream_exception(&self, error: StreamError) {
        log::info!("stream exception: {}", error);
        if let Some(stream_id) = error.stream_id() {
            let version = error
                .version()
                .unwrap_or(self.inner.config.unknown_stream_rst_version);
            let _ = self.rst(version, RstInfo::new(stream_id, error.status()));
        }
    }

    fn on_session_exception(&self, error: SessionError) {
        log::info!("session exception: {}", error);
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && !self.inner.rejected.load(Ordering::Acquire)
        {
            let frame = GoAway::new(
                self.inner.config.unknown_stream_rst_version,
                StreamId::new(self.inner.last_stream_id.load(Ordering::Acquire)),
                error.status(),
            );
            self.enqueue_go_away(frame, false);
            self.flush();
        } else {
            self.inner.controller.close(false);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Session")
            .field("streams", &self.inner.streams.len())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}
