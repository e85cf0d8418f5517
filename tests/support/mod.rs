#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ntex_bytes::Bytes;
use parking_lot::Mutex;

use spdy::frame::{ControlFrame, Data};
use spdy::{
    Config, Controller, DataInfo, FrameListener, GoAwayInfo, Headers, HeadersInfo, Parser,
    ParserListener, PingInfo, ReplyInfo, RstInfo, Session, SessionError, SessionListener,
    SettingsInfo, StreamError, StreamFrameListener, StreamRef, SynInfo, WriteCompletion,
};

/// Transport stand-in that records every buffer and completes writes
/// synchronously.
#[derive(Default)]
pub struct TestController {
    pub writes: Mutex<Vec<Bytes>>,
    pub closed: Mutex<Option<bool>>,
}

impl TestController {
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// All written bytes, concatenated in write order.
    pub fn written(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for buffer in self.writes.lock().iter() {
            out.extend_from_slice(buffer);
        }
        out
    }

    /// Decodes every frame written so far.
    pub fn decoded(&self) -> Events {
        let events = Events::default();
        let mut parser = Parser::new();
        parser.parse(&self.written(), &events);
        events
    }
}

pub struct TestTransport(pub Arc<TestController>);

impl Controller for TestTransport {
    fn write(&self, buffer: Bytes, done: WriteCompletion) {
        self.0.writes.lock().push(buffer);
        done.complete();
    }

    fn close(&self, graceful: bool) {
        *self.0.closed.lock() = Some(graceful);
    }
}

/// Collects parser events for assertions.
#[derive(Default)]
pub struct Events {
    pub control: Mutex<Vec<ControlFrame>>,
    pub data: Mutex<Vec<(Data, Bytes)>>,
    pub stream_errors: Mutex<Vec<StreamError>>,
    pub session_errors: Mutex<Vec<SessionError>>,
}

impl Events {
    pub fn control_frames(&self) -> Vec<ControlFrame> {
        self.control.lock().clone()
    }

    pub fn data_frames(&self) -> Vec<(Data, Bytes)> {
        self.data.lock().clone()
    }
}

impl ParserListener for Events {
    fn on_control_frame(&self, frame: ControlFrame) {
        self.control.lock().push(frame);
    }

    fn on_data_frame(&self, frame: Data, payload: Bytes) {
        self.data.lock().push((frame, payload));
    }

    fn on_stream_exception(&self, error: StreamError) {
        self.stream_errors.lock().push(error);
    }

    fn on_session_exception(&self, error: SessionError) {
        self.session_errors.lock().push(error);
    }
}

/// Counts lifecycle notifications.
#[derive(Default)]
pub struct CountingListener {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
}

impl SessionListener for CountingListener {
    fn on_stream_created(&self, _stream: &StreamRef) {
        self.created.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stream_closed(&self, _stream: &StreamRef) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records per-stream frame events.
#[derive(Default)]
pub struct RecordingStreamListener {
    pub replies: Mutex<Vec<ReplyInfo>>,
    pub headers: Mutex<Vec<HeadersInfo>>,
    pub data: Mutex<Vec<(usize, bool)>>,
}

impl StreamFrameListener for RecordingStreamListener {
    fn on_reply(&self, _stream: &StreamRef, info: &ReplyInfo) {
        self.replies.lock().push(info.clone());
    }

    fn on_headers(&self, _stream: &StreamRef, info: &HeadersInfo) {
        self.headers.lock().push(info.clone());
    }

    fn on_data(&self, _stream: &StreamRef, info: &DataInfo) {
        self.data.lock().push((info.len(), info.is_close()));
    }
}

/// Records session frame events; `on_syn` installs the shared stream
/// listener and can reply eagerly with a FIN.
#[derive(Default)]
pub struct RecordingFrameListener {
    pub syns: Mutex<Vec<SynInfo>>,
    pub rsts: Mutex<Vec<RstInfo>>,
    pub settings: Mutex<Vec<SettingsInfo>>,
    pub pings: Mutex<Vec<PingInfo>>,
    pub go_aways: Mutex<Vec<GoAwayInfo>>,
    pub stream_listener: Arc<RecordingStreamListener>,
    pub reply_with_fin: bool,
}

impl FrameListener for RecordingFrameListener {
    fn on_syn(
        &self,
        stream: &StreamRef,
        info: &SynInfo,
    ) -> Option<Arc<dyn StreamFrameListener>> {
        self.syns.lock().push(info.clone());
        if self.reply_with_fin {
            stream
                .reply(ReplyInfo::new(Headers::new(), true))
                .expect("reply");
        }
        Some(self.stream_listener.clone())
    }

    fn on_rst(&self, _session: &Session, info: &RstInfo) {
        self.rsts.lock().push(*info);
    }

    fn on_settings(&self, _session: &Session, info: &SettingsInfo) {
        self.settings.lock().push(info.clone());
    }

    fn on_ping(&self, _session: &Session, info: &PingInfo) {
        self.pings.lock().push(*info);
    }

    fn on_go_away(&self, _session: &Session, info: &GoAwayInfo) {
        self.go_aways.lock().push(*info);
    }
}

/// A session over a recording transport.
pub fn session(initial_stream_id: u32) -> (Session, Arc<TestController>) {
    session_with(initial_stream_id, None, Config::default())
}

pub fn session_with(
    initial_stream_id: u32,
    frame_listener: Option<Arc<dyn FrameListener>>,
    config: Config,
) -> (Session, Arc<TestController>) {
    let controller = Arc::new(TestController::default());
    let session = Session::new(
        Box::new(TestTransport(controller.clone())),
        initial_stream_id,
        frame_listener,
        config,
    );
    (session, controller)
}
