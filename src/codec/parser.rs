use ntex_bytes::{Bytes, BytesMut};

use crate::consts::HEADER_LENGTH;
use crate::error::{SessionError, StreamError};
use crate::frame::{
    ControlFrame, Data, GoAway, Head, HeadersFrame, Kind, Noop, Ping, Reset, SessionStatus,
    Settings, StreamStatus, SynReply, SynStream, Version, WindowUpdate,
};
use crate::zlib::Decompressor;

/// Receives the frame events a [`Parser`] produces.
///
/// Stream exceptions abort only the offending frame; a session exception
/// poisons the parser and no further events are produced.
pub trait ParserListener {
    fn on_control_frame(&self, frame: ControlFrame);
    fn on_data_frame(&self, frame: Data, payload: Bytes);
    fn on_stream_exception(&self, error: StreamError);
    fn on_session_exception(&self, error: SessionError);
}

enum Event {
    Control(ControlFrame),
    Data(Data, Bytes),
}

enum ParseError {
    Stream(StreamError),
    Session(SessionError),
}

/// Resumable frame parser.
///
/// Accepts arbitrary byte slices and buffers until a complete frame is
/// available, so the header-block inflater always sees the whole
/// compressed block at once (SYNC_FLUSH framing gives no end-of-stream
/// signal to detect completion otherwise).
pub struct Parser {
    buf: BytesMut,
    decompressor: Decompressor,
    failed: bool,
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            buf: BytesMut::new(),
            decompressor: Decompressor::new(),
            failed: false,
        }
    }

    /// Consumes `bytes`, emitting an event for every frame completed by
    /// them. Partial trailing frames are kept for the next call.
    pub fn parse(&mut self, bytes: &[u8], listener: &dyn ParserListener) {
        self.buf.extend_from_slice(bytes);
        loop {
            match self.decode() {
                Ok(Some(Event::Control(frame))) => listener.on_control_frame(frame),
                Ok(Some(Event::Data(frame, payload))) => listener.on_data_frame(frame, payload),
                Ok(None) => return,
                Err(ParseError::Stream(e)) => listener.on_stream_exception(e),
                Err(ParseError::Session(e)) => {
                    self.failed = true;
                    listener.on_session_exception(e);
                    return;
                }
            }
        }
    }

    /// Decodes at most one frame from the accumulated bytes.
    fn decode(&mut self) -> Result<Option<Event>, ParseError> {
        loop {
            if self.failed || self.buf.len() < HEADER_LENGTH {
                return Ok(None);
            }
            let head = Head::parse(&self.buf[..HEADER_LENGTH]);
            if self.buf.len() < HEADER_LENGTH + head.length() {
                // Wait for the rest of the frame
                return Ok(None);
            }
            let _ = self.buf.split_to(HEADER_LENGTH);
            let mut body = self.buf.split_to(head.length());

            match head {
                Head::Data(head) => {
                    let frame = Data::load(head).map_err(ParseError::Stream)?;
                    log::trace!(
                        "decoded DATA frame; id={:?} len={}",
                        frame.stream_id,
                        body.len()
                    );
                    return Ok(Some(Event::Data(frame, body.freeze())));
                }
                Head::Control(head) => {
                    if head.kind == Kind::Unknown {
                        // Unknown control frame types are ignored
                        log::trace!("ignoring unknown control frame type");
                        continue;
                    }
                    let version = match Version::from_wire(head.version) {
                        Some(version) => version,
                        None => {
                            proto_err!(stream: "unsupported version {} on {:?} frame", head.version, head.kind);
                            return Err(ParseError::Stream(StreamError::new(
                                StreamStatus::UnsupportedVersion,
                                format!("unsupported version {}", head.version),
                            )));
                        }
                    };
                    let frame = self.load_control(version, head.kind, head.flags, &mut body)?;
                    log::trace!("decoded {:?} frame", head.kind);
                    return Ok(Some(Event::Control(frame)));
                }
            }
        }
    }

    fn load_control(
        &mut self,
        version: Version,
        kind: Kind,
        flags: u8,
        body: &mut BytesMut,
    ) -> Result<ControlFrame, ParseError> {
        let result = match kind {
            Kind::SynStream => {
                SynStream::load(version, flags, body, &mut self.decompressor).map(Into::into)
            }
            Kind::SynReply => {
                SynReply::load(version, flags, body, &mut self.decompressor).map(Into::into)
            }
            Kind::Reset => Reset::load(version, body).map(Into::into),
            Kind::Settings => Settings::load(version, flags, body).map(Into::into),
            Kind::Noop => Ok(Noop { version }.into()),
            Kind::Ping => Ping::load(version, body).map(Into::into),
            Kind::GoAway => GoAway::load(version, body).map(Into::into),
            Kind::Headers => {
                HeadersFrame::load(version, flags, body, &mut self.decompressor).map(Into::into)
            }
            Kind::WindowUpdate => WindowUpdate::load(version, body).map(Into::into),
            Kind::Unknown => unreachable!("unknown kinds are skipped before loading"),
        };

        result.map_err(|e| {
            proto_err!(stream: "failed to load {:?} frame; err={}", kind, e);
            if self.decompressor.poisoned() {
                // The shared inflate context is gone; no later header
                // block can be decoded on this session
                ParseError::Session(SessionError::new(
                    SessionStatus::ProtocolError,
                    e.reason().to_string(),
                ))
            } else {
                ParseError::Stream(e)
            }
        })
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}
