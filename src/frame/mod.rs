use std::fmt;

/// A helper macro that unpacks a sequence of 4 bytes found in the buffer with
/// the given identifier, starting at the given offset, into the given integer
/// type. Obviously, the integer type should be able to support at least 4
/// bytes.
///
/// # Examples
///
/// ```ignore
/// # // We ignore this doctest because the macro is not exported.
/// let buf: [u8; 4] = [0, 0, 0, 1];
/// assert_eq!(1u32, unpack_octets_4!(buf, 0, u32));
/// ```
macro_rules! unpack_octets_4 {
    ($buf:expr, $offset:expr, $tip:ty) => {
        (($buf[$offset + 0] as $tip) << 24)
            | (($buf[$offset + 1] as $tip) << 16)
            | (($buf[$offset + 2] as $tip) << 8)
            | (($buf[$offset + 3] as $tip) << 0)
    };
}


mod data;
mod go_away;
mod head;
mod headers;
mod ping;
mod reset;
mod settings;
mod status;
mod stream_id;
mod syn_reply;
mod syn_stream;
mod window_update;

pub use self::data::Data;
pub use self::go_away::GoAway;
pub use self::head::{ControlHead, DataHead, Head};
pub use self::headers::{HeadersFlags, HeadersFrame};
pub use self::ping::Ping;
pub use self::reset::Reset;
pub use self::settings::{Settings, SettingsFlags, SettingsMap, SettingKey};
pub use self::status::{SessionStatus, StreamStatus};
pub use self::stream_id::StreamId;
pub use self::syn_reply::SynReply;
pub use self::syn_stream::{SynStream, SynStreamFlags};
pub use self::window_update::WindowUpdate;

/// Protocol versions understood by the codec.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Version {
    V2,
    V3,
}

impl Version {
    pub fn from_wire(raw: u16) -> Option<Version> {
        match raw {
            2 => Some(Version::V2),
            3 => Some(Version::V3),
            _ => None,
        }
    }

    pub fn wire(self) -> u16 {
        match self {
            Version::V2 => 2,
            Version::V3 => 3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.wire())
    }
}

/// Control frame types.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    SynStream = 1,
    SynReply = 2,
    Reset = 3,
    Settings = 4,
    Noop = 5,
    Ping = 6,
    GoAway = 7,
    Headers = 8,
    WindowUpdate = 9,
    Unknown,
}

impl Kind {
    pub fn new(raw: u16) -> Kind {
        match raw {
            1 => Kind::SynStream,
            2 => Kind::SynReply,
            3 => Kind::Reset,
            4 => Kind::Settings,
            5 => Kind::Noop,
            6 => Kind::Ping,
            7 => Kind::GoAway,
            8 => Kind::Headers,
            9 => Kind::WindowUpdate,
            _ => Kind::Unknown,
        }
    }
}

/// NOOP frame; carries no payload and is ignored on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Noop {
    pub version: Version,
}

impl Noop {
    pub fn encode<B: ntex_bytes::BufMut>(&self, dst: &mut B) {
        ControlHead::new(Kind::Noop, self.version, 0).encode(0, dst);
    }
}

impl From<Noop> for ControlFrame {
    fn from(src: Noop) -> ControlFrame {
        ControlFrame::Noop(src)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum ControlFrame {
    SynStream(SynStream),
    SynReply(SynReply),
    Reset(Reset),
    Settings(Settings),
    Noop(Noop),
    Ping(Ping),
    GoAway(GoAway),
    Headers(HeadersFrame),
    WindowUpdate(WindowUpdate),
}

impl ControlFrame {
    pub fn kind(&self) -> Kind {
        match *self {
            ControlFrame::SynStream(..) => Kind::SynStream,
            ControlFrame::SynReply(..) => Kind::SynReply,
            ControlFrame::Reset(..) => Kind::Reset,
            ControlFrame::Settings(..) => Kind::Settings,
            ControlFrame::Noop(..) => Kind::Noop,
            ControlFrame::Ping(..) => Kind::Ping,
            ControlFrame::GoAway(..) => Kind::GoAway,
            ControlFrame::Headers(..) => Kind::Headers,
            ControlFrame::WindowUpdate(..) => Kind::WindowUpdate,
        }
    }

    pub fn version(&self) -> Version {
        match *self {
            ControlFrame::SynStream(ref f) => f.version,
            ControlFrame::SynReply(ref f) => f.version,
            ControlFrame::Reset(ref f) => f.version,
            ControlFrame::Settings(ref f) => f.version,
            ControlFrame::Noop(ref f) => f.version,
            ControlFrame::Ping(ref f) => f.version,
            ControlFrame::GoAway(ref f) => f.version,
            ControlFrame::Headers(ref f) => f.version,
            ControlFrame::WindowUpdate(ref f) => f.version,
        }
    }
}

impl fmt::Debug for ControlFrame {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::ControlFrame::*;

        match *self {
            SynStream(ref frame) => fmt::Debug::fmt(frame, fmt),
            SynReply(ref frame) => fmt::Debug::fmt(frame, fmt),
            Reset(ref frame) => fmt::Debug::fmt(frame, fmt),
            Settings(ref frame) => fmt::Debug::fmt(frame, fmt),
            Noop(ref frame) => fmt::Debug::fmt(frame, fmt),
            Ping(ref frame) => fmt::Debug::fmt(frame, fmt),
            GoAway(ref frame) => fmt::Debug::fmt(frame, fmt),
            Headers(ref frame) => fmt::Debug::fmt(frame, fmt),
            WindowUpdate(ref frame) => fmt::Debug::fmt(frame, fmt),
        }
    }
}

/// Any frame, control or data.
#[derive(Debug)]
pub enum Frame {
    Control(ControlFrame),
    Data(Data),
}

impl From<ControlFrame> for Frame {
    fn from(src: ControlFrame) -> Frame {
        Frame::Control(src)
    }
}

impl From<Data> for Frame {
    fn from(src: Data) -> Frame {
        Frame::Data(src)
    }
}
