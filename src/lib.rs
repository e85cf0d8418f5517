//! A SPDY (v2 and v3) protocol endpoint.
//!
//! This library implements the core of a SPDY endpoint: the session
//! multiplexer that owns a single transport connection and the
//! incremental frame codec translating between octet streams and typed
//! frames. The implementation is decoupled from TCP or TLS details: the
//! transport is a [`Controller`] the session writes into, and inbound
//! bytes enter through [`Session::feed`].
//!
//! # Layout
//!
//! Frame types live in [`frame`], the header-block compression in
//! [`zlib`], the parser and generator in [`codec`]. The [`Session`] and
//! [`StreamRef`] types at the crate root are the application surface.
//!
//! # Sessions and streams
//!
//! A [`Session`] multiplexes many bidirectional streams over one ordered
//! byte transport. The active half is the session API (`syn`, `rst`,
//! `settings`, `ping`, `go_away`); the passive half are the listener
//! traits ([`FrameListener`], [`SessionListener`],
//! [`StreamFrameListener`]) invoked as inbound frames are dispatched.
//!
//! # Flow control
//!
//! SPDY v3 governs outbound DATA with a per-stream window. Queued
//! payload is drained in window sized chunks at flush time; a stalled
//! stream resumes when the peer grants a WINDOW_UPDATE. v2 streams have
//! no flow control.

#![deny(rust_2018_idioms)]

macro_rules! proto_err {
    (session: $($msg:tt)+) => {
        log::debug!("session error PROTOCOL_ERROR -- {};", format_args!($($msg)+))
    };
    (stream: $($msg:tt)+) => {
        log::debug!("stream error PROTOCOL_ERROR -- {};", format_args!($($msg)+))
    };
}

mod config;
mod consts;
mod error;
mod headers;
mod message;
mod session;
mod stream;
mod window;

pub mod codec;
pub mod frame;
pub mod zlib;

pub use self::codec::{Generator, Parser, ParserListener};
pub use self::config::Config;
pub use self::error::{OperationError, SessionError, StreamError};
pub use self::frame::{SessionStatus, StreamId, StreamStatus, Version};
pub use self::headers::Headers;
pub use self::message::{
    DataInfo, GoAwayInfo, HeadersInfo, PingInfo, ReplyInfo, RstInfo, SettingsInfo, SynInfo,
};
pub use self::session::{
    Controller, FrameListener, Session, SessionListener, StreamFrameListener, WriteCompletion,
};
pub use self::stream::{CloseState, StreamRef};
