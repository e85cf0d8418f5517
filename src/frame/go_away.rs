use ntex_bytes::{Buf, BufMut, BytesMut};

use crate::error::StreamError;

use super::{ControlFrame, ControlHead, Kind, SessionStatus, StreamId, StreamStatus, Version};

/// GO_AWAY frame
///
/// The v2 body is the last stream id alone; v3 appends a session status
/// code, so both sides must branch on the version.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GoAway {
    pub version: Version,
    pub last_stream_id: StreamId,
    pub status: SessionStatus,
}

impl GoAway {
    pub fn new(version: Version, last_stream_id: StreamId, status: SessionStatus) -> GoAway {
        GoAway {
            version,
            last_stream_id,
            status,
        }
    }

    pub fn load(version: Version, body: &mut BytesMut) -> Result<GoAway, StreamError> {
        let expected = match version {
            Version::V2 => 4,
            Version::V3 => 8,
        };
        if body.remaining() != expected {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "GO_AWAY body length does not match version",
            ));
        }
        let last_stream_id = StreamId::new(body.get_u32());
        let status = match version {
            Version::V2 => SessionStatus::Ok,
            Version::V3 => {
                let code = body.get_u32();
                SessionStatus::from_code(code).ok_or_else(|| {
                    StreamError::new(
                        StreamStatus::ProtocolError,
                        format!("unknown GO_AWAY status code {}", code),
                    )
                })?
            }
        };

        Ok(GoAway {
            version,
            last_stream_id,
            status,
        })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        log::trace!(
            "encoding GO_AWAY; last={:?} status={}",
            self.last_stream_id,
            self.status
        );
        let head = ControlHead::new(Kind::GoAway, self.version, 0);
        match self.version {
            Version::V2 => {
                head.encode(4, dst);
                dst.put_u32(self.last_stream_id.into());
            }
            Version::V3 => {
                head.encode(8, dst);
                dst.put_u32(self.last_stream_id.into());
                dst.put_u32(self.status.code());
            }
        }
    }
}

impl From<GoAway> for ControlFrame {
    fn from(src: GoAway) -> ControlFrame {
        ControlFrame::GoAway(src)
    }
}
