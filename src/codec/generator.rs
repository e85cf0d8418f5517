use std::cmp;

use ntex_bytes::{Bytes, BytesMut};

use crate::consts::HEADER_LENGTH;
use crate::error::OperationError;
use crate::frame::{ControlFrame, Data, StreamId};
use crate::message::DataInfo;
use crate::zlib::Compressor;

/// Serialises frames to contiguous wire buffers.
///
/// Owns the session's deflate context, so control-frame generation must
/// stay serialised with stream id allocation: an interleaving would let a
/// later id's compressed block reference dictionary state the peer has
/// not seen yet.
pub struct Generator {
    compressor: Compressor,
}

impl Generator {
    pub fn new() -> Generator {
        Generator {
            compressor: Compressor::new(),
        }
    }

    pub fn control(&mut self, frame: &ControlFrame) -> Result<Bytes, OperationError> {
        let mut dst = BytesMut::with_capacity(64);
        match *frame {
            ControlFrame::SynStream(ref f) => f.encode(&mut self.compressor, &mut dst)?,
            ControlFrame::SynReply(ref f) => f.encode(&mut self.compressor, &mut dst)?,
            ControlFrame::Headers(ref f) => f.encode(&mut self.compressor, &mut dst)?,
            ControlFrame::Reset(ref f) => f.encode(&mut dst)?,
            ControlFrame::Settings(ref f) => f.encode(&mut dst),
            ControlFrame::Noop(ref f) => f.encode(&mut dst),
            ControlFrame::Ping(ref f) => f.encode(&mut dst),
            ControlFrame::GoAway(ref f) => f.encode(&mut dst),
            ControlFrame::WindowUpdate(ref f) => f.encode(&mut dst),
        }
        Ok(dst.freeze())
    }

    /// Produces one data frame draining up to `max_len` payload bytes
    /// from `info`. The FIN flag is set only on the chunk that consumes a
    /// close-marked payload.
    pub fn data(stream_id: StreamId, max_len: usize, info: &mut DataInfo) -> Bytes {
        let len = cmp::min(max_len, info.available());
        let fin = info.is_close() && len == info.available();
        let payload = info.consume(len);

        let mut dst = BytesMut::with_capacity(HEADER_LENGTH + len);
        Data::encode(stream_id, fin, &payload, &mut dst);
        dst.freeze()
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}
