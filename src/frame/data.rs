use ntex_bytes::BufMut;

use crate::error::StreamError;

use super::{DataHead, StreamId, StreamStatus};

const FLAG_FIN: u8 = 0x01;

/// Data frame
///
/// The payload travels separately: the parser hands it to the listener
/// as raw bytes next to this descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Data {
    pub stream_id: StreamId,
    pub fin: bool,
}

impl Data {
    pub fn is_fin(&self) -> bool {
        self.fin
    }

    pub fn load(head: DataHead) -> Result<Data, StreamError> {
        if head.flags & !FLAG_FIN != 0 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                format!("invalid DATA flags {:#04x}", head.flags),
            )
            .on_stream(head.stream_id, None));
        }

        Ok(Data {
            stream_id: head.stream_id,
            fin: head.flags & FLAG_FIN != 0,
        })
    }

    /// Writes one data frame carrying `payload`.
    pub fn encode<B: BufMut>(stream_id: StreamId, fin: bool, payload: &[u8], dst: &mut B) {
        let flags = if fin { FLAG_FIN } else { 0 };
        DataHead::new(stream_id, flags).encode(payload.len(), dst);
        dst.put_slice(payload);
    }
}
