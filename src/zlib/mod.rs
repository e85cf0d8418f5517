//! zlib header-block coding with the SPDY preset dictionaries.
//!
//! Header blocks are deflated with SYNC_FLUSH framing against a
//! version-specific preset dictionary. Both directions are stateful for
//! the life of a session: the dictionary is primed from the version of
//! the first block handled and the compression history carries across
//! frames, which is why block coding must be serialised with stream id
//! allocation on the send side.

mod dictionary;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};
use ntex_bytes::{BufMut, BytesMut};

use crate::error::StreamError;
use crate::frame::{StreamStatus, Version};
use crate::headers::Headers;

pub use self::dictionary::{V2_DICTIONARY, V3_DICTIONARY};

const CHUNK: usize = 512;

/// Stateful deflate context for outgoing header blocks.
pub struct Compressor {
    z: Compress,
    primed: bool,
}

impl Compressor {
    pub fn new() -> Compressor {
        Compressor {
            z: Compress::new(Compression::default(), true),
            primed: false,
        }
    }

    /// Deflates `input` with a SYNC_FLUSH, so the peer can fully inflate
    /// the block without seeing end-of-stream.
    pub fn compress(&mut self, version: Version, input: &[u8]) -> Result<Vec<u8>, StreamError> {
        if !self.primed {
            self.z
                .set_dictionary(dictionary::for_version(version))
                .map_err(|e| {
                    StreamError::new(
                        StreamStatus::InternalError,
                        format!("failed to prime deflate dictionary: {}", e),
                    )
                })?;
            self.primed = true;
        }

        let mut out = Vec::with_capacity(input.len() + CHUNK);
        let mut pos = 0;
        loop {
            let before = self.z.total_in();
            self.z
                .compress_vec(&input[pos..], &mut out, FlushCompress::Sync)
                .map_err(|e| {
                    StreamError::new(
                        StreamStatus::InternalError,
                        format!("deflate failed: {}", e),
                    )
                })?;
            pos += (self.z.total_in() - before) as usize;

            // A sync flush is complete once all input is consumed and the
            // output buffer was not filled to capacity.
            if pos == input.len() && out.len() < out.capacity() {
                return Ok(out);
            }
            out.reserve(CHUNK);
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Compressor::new()
    }
}

/// Stateful inflate context for incoming header blocks.
///
/// The caller must hand over the complete compressed block: SYNC_FLUSH
/// framing never signals end-of-stream, so completion can only be judged
/// by having consumed exactly `length` input bytes.
pub struct Decompressor {
    z: Decompress,
    poisoned: bool,
}

impl Decompressor {
    pub fn new() -> Decompressor {
        Decompressor {
            z: Decompress::new(true),
            poisoned: false,
        }
    }

    /// True once the inflate context hit a hard error; the compression
    /// history is lost and no later block on this session can be decoded.
    pub fn poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn decompress(&mut self, version: Version, input: &[u8]) -> Result<Vec<u8>, StreamError> {
        let mut out = Vec::with_capacity(input.len() * 2 + CHUNK);
        let mut pos = 0;
        loop {
            let before = self.z.total_in();
            match self
                .z
                .decompress_vec(&input[pos..], &mut out, FlushDecompress::Sync)
            {
                Ok(_) => {
                    pos += (self.z.total_in() - before) as usize;
                    if pos == input.len() && out.len() < out.capacity() {
                        return Ok(out);
                    }
                    out.reserve(CHUNK);
                }
                Err(e) if e.needs_dictionary().is_some() => {
                    pos += (self.z.total_in() - before) as usize;
                    self.z
                        .set_dictionary(dictionary::for_version(version))
                        .map_err(|e| {
                            StreamError::new(
                                StreamStatus::ProtocolError,
                                format!("inflate dictionary mismatch: {}", e),
                            )
                        })?;
                }
                Err(e) => {
                    self.poisoned = true;
                    return Err(StreamError::new(
                        StreamStatus::ProtocolError,
                        format!("corrupted header block: {}", e),
                    ));
                }
            }
        }
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Decompressor::new()
    }
}

/// Inflates and decodes a complete header block.
pub fn decode_block(
    version: Version,
    block: &[u8],
    decompressor: &mut Decompressor,
) -> Result<Headers, StreamError> {
    let plain = decompressor.decompress(version, block)?;
    decode_headers(version, &plain)
}

/// Encodes and deflates a header block.
pub fn encode_block(
    version: Version,
    headers: &Headers,
    compressor: &mut Compressor,
) -> Result<Vec<u8>, StreamError> {
    let plain = encode_headers(version, headers)?;
    compressor.compress(version, &plain)
}

/// Decodes the uncompressed name/value pair block: a pair count (16 bit
/// at v2, 32 bit at v3), then per pair a length prefixed name and value
/// using the same width. Values of a repeated name are NUL separated.
pub fn decode_headers(version: Version, mut plain: &[u8]) -> Result<Headers, StreamError> {
    let count = read_length(version, &mut plain)?;

    let mut headers = Headers::new();
    for _ in 0..count {
        let name_len = read_length(version, &mut plain)?;
        if name_len == 0 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "invalid header name length",
            ));
        }
        let name = read_string(&mut plain, name_len)?;

        let value_len = read_length(version, &mut plain)?;
        if value_len == 0 {
            return Err(StreamError::new(
                StreamStatus::ProtocolError,
                "invalid header value length",
            ));
        }
        let value = read_string(&mut plain, value_len)?;

        // Multi valued headers are NUL separated; an empty part means
        // consecutive or dangling NULs (section 2.6.9)
        for part in value.split('\u{0}') {
            if part.is_empty() {
                return Err(StreamError::new(
                    StreamStatus::ProtocolError,
                    "invalid multi valued header",
                ));
            }
            headers.add(name.clone(), part);
        }
    }
    Ok(headers)
}

/// Encodes the uncompressed name/value pair block.
pub fn encode_headers(version: Version, headers: &Headers) -> Result<Vec<u8>, StreamError> {
    let mut dst = BytesMut::with_capacity(64);
    write_length(version, headers.len(), &mut dst)?;

    for (name, values) in headers.iter() {
        let name = iso_bytes(name)?;
        write_length(version, name.len(), &mut dst)?;
        dst.extend_from_slice(&name);

        let mut value = Vec::new();
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                value.push(0);
            }
            value.extend_from_slice(&iso_bytes(v)?);
        }
        write_length(version, value.len(), &mut dst)?;
        dst.extend_from_slice(&value);
    }
    Ok(dst.to_vec())
}

fn read_length(version: Version, plain: &mut &[u8]) -> Result<usize, StreamError> {
    let width = match version {
        Version::V2 => 2,
        Version::V3 => 4,
    };
    if plain.len() < width {
        return Err(StreamError::new(
            StreamStatus::ProtocolError,
            "truncated header block",
        ));
    }
    let value = match version {
        Version::V2 => ((plain[0] as usize) << 8) | plain[1] as usize,
        Version::V3 => {
            ((plain[0] as usize) << 24)
                | ((plain[1] as usize) << 16)
                | ((plain[2] as usize) << 8)
                | plain[3] as usize
        }
    };
    *plain = &plain[width..];
    Ok(value)
}

fn read_string(plain: &mut &[u8], len: usize) -> Result<String, StreamError> {
    if plain.len() < len {
        return Err(StreamError::new(
            StreamStatus::ProtocolError,
            "truncated header block",
        ));
    }
    let value = iso_string(&plain[..len]);
    *plain = &plain[len..];
    Ok(value)
}

fn write_length(version: Version, len: usize, dst: &mut BytesMut) -> Result<(), StreamError> {
    match version {
        Version::V2 => {
            if len > u16::MAX as usize {
                return Err(StreamError::new(
                    StreamStatus::ProtocolError,
                    "header block field too large for v2",
                ));
            }
            dst.put_u16(len as u16);
        }
        Version::V3 => dst.put_u32(len as u32),
    }
    Ok(())
}

/// ISO-8859-1 octets map 1:1 onto the first 256 Unicode code points.
fn iso_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn iso_bytes(s: &str) -> Result<Vec<u8>, StreamError> {
    s.chars()
        .map(|c| {
            let code = c as u32;
            if code <= 0xFF {
                Ok(code as u8)
            } else {
                Err(StreamError::new(
                    StreamStatus::ProtocolError,
                    "header not representable in ISO-8859-1",
                ))
            }
        })
        .collect()
}
