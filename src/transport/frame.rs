//! Delimited message framing
//!
//! A message is bincode-encoded, byte-stuffed with COBS so the payload never
//! contains `0x00`, then terminated by a single `0x00`. Readers accumulate
//! bytes until the delimiter, refusing to buffer more than a configured limit.

use crate::transport::error::{TransportError, TransportResult};
use crate::transport::mux::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Frame terminator
pub const DELIMITER: u8 = 0x00;

/// Default bound on one encoded frame
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024;

/// Encode `msg` as one complete delimited frame
pub fn encode_message<T: Serialize>(msg: &T) -> TransportResult<Vec<u8>> {
    let raw = bincode::serialize(msg)?;
    let mut out = cobs_encode(&raw);
    out.push(DELIMITER);
    Ok(out)
}

/// Decode the contents of one frame (delimiter already stripped)
pub fn decode_message<T: DeserializeOwned>(frame: &[u8]) -> TransportResult<T> {
    let raw = cobs_decode(frame)?;
    bincode::deserialize(&raw).map_err(|e| TransportError::MalformedFrame(e.to_string()))
}

fn cobs_encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 254 + 2);
    let mut code_at = 0;
    let mut code: u8 = 1;
    out.push(0);

    for &byte in input {
        if byte == 0 {
            out[code_at] = code;
            code_at = out.len();
            out.push(0);
            code = 1;
            continue;
        }

        out.push(byte);
        code += 1;
        if code == 0xFF {
            out[code_at] = code;
            code_at = out.len();
            out.push(0);
            code = 1;
        }
    }

    out[code_at] = code;
    out
}

fn cobs_decode(input: &[u8]) -> TransportResult<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        let code = input[i] as usize;
        if code == 0 {
            return Err(TransportError::MalformedFrame(
                "zero byte inside frame".to_string(),
            ));
        }

        let end = i + code;
        if end > input.len() {
            return Err(TransportError::MalformedFrame(
                "truncated stuffing block".to_string(),
            ));
        }

        out.extend_from_slice(&input[i + 1..end]);
        i = end;
        if code != 0xFF && i < input.len() {
            out.push(0);
        }
    }

    Ok(out)
}

/// Accumulates raw bytes and yields complete frames
#[derive(Debug)]
pub struct MessageDecoder {
    buf: Vec<u8>,
    max_frame: usize,
}

impl MessageDecoder {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered toward an incomplete frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame without its delimiter, if one is buffered
    pub fn next_frame(&mut self) -> TransportResult<Option<Vec<u8>>> {
        match self.buf.iter().position(|b| *b == DELIMITER) {
            Some(pos) if pos > self.max_frame => Err(TransportError::FrameTooLarge {
                len: pos,
                max: self.max_frame,
            }),
            Some(pos) => {
                let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
                frame.pop();
                Ok(Some(frame))
            }
            None if self.buf.len() > self.max_frame => Err(TransportError::FrameTooLarge {
                len: self.buf.len(),
                max: self.max_frame,
            }),
            None => Ok(None),
        }
    }

    /// Next complete message, if one is buffered
    pub fn next_message<T: DeserializeOwned>(&mut self) -> TransportResult<Option<T>> {
        match self.next_frame()? {
            Some(frame) => decode_message(&frame).map(Some),
            None => Ok(None),
        }
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

/// Write one message to a stream
pub fn write_message<T: Serialize>(stream: &mut Stream, msg: &T) -> TransportResult<()> {
    let bytes = encode_message(msg)?;
    stream.write_all(&bytes)
}

/// Read one message from a stream.
///
/// `Ok(None)` when the peer closed the stream without sending anything; a
/// close in the middle of a frame is malformed.
pub async fn read_message<T: DeserializeOwned>(
    stream: &mut Stream,
    decoder: &mut MessageDecoder,
) -> TransportResult<Option<T>> {
    loop {
        if let Some(msg) = decoder.next_message()? {
            return Ok(Some(msg));
        }

        match stream.read_chunk().await? {
            Some(chunk) => decoder.push(&chunk),
            None if decoder.pending() == 0 => return Ok(None),
            None => {
                return Err(TransportError::MalformedFrame(
                    "stream ended inside a frame".to_string(),
                ))
            }
        }
    }
}
