//! Frame encoding and decoding
//!
//! - START: `0x7E`
//! - LENGTH: payload length (0-96)
//! - KIND: message kind
//! - SEQ: wrapping frame counter
//! - PAYLOAD
//! - CHECKSUM: XOR of LENGTH, KIND, SEQ and every payload byte

use heapless::Vec;

/// Frame synchronization byte
pub const FRAME_START: u8 = 0x7E;

/// Largest payload a frame carries
pub const MAX_PAYLOAD_SIZE: usize = 96;

/// START + LENGTH + KIND + SEQ + payload + CHECKSUM
pub const MAX_FRAME_SIZE: usize = 4 + MAX_PAYLOAD_SIZE + 1;

const OVERHEAD: usize = 5;

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds [`MAX_PAYLOAD_SIZE`]
    PayloadTooLarge,
    /// Checksum mismatch
    InvalidChecksum,
    /// Length byte out of range
    InvalidLength,
    /// Payload does not match its message kind
    InvalidPayload,
    /// Unknown message kind
    UnknownKind(u8),
    /// Output buffer too small
    BufferTooSmall,
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u8,
    pub seq: u8,
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a frame; `seq` is assigned by the sender at encode time
    pub fn new(kind: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self {
            kind,
            seq: 0,
            payload,
        })
    }

    /// Frame with no payload
    pub fn empty(kind: u8) -> Self {
        Self {
            kind,
            seq: 0,
            payload: Vec::new(),
        }
    }

    /// Same frame with sequence number `seq`
    pub fn with_seq(mut self, seq: u8) -> Self {
        self.seq = seq;
        self
    }

    /// Bytes on the wire
    pub fn encoded_len(&self) -> usize {
        OVERHEAD + self.payload.len()
    }

    fn checksum(length: u8, kind: u8, seq: u8, payload: &[u8]) -> u8 {
        payload.iter().fold(length ^ kind ^ seq, |acc, &b| acc ^ b)
    }

    /// Encode into `buffer`, returning the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let len = self.encoded_len();
        if buffer.len() < len {
            return Err(FrameError::BufferTooSmall);
        }

        let length = self.payload.len() as u8;
        buffer[0] = FRAME_START;
        buffer[1] = length;
        buffer[2] = self.kind;
        buffer[3] = self.seq;
        buffer[4..len - 1].copy_from_slice(&self.payload);
        buffer[len - 1] = Self::checksum(length, self.kind, self.seq, &self.payload);

        Ok(len)
    }

    /// Encode into a heapless Vec
    pub fn encode_to_vec(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        // The payload can never exceed MAX_PAYLOAD_SIZE, so the buffer fits
        let len = self.encode(&mut buffer).unwrap_or(0);
        let mut out = Vec::new();
        let _ = out.extend_from_slice(&buffer[..len]);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Length,
    Kind,
    Seq,
    Payload,
    Checksum,
}

/// Incremental frame decoder for the receiving side
#[derive(Debug, Clone)]
pub struct FrameParser {
    phase: Phase,
    length: u8,
    kind: u8,
    seq: u8,
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            phase: Phase::Start,
            length: 0,
            kind: 0,
            seq: 0,
            payload: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Start;
        self.payload.clear();
    }

    /// Feed one byte
    ///
    /// Returns `Ok(Some(frame))` when a frame completes, `Ok(None)` while
    /// more bytes are needed. Bytes before a START are skipped.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.phase {
            Phase::Start => {
                if byte == FRAME_START {
                    self.phase = Phase::Length;
                }
            }
            Phase::Length => {
                if byte as usize > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::InvalidLength);
                }
                self.length = byte;
                self.phase = Phase::Kind;
            }
            Phase::Kind => {
                self.kind = byte;
                self.phase = Phase::Seq;
            }
            Phase::Seq => {
                self.seq = byte;
                self.payload.clear();
                self.phase = if self.length == 0 {
                    Phase::Checksum
                } else {
                    Phase::Payload
                };
            }
            Phase::Payload => {
                // Length was bounded above
                let _ = self.payload.push(byte);
                if self.payload.len() == self.length as usize {
                    self.phase = Phase::Checksum;
                }
            }
            Phase::Checksum => {
                let expected = Frame::checksum(self.length, self.kind, self.seq, &self.payload);
                if byte != expected {
                    self.reset();
                    return Err(FrameError::InvalidChecksum);
                }

                let frame = Frame {
                    kind: self.kind,
                    seq: self.seq,
                    payload: self.payload.clone(),
                };
                self.reset();
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Feed bytes until a frame completes
    ///
    /// Returns the frame and the number of bytes consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
        for (i, &byte) in bytes.iter().enumerate() {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some((frame, i + 1)));
            }
        }
        Ok(None)
    }
}
