//! Diagnostic message kinds
//!
//! A dump is `Hello`, `Counters`, `Session`, `Health`, one `Sample` per
//! logged entry (oldest first), the raw store in `StoreChunk`s, then `End`.

use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};
use heapless::Vec;

pub const MSG_HELLO: u8 = 0x01;
pub const MSG_COUNTERS: u8 = 0x10;
pub const MSG_SESSION: u8 = 0x11;
pub const MSG_HEALTH: u8 = 0x12;
pub const MSG_SAMPLE: u8 = 0x13;
pub const MSG_STORE_CHUNK: u8 = 0x14;
pub const MSG_END: u8 = 0x1F;

/// Raw store bytes carried per chunk frame
pub const STORE_CHUNK_SIZE: usize = 64;

/// Lifetime counters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CountersReport {
    pub drive_sessions: u32,
    pub charge_sessions: u32,
    pub odometer_km: f32,
    pub store_version: u16,
}

/// Current session and trip
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionReport {
    /// 0 = driving, 1 = charging
    pub mode: u8,
    pub start_charge_level: u16,
    pub start_charge_percent: f32,
    pub odometer_km: f32,
    pub last_charge_level: u16,
    pub ticks: u32,
    pub trip_km: f32,
}

/// Fault and staleness counters since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthReport {
    pub sensor_faults: u32,
    pub storage_failures: u32,
    pub clamped_estimates: u32,
    pub glitches_rejected: u32,
    pub stale_ticks: u32,
    pub ticks_since_update: u32,
}

/// One message of a diagnostics dump
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticMessage<'a> {
    /// Start of dump
    Hello {
        store_version: u16,
        log_capacity: u16,
        store_bytes: u16,
    },
    Counters(CountersReport),
    Session(SessionReport),
    Health(HealthReport),
    /// Logged sample, `index` counted from the oldest
    Sample {
        index: u16,
        progress: f32,
        charge_percent: f32,
    },
    /// Raw store contents starting at `offset`
    StoreChunk { offset: u16, bytes: &'a [u8] },
    /// End of dump
    End { samples: u16, store_bytes: u16 },
}

impl<'a> DiagnosticMessage<'a> {
    /// Encode into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let mut p = Payload::default();
        let kind = match self {
            DiagnosticMessage::Hello {
                store_version,
                log_capacity,
                store_bytes,
            } => {
                p.u16(*store_version)?.u16(*log_capacity)?.u16(*store_bytes)?;
                MSG_HELLO
            }
            DiagnosticMessage::Counters(c) => {
                p.u32(c.drive_sessions)?
                    .u32(c.charge_sessions)?
                    .f32(c.odometer_km)?
                    .u16(c.store_version)?;
                MSG_COUNTERS
            }
            DiagnosticMessage::Session(s) => {
                p.u8(s.mode)?
                    .u16(s.start_charge_level)?
                    .f32(s.start_charge_percent)?
                    .f32(s.odometer_km)?
                    .u16(s.last_charge_level)?
                    .u32(s.ticks)?
                    .f32(s.trip_km)?;
                MSG_SESSION
            }
            DiagnosticMessage::Health(h) => {
                p.u32(h.sensor_faults)?
                    .u32(h.storage_failures)?
                    .u32(h.clamped_estimates)?
                    .u32(h.glitches_rejected)?
                    .u32(h.stale_ticks)?
                    .u32(h.ticks_since_update)?;
                MSG_HEALTH
            }
            DiagnosticMessage::Sample {
                index,
                progress,
                charge_percent,
            } => {
                p.u16(*index)?.f32(*progress)?.f32(*charge_percent)?;
                MSG_SAMPLE
            }
            DiagnosticMessage::StoreChunk { offset, bytes } => {
                p.u16(*offset)?.bytes(bytes)?;
                MSG_STORE_CHUNK
            }
            DiagnosticMessage::End {
                samples,
                store_bytes,
            } => {
                p.u16(*samples)?.u16(*store_bytes)?;
                MSG_END
            }
        };
        Frame::new(kind, &p.0)
    }

    /// Decode a frame, borrowing chunk bytes from it
    pub fn from_frame(frame: &'a Frame) -> Result<Self, FrameError> {
        let mut r = Reader(&frame.payload);
        let message = match frame.kind {
            MSG_HELLO => DiagnosticMessage::Hello {
                store_version: r.u16()?,
                log_capacity: r.u16()?,
                store_bytes: r.u16()?,
            },
            MSG_COUNTERS => DiagnosticMessage::Counters(CountersReport {
                drive_sessions: r.u32()?,
                charge_sessions: r.u32()?,
                odometer_km: r.f32()?,
                store_version: r.u16()?,
            }),
            MSG_SESSION => DiagnosticMessage::Session(SessionReport {
                mode: r.u8()?,
                start_charge_level: r.u16()?,
                start_charge_percent: r.f32()?,
                odometer_km: r.f32()?,
                last_charge_level: r.u16()?,
                ticks: r.u32()?,
                trip_km: r.f32()?,
            }),
            MSG_HEALTH => DiagnosticMessage::Health(HealthReport {
                sensor_faults: r.u32()?,
                storage_failures: r.u32()?,
                clamped_estimates: r.u32()?,
                glitches_rejected: r.u32()?,
                stale_ticks: r.u32()?,
                ticks_since_update: r.u32()?,
            }),
            MSG_SAMPLE => DiagnosticMessage::Sample {
                index: r.u16()?,
                progress: r.f32()?,
                charge_percent: r.f32()?,
            },
            MSG_STORE_CHUNK => DiagnosticMessage::StoreChunk {
                offset: r.u16()?,
                bytes: r.rest(),
            },
            MSG_END => DiagnosticMessage::End {
                samples: r.u16()?,
                store_bytes: r.u16()?,
            },
            other => return Err(FrameError::UnknownKind(other)),
        };

        if r.0.is_empty() {
            Ok(message)
        } else {
            Err(FrameError::InvalidPayload)
        }
    }
}

#[derive(Default)]
struct Payload(Vec<u8, MAX_PAYLOAD_SIZE>);

impl Payload {
    fn bytes(&mut self, data: &[u8]) -> Result<&mut Self, FrameError> {
        self.0
            .extend_from_slice(data)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(self)
    }

    fn u8(&mut self, value: u8) -> Result<&mut Self, FrameError> {
        self.bytes(&[value])
    }

    fn u16(&mut self, value: u16) -> Result<&mut Self, FrameError> {
        self.bytes(&value.to_le_bytes())
    }

    fn u32(&mut self, value: u32) -> Result<&mut Self, FrameError> {
        self.bytes(&value.to_le_bytes())
    }

    fn f32(&mut self, value: f32) -> Result<&mut Self, FrameError> {
        self.bytes(&value.to_le_bytes())
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        if self.0.len() < N {
            return Err(FrameError::InvalidPayload);
        }
        let (head, tail) = self.0.split_at(N);
        self.0 = tail;
        let mut out = [0u8; N];
        out.copy_from_slice(head);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        self.take().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, FrameError> {
        self.take().map(u32::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, FrameError> {
        self.take().map(f32::from_le_bytes)
    }

    fn rest(&mut self) -> &'a [u8] {
        core::mem::take(&mut self.0)
    }
}
