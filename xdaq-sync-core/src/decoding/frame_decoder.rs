//! Decoding of raw acquisition buffers into timestamped sample batches.
//!
//! The device delivers a buffer holding one or more per-timestep frames
//! back to back. Every frame has the same size, negotiated at startup as
//! `sample_size_bytes × active_streams`.
//!
//! Frame layout (little-endian):
//! ```text
//! [0-7]    magic (0xD7A22AAA38132A53)
//! [8-11]   timestamp (u32, device sample counter)
//! [12..]   stream payload (opaque)
//! ```
use crate::models::error::{InvalidFrame, SyncError};

/// Magic number at the start of every device frame.
pub const FRAME_MAGIC: u64 = 0xD7A2_2AAA_3813_2A53;

/// Byte offset of the timestamp within a frame.
pub const DEFAULT_TIMESTAMP_OFFSET: usize = 8;

const TIMESTAMP_WIDTH: usize = 4;

/// Negotiated frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    frame_size_bytes: usize,
    num_streams: usize,
    timestamp_offset: usize,
}

impl FrameLayout {
    pub fn new(frame_size_bytes: usize, num_streams: usize) -> Result<Self, SyncError> {
        Self::with_timestamp_offset(frame_size_bytes, num_streams, DEFAULT_TIMESTAMP_OFFSET)
    }

    pub fn with_timestamp_offset(
        frame_size_bytes: usize,
        num_streams: usize,
        timestamp_offset: usize,
    ) -> Result<Self, SyncError> {
        if num_streams == 0 {
            return Err(SyncError::Configuration("no active streams".into()));
        }
        if frame_size_bytes < timestamp_offset + TIMESTAMP_WIDTH {
            return Err(SyncError::Configuration(format!(
                "frame size {} too small for timestamp at offset {}",
                frame_size_bytes, timestamp_offset
            )));
        }
        Ok(Self {
            frame_size_bytes,
            num_streams,
            timestamp_offset,
        })
    }

    /// Derive the layout from device-reported sample size and stream count.
    pub fn from_device(sample_size_bytes: usize, num_streams: usize) -> Result<Self, SyncError> {
        let frame_size = sample_size_bytes
            .checked_mul(num_streams)
            .ok_or_else(|| SyncError::Configuration("frame size overflow".into()))?;
        Self::new(frame_size, num_streams)
    }

    pub fn frame_size_bytes(&self) -> usize {
        self.frame_size_bytes
    }

    pub fn num_streams(&self) -> usize {
        self.num_streams
    }

    /// Validate `raw` and wrap it in a [`SampleBatch`] view.
    pub fn decode<'a>(&self, raw: &'a [u8]) -> Result<SampleBatch<'a>, InvalidFrame> {
        if raw.is_empty() || raw.len() % self.frame_size_bytes != 0 {
            return Err(InvalidFrame {
                length: raw.len(),
                frame_size_bytes: self.frame_size_bytes,
            });
        }
        Ok(SampleBatch { raw, layout: *self })
    }
}

/// Decode `raw` against an ad-hoc frame size.
///
/// A frame size that cannot hold a timestamp rejects every buffer.
pub fn decode(
    raw: &[u8],
    frame_size_bytes: usize,
    num_streams: usize,
) -> Result<SampleBatch<'_>, InvalidFrame> {
    let layout = FrameLayout::new(frame_size_bytes, num_streams).map_err(|_| InvalidFrame {
        length: raw.len(),
        frame_size_bytes,
    })?;
    layout.decode(raw)
}

/// Zero-copy view over a validated raw buffer.
#[derive(Debug, Clone, Copy)]
pub struct SampleBatch<'a> {
    raw: &'a [u8],
    layout: FrameLayout,
}

impl<'a> SampleBatch<'a> {
    pub fn num_samples(&self) -> usize {
        self.raw.len() / self.layout.frame_size_bytes
    }

    pub fn num_streams(&self) -> usize {
        self.layout.num_streams
    }

    pub fn len_bytes(&self) -> usize {
        self.raw.len()
    }

    /// Timestamp of sample `index`, or `None` past the end.
    pub fn timestamp(&self, index: usize) -> Option<u64> {
        if index >= self.num_samples() {
            return None;
        }
        let start = index * self.layout.frame_size_bytes + self.layout.timestamp_offset;
        let bytes: [u8; TIMESTAMP_WIDTH] = self.raw[start..start + TIMESTAMP_WIDTH].try_into().ok()?;
        Some(u32::from_le_bytes(bytes) as u64)
    }

    /// A validated batch always holds at least one sample.
    pub fn first_timestamp(&self) -> u64 {
        self.timestamp(0).unwrap_or_default()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = u64> + 'a {
        let batch = *self;
        (0..batch.num_samples()).filter_map(move |i| batch.timestamp(i))
    }

    /// Raw bytes of sample `index`.
    pub fn sample(&self, index: usize) -> Option<&'a [u8]> {
        let size = self.layout.frame_size_bytes;
        self.raw.get(index * size..(index + 1) * size)
    }
}

/// Encode one device frame; the payload is zero-filled.
///
/// Used by synthetic sources and tests.
pub fn encode_frame(layout: &FrameLayout, timestamp: u32, out: &mut Vec<u8>) {
    let start = out.len();
    out.resize(start + layout.frame_size_bytes, 0);
    let frame = &mut out[start..];
    if layout.timestamp_offset >= 8 {
        frame[0..8].copy_from_slice(&FRAME_MAGIC.to_le_bytes());
    }
    let ts = layout.timestamp_offset;
    frame[ts..ts + TIMESTAMP_WIDTH].copy_from_slice(&timestamp.to_le_bytes());
}
