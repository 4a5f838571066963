//! Extraction results.

use image::RgbImage;

/// Counters collected while extracting.
///
/// Every decoded frame is either converted or discarded, so
/// `frames_decoded == frames_converted + frames_discarded` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// Video packets fed to the decoder.
    pub packets_read: u64,
    /// Frames that came out of the decoder.
    pub frames_decoded: u64,
    /// Frames converted into the output buffer.
    pub frames_converted: u64,
    /// Frames decoded but not wanted.
    pub frames_discarded: u64,
    /// Successful seeks.
    pub seeks: u64,
    /// Packets the decoder rejected.
    pub decode_errors: u64,
    /// Whether seeking was abandoned for a sequential scan.
    pub fell_back_to_sequential: bool,
}

/// Decoded frames packed as one `[frame_count, height, width, 3]` RGB buffer.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Packed RGB24 bytes, frame after frame, rows top to bottom.
    pub frames: Vec<u8>,
    /// Number of frames in `frames`. May be lower than requested when the
    /// stream ended early.
    pub frame_count: usize,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Width of the decoded video.
    pub source_width: u32,
    /// Height of the decoded video.
    pub source_height: u32,
    /// Presentation index of each frame in `frames`.
    pub frame_indices: Vec<u64>,
    /// What the extraction had to do to get there.
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    /// Bytes per frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Number of frames; same as `frame_count`.
    pub fn len(&self) -> usize {
        self.frame_count
    }

    /// Whether no frame was extracted.
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// RGB bytes of frame `position` (position in the output, not the
    /// presentation index).
    pub fn frame(&self, position: usize) -> Option<&[u8]> {
        if position >= self.frame_count {
            return None;
        }
        let size = self.frame_bytes();
        self.frames.get(position * size..(position + 1) * size)
    }

    /// Copy frame `position` into an [`RgbImage`].
    pub fn frame_image(&self, position: usize) -> Option<RgbImage> {
        let bytes = self.frame(position)?;
        RgbImage::from_raw(self.width, self.height, bytes.to_vec())
    }

    /// Iterate over the frames in output order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.frames
            .chunks_exact(self.frame_bytes().max(1))
            .take(self.frame_count)
    }

    /// Take ownership of the packed buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.frames
    }
}
