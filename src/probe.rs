//! Lightweight stream probing.
//!
//! [`probe`] reports what an extraction would see (source size, frame
//! count, keyframe layout) from a packet-only pass. No picture is decoded,
//! so it is cheap enough to run before choosing indices for
//! [`extract_indices`](crate::extract_indices).

use ffmpeg_next::codec::context::Context as CodecContext;

use crate::demux::Demuxer;
use crate::error::LoadvidError;
use crate::stream_index::StreamIndex;

/// Facts about the primary video stream of an encoded blob.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Frames available to extraction; valid indices are `0..frame_count`.
    pub frame_count: u64,
    /// Guessed frame rate, `0.0` when unknown.
    pub frames_per_second: f64,
    /// Number of keyframes found.
    pub keyframe_count: usize,
    /// Mean distance between keyframes in frames.
    pub keyframe_interval: u64,
    /// Whether packet timestamps allow seeking.
    pub seekable: bool,
    /// Decoder name, e.g. `h264`.
    pub codec: String,
}

/// Probe `encoded` without decoding any picture.
///
/// # Errors
///
/// - [`LoadvidError::EmptyInput`] for an empty buffer.
/// - [`LoadvidError::Container`] / [`LoadvidError::NoVideoStream`] when the
///   buffer is not a video container.
///
/// # Example
///
/// ```no_run
/// let encoded = std::fs::read("clip.mp4")?;
/// let info = loadvid::probe(&encoded)?;
/// println!("{}x{}, {} frames", info.width, info.height, info.frame_count);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn probe(encoded: &[u8]) -> Result<VideoInfo, LoadvidError> {
    if encoded.is_empty() {
        return Err(LoadvidError::EmptyInput);
    }

    let mut demuxer = Demuxer::open(encoded)?;
    let stream = demuxer.stream_info().clone();
    let decoder = CodecContext::from_parameters(demuxer.codec_parameters()?)?
        .decoder()
        .video()?;
    let (width, height) = (decoder.width(), decoder.height());
    let index = StreamIndex::scan(&mut demuxer);

    Ok(VideoInfo {
        width,
        height,
        frame_count: index.total_frames(),
        frames_per_second: stream.frames_per_second,
        keyframe_count: index.keyframes().len(),
        keyframe_interval: index.keyframe_interval(),
        seekable: index.is_reliable() && !index.keyframes().is_empty(),
        codec: stream.codec,
    })
}
