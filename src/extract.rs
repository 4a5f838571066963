//! Extraction entry points.
//!
//! Every call is self-contained: it opens its own demuxers and decoder over
//! the borrowed bytes, so calls on the same buffer can run concurrently from
//! different threads.
//!
//! An extraction makes two passes over the container. The first reads
//! packets only, to count frames and locate keyframes. The second decodes,
//! seeking past the frames nobody asked for.

use crate::assembler::Assembler;
use crate::conversion::OutputSize;
use crate::decoder::DecoderSession;
use crate::demux::Demuxer;
use crate::error::LoadvidError;
use crate::options::ExtractOptions;
use crate::result::ExtractionResult;
use crate::selection::SelectionPolicy;
use crate::selector::Selector;
use crate::stream_index::StreamIndex;

/// Extract `num_frames` frames spread evenly over the video.
///
/// Frames are resized to exactly `width × height` and packed as RGB24.
/// With `fps_cap`, consecutive frames are at least `ceil(fps / fps_cap)`
/// frames apart, so fewer than `num_frames` may be returned for short
/// videos. With `random_seek`, sampling starts at a random offset instead
/// of the first frame while keeping the same spacing.
///
/// # Errors
///
/// - [`LoadvidError::InvalidDimensions`], [`LoadvidError::EmptyInput`],
///   [`LoadvidError::InvalidFrameCount`] or [`LoadvidError::InvalidFpsCap`]
///   for bad arguments, before anything is decoded.
/// - [`LoadvidError::Container`] or [`LoadvidError::NoVideoStream`] when the
///   bytes are not a video.
/// - [`LoadvidError::Conversion`] when a frame cannot be converted to RGB.
///
/// # Example
///
/// ```no_run
/// let encoded = std::fs::read("clip.mp4")?;
/// let result = loadvid::extract_uniform(&encoded, 224, 224, 8, None, false)?;
/// assert_eq!(result.frames.len(), result.frame_count * 224 * 224 * 3);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn extract_uniform(
    encoded: &[u8],
    width: u32,
    height: u32,
    num_frames: u64,
    fps_cap: Option<u32>,
    random_seek: bool,
) -> Result<ExtractionResult, LoadvidError> {
    extract_uniform_with_options(
        encoded,
        width,
        height,
        num_frames,
        fps_cap,
        random_seek,
        &ExtractOptions::default(),
    )
}

/// [`extract_uniform`] with explicit [`ExtractOptions`].
pub fn extract_uniform_with_options(
    encoded: &[u8],
    width: u32,
    height: u32,
    num_frames: u64,
    fps_cap: Option<u32>,
    random_seek: bool,
    options: &ExtractOptions,
) -> Result<ExtractionResult, LoadvidError> {
    let policy = SelectionPolicy::Uniform {
        count: num_frames,
        fps_cap,
        random_seek,
    };
    extract(encoded, width, height, &policy, options)
}

/// Extract the frames at the given presentation indices.
///
/// `frame_indices` must be strictly increasing and inside the stream; use
/// [`probe`](crate::probe) to learn the frame count first.
///
/// # Errors
///
/// As [`extract_uniform`], plus [`LoadvidError::InvalidIndices`] for an
/// empty, unordered, duplicated or out-of-range index list.
///
/// # Example
///
/// ```no_run
/// let encoded = std::fs::read("clip.mp4")?;
/// let result = loadvid::extract_indices(&encoded, 64, 64, &[0, 10, 20])?;
/// assert_eq!(result.frame_indices, vec![0, 10, 20]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn extract_indices(
    encoded: &[u8],
    width: u32,
    height: u32,
    frame_indices: &[u64],
) -> Result<ExtractionResult, LoadvidError> {
    extract_indices_with_options(
        encoded,
        width,
        height,
        frame_indices,
        &ExtractOptions::default(),
    )
}

/// [`extract_indices`] with explicit [`ExtractOptions`].
pub fn extract_indices_with_options(
    encoded: &[u8],
    width: u32,
    height: u32,
    frame_indices: &[u64],
    options: &ExtractOptions,
) -> Result<ExtractionResult, LoadvidError> {
    let policy = SelectionPolicy::ExplicitIndices(frame_indices.to_vec());
    extract(encoded, width, height, &policy, options)
}

/// Extract the frames chosen by `policy`.
pub fn extract(
    encoded: &[u8],
    width: u32,
    height: u32,
    policy: &SelectionPolicy,
    options: &ExtractOptions,
) -> Result<ExtractionResult, LoadvidError> {
    let size = OutputSize::new(width, height)?;
    if encoded.is_empty() {
        return Err(LoadvidError::EmptyInput);
    }
    policy.validate()?;

    let (stream, index) = {
        let mut scan = Demuxer::open(encoded)?;
        let stream = scan.stream_info().clone();
        (stream, StreamIndex::scan(&mut scan))
    };
    let wanted = policy.plan(index.total_frames(), stream.frames_per_second, options.seed)?;

    let demuxer = Demuxer::open(encoded)?;
    let session = DecoderSession::open(demuxer.codec_parameters()?, &index, options)?;
    let (source_width, source_height) = session.dimensions();

    let expected = wanted.len();
    let selector = Selector::new(demuxer, session, &index, wanted, options.seek_policy);
    let (frames, frame_count, outcome) =
        Assembler::new(size, options).assemble(expected, |emit| selector.run(emit))?;

    if frame_count < expected {
        log::warn!("Extracted {frame_count} of {expected} planned frames");
    }
    log::debug!(
        "Extraction finished: {frame_count} frames, {} decoded, {} seeks",
        outcome.stats.frames_decoded,
        outcome.stats.seeks,
    );

    Ok(ExtractionResult {
        frames,
        frame_count,
        width,
        height,
        source_width,
        source_height,
        frame_indices: outcome.frame_indices,
        stats: outcome.stats,
    })
}
