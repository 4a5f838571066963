//! Resize and pixel-format conversion.
//!
//! Every emitted frame goes through swscale once: its native pixel format is
//! converted to packed RGB24 and resampled to the caller's exact width and
//! height (stretched, not letterboxed). Scaling contexts are expensive to
//! build, so each thread keeps the last one it used and only rebuilds it when
//! the source format or size changes.

use std::cell::RefCell;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};

use crate::decoder::DecodedFrame;
use crate::error::LoadvidError;

/// Resampling filter used when resizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResizeFilter {
    /// Bilinear interpolation.
    #[default]
    Bilinear,
    /// Area averaging; good for strong downscaling.
    Area,
    /// Bicubic interpolation.
    Bicubic,
    /// Nearest neighbour.
    Nearest,
}

impl ResizeFilter {
    fn flags(self) -> ScalingFlags {
        match self {
            Self::Bilinear => ScalingFlags::BILINEAR,
            Self::Area => ScalingFlags::AREA,
            Self::Bicubic => ScalingFlags::BICUBIC,
            Self::Nearest => ScalingFlags::POINT,
        }
    }
}

/// Target size of every output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OutputSize {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl OutputSize {
    /// Validate a requested output size.
    ///
    /// # Errors
    ///
    /// Returns [`LoadvidError::InvalidDimensions`] if either side is zero or
    /// one frame would not fit in memory addressable by `usize`.
    pub(crate) fn new(width: u32, height: u32) -> Result<Self, LoadvidError> {
        let size = Self { width, height };
        match size.checked_frame_bytes() {
            Some(bytes) if bytes > 0 => Ok(size),
            _ => Err(LoadvidError::InvalidDimensions { width, height }),
        }
    }

    /// Bytes of one packed RGB24 frame.
    pub(crate) fn frame_bytes(&self) -> usize {
        self.checked_frame_bytes().unwrap_or(usize::MAX)
    }

    fn checked_frame_bytes(&self) -> Option<usize> {
        usize::try_from(self.width)
            .ok()?
            .checked_mul(usize::try_from(self.height).ok()?)?
            .checked_mul(3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    format: Pixel,
    width: u32,
    height: u32,
    target: OutputSize,
    filter: ResizeFilter,
}

thread_local! {
    static SCALER: RefCell<Option<(ScalerKey, ScalingContext)>> = RefCell::new(None);
}

/// Whether swscale can read frames of `format`.
pub fn is_supported_input(format: Pixel) -> bool {
    unsafe { ffmpeg_sys_next::sws_isSupportedInput(format.into()) > 0 }
}

/// Convert `frame` to RGB24 at `size`, writing exactly
/// [`OutputSize::frame_bytes`] bytes into `output`.
///
/// # Errors
///
/// Returns [`LoadvidError::Conversion`] if the pixel format is not supported
/// or swscale fails.
pub(crate) fn convert(
    frame: &DecodedFrame,
    size: OutputSize,
    filter: ResizeFilter,
    output: &mut [u8],
) -> Result<(), LoadvidError> {
    let source = &frame.frame;
    let format = source.format();
    let conversion_error = |reason: String| LoadvidError::Conversion {
        frame_index: frame.presentation_index,
        pixel_format: format!("{format:?}"),
        reason,
    };

    if !is_supported_input(format) {
        return Err(conversion_error(
            "pixel format is not supported by the scaler".to_string(),
        ));
    }
    if output.len() != size.frame_bytes() {
        return Err(conversion_error(format!(
            "output slot holds {} bytes, expected {}",
            output.len(),
            size.frame_bytes()
        )));
    }

    let key = ScalerKey {
        format,
        width: source.width(),
        height: source.height(),
        target: size,
        filter,
    };

    SCALER.with(|cell| {
        let mut cached = cell.borrow_mut();

        let stale = cached.as_ref().is_none_or(|(cached_key, _)| *cached_key != key);
        if stale {
            log::trace!(
                "Building scaler {:?} {}x{} -> RGB24 {}x{}",
                format,
                key.width,
                key.height,
                size.width,
                size.height
            );
            let scaler = ScalingContext::get(
                format,
                key.width,
                key.height,
                Pixel::RGB24,
                size.width,
                size.height,
                filter.flags(),
            )
            .map_err(|error| conversion_error(error.to_string()))?;
            *cached = Some((key, scaler));
        }

        let Some((_, scaler)) = cached.as_mut() else {
            return Err(conversion_error("no scaler available".to_string()));
        };

        let mut rgb_frame = VideoFrame::empty();
        scaler
            .run(source, &mut rgb_frame)
            .map_err(|error| conversion_error(error.to_string()))?;
        copy_packed_rows(&rgb_frame, size, output);
        Ok(())
    })
}

/// Copy an RGB24 frame into `output`, dropping any per-row padding.
fn copy_packed_rows(rgb_frame: &VideoFrame, size: OutputSize, output: &mut [u8]) {
    let row_bytes = size.width as usize * 3;
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);

    if stride == row_bytes {
        output.copy_from_slice(&data[..output.len()]);
        return;
    }

    for (row, destination) in output.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * stride;
        destination.copy_from_slice(&data[start..start + row_bytes]);
    }
}
