//! # loadvid
//!
//! Load frames from encoded video held in memory.
//!
//! `loadvid` takes a compressed video blob (MP4, MKV, WebM, AVI, ...) and
//! returns the frames you ask for, decoded, resized and packed into a single
//! RGB24 buffer laid out as `[frame_count, height, width, 3]`. Only the frames
//! that are needed get decoded; everything else is skipped by seeking to the
//! nearest keyframe. Decoding, demuxing and scaling are powered by FFmpeg via
//! the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Evenly spaced frames
//!
//! ```no_run
//! let encoded = std::fs::read("clip.mp4")?;
//!
//! // 16 frames at 224x224, at most 5 per second of video, random start.
//! let result = loadvid::extract_uniform(&encoded, 224, 224, 16, Some(5), true)?;
//! println!("{} frames from {:?}", result.frame_count, result.frame_indices);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Specific frames
//!
//! ```no_run
//! let encoded = std::fs::read("clip.mp4")?;
//! let info = loadvid::probe(&encoded)?;
//!
//! let last = info.frame_count - 1;
//! let result = loadvid::extract_indices(&encoded, 128, 72, &[0, last / 2, last])?;
//! result.frame_image(0).unwrap().save("first.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Output layout
//!
//! Frames appear in ascending presentation order, rows top to bottom, pixels
//! as `R, G, B` bytes with no padding. Frames are stretched to the requested
//! size; aspect ratio is not preserved. When the stream ends before every
//! requested frame was found, the result is shorter and
//! [`ExtractionResult::frame_count`] says how many frames it holds.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | Convert frames on a rayon pool while decoding continues (default) |
//! | `async` | `extract_uniform_async` / `extract_indices_async` via Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

mod assembler;
#[cfg(feature = "async")]
pub mod asynchronous;
pub mod conversion;
mod decoder;
mod demux;
pub mod error;
pub mod extract;
pub mod ffmpeg;
mod memory_input;
pub mod options;
pub mod probe;
mod reorder;
pub mod result;
pub mod selection;
mod selector;
mod stream_index;

#[cfg(feature = "async")]
pub use asynchronous::{extract_indices_async, extract_uniform_async};
pub use conversion::ResizeFilter;
pub use error::LoadvidError;
pub use extract::{
    extract, extract_indices, extract_indices_with_options, extract_uniform,
    extract_uniform_with_options,
};
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use options::ExtractOptions;
pub use probe::{VideoInfo, probe};
pub use result::{ExtractionResult, ExtractionStats};
pub use selection::{SeekPolicy, SelectionPolicy, seek_when_gap_exceeds_interval};
