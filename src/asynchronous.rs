//! Async extraction via Tokio.
//!
//! Decoding is CPU-bound and blocking, so these wrappers move the
//! synchronous call onto Tokio's blocking thread pool. The encoded bytes are
//! taken as an `Arc<[u8]>` because the work outlives the caller's borrow.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use loadvid::{ExtractOptions, LoadvidError};
//!
//! # async fn example() -> Result<(), LoadvidError> {
//! let encoded: Arc<[u8]> = std::fs::read("clip.mp4").unwrap().into();
//! let result = loadvid::extract_uniform_async(
//!     Arc::clone(&encoded),
//!     112,
//!     112,
//!     8,
//!     None,
//!     false,
//!     ExtractOptions::default(),
//! )
//! .await?;
//! println!("{} frames", result.frame_count);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::error::LoadvidError;
use crate::extract;
use crate::options::ExtractOptions;
use crate::result::ExtractionResult;

/// Run [`extract_uniform_with_options`](crate::extract_uniform_with_options)
/// on the blocking pool.
///
/// # Errors
///
/// Any error of the synchronous call, or [`LoadvidError::TaskFailed`] if
/// the blocking task panicked.
pub async fn extract_uniform_async(
    encoded: Arc<[u8]>,
    width: u32,
    height: u32,
    num_frames: u64,
    fps_cap: Option<u32>,
    random_seek: bool,
    options: ExtractOptions,
) -> Result<ExtractionResult, LoadvidError> {
    run_blocking(move || {
        extract::extract_uniform_with_options(
            &encoded,
            width,
            height,
            num_frames,
            fps_cap,
            random_seek,
            &options,
        )
    })
    .await
}

/// Run [`extract_indices_with_options`](crate::extract_indices_with_options)
/// on the blocking pool.
///
/// # Errors
///
/// Any error of the synchronous call, or [`LoadvidError::TaskFailed`] if
/// the blocking task panicked.
pub async fn extract_indices_async(
    encoded: Arc<[u8]>,
    width: u32,
    height: u32,
    frame_indices: Vec<u64>,
    options: ExtractOptions,
) -> Result<ExtractionResult, LoadvidError> {
    run_blocking(move || {
        extract::extract_indices_with_options(&encoded, width, height, &frame_indices, &options)
    })
    .await
}

async fn run_blocking<F>(work: F) -> Result<ExtractionResult, LoadvidError>
where
    F: FnOnce() -> Result<ExtractionResult, LoadvidError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|error| LoadvidError::TaskFailed(error.to_string()))?
}
