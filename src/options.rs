//! Extraction options.
//!
//! [`ExtractOptions`] is a builder that threads tuning knobs (resampling
//! filter, worker count, decoder threading, seek policy, random seed)
//! through the extraction entry points without widening every signature.
//! A default-constructed value gives the same behaviour as the plain
//! [`extract_uniform`](crate::extract_uniform) and
//! [`extract_indices`](crate::extract_indices) calls.
//!
//! # Example
//!
//! ```no_run
//! use loadvid::{ExtractOptions, ResizeFilter};
//!
//! let encoded = std::fs::read("clip.mp4")?;
//! let options = ExtractOptions::new()
//!     .with_resize_filter(ResizeFilter::Area)
//!     .with_worker_count(4)
//!     .with_seed(7);
//!
//! let result = loadvid::extract_uniform_with_options(
//!     &encoded, 224, 224, 16, Some(15), true, &options,
//! )?;
//! println!("decoded {} frames", result.frame_count);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::conversion::ResizeFilter;
use crate::selection::{SeekPolicy, seek_when_gap_exceeds_interval};

/// Tuning settings for an extraction call.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub(crate) resize_filter: ResizeFilter,
    /// Conversion worker threads. `None` uses rayon's global pool.
    pub(crate) worker_count: Option<usize>,
    /// FFmpeg frame-threading count. `None` keeps FFmpeg's default.
    pub(crate) decoder_threads: Option<usize>,
    pub(crate) seek_policy: SeekPolicy,
    /// Seed for the random start offset. `None` draws from the thread RNG.
    pub(crate) seed: Option<u64>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            resize_filter: ResizeFilter::default(),
            worker_count: None,
            decoder_threads: None,
            seek_policy: seek_when_gap_exceeds_interval,
            seed: None,
        }
    }
}

impl ExtractOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resampling filter used when resizing frames.
    #[must_use]
    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Bound the number of threads converting frames in parallel.
    ///
    /// Values below 1 are treated as 1. Without the `rayon` feature,
    /// conversion always runs on the calling thread.
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers.max(1));
        self
    }

    /// Enable FFmpeg frame threading with `threads` decoder threads.
    #[must_use]
    pub fn with_decoder_threads(mut self, threads: usize) -> Self {
        self.decoder_threads = Some(threads);
        self
    }

    /// Replace the seek-versus-scan decision.
    ///
    /// The policy receives the number of frames between the current decode
    /// position and the next wanted frame, and the stream's mean keyframe
    /// interval; it returns `true` to seek.
    #[must_use]
    pub fn with_seek_policy(mut self, policy: SeekPolicy) -> Self {
        self.seek_policy = policy;
        self
    }

    /// Make the random start offset of uniform sampling reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The configured resampling filter.
    pub fn resize_filter(&self) -> ResizeFilter {
        self.resize_filter
    }

    /// The configured conversion worker count, if bounded.
    pub fn worker_count(&self) -> Option<usize> {
        self.worker_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let options = ExtractOptions::new()
            .with_resize_filter(ResizeFilter::Bicubic)
            .with_worker_count(0)
            .with_decoder_threads(2)
            .with_seed(42);

        assert_eq!(options.resize_filter(), ResizeFilter::Bicubic);
        assert_eq!(options.worker_count(), Some(1));
        assert_eq!(options.decoder_threads, Some(2));
        assert_eq!(options.seed, Some(42));
    }

    #[test]
    fn default_policy_seeks_past_one_interval() {
        let options = ExtractOptions::default();
        assert!((options.seek_policy)(31, 30));
        assert!(!(options.seek_policy)(30, 30));
    }
}
