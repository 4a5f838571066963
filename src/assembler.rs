//! Output buffer assembly.
//!
//! The [`Assembler`] pre-sizes the output buffer for the planned number of
//! frames and gives each emitted frame the next free slot. Conversion either
//! runs inline on the decoding thread or, with the `rayon` feature, on a
//! worker pool while decoding continues. Slots are disjoint `&mut` chunks of
//! the buffer, so workers never contend on pixel data; only completion
//! bookkeeping is shared.

#[cfg(feature = "rayon")]
use std::sync::{Condvar, Mutex, PoisonError};

use crate::conversion::{self, OutputSize, ResizeFilter};
use crate::decoder::DecodedFrame;
use crate::error::LoadvidError;
use crate::options::ExtractOptions;

/// Callback the frame selector hands every wanted frame to.
pub(crate) type Emit<'e> = dyn FnMut(DecodedFrame) -> Result<(), LoadvidError> + 'e;

pub(crate) struct Assembler {
    size: OutputSize,
    filter: ResizeFilter,
    #[cfg_attr(not(feature = "rayon"), allow(dead_code))]
    workers: Option<usize>,
}

impl Assembler {
    pub(crate) fn new(size: OutputSize, options: &ExtractOptions) -> Self {
        Self {
            size,
            filter: options.resize_filter,
            workers: options.worker_count,
        }
    }

    /// Run `drive`, converting each frame it emits into the next slot.
    ///
    /// Returns the buffer truncated to the frames actually written, along
    /// with whatever `drive` returned.
    pub(crate) fn assemble<R>(
        &self,
        expected_frames: usize,
        drive: impl FnOnce(&mut Emit<'_>) -> Result<R, LoadvidError>,
    ) -> Result<(Vec<u8>, usize, R), LoadvidError> {
        let frame_bytes = self.size.frame_bytes();
        let buffer_bytes = expected_frames.checked_mul(frame_bytes).ok_or(
            LoadvidError::InvalidDimensions {
                width: self.size.width,
                height: self.size.height,
            },
        )?;
        let mut buffer = vec![0u8; buffer_bytes];

        let (filled, outcome) = if self.runs_inline() {
            self.assemble_inline(&mut buffer, drive)?
        } else {
            self.assemble_parallel(&mut buffer, drive)?
        };

        buffer.truncate(filled * frame_bytes);
        Ok((buffer, filled, outcome))
    }

    #[cfg(feature = "rayon")]
    fn runs_inline(&self) -> bool {
        // Blocking a rayon worker on back-pressure could starve its pool.
        rayon::current_thread_index().is_some()
    }

    #[cfg(not(feature = "rayon"))]
    fn runs_inline(&self) -> bool {
        true
    }

    fn assemble_inline<R>(
        &self,
        buffer: &mut [u8],
        drive: impl FnOnce(&mut Emit<'_>) -> Result<R, LoadvidError>,
    ) -> Result<(usize, R), LoadvidError> {
        let mut slots = buffer.chunks_exact_mut(self.size.frame_bytes());
        let mut filled = 0;

        let outcome = drive(&mut |frame: DecodedFrame| {
            let slot = slots.next().ok_or_else(|| no_slot_left(&frame))?;
            conversion::convert(&frame, self.size, self.filter, slot)?;
            filled += 1;
            Ok(())
        })?;

        Ok((filled, outcome))
    }

    #[cfg(not(feature = "rayon"))]
    fn assemble_parallel<R>(
        &self,
        buffer: &mut [u8],
        drive: impl FnOnce(&mut Emit<'_>) -> Result<R, LoadvidError>,
    ) -> Result<(usize, R), LoadvidError> {
        self.assemble_inline(buffer, drive)
    }

    #[cfg(feature = "rayon")]
    fn assemble_parallel<R>(
        &self,
        buffer: &mut [u8],
        drive: impl FnOnce(&mut Emit<'_>) -> Result<R, LoadvidError>,
    ) -> Result<(usize, R), LoadvidError> {
        let pool = self.workers.and_then(|workers| {
            match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
                Ok(pool) => Some(pool),
                Err(error) => {
                    log::warn!("Could not build a {workers}-thread pool ({error}); using the global pool");
                    None
                }
            }
        });
        let workers = match &pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        };
        let completion = Completion::new(workers.max(1) * 2);

        let outcome = match &pool {
            Some(pool) => {
                pool.in_place_scope(|scope| self.convert_in_scope(scope, buffer, &completion, drive))
            }
            None => rayon::in_place_scope(|scope| {
                self.convert_in_scope(scope, buffer, &completion, drive)
            }),
        };

        // All spawned conversions have finished once the scope returns.
        let progress = completion.into_progress();
        let outcome = outcome?;
        if let Some(error) = progress.error {
            return Err(error);
        }
        Ok((progress.filled, outcome))
    }

    #[cfg(feature = "rayon")]
    fn convert_in_scope<'scope, R>(
        &self,
        scope: &rayon::Scope<'scope>,
        buffer: &'scope mut [u8],
        completion: &'scope Completion,
        drive: impl FnOnce(&mut Emit<'_>) -> Result<R, LoadvidError>,
    ) -> Result<R, LoadvidError> {
        let (size, filter) = (self.size, self.filter);
        let mut slots = buffer.chunks_exact_mut(size.frame_bytes());

        drive(&mut |frame: DecodedFrame| {
            if let Some(error) = completion.take_error() {
                return Err(error);
            }
            let slot = slots.next().ok_or_else(|| no_slot_left(&frame))?;

            completion.wait_for_room();
            scope.spawn(move |_| {
                let result = conversion::convert(&frame, size, filter, slot);
                completion.finish(result);
            });
            Ok(())
        })
    }
}

fn no_slot_left(frame: &DecodedFrame) -> LoadvidError {
    LoadvidError::Conversion {
        frame_index: frame.presentation_index,
        pixel_format: format!("{:?}", frame.pixel_format()),
        reason: "more frames emitted than planned".to_string(),
    }
}

#[cfg(feature = "rayon")]
#[derive(Default)]
struct Progress {
    in_flight: usize,
    filled: usize,
    error: Option<LoadvidError>,
}

/// Shared bookkeeping for conversions running on the pool.
#[cfg(feature = "rayon")]
struct Completion {
    progress: Mutex<Progress>,
    changed: Condvar,
    max_in_flight: usize,
}

#[cfg(feature = "rayon")]
impl Completion {
    fn new(max_in_flight: usize) -> Self {
        Self {
            progress: Mutex::new(Progress::default()),
            changed: Condvar::new(),
            max_in_flight,
        }
    }

    /// Block until fewer than `max_in_flight` conversions are running, then
    /// reserve a place for one more.
    fn wait_for_room(&self) {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        while progress.in_flight >= self.max_in_flight {
            progress = self
                .changed
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }
        progress.in_flight += 1;
    }

    fn finish(&self, result: Result<(), LoadvidError>) {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        progress.in_flight -= 1;
        match result {
            Ok(()) => progress.filled += 1,
            Err(error) => {
                if progress.error.is_none() {
                    progress.error = Some(error);
                }
            }
        }
        self.changed.notify_all();
    }

    fn take_error(&self) -> Option<LoadvidError> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error
            .take()
    }

    fn into_progress(self) -> Progress {
        self.progress.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
