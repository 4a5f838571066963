//! Frame selection policies.
//!
//! A [`SelectionPolicy`] says which frames a caller wants. Before any
//! decoding starts it is validated and then planned into a strictly
//! increasing list of presentation indices that the frame selector walks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::LoadvidError;

/// Decides whether to seek instead of decoding forward.
///
/// Called with the number of frames between the current decode position
/// and the next wanted frame, and the stream's mean keyframe interval.
pub type SeekPolicy = fn(gap_in_frames: u64, keyframe_interval: u64) -> bool;

/// Default [`SeekPolicy`]: seek once the gap is longer than one keyframe
/// interval, since decoding forward would cost more than restarting at the
/// next keyframe.
pub fn seek_when_gap_exceeds_interval(gap_in_frames: u64, keyframe_interval: u64) -> bool {
    gap_in_frames > keyframe_interval
}

/// Which frames to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// `count` frames spread evenly over the stream.
    Uniform {
        /// Number of frames wanted.
        count: u64,
        /// Upper bound on the sampling rate in frames per second.
        fps_cap: Option<u32>,
        /// Start at a random offset instead of frame 0.
        random_seek: bool,
    },
    /// Exactly these presentation indices, strictly increasing.
    ExplicitIndices(Vec<u64>),
}

impl SelectionPolicy {
    /// Check the policy on its own, before the stream is opened.
    pub(crate) fn validate(&self) -> Result<(), LoadvidError> {
        match self {
            Self::Uniform { count: 0, .. } => Err(LoadvidError::InvalidFrameCount),
            Self::Uniform {
                fps_cap: Some(0), ..
            } => Err(LoadvidError::InvalidFpsCap),
            Self::Uniform { .. } => Ok(()),
            Self::ExplicitIndices(indices) => validate_indices(indices),
        }
    }

    /// Turn the policy into the presentation indices to emit.
    ///
    /// # Errors
    ///
    /// Returns [`LoadvidError::InvalidIndices`] when an explicit index lies
    /// outside the stream.
    pub(crate) fn plan(
        &self,
        total_frames: u64,
        frames_per_second: f64,
        seed: Option<u64>,
    ) -> Result<Vec<u64>, LoadvidError> {
        match self {
            Self::ExplicitIndices(indices) => {
                check_in_range(indices, total_frames)?;
                Ok(indices.clone())
            }
            Self::Uniform {
                count,
                fps_cap,
                random_seek,
            } => {
                if total_frames == 0 {
                    return Ok(Vec::new());
                }
                let step = uniform_step(
                    total_frames,
                    *count,
                    minimum_step(frames_per_second, *fps_cap),
                );
                let start = if *random_seek {
                    random_start(uniform_slack(total_frames, *count, step), seed)
                } else {
                    0
                };
                let targets = uniform_targets(total_frames, *count, step, start);
                log::debug!(
                    "Planned {} of {count} uniform frames over {total_frames} (step={step:.3}, start={start})",
                    targets.len(),
                );
                Ok(targets)
            }
        }
    }
}

/// Reject empty, unordered or duplicated explicit indices.
pub(crate) fn validate_indices(indices: &[u64]) -> Result<(), LoadvidError> {
    if indices.is_empty() {
        return Err(LoadvidError::InvalidIndices {
            position: 0,
            reason: "no frame indices given".to_string(),
        });
    }

    for (position, pair) in indices.windows(2).enumerate() {
        let (previous, current) = (pair[0], pair[1]);
        if current == previous {
            return Err(LoadvidError::InvalidIndices {
                position: position + 1,
                reason: format!("index {current} is repeated"),
            });
        }
        if current < previous {
            return Err(LoadvidError::InvalidIndices {
                position: position + 1,
                reason: format!("index {current} follows {previous}; indices must be increasing"),
            });
        }
    }
    Ok(())
}

fn check_in_range(indices: &[u64], total_frames: u64) -> Result<(), LoadvidError> {
    match indices.iter().position(|&index| index >= total_frames) {
        Some(position) => Err(LoadvidError::InvalidIndices {
            position,
            reason: format!(
                "index {} is out of range for a stream of {total_frames} frames",
                indices[position]
            ),
        }),
        None => Ok(()),
    }
}

/// Smallest spacing that keeps sampling at or below `fps_cap`.
pub(crate) fn minimum_step(frames_per_second: f64, fps_cap: Option<u32>) -> u64 {
    match fps_cap {
        Some(cap) if cap > 0 && frames_per_second > f64::from(cap) => {
            (frames_per_second / f64::from(cap)).ceil() as u64
        }
        _ => 1,
    }
}

fn uniform_step(total_frames: u64, count: u64, minimum_step: u64) -> f64 {
    (total_frames as f64 / count as f64).max(minimum_step as f64)
}

/// Room left after the sampled span, i.e. the largest start offset that
/// still fits every target.
fn uniform_slack(total_frames: u64, count: u64, step: f64) -> u64 {
    let span = ((count - 1) as f64 * step).floor();
    let last = (total_frames - 1) as f64;
    if span >= last { 0 } else { (last - span) as u64 }
}

fn random_start(slack: u64, seed: Option<u64>) -> u64 {
    if slack == 0 {
        return 0;
    }
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed).gen_range(0..=slack),
        None => rand::thread_rng().gen_range(0..=slack),
    }
}

/// `start + floor(k * step)` for each `k`, kept inside `[0, total_frames)`.
///
/// A target landing exactly on `total_frames` is pulled back to the last
/// frame when that keeps at least `step` frames between neighbours.
/// Anything further out is dropped.
fn uniform_targets(total_frames: u64, count: u64, step: f64, start: u64) -> Vec<u64> {
    let mut targets: Vec<u64> = Vec::with_capacity(count.min(total_frames) as usize);
    for k in 0..count {
        let target = start + (k as f64 * step).floor() as u64;
        if target < total_frames {
            targets.push(target);
            continue;
        }

        let last_frame = total_frames - 1;
        let fits = targets
            .last()
            .is_none_or(|&previous| previous < last_frame && (last_frame - previous) as f64 >= step.floor());
        if target == total_frames && fits {
            targets.push(last_frame);
        }
        break;
    }
    targets
}
