//! Frame selector.
//!
//! The selector drives the demuxer and decoder towards a planned list of
//! presentation indices. It is a small state machine:
//!
//! - `Seeking`: jump to the keyframe at or before the next wanted frame.
//! - `Decoding`: feed packets forward, discarding frames until the next
//!   wanted one shows up, then emit it and plan again.
//! - `Done`: every wanted frame was emitted, or the stream ended.
//!
//! Whether a jump is worth it is left to a [`SeekPolicy`]. When seeking
//! misbehaves (the demuxer refuses, the landing keyframe does not decode,
//! or the first frame after a jump is already past the target), the
//! selector rewinds to the start of the stream and finishes with a plain
//! sequential scan.

use std::cmp::Ordering;

use crate::assembler::Emit;
use crate::decoder::{DecodedFrame, DecoderSession};
use crate::demux::{DemuxedPacket, Demuxer};
use crate::error::LoadvidError;
use crate::result::ExtractionStats;
use crate::selection::SeekPolicy;
use crate::stream_index::{Keyframe, StreamIndex};

/// Where compressed packets come from.
pub(crate) trait PacketSource {
    fn next_packet(&mut self) -> Option<DemuxedPacket>;

    /// Reposition at the keyframe at or before `timestamp`.
    fn seek(&mut self, timestamp: i64) -> Result<(), LoadvidError>;

    /// Declared start of the stream, used to rewind.
    fn start_time(&self) -> Option<i64>;
}

/// Turns packets into frames in presentation order.
pub(crate) trait FrameDecoder {
    fn decode(&mut self, packet: &DemuxedPacket) -> Result<Vec<DecodedFrame>, LoadvidError>;

    fn flush(&mut self) -> Vec<DecodedFrame>;

    /// Forget decoder state, returning frames that were still held back.
    fn reset(&mut self) -> Vec<DecodedFrame>;
}

impl PacketSource for Demuxer<'_> {
    fn next_packet(&mut self) -> Option<DemuxedPacket> {
        Demuxer::next_packet(self)
    }

    fn seek(&mut self, timestamp: i64) -> Result<(), LoadvidError> {
        Demuxer::seek(self, timestamp)
    }

    fn start_time(&self) -> Option<i64> {
        self.stream_info().start_time
    }
}

impl FrameDecoder for DecoderSession<'_> {
    fn decode(&mut self, packet: &DemuxedPacket) -> Result<Vec<DecodedFrame>, LoadvidError> {
        DecoderSession::decode(self, packet)
    }

    fn flush(&mut self) -> Vec<DecodedFrame> {
        DecoderSession::flush(self)
    }

    fn reset(&mut self) -> Vec<DecodedFrame> {
        DecoderSession::reset(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Seeking {
        target_timestamp: i64,
        keyframe: Keyframe,
    },
    Decoding {
        next_wanted: u64,
    },
    Done,
}

/// What a finished selection produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct SelectionOutcome {
    /// Presentation indices emitted, in emission order.
    pub(crate) frame_indices: Vec<u64>,
    pub(crate) stats: ExtractionStats,
}

pub(crate) struct Selector<'i, S, D> {
    source: S,
    decoder: D,
    index: &'i StreamIndex,
    seek_policy: SeekPolicy,
    wanted: Vec<u64>,
    /// Position in `wanted` of the next frame to emit.
    next: usize,
    state: State,
    /// Presentation index of the last frame seen.
    position: Option<u64>,
    seeking_enabled: bool,
    /// Keyframe a seek landed on, until its packet decodes.
    awaiting_keyframe: Option<Keyframe>,
    /// Set after a seek until the first frame arrives.
    verify_after_seek: bool,
    emitted: Vec<u64>,
    stats: ExtractionStats,
}

impl<'i, S: PacketSource, D: FrameDecoder> Selector<'i, S, D> {
    /// `wanted` must be strictly increasing.
    pub(crate) fn new(
        source: S,
        decoder: D,
        index: &'i StreamIndex,
        wanted: Vec<u64>,
        seek_policy: SeekPolicy,
    ) -> Self {
        let seeking_enabled = index.is_reliable() && !index.keyframes().is_empty();
        if !seeking_enabled {
            log::debug!("Seeking disabled; frames will be decoded sequentially");
        }

        Self {
            source,
            decoder,
            index,
            seek_policy,
            emitted: Vec::with_capacity(wanted.len()),
            wanted,
            next: 0,
            state: State::Done,
            position: None,
            seeking_enabled,
            awaiting_keyframe: None,
            verify_after_seek: false,
            stats: ExtractionStats::default(),
        }
    }

    /// Run to completion, handing every wanted frame to `emit` in order.
    ///
    /// # Errors
    ///
    /// Only errors returned by `emit` abort the selection; decoding and
    /// seeking problems are recovered from.
    pub(crate) fn run(
        mut self,
        emit: &mut Emit<'_>,
    ) -> Result<SelectionOutcome, LoadvidError> {
        self.state = self.plan_next();

        loop {
            match self.state {
                State::Done => break,
                State::Seeking {
                    target_timestamp,
                    keyframe,
                } => self.seek(target_timestamp, keyframe),
                State::Decoding { next_wanted } => match self.source.next_packet() {
                    Some(packet) => self.decode_packet(&packet, next_wanted, emit)?,
                    None => self.finish(emit)?,
                },
            }
        }

        Ok(SelectionOutcome {
            frame_indices: self.emitted,
            stats: self.stats,
        })
    }

    fn plan_next(&self) -> State {
        let Some(&target) = self.wanted.get(self.next) else {
            return State::Done;
        };

        if self.seeking_enabled {
            let current = self.position.map_or(0, |position| position + 1);
            if let Some(keyframe) = self.index.keyframe_at_or_before(target) {
                if keyframe.presentation_index > current {
                    let gap = target - current;
                    if (self.seek_policy)(gap, self.index.keyframe_interval()) {
                        return State::Seeking {
                            target_timestamp: keyframe.timestamp,
                            keyframe,
                        };
                    }
                }
            }
        }

        State::Decoding {
            next_wanted: target,
        }
    }

    fn seek(&mut self, target_timestamp: i64, keyframe: Keyframe) {
        if let Err(error) = self.source.seek(target_timestamp) {
            log::warn!("Seek to timestamp {target_timestamp} failed: {error}");
            self.fall_back_to_sequential();
            return;
        }

        self.stats.seeks += 1;
        let held = self.decoder.reset();
        self.discard_all(held);
        self.position = keyframe.presentation_index.checked_sub(1);
        self.awaiting_keyframe = Some(keyframe);
        self.verify_after_seek = true;
        self.state = match self.wanted.get(self.next) {
            Some(&next_wanted) => State::Decoding { next_wanted },
            None => State::Done,
        };
    }

    fn decode_packet(
        &mut self,
        packet: &DemuxedPacket,
        next_wanted: u64,
        emit: &mut Emit<'_>,
    ) -> Result<(), LoadvidError> {
        self.stats.packets_read += 1;

        match self.decoder.decode(packet) {
            Ok(frames) => {
                self.awaiting_keyframe = None;
                self.consume(frames, emit)?;
            }
            Err(error) => {
                self.stats.decode_errors += 1;
                match self.awaiting_keyframe.take() {
                    Some(keyframe) => {
                        log::warn!(
                            "Keyframe {} did not decode ({error}) while looking for frame {next_wanted}",
                            keyframe.presentation_index
                        );
                        self.recover_from_bad_keyframe(keyframe);
                    }
                    None => log::debug!("Skipping undecodable packet: {error}"),
                }
            }
        }
        Ok(())
    }

    fn recover_from_bad_keyframe(&mut self, keyframe: Keyframe) {
        match self.index.keyframe_before(keyframe) {
            Some(previous) => {
                log::debug!(
                    "Retrying from keyframe {} at timestamp {}",
                    previous.presentation_index,
                    previous.timestamp
                );
                self.state = State::Seeking {
                    target_timestamp: previous.timestamp,
                    keyframe: previous,
                };
            }
            None => self.fall_back_to_sequential(),
        }
    }

    /// Rewind to the start and disable seeking for the rest of the call.
    fn fall_back_to_sequential(&mut self) {
        log::warn!("Falling back to a sequential scan from the start of the stream");
        self.seeking_enabled = false;
        self.stats.fell_back_to_sequential = true;
        self.awaiting_keyframe = None;
        self.verify_after_seek = false;

        let held = self.decoder.reset();
        self.discard_all(held);

        let rewind_to = self
            .index
            .start_timestamp()
            .or_else(|| self.source.start_time())
            .unwrap_or(0);
        match self.source.seek(rewind_to) {
            Ok(()) => self.position = None,
            Err(error) => log::warn!("Could not rewind the stream ({error}); continuing in place"),
        }

        self.state = self.plan_next();
    }

    /// Route decoded frames: emit the wanted ones, discard the rest.
    ///
    /// Returns `true` if the frames revealed a bad seek and the selector
    /// restarted from the beginning of the stream.
    fn consume(
        &mut self,
        frames: Vec<DecodedFrame>,
        emit: &mut Emit<'_>,
    ) -> Result<bool, LoadvidError> {
        let mut frames = frames.into_iter();

        while let Some(frame) = frames.next() {
            self.stats.frames_decoded += 1;
            let index = frame.presentation_index;

            if self.verify_after_seek {
                self.verify_after_seek = false;
                let overshot = self.wanted.get(self.next).is_some_and(|&target| index > target);
                if overshot {
                    log::warn!("First frame after seek ({index}) is past the wanted frame");
                    self.stats.frames_discarded += 1;
                    self.discard_all(frames);
                    self.fall_back_to_sequential();
                    return Ok(true);
                }
            }

            self.position = Some(index);
            self.skip_missed(index);

            match self.wanted.get(self.next).map(|target| index.cmp(target)) {
                Some(Ordering::Equal) => self.emit(frame, emit)?,
                _ => self.stats.frames_discarded += 1,
            }
        }
        Ok(false)
    }

    /// Give up on wanted frames the stream has already moved past.
    fn skip_missed(&mut self, index: u64) {
        while let Some(&target) = self.wanted.get(self.next) {
            if target >= index {
                break;
            }
            log::warn!("Frame {target} was never decoded; skipping it");
            self.next += 1;
            self.state = self.plan_next();
        }
    }

    fn emit(
        &mut self,
        frame: DecodedFrame,
        emit: &mut Emit<'_>,
    ) -> Result<(), LoadvidError> {
        log::trace!(
            "Emitting frame {} (timestamp {:?})",
            frame.presentation_index,
            frame.timestamp
        );
        self.emitted.push(frame.presentation_index);
        self.next += 1;
        self.stats.frames_converted += 1;
        emit(frame)?;
        self.state = self.plan_next();
        Ok(())
    }

    /// Drain the decoder at end-of-stream.
    fn finish(
        &mut self,
        emit: &mut Emit<'_>,
    ) -> Result<(), LoadvidError> {
        self.awaiting_keyframe = None;
        let frames = self.decoder.flush();
        if self.consume(frames, emit)? {
            return Ok(());
        }

        if self.next < self.wanted.len() {
            log::warn!(
                "Stream ended after {} of {} wanted frames",
                self.emitted.len(),
                self.wanted.len()
            );
        }
        self.state = State::Done;
        Ok(())
    }

    fn discard_all(&mut self, frames: impl IntoIterator<Item = DecodedFrame>) {
        let count = frames.into_iter().count() as u64;
        self.stats.frames_decoded += count;
        self.stats.frames_discarded += count;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use ffmpeg_next::Packet;
    use ffmpeg_next::frame::Video as VideoFrame;

    use super::*;
    use crate::selection::seek_when_gap_exceeds_interval;
    use crate::stream_index::PacketFacts;

    /// One packet per frame with timestamps equal to presentation indices.
    struct FakeSource {
        total: u64,
        keyframe_every: u64,
        cursor: u64,
        fail_seeks: bool,
        /// Lands this many keyframes later than asked.
        overshoot: u64,
    }

    impl FakeSource {
        fn new(total: u64, keyframe_every: u64) -> Self {
            Self {
                total,
                keyframe_every,
                cursor: 0,
                fail_seeks: false,
                overshoot: 0,
            }
        }
    }

    impl PacketSource for FakeSource {
        fn next_packet(&mut self) -> Option<DemuxedPacket> {
            if self.cursor >= self.total {
                return None;
            }
            let timestamp = self.cursor;
            self.cursor += 1;
            Some(DemuxedPacket {
                timestamp: Some(timestamp as i64),
                is_keyframe: timestamp % self.keyframe_every == 0,
                discard: false,
                packet: Packet::empty(),
            })
        }

        fn seek(&mut self, timestamp: i64) -> Result<(), LoadvidError> {
            if self.fail_seeks && timestamp > 0 {
                return Err(LoadvidError::Ffmpeg("seek refused".to_string()));
            }
            let keyframe = (timestamp as u64 / self.keyframe_every) * self.keyframe_every;
            self.cursor = (keyframe + self.overshoot * self.keyframe_every).min(self.total);
            if timestamp == 0 {
                self.cursor = 0;
            }
            Ok(())
        }

        fn start_time(&self) -> Option<i64> {
            Some(0)
        }
    }

    /// Decodes instantly; packets listed in `broken` fail every time.
    #[derive(Default)]
    struct FakeDecoder {
        broken: HashSet<i64>,
    }

    impl FrameDecoder for FakeDecoder {
        fn decode(&mut self, packet: &DemuxedPacket) -> Result<Vec<DecodedFrame>, LoadvidError> {
            let timestamp = packet.timestamp.unwrap_or_default();
            if self.broken.contains(&timestamp) {
                return Err(LoadvidError::Decode {
                    timestamp: Some(timestamp),
                    reason: "corrupt".to_string(),
                });
            }
            Ok(vec![DecodedFrame {
                presentation_index: timestamp as u64,
                timestamp: Some(timestamp),
                frame: VideoFrame::empty(),
            }])
        }

        fn flush(&mut self) -> Vec<DecodedFrame> {
            Vec::new()
        }

        fn reset(&mut self) -> Vec<DecodedFrame> {
            Vec::new()
        }
    }

    fn facts(total: u64, keyframe_every: u64) -> impl Iterator<Item = PacketFacts> {
        (0..total).map(move |timestamp| PacketFacts {
            timestamp: Some(timestamp as i64),
            is_keyframe: timestamp % keyframe_every == 0,
            discard: false,
        })
    }

    fn index_for(total: u64, keyframe_every: u64) -> StreamIndex {
        StreamIndex::from_packets(facts(total, keyframe_every), 0)
    }

    fn always_seek(_gap: u64, _interval: u64) -> bool {
        true
    }

    fn never_seek(_gap: u64, _interval: u64) -> bool {
        false
    }

    fn run(
        source: FakeSource,
        decoder: FakeDecoder,
        index: &StreamIndex,
        wanted: Vec<u64>,
        policy: SeekPolicy,
    ) -> (SelectionOutcome, Vec<u64>) {
        let mut seen = Vec::new();
        let outcome = Selector::new(source, decoder, index, wanted, policy)
            .run(&mut |frame| {
                seen.push(frame.presentation_index);
                Ok(())
            })
            .unwrap();
        (outcome, seen)
    }

    fn assert_accounted(stats: &ExtractionStats) {
        assert_eq!(
            stats.frames_decoded,
            stats.frames_converted + stats.frames_discarded
        );
    }

    #[test]
    fn sequential_scan_emits_wanted_frames() {
        let index = index_for(10, 3);
        let (outcome, seen) = run(
            FakeSource::new(10, 3),
            FakeDecoder::default(),
            &index,
            vec![0, 5, 9],
            never_seek,
        );

        assert_eq!(seen, vec![0, 5, 9]);
        assert_eq!(outcome.frame_indices, vec![0, 5, 9]);
        assert_eq!(outcome.stats.seeks, 0);
        assert_eq!(outcome.stats.frames_decoded, 10);
        assert_eq!(outcome.stats.frames_converted, 3);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn seeking_skips_ahead() {
        let index = index_for(100, 10);
        let (outcome, seen) = run(
            FakeSource::new(100, 10),
            FakeDecoder::default(),
            &index,
            vec![5, 55, 97],
            always_seek,
        );

        assert_eq!(seen, vec![5, 55, 97]);
        assert_eq!(outcome.stats.seeks, 2);
        assert!(outcome.stats.frames_decoded < 30);
        assert!(!outcome.stats.fell_back_to_sequential);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn default_policy_scans_short_gaps() {
        let index = index_for(100, 10);
        let (outcome, seen) = run(
            FakeSource::new(100, 10),
            FakeDecoder::default(),
            &index,
            vec![2, 8, 14, 60],
            seek_when_gap_exceeds_interval,
        );

        assert_eq!(seen, vec![2, 8, 14, 60]);
        assert_eq!(outcome.stats.seeks, 1);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn refused_seek_falls_back_to_scan() {
        let index = index_for(50, 10);
        let mut source = FakeSource::new(50, 10);
        source.fail_seeks = true;
        let (outcome, seen) = run(source, FakeDecoder::default(), &index, vec![3, 42], always_seek);

        assert_eq!(seen, vec![3, 42]);
        assert!(outcome.stats.fell_back_to_sequential);
        assert_eq!(outcome.stats.seeks, 0);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn overshooting_seek_restarts_from_beginning() {
        let index = index_for(50, 10);
        let mut source = FakeSource::new(50, 10);
        source.overshoot = 1;
        let (outcome, seen) = run(source, FakeDecoder::default(), &index, vec![25, 30], always_seek);

        assert_eq!(seen, vec![25, 30]);
        assert!(outcome.stats.fell_back_to_sequential);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn broken_keyframe_retries_previous_one() {
        let index = index_for(50, 10);
        let decoder = FakeDecoder {
            broken: HashSet::from([30]),
        };
        let (outcome, seen) = run(FakeSource::new(50, 10), decoder, &index, vec![35], always_seek);

        assert_eq!(seen, vec![35]);
        assert_eq!(outcome.stats.seeks, 2);
        assert_eq!(outcome.stats.decode_errors, 2);
        assert!(!outcome.stats.fell_back_to_sequential);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn undecodable_frame_shortens_result() {
        let index = index_for(10, 5);
        let decoder = FakeDecoder {
            broken: HashSet::from([4]),
        };
        let (outcome, seen) = run(FakeSource::new(10, 5), decoder, &index, vec![2, 4, 7], never_seek);

        assert_eq!(seen, vec![2, 7]);
        assert_eq!(outcome.frame_indices, vec![2, 7]);
        assert_eq!(outcome.stats.decode_errors, 1);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn stream_ending_early_gives_short_result() {
        let index = StreamIndex::from_packets(facts(8, 100), 12);
        let (outcome, seen) = run(
            FakeSource::new(8, 100),
            FakeDecoder::default(),
            &index,
            vec![1, 7, 10],
            never_seek,
        );

        assert_eq!(seen, vec![1, 7]);
        assert_eq!(outcome.stats.frames_decoded, 8);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn unreliable_index_never_seeks() {
        let untimed = facts(20, 5).map(|packet| PacketFacts {
            timestamp: None,
            ..packet
        });
        let index = StreamIndex::from_packets(untimed, 0);
        let (outcome, seen) = run(
            FakeSource::new(20, 5),
            FakeDecoder::default(),
            &index,
            vec![0, 19],
            always_seek,
        );

        assert_eq!(seen, vec![0, 19]);
        assert_eq!(outcome.stats.seeks, 0);
        assert_accounted(&outcome.stats);
    }

    #[test]
    fn emit_errors_abort() {
        let index = index_for(10, 5);
        let result = Selector::new(
            FakeSource::new(10, 5),
            FakeDecoder::default(),
            &index,
            vec![1, 2],
            never_seek,
        )
        .run(&mut |_| Err(LoadvidError::Ffmpeg("boom".to_string())));

        assert!(matches!(result, Err(LoadvidError::Ffmpeg(_))));
    }
}
