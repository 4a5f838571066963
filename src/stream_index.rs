//! Keyframe and presentation-order index of a video stream.
//!
//! Built from a packet-only pass over the stream (no decoding), the
//! [`StreamIndex`] maps stream timestamps to 0-based presentation indices
//! and records where the keyframes sit, which is what the frame selector
//! needs to decide where to seek.

use crate::demux::{DemuxedPacket, Demuxer};

/// A keyframe located in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Keyframe {
    /// Presentation index of the keyframe.
    pub(crate) presentation_index: u64,
    /// Stream timestamp to seek to.
    pub(crate) timestamp: i64,
}

/// What the index needs to know about one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PacketFacts {
    pub(crate) timestamp: Option<i64>,
    pub(crate) is_keyframe: bool,
    /// Decoded but never displayed.
    pub(crate) discard: bool,
}

impl From<&DemuxedPacket> for PacketFacts {
    fn from(packet: &DemuxedPacket) -> Self {
        Self {
            timestamp: packet.timestamp,
            is_keyframe: packet.is_keyframe,
            discard: packet.discard,
        }
    }
}

/// Presentation-order map of one video stream.
#[derive(Debug, Clone, Default)]
pub(crate) struct StreamIndex {
    /// Distinct timestamps of displayed frames in ascending order.
    timestamps: Vec<i64>,
    keyframes: Vec<Keyframe>,
    total_frames: u64,
    reliable: bool,
}

impl StreamIndex {
    /// Scan every remaining packet of `demuxer`.
    ///
    /// Consumes the demuxer's packets; callers scan on a dedicated demuxer
    /// and decode on a fresh one.
    pub(crate) fn scan(demuxer: &mut Demuxer<'_>) -> Self {
        let declared = demuxer.stream_info().declared_frame_count;
        let mut packets = Vec::new();
        while let Some(packet) = demuxer.next_packet() {
            packets.push(PacketFacts::from(&packet));
        }

        let index = Self::from_packets(packets, declared);
        log::debug!(
            "Indexed {} frames ({} keyframes, reliable={})",
            index.total_frames,
            index.keyframes.len(),
            index.reliable,
        );
        index
    }

    /// Build an index from packets in decode order.
    ///
    /// Discarded packets never produce a visible frame, so they are left out
    /// of the count and of the container's declared count as well.
    pub(crate) fn from_packets(
        packets: impl IntoIterator<Item = PacketFacts>,
        declared_frame_count: u64,
    ) -> Self {
        let mut timestamps = Vec::new();
        let mut keyframe_timestamps = Vec::new();
        let mut shown = 0u64;
        let mut discarded = 0u64;
        let mut all_timestamped = true;

        for packet in packets {
            if packet.discard {
                discarded += 1;
                continue;
            }
            shown += 1;
            match packet.timestamp {
                Some(timestamp) => {
                    timestamps.push(timestamp);
                    if packet.is_keyframe {
                        keyframe_timestamps.push(timestamp);
                    }
                }
                None => all_timestamped = false,
            }
        }
        if discarded > 0 {
            log::debug!("Ignoring {discarded} packets flagged for discard");
        }

        let total_frames = shown.max(declared_frame_count.saturating_sub(discarded));
        let reliable = all_timestamped && !timestamps.is_empty();
        if !reliable {
            return Self {
                timestamps: Vec::new(),
                keyframes: Vec::new(),
                total_frames,
                reliable,
            };
        }

        timestamps.sort_unstable();
        timestamps.dedup();

        let mut keyframes: Vec<Keyframe> = keyframe_timestamps
            .into_iter()
            .filter_map(|timestamp| {
                timestamps
                    .binary_search(&timestamp)
                    .ok()
                    .map(|position| Keyframe {
                        presentation_index: position as u64,
                        timestamp,
                    })
            })
            .collect();
        keyframes.sort_unstable_by_key(|keyframe| keyframe.presentation_index);
        keyframes.dedup_by_key(|keyframe| keyframe.presentation_index);

        Self {
            timestamps,
            keyframes,
            total_frames,
            reliable,
        }
    }

    /// Number of frames the stream is expected to decode to.
    pub(crate) fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Whether timestamps can be trusted for seeking and indexing.
    pub(crate) fn is_reliable(&self) -> bool {
        self.reliable
    }

    /// All keyframes in presentation order.
    pub(crate) fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Timestamp of the earliest frame, when known.
    pub(crate) fn start_timestamp(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    /// Presentation index of a decoded frame's timestamp.
    ///
    /// Timestamps that match no packet map to the next indexed position.
    /// Returns `None` for unreliable indexes.
    pub(crate) fn presentation_index(&self, timestamp: i64) -> Option<u64> {
        if !self.reliable {
            return None;
        }
        let position = self.timestamps.partition_point(|&known| known < timestamp);
        Some(position.min(self.timestamps.len() - 1) as u64)
    }

    /// The last keyframe whose presentation index is `<= index`.
    pub(crate) fn keyframe_at_or_before(&self, index: u64) -> Option<Keyframe> {
        let position = self
            .keyframes
            .partition_point(|keyframe| keyframe.presentation_index <= index);
        position.checked_sub(1).map(|position| self.keyframes[position])
    }

    /// The keyframe preceding `keyframe`, used when `keyframe` itself turns
    /// out to be undecodable.
    pub(crate) fn keyframe_before(&self, keyframe: Keyframe) -> Option<Keyframe> {
        keyframe
            .presentation_index
            .checked_sub(1)
            .and_then(|index| self.keyframe_at_or_before(index))
    }

    /// Mean distance between consecutive keyframes, in frames.
    ///
    /// A stream with a single keyframe reports its whole length.
    pub(crate) fn keyframe_interval(&self) -> u64 {
        match (self.keyframes.first(), self.keyframes.last()) {
            (Some(first), Some(last)) if self.keyframes.len() > 1 => {
                let span = last.presentation_index - first.presentation_index;
                (span / (self.keyframes.len() as u64 - 1)).max(1)
            }
            _ => self.total_frames.max(1),
        }
    }
}
