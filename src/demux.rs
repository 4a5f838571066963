//! Container demuxing.
//!
//! [`Demuxer`] opens an in-memory container, picks the primary video stream
//! and yields that stream's compressed packets lazily until end-of-stream.
//! Packets belonging to other streams (audio, subtitles, data) are read and
//! dropped without ever being surfaced.

use std::ffi::c_int;

use ffmpeg_next::codec::Parameters;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::stream::Disposition;
use ffmpeg_next::media::Type;
use ffmpeg_next::{Error as FfmpegError, Packet, Rational};
use ffmpeg_sys_next::{AV_PKT_FLAG_DISCARD, AVSEEK_FLAG_BACKWARD, av_seek_frame};

use crate::error::LoadvidError;
use crate::memory_input::MemoryInput;

/// Consecutive read failures tolerated before the stream is treated as ended.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// Facts about the selected video stream, gathered when the container is
/// opened.
#[derive(Debug, Clone)]
pub(crate) struct StreamInfo {
    /// Index of the stream inside the container.
    pub(crate) stream_index: usize,
    /// Guessed frame rate, or `0.0` when the container does not say.
    pub(crate) frames_per_second: f64,
    /// Frame count declared by the container, or `0` when absent.
    pub(crate) declared_frame_count: u64,
    /// Stream start time in stream time base units, when declared.
    pub(crate) start_time: Option<i64>,
    /// Short name of the decoder that will be used.
    pub(crate) codec: String,
}

/// A compressed packet of the selected video stream.
pub(crate) struct DemuxedPacket {
    /// Presentation timestamp, falling back to the decode timestamp.
    pub(crate) timestamp: Option<i64>,
    /// Whether the packet starts a keyframe.
    pub(crate) is_keyframe: bool,
    /// The container asked for the decoded picture to be dropped, as MP4
    /// does for samples before the start of an edit list.
    pub(crate) discard: bool,
    pub(crate) packet: Packet,
}

impl DemuxedPacket {
    fn new(packet: Packet) -> Self {
        Self {
            timestamp: packet.pts().or_else(|| packet.dts()),
            is_keyframe: packet.is_key(),
            discard: packet.flags().bits() & AV_PKT_FLAG_DISCARD as c_int != 0,
            packet,
        }
    }
}

/// Reads the primary video stream of an in-memory container.
pub(crate) struct Demuxer<'a> {
    source: MemoryInput<'a>,
    stream: StreamInfo,
    consecutive_errors: u32,
    finished: bool,
}

impl<'a> Demuxer<'a> {
    /// Open `data` and select its primary video stream.
    ///
    /// # Errors
    ///
    /// - [`LoadvidError::Container`] if the buffer is not a parseable
    ///   container.
    /// - [`LoadvidError::NoVideoStream`] if no stream can be decoded as video.
    pub(crate) fn open(data: &'a [u8]) -> Result<Self, LoadvidError> {
        let source = MemoryInput::open(data)?;
        let stream = select_video_stream(source.input()).ok_or(LoadvidError::NoVideoStream)?;

        log::debug!(
            "Selected video stream {} (codec={}, fps={:.3}, declared_frames={})",
            stream.stream_index,
            stream.codec,
            stream.frames_per_second,
            stream.declared_frame_count,
        );

        Ok(Self {
            source,
            stream,
            consecutive_errors: 0,
            finished: false,
        })
    }

    pub(crate) fn stream_info(&self) -> &StreamInfo {
        &self.stream
    }

    /// Codec parameters of the selected stream, for building a decoder.
    pub(crate) fn codec_parameters(&self) -> Result<Parameters, LoadvidError> {
        self.source
            .input()
            .stream(self.stream.stream_index)
            .map(|stream| stream.parameters().into())
            .ok_or(LoadvidError::NoVideoStream)
    }

    /// Read the next packet of the video stream.
    ///
    /// Returns `None` at end-of-stream. Read errors are skipped until
    /// [`MAX_CONSECUTIVE_READ_ERRORS`] happen in a row.
    pub(crate) fn next_packet(&mut self) -> Option<DemuxedPacket> {
        if self.finished {
            return None;
        }

        let input = self.source.input_mut();
        let packet = read_stream_packet(
            |packet| packet.read(input),
            self.stream.stream_index,
            &mut self.consecutive_errors,
        );
        match packet {
            Some(packet) => Some(DemuxedPacket::new(packet)),
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Seek the video stream to the keyframe at or before `timestamp`
    /// (in stream time base units).
    pub(crate) fn seek(&mut self, timestamp: i64) -> Result<(), LoadvidError> {
        log::trace!(
            "Seeking stream {} to timestamp {timestamp}",
            self.stream.stream_index
        );
        let status = unsafe {
            av_seek_frame(
                self.source.input_mut().as_mut_ptr(),
                self.stream.stream_index as c_int,
                timestamp,
                AVSEEK_FLAG_BACKWARD as c_int,
            )
        };
        if status < 0 {
            return Err(LoadvidError::from(FfmpegError::from(status)));
        }
        self.finished = false;
        self.consecutive_errors = 0;
        Ok(())
    }
}

/// Read until a packet of `stream_index` turns up.
///
/// Returns `None` at end-of-stream, or once `consecutive_errors` reaches
/// [`MAX_CONSECUTIVE_READ_ERRORS`]. Any successful read resets the count.
fn read_stream_packet(
    mut read: impl FnMut(&mut Packet) -> Result<(), FfmpegError>,
    stream_index: usize,
    consecutive_errors: &mut u32,
) -> Option<Packet> {
    loop {
        let mut packet = Packet::empty();
        match read(&mut packet) {
            Ok(()) => {
                *consecutive_errors = 0;
                if packet.stream() == stream_index {
                    return Some(packet);
                }
            }
            Err(FfmpegError::Eof) => return None,
            Err(error) => {
                *consecutive_errors += 1;
                log::warn!("Skipping unreadable packet: {error}");
                if *consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    log::warn!("Giving up after {consecutive_errors} consecutive read errors");
                    return None;
                }
            }
        }
    }
}

/// Pick the first video stream that is not cover art and has a decoder.
fn select_video_stream(input: &Input) -> Option<StreamInfo> {
    input.streams().find_map(|stream| {
        let parameters = stream.parameters();
        if parameters.medium() != Type::Video
            || stream.disposition().contains(Disposition::ATTACHED_PIC)
        {
            return None;
        }
        let codec = ffmpeg_next::decoder::find(parameters.id())?;

        let declared = stream.frames();
        let start_time = stream.start_time();
        Some(StreamInfo {
            stream_index: stream.index(),
            frames_per_second: guess_frame_rate(stream.avg_frame_rate(), stream.rate()),
            declared_frame_count: if declared > 0 { declared as u64 } else { 0 },
            start_time: (start_time != ffmpeg_sys_next::AV_NOPTS_VALUE).then_some(start_time),
            codec: codec.name().to_string(),
        })
    })
}

/// Prefer the average frame rate, then the real base rate.
fn guess_frame_rate(average: Rational, base: Rational) -> f64 {
    [average, base]
        .into_iter()
        .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
        .map(|rate| rate.numerator() as f64 / rate.denominator() as f64)
        .unwrap_or(0.0)
}
