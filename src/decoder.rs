//! Decoder session.
//!
//! A [`DecoderSession`] owns one FFmpeg video decoder for the duration of a
//! single extraction call. Nothing is shared between calls, so concurrent
//! extractions over the same bytes never touch each other's decoder state.

use ffmpeg_next::codec::Parameters;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::codec::threading;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::util::error::EAGAIN;

use crate::demux::DemuxedPacket;
use crate::error::LoadvidError;
use crate::options::ExtractOptions;
use crate::reorder::ReorderBuffer;
use crate::stream_index::StreamIndex;

/// A decoded picture tagged with its place in presentation order.
pub(crate) struct DecodedFrame {
    /// 0-based presentation index within the stream.
    pub(crate) presentation_index: u64,
    /// Best-effort stream timestamp of the picture.
    pub(crate) timestamp: Option<i64>,
    pub(crate) frame: VideoFrame,
}

impl DecodedFrame {
    /// Native pixel format of the decoded picture.
    pub(crate) fn pixel_format(&self) -> Pixel {
        self.frame.format()
    }
}

/// Stateful decoder for one video stream, yielding frames in presentation
/// order.
pub(crate) struct DecoderSession<'i> {
    decoder: ffmpeg_next::decoder::Video,
    index: &'i StreamIndex,
    reorder: ReorderBuffer<VideoFrame>,
    /// Key used for frames that carry no timestamp.
    fallback_key: i64,
    /// Next index handed out when the stream index is unreliable.
    sequential_index: u64,
    /// Frames released before a decode error, handed out on the next call.
    pending: Vec<DecodedFrame>,
}

impl<'i> DecoderSession<'i> {
    /// Open a decoder for the stream described by `parameters`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadvidError::Decode`] if FFmpeg cannot open a decoder for
    /// the stream's codec.
    pub(crate) fn open(
        parameters: Parameters,
        index: &'i StreamIndex,
        options: &ExtractOptions,
    ) -> Result<Self, LoadvidError> {
        let decoder_error = |error: ffmpeg_next::Error| LoadvidError::Decode {
            timestamp: None,
            reason: format!("could not open decoder: {error}"),
        };

        let mut context = CodecContext::from_parameters(parameters).map_err(decoder_error)?;
        if let Some(count) = options.decoder_threads {
            context.set_threading(threading::Config {
                kind: threading::Type::Frame,
                ..threading::Config::count(count)
            });
        }
        let decoder = context.decoder().video().map_err(decoder_error)?;

        let reorder_depth = unsafe { (*decoder.as_ptr()).has_b_frames }.max(1) as usize;
        log::debug!(
            "Opened decoder {}x{} {:?} (reorder depth {reorder_depth})",
            decoder.width(),
            decoder.height(),
            decoder.format(),
        );

        Ok(Self {
            decoder,
            index,
            reorder: ReorderBuffer::new(reorder_depth),
            fallback_key: 0,
            sequential_index: 0,
            pending: Vec::new(),
        })
    }

    /// Coded dimensions reported by the decoder.
    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    /// Feed one packet, returning the frames that became ready.
    ///
    /// # Errors
    ///
    /// Returns [`LoadvidError::Decode`] if the decoder rejects the packet or
    /// fails while producing a picture (with frame threading, errors surface
    /// there). The session stays usable; callers may skip the packet and
    /// continue.
    pub(crate) fn decode(
        &mut self,
        packet: &DemuxedPacket,
    ) -> Result<Vec<DecodedFrame>, LoadvidError> {
        let decode_error = |error: ffmpeg_next::Error| LoadvidError::Decode {
            timestamp: packet.timestamp,
            reason: error.to_string(),
        };

        self.decoder.send_packet(&packet.packet).map_err(decode_error)?;

        let mut ready = std::mem::take(&mut self.pending);
        match self.receive_into(&mut ready) {
            Ok(()) => Ok(ready),
            Err(error) => {
                self.pending = ready;
                Err(decode_error(error))
            }
        }
    }

    /// Drain everything the decoder still holds at end-of-stream.
    pub(crate) fn flush(&mut self) -> Vec<DecodedFrame> {
        let mut ready = std::mem::take(&mut self.pending);
        if let Err(error) = self.decoder.send_eof() {
            log::debug!("Decoder rejected end-of-stream: {error}");
        }
        if let Err(error) = self.receive_into(&mut ready) {
            log::debug!("Decoder failed while draining: {error}");
        }
        for (_, frame) in self.reorder.drain() {
            ready.push(self.tag(frame));
        }
        ready
    }

    /// Forget decoder state before reading from a new position.
    ///
    /// Returns the frames still waiting in the reorder buffer so the caller
    /// can account for them.
    pub(crate) fn reset(&mut self) -> Vec<DecodedFrame> {
        self.decoder.flush();
        let mut held = std::mem::take(&mut self.pending);
        for (_, frame) in self.reorder.reset() {
            held.push(self.tag(frame));
        }
        self.sequential_index = 0;
        held
    }

    /// Pull pictures until the decoder wants more input.
    fn receive_into(&mut self, ready: &mut Vec<DecodedFrame>) -> Result<(), ffmpeg_next::Error> {
        loop {
            let mut frame = VideoFrame::empty();
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => {}
                Err(error) if is_drained(&error) => return Ok(()),
                Err(error) => return Err(error),
            }

            let key = match frame_timestamp(&frame) {
                Some(timestamp) => {
                    self.fallback_key = timestamp.saturating_add(1);
                    timestamp
                }
                None => {
                    let key = self.fallback_key;
                    self.fallback_key = key.saturating_add(1);
                    key
                }
            };

            if let Some((_, released)) = self.reorder.push(key, frame) {
                ready.push(self.tag(released));
            }
        }
    }

    fn tag(&mut self, frame: VideoFrame) -> DecodedFrame {
        let timestamp = frame_timestamp(&frame);
        let presentation_index = match timestamp.and_then(|t| self.index.presentation_index(t)) {
            Some(index) => index,
            None => self.sequential_index,
        };
        self.sequential_index = presentation_index + 1;

        DecodedFrame {
            presentation_index,
            timestamp,
            frame,
        }
    }
}

fn frame_timestamp(frame: &VideoFrame) -> Option<i64> {
    frame.timestamp().or_else(|| frame.pts())
}

/// `receive_frame` errors that only mean no picture is ready.
fn is_drained(error: &ffmpeg_next::Error) -> bool {
    match error {
        ffmpeg_next::Error::Eof => true,
        ffmpeg_next::Error::Other { errno } => *errno == EAGAIN,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_eagain_and_eof_end_receiving() {
        assert!(is_drained(&ffmpeg_next::Error::Eof));
        assert!(is_drained(&ffmpeg_next::Error::Other { errno: EAGAIN }));
        assert!(!is_drained(&ffmpeg_next::Error::InvalidData));
        assert!(!is_drained(&ffmpeg_next::Error::Other { errno: EAGAIN + 1 }));
    }
}
