//! Shared fixtures for the integration tests.
//!
//! Videos are synthesised at test time with FFmpeg's MPEG-4 Part 2 encoder:
//! every frame is a flat colour derived from its index, so any output frame
//! can be traced back to the source frame it came from. Tests skip when the
//! encoder is not compiled into the local FFmpeg.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::OnceLock;

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::format::flag::Flags as FormatFlags;
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{Dictionary, Packet, Rational};

pub const FRAME_COUNT: u64 = 30;
pub const SOURCE_WIDTH: u32 = 64;
pub const SOURCE_HEIGHT: u32 = 48;
pub const FRAMES_PER_SECOND: i32 = 10;
pub const GROUP_OF_PICTURES: u32 = 5;

/// Colour of source frame `index`. Red rises and green falls with the index,
/// blue stays constant.
pub fn color_of(index: u64) -> [u8; 3] {
    let step = (index * 8) as u8;
    [16 + step, 240 - step, 96]
}

/// MP4 with I and P frames only.
pub fn sample_video() -> Option<&'static [u8]> {
    static VIDEO: OnceLock<Option<Vec<u8>>> = OnceLock::new();
    VIDEO
        .get_or_init(|| encode_or_skip("mp4", 0))
        .as_deref()
}

/// Matroska with two B-frames between references, so decode order differs
/// from presentation order.
pub fn sample_video_with_b_frames() -> Option<&'static [u8]> {
    static VIDEO: OnceLock<Option<Vec<u8>>> = OnceLock::new();
    VIDEO
        .get_or_init(|| encode_or_skip("mkv", 2))
        .as_deref()
}

fn encode_or_skip(extension: &str, max_b_frames: usize) -> Option<Vec<u8>> {
    match encode_video(extension, max_b_frames) {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            eprintln!("Skipping: cannot synthesise {extension} fixture ({error})");
            None
        }
    }
}

/// Encode [`FRAME_COUNT`] flat frames and return the container bytes.
pub fn encode_video(extension: &str, max_b_frames: usize) -> Result<Vec<u8>, ffmpeg_next::Error> {
    ffmpeg_next::init()?;

    let file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .map_err(|_| ffmpeg_next::Error::Bug)?;
    let path = file.path().to_path_buf();

    let mut output = ffmpeg_next::format::output(&path)?;
    let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

    let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
        .ok_or(ffmpeg_next::Error::EncoderNotFound)?;
    let mut stream = output.add_stream(codec)?;
    let stream_index = stream.index();

    let mut encoder = CodecContext::from_parameters(stream.parameters())?
        .encoder()
        .video()?;
    let time_base = Rational::new(1, FRAMES_PER_SECOND);
    encoder.set_width(SOURCE_WIDTH);
    encoder.set_height(SOURCE_HEIGHT);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_time_base(time_base);
    encoder.set_frame_rate(Some(Rational::new(FRAMES_PER_SECOND, 1)));
    encoder.set_gop(GROUP_OF_PICTURES);
    encoder.set_max_b_frames(max_b_frames);
    encoder.set_bit_rate(2_000_000);
    unsafe {
        let context = encoder.as_mut_ptr();
        // Fixed quantiser 2 keeps flat colours within a couple of levels.
        (*context).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_QSCALE as i32;
        (*context).global_quality = 2 * ffmpeg_sys_next::FF_QP2LAMBDA as i32;
        if needs_global_header {
            (*context).flags |= ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }
    }

    // Every frame changes colour; keep the encoder from inserting extra
    // keyframes on scene changes.
    let mut settings = Dictionary::new();
    settings.set("sc_threshold", "1000000000");
    let mut encoder = encoder.open_as_with(codec, settings)?;
    stream.set_parameters(&encoder);
    output.write_header()?;

    let stream_time_base = output
        .stream(stream_index)
        .map(|stream| stream.time_base())
        .ok_or(ffmpeg_next::Error::StreamNotFound)?;

    let mut scaler = ScalingContext::get(
        Pixel::RGB24,
        SOURCE_WIDTH,
        SOURCE_HEIGHT,
        Pixel::YUV420P,
        SOURCE_WIDTH,
        SOURCE_HEIGHT,
        ScalingFlags::BILINEAR,
    )?;

    for index in 0..FRAME_COUNT {
        let mut rgb_frame = VideoFrame::new(Pixel::RGB24, SOURCE_WIDTH, SOURCE_HEIGHT);
        let stride = rgb_frame.stride(0);
        let color = color_of(index);
        let data = rgb_frame.data_mut(0);
        for row in 0..SOURCE_HEIGHT as usize {
            for pixel in data[row * stride..row * stride + SOURCE_WIDTH as usize * 3].chunks_exact_mut(3) {
                pixel.copy_from_slice(&color);
            }
        }

        let mut yuv_frame = VideoFrame::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(index as i64));

        encoder.send_frame(&yuv_frame)?;
        write_packets(&mut encoder, &mut output, stream_index, time_base, stream_time_base)?;
    }

    encoder.send_eof()?;
    write_packets(&mut encoder, &mut output, stream_index, time_base, stream_time_base)?;
    output.write_trailer()?;
    drop(output);

    std::fs::read(&path).map_err(|_| ffmpeg_next::Error::Bug)
}

fn write_packets(
    encoder: &mut ffmpeg_next::encoder::video::Encoder,
    output: &mut ffmpeg_next::format::context::Output,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
) -> Result<(), ffmpeg_next::Error> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(encoder_time_base, stream_time_base);
        packet.write_interleaved(output)?;
    }
    Ok(())
}

/// Mean of each channel over one packed RGB frame.
pub fn mean_color(frame: &[u8]) -> [f64; 3] {
    let pixels = (frame.len() / 3) as f64;
    let mut sums = [0.0f64; 3];
    for pixel in frame.chunks_exact(3) {
        for (sum, &channel) in sums.iter_mut().zip(pixel) {
            *sum += f64::from(channel);
        }
    }
    sums.map(|sum| sum / pixels)
}

/// Source frame index whose colour is closest to `frame`.
pub fn identify(frame: &[u8]) -> u64 {
    let mean = mean_color(frame);
    (0..FRAME_COUNT)
        .min_by(|&left, &right| {
            distance(mean, color_of(left)).total_cmp(&distance(mean, color_of(right)))
        })
        .unwrap_or(0)
}

fn distance(mean: [f64; 3], color: [u8; 3]) -> f64 {
    mean.iter()
        .zip(color)
        .map(|(channel, target)| (channel - f64::from(target)).powi(2))
        .sum()
}

/// A short mono WAV file: valid media, but no video stream.
pub fn wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for sample in 0..8000i32 {
            let value = ((sample as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(value).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}
