//! Container-level behaviour: malformed input, audio-only input, probing.

mod common;

use common::{FRAME_COUNT, SOURCE_HEIGHT, SOURCE_WIDTH};
use loadvid::LoadvidError;

fn assert_not_a_video(error: &LoadvidError) {
    assert!(
        matches!(
            error,
            LoadvidError::Container(_) | LoadvidError::NoVideoStream
        ),
        "{error:?}"
    );
    assert!(!error.is_input_validation());
}

#[test]
fn garbage_bytes_are_a_container_error() {
    let garbage: Vec<u8> = (0..4096u32).map(|value| (value * 7919 % 251) as u8).collect();

    let error = loadvid::extract_uniform(&garbage, 8, 8, 4, None, false).unwrap_err();
    assert_not_a_video(&error);

    let error = loadvid::extract_indices(&garbage, 8, 8, &[0]).unwrap_err();
    assert_not_a_video(&error);
}

#[test]
fn audio_only_input_has_no_video_stream() {
    let wav = common::wav_bytes();

    let error = loadvid::extract_uniform(&wav, 8, 8, 4, None, false).unwrap_err();
    assert!(matches!(error, LoadvidError::NoVideoStream), "{error:?}");

    let error = loadvid::probe(&wav).unwrap_err();
    assert!(matches!(error, LoadvidError::NoVideoStream), "{error:?}");
}

#[test]
fn truncated_header_is_rejected() {
    let Some(video) = common::sample_video() else {
        return;
    };

    let error = loadvid::extract_uniform(&video[..64], 8, 8, 2, None, false).unwrap_err();
    assert!(!error.is_input_validation(), "{error:?}");
}

#[test]
fn probe_reports_stream_layout() {
    let Some(video) = common::sample_video() else {
        return;
    };

    let info = loadvid::probe(video).expect("probe");

    assert_eq!((info.width, info.height), (SOURCE_WIDTH, SOURCE_HEIGHT));
    assert_eq!(info.frame_count, FRAME_COUNT);
    assert!((info.frames_per_second - 10.0).abs() < 0.01, "{info:?}");
    assert!(info.keyframe_count >= 6, "{info:?}");
    assert!(info.keyframe_interval <= 5, "{info:?}");
    assert!(info.seekable);
    assert_eq!(info.codec, "mpeg4");
}

#[test]
fn probe_matches_b_frame_stream() {
    let Some(video) = common::sample_video_with_b_frames() else {
        return;
    };

    let info = loadvid::probe(video).expect("probe");
    assert_eq!(info.frame_count, FRAME_COUNT);
    assert!(info.keyframe_count >= 1);
}

#[test]
fn damaged_payload_still_extracts() {
    let Some(video) = common::sample_video_with_b_frames() else {
        return;
    };
    let mut damaged = video.to_vec();
    let middle = damaged.len() / 2;
    let end = (middle + 512).min(damaged.len());
    for (offset, byte) in damaged[middle..end].iter_mut().enumerate() {
        *byte = (offset as u8).wrapping_mul(37) ^ 0xA5;
    }

    let result = loadvid::extract_uniform(&damaged, 8, 8, 6, None, false).expect("extract");

    assert!(result.frame_count <= 6);
    assert_eq!(result.frame_indices.len(), result.frame_count);
    assert_eq!(result.frames.len(), result.frame_count * 8 * 8 * 3);
    assert!(result.frame_indices.windows(2).all(|pair| pair[0] < pair[1]));
}
