//! Async wrapper integration tests.
//!
//! Requires the `async` feature.

#![cfg(feature = "async")]

mod common;

use std::sync::Arc;

use common::identify;
use loadvid::{ExtractOptions, LoadvidError};

#[tokio::test]
async fn async_indices_match_blocking_call() {
    let Some(video) = common::sample_video() else {
        return;
    };
    let encoded: Arc<[u8]> = Arc::from(video);

    let blocking = loadvid::extract_indices(video, 8, 8, &[2, 12]).expect("blocking");
    let asynchronous = loadvid::extract_indices_async(
        Arc::clone(&encoded),
        8,
        8,
        vec![2, 12],
        ExtractOptions::default(),
    )
    .await
    .expect("async");

    assert_eq!(asynchronous.frames, blocking.frames);
    assert_eq!(asynchronous.frame_indices, vec![2, 12]);
}

#[tokio::test]
async fn async_uniform_extracts_frames() {
    let Some(video) = common::sample_video() else {
        return;
    };

    let result = loadvid::extract_uniform_async(
        Arc::from(video),
        8,
        8,
        3,
        None,
        false,
        ExtractOptions::default(),
    )
    .await
    .expect("async");

    assert_eq!(result.frame_count, 3);
    let identified: Vec<u64> = result.iter().map(identify).collect();
    assert_eq!(identified, result.frame_indices);
}

#[tokio::test]
async fn async_errors_pass_through() {
    let error = loadvid::extract_uniform_async(
        Arc::from(&b"nope"[..]),
        0,
        8,
        3,
        None,
        false,
        ExtractOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(error, LoadvidError::InvalidDimensions { .. }));
}
