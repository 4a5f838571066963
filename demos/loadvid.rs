//! Repeatedly sample frames uniformly from a video file with a random start.
//!
//! Usage:
//!   cargo run --example loadvid -- <input_file> [width] [height]

use std::error::Error;
use std::time::Instant;

const NUM_FRAMES: u64 = 32;
const ROUNDS: usize = 10;

fn main() -> Result<(), Box<dyn Error>> {
    let mut arguments = std::env::args().skip(1);
    let input_path = arguments.next().unwrap_or_else(|| "input.mp4".to_string());
    let width: u32 = arguments.next().map(|value| value.parse()).transpose()?.unwrap_or(224);
    let height: u32 = arguments.next().map(|value| value.parse()).transpose()?.unwrap_or(224);

    println!("Reading {input_path}...");
    let encoded = std::fs::read(&input_path)?;

    let info = loadvid::probe(&encoded)?;
    println!(
        "Video: {}x{}, {:.2} fps, {} frames, keyframe every {} frames ({})",
        info.width,
        info.height,
        info.frames_per_second,
        info.frame_count,
        info.keyframe_interval,
        info.codec,
    );

    let mut last = None;
    for round in 0..ROUNDS {
        let start = Instant::now();
        let result = loadvid::extract_uniform(&encoded, width, height, NUM_FRAMES, Some(15), true)?;
        println!(
            "round {round}: {} frames in {:.3?} (decoded {}, seeks {})",
            result.frame_count,
            start.elapsed(),
            result.stats.frames_decoded,
            result.stats.seeks,
        );
        last = Some(result);
    }

    if let Some(result) = last {
        if let Some(image) = result.frame_image(0) {
            image.save("loadvid_first.png")?;
            println!("Saved loadvid_first.png (frame {})", result.frame_indices[0]);
        }
        if let Some(image) = result.len().checked_sub(1).and_then(|last| result.frame_image(last)) {
            image.save("loadvid_last.png")?;
            println!("Saved loadvid_last.png");
        }
    }

    Ok(())
}
