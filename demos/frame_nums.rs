//! Decode a randomly chosen, strictly increasing set of frames from a video file.
//!
//! Usage:
//!   cargo run --example frame_nums -- <input_file> [width] [height]

use std::error::Error;
use std::time::Instant;

use rand::Rng;

fn main() -> Result<(), Box<dyn Error>> {
    let mut arguments = std::env::args().skip(1);
    let input_path = arguments.next().unwrap_or_else(|| "input.mp4".to_string());
    let width: u32 = arguments.next().map(|value| value.parse()).transpose()?.unwrap_or(224);
    let height: u32 = arguments.next().map(|value| value.parse()).transpose()?.unwrap_or(224);

    let encoded = std::fs::read(&input_path)?;
    let info = loadvid::probe(&encoded)?;

    // Gaps of 1 to 3 frames, starting after frame 0.
    let mut rng = rand::thread_rng();
    let mut frame_indices = Vec::new();
    let mut index = 0u64;
    loop {
        index += rng.gen_range(1..4);
        if index >= info.frame_count || frame_indices.len() == 8 {
            break;
        }
        frame_indices.push(index);
    }
    println!("Requesting frames {frame_indices:?}");

    let start = Instant::now();
    let result = loadvid::extract_indices(&encoded, width, height, &frame_indices)?;
    println!("Decoded {} frames in {:.3?}", result.frame_count, start.elapsed());
    println!("{:#?}", result.stats);

    for (position, frame_index) in result.frame_indices.iter().enumerate() {
        if let Some(image) = result.frame_image(position) {
            let filename = format!("frame_{frame_index}.png");
            image.save(&filename)?;
            println!("Saved {filename}");
        }
    }

    Ok(())
}
