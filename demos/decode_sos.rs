//! Generate a synthetic SOS trace and decode it

use blink_morse::{decode_trace, FrameRecord, PipelineConfig, Thresholds};

const FPS: f64 = 30.0;
const OPEN: f64 = 0.31;
const CLOSED: f64 = 0.06;

fn push(frames: &mut Vec<FrameRecord>, t: &mut f64, ear: f64, seconds: f64) {
    let n = (seconds * FPS).round() as usize;
    for _ in 0..n {
        frames.push(FrameRecord::with_ear(*t, ear));
        *t += 1.0 / FPS;
    }
}

fn main() {
    let mut frames = Vec::new();
    let mut t = 0.0;
    push(&mut frames, &mut t, OPEN, 0.5);

    for symbol in "...---...".chars() {
        let closed = if symbol == '.' { 0.15 } else { 0.8 };
        push(&mut frames, &mut t, CLOSED, closed);
        push(&mut frames, &mut t, OPEN, 0.4);
    }
    push(&mut frames, &mut t, OPEN, 3.0);

    match decode_trace(&frames, PipelineConfig::default(), Thresholds::default()) {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: {e:?}"),
        },
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
