//! FFmpeg filter builders.

use reel_models::{OUTPUT_FPS, OUTPUT_HEIGHT, OUTPUT_WIDTH};

/// Caption font size in pixels at 1080p.
pub const CAPTION_FONT_SIZE: u32 = 48;
/// Caption outline width in pixels.
pub const CAPTION_BORDER_WIDTH: u32 = 3;
/// Distance of the caption baseline from the bottom edge, in pixels.
pub const CAPTION_BOTTOM_MARGIN: u32 = 100;

/// Normalize any source to the fixed output resolution.
///
/// Scales to fit inside 1920x1080 preserving aspect ratio, pads the rest
/// with black, squares the sample aspect and locks the frame rate so all
/// clips are concatenation-compatible.
pub fn filter_normalize() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = OUTPUT_WIDTH,
        h = OUTPUT_HEIGHT,
        fps = OUTPUT_FPS
    )
}

/// Quote a string for use as a drawtext `text` value.
///
/// The whole value is wrapped in single quotes so the filter-graph parser
/// leaves `,;:[]` alone; embedded quotes close, escape and reopen the
/// quoted section.
pub fn quote_drawtext(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Caption overlay: white text with a black outline, horizontally centered
/// in the lower portion of the frame.
pub fn filter_caption(text: &str) -> String {
    format!(
        "drawtext=text={}:expansion=none:fontcolor=white:fontsize={}:\
         borderw={}:bordercolor=black:x=(w-text_w)/2:y=h-text_h-{}",
        quote_drawtext(text),
        CAPTION_FONT_SIZE,
        CAPTION_BORDER_WIDTH,
        CAPTION_BOTTOM_MARGIN
    )
}

/// Concatenate `n` video inputs and append a trailing pad that clones the
/// last frame (reserved for the audio fade-out). Produces label `[vout]`.
pub fn filter_concat(n: usize, pad_secs: f64) -> String {
    let mut graph = String::new();
    for i in 0..n {
        graph.push_str(&format!("[{i}:v]"));
    }
    graph.push_str(&format!("concat=n={n}:v=1:a=0"));
    if pad_secs > 0.0 {
        graph.push_str(&format!(
            "[cat];[cat]tpad=stop_mode=clone:stop_duration={pad_secs:.3}"
        ));
    }
    graph.push_str("[vout]");
    graph
}

/// Audio fade-out starting at `start` for `duration` seconds.
pub fn filter_afade_out(start: f64, duration: f64) -> String {
    format!("afade=t=out:st={start:.3}:d={duration:.3}")
}
