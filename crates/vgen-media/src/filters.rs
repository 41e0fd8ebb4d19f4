//! FFmpeg filter graph fragments.
//!
//! Each builder returns one filter chain with its input and output labels so
//! the composition backend can join them with `;`.

use vgen_models::TextPosition;

/// Escape a value for use inside a single-quoted filter option.
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

/// Escape a file path used as a filter option.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace('\'', "\\'").replace(':', "\\:")
}

/// Format seconds for filter expressions.
pub fn secs(t: f64) -> String {
    format!("{:.3}", t)
}

/// Solid black base canvas of the given duration.
pub fn color_source(width: u32, height: u32, fps: u32, duration: f64) -> String {
    format!("color=c=black:s={}x{}:r={}:d={}", width, height, fps, secs(duration))
}

/// Trim a (looped) clip input to `duration`, fill the frame and shift it to
/// start at `start` on the output timeline.
pub fn background_segment(
    input: usize,
    start: f64,
    duration: f64,
    width: u32,
    height: u32,
    fps: u32,
    out_label: &str,
) -> String {
    format!(
        "[{input}:v]trim=duration={dur},setpts=PTS-STARTPTS,\
         scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps},\
         setpts=PTS+{start}/TB[{out}]",
        input = input,
        dur = secs(duration),
        w = width,
        h = height,
        fps = fps,
        start = secs(start),
        out = out_label,
    )
}

/// Effect overlay input: trimmed, resized to the frame and made partially transparent.
pub fn effect_segment(
    input: usize,
    start: f64,
    duration: f64,
    width: u32,
    height: u32,
    opacity: f32,
    out_label: &str,
) -> String {
    format!(
        "[{input}:v]trim=duration={dur},setpts=PTS-STARTPTS,scale={w}:{h},format=rgba,\
         colorchannelmixer=aa={opacity:.2},setpts=PTS+{start}/TB[{out}]",
        input = input,
        dur = secs(duration),
        w = width,
        h = height,
        opacity = opacity,
        start = secs(start),
        out = out_label,
    )
}

/// Composite `top` over `base` during `[start, end)`.
pub fn overlay_between(base: &str, top: &str, start: f64, end: f64, out_label: &str) -> String {
    format!(
        "[{base}][{top}]overlay=0:0:eof_action=pass:enable='between(t,{s},{e})'[{out}]",
        base = base,
        top = top,
        s = secs(start),
        e = secs(end),
        out = out_label,
    )
}

/// Caption styling for [`drawtext`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font: String,
    pub font_size: u32,
    pub color: String,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub position: TextPosition,
    pub margin: u32,
    /// Fade-in and fade-out length, seconds
    pub fade: f64,
}

/// One drawtext filter showing `text` during `[start, end]` with a linear
/// fade at both ends. The fade shrinks for captions shorter than two fades.
pub fn drawtext(text: &str, start: f64, end: f64, style: &CaptionStyle) -> String {
    let y = match style.position {
        TextPosition::CenterBottom => format!("h-text_h-{}", style.margin),
        TextPosition::Center => "(h-text_h)/2".to_string(),
        TextPosition::CenterTop => format!("{}", style.margin),
    };

    let fade = style.fade.min((end - start) / 2.0).max(0.0);
    let alpha = if fade > 0.0 {
        format!(
            ":alpha='if(lt(t,{s}+{f}),(t-{s})/{f},if(gt(t,{e}-{f}),({e}-t)/{f},1))'",
            s = secs(start),
            e = secs(end),
            f = secs(fade),
        )
    } else {
        String::new()
    };

    // Font files are passed by path, anything else goes through fontconfig.
    let lower = style.font.to_ascii_lowercase();
    let font = if lower.ends_with(".ttf") || lower.ends_with(".otf") {
        format!("fontfile='{}'", escape_filter_path(&style.font))
    } else {
        format!("font='{}'", escape_filter_value(&style.font))
    };

    format!(
        "drawtext={font}:text='{text}':fontsize={size}:fontcolor={color}:\
         borderw={bw}:bordercolor={bc}:x=(w-text_w)/2:y={y}:\
         enable='between(t,{s},{e})'{alpha}",
        font = font,
        text = escape_filter_value(text),
        size = style.font_size,
        color = style.color,
        bw = style.stroke_width,
        bc = style.stroke_color,
        y = y,
        s = secs(start),
        e = secs(end),
        alpha = alpha,
    )
}

/// A slice of the narration input, normalized for concatenation.
pub fn narration_slice(
    input: usize,
    from: f64,
    to: Option<f64>,
    sample_rate: u32,
    out_label: &str,
) -> String {
    let trim = match to {
        Some(to) => format!("atrim=start={}:end={}", secs(from), secs(to)),
        None => format!("atrim=start={}", secs(from)),
    };
    format!(
        "[{input}:a]{trim},asetpts=PTS-STARTPTS,{fmt}[{out}]",
        input = input,
        trim = trim,
        fmt = audio_format(sample_rate),
        out = out_label,
    )
}

/// True silence of `duration` seconds.
pub fn silence(duration: f64, sample_rate: u32, out_label: &str) -> String {
    format!(
        "anullsrc=r={rate}:cl=stereo,atrim=duration={dur},asetpts=PTS-STARTPTS,{fmt}[{out}]",
        rate = sample_rate,
        dur = secs(duration),
        fmt = audio_format(sample_rate),
        out = out_label,
    )
}

/// Concatenate audio labels in order.
pub fn concat_audio(labels: &[String], out_label: &str) -> String {
    let inputs: String = labels.iter().map(|l| format!("[{}]", l)).collect();
    format!("{}concat=n={}:v=0:a=1[{}]", inputs, labels.len(), out_label)
}

/// Apply a gain to a labelled stream.
pub fn volume(in_label: &str, gain: f64, out_label: &str) -> String {
    format!("[{}]volume={:.3}[{}]", in_label, gain, out_label)
}

/// An audio cue from `input`: optionally trimmed to `duration`, scaled by
/// `gain` and delayed to `start`.
pub fn audio_cue(
    input: usize,
    start: f64,
    duration: Option<f64>,
    gain: f64,
    sample_rate: u32,
    out_label: &str,
) -> String {
    let trim = duration
        .map(|d| format!("atrim=duration={},asetpts=PTS-STARTPTS,", secs(d)))
        .unwrap_or_default();
    let delay_ms = (start.max(0.0) * 1000.0).round() as u64;
    format!(
        "[{input}:a]{trim}{fmt},volume={gain:.3},adelay={delay}|{delay}[{out}]",
        input = input,
        trim = trim,
        fmt = audio_format(sample_rate),
        gain = gain,
        delay = delay_ms,
        out = out_label,
    )
}

/// Mix labels without renormalizing; the first label sets the length.
pub fn mix_audio(labels: &[String], out_label: &str) -> String {
    if labels.len() == 1 {
        return format!("[{}]anull[{}]", labels[0], out_label);
    }
    let inputs: String = labels.iter().map(|l| format!("[{}]", l)).collect();
    format!(
        "{}amix=inputs={}:duration=first:dropout_transition=0:normalize=0[{}]",
        inputs,
        labels.len(),
        out_label
    )
}

fn audio_format(sample_rate: u32) -> String {
    format!(
        "aformat=sample_fmts=fltp:sample_rates={}:channel_layouts=stereo",
        sample_rate
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> CaptionStyle {
        CaptionStyle {
            font: "Arial-Bold".to_string(),
            font_size: 90,
            color: "white".to_string(),
            stroke_width: 4,
            stroke_color: "black".to_string(),
            position: TextPosition::CenterBottom,
            margin: 100,
            fade: 0.3,
        }
    }

    #[test]
    fn test_drawtext_timing_and_fade() {
        let filter = drawtext("Bananas são", 0.0, 2.0, &style());
        assert!(filter.contains("text='Bananas são'"));
        assert!(filter.contains("enable='between(t,0.000,2.000)'"));
        assert!(filter.contains("(t-0.000)/0.300"));
        assert!(filter.contains("y=h-text_h-100"));
        assert!(filter.contains("borderw=4"));
    }

    #[test]
    fn test_drawtext_short_caption_shrinks_fade() {
        let filter = drawtext("oi", 1.0, 1.2, &style());
        assert!(filter.contains("/0.100"));
    }

    #[test]
    fn test_drawtext_escapes_text() {
        let filter = drawtext("it's 10:30", 0.0, 1.0, &style());
        assert!(filter.contains(r"it'\''s 10\:30"));
    }

    #[test]
    fn test_font_file() {
        let mut s = style();
        s.font = "/usr/share/fonts/Anton.ttf".to_string();
        assert!(drawtext("x", 0.0, 1.0, &s)
            .starts_with("drawtext=fontfile='/usr/share/fonts/Anton.ttf'"));
        assert!(drawtext("x", 0.0, 1.0, &style()).starts_with("drawtext=font='Arial-Bold'"));
    }

    #[test]
    fn test_positions() {
        let mut s = style();
        s.position = TextPosition::Center;
        assert!(drawtext("x", 0.0, 1.0, &s).contains("y=(h-text_h)/2"));
        s.position = TextPosition::CenterTop;
        assert!(drawtext("x", 0.0, 1.0, &s).contains("y=100"));
    }

    #[test]
    fn test_background_segment() {
        let f = background_segment(2, 3.5, 2.0, 1080, 1920, 25, "bg0");
        assert!(f.starts_with("[2:v]trim=duration=2.000"));
        assert!(f.contains("crop=1080:1920"));
        assert!(f.ends_with("setpts=PTS+3.500/TB[bg0]"));
    }

    #[test]
    fn test_audio_chain_pieces() {
        assert_eq!(
            concat_audio(&["a0".to_string(), "s0".to_string(), "a1".to_string()], "narr"),
            "[a0][s0][a1]concat=n=3:v=0:a=1[narr]"
        );
        assert!(silence(1.5, 44100, "s0").contains("atrim=duration=1.500"));
        assert!(audio_cue(3, 2.25, None, 0.5, 44100, "fx0").contains("adelay=2250|2250"));
        assert!(narration_slice(1, 2.0, None, 44100, "n1").contains("atrim=start=2.000,"));
        assert_eq!(mix_audio(&["narr".to_string()], "aout"), "[narr]anull[aout]");
        assert!(mix_audio(&["narr".to_string(), "fx0".to_string()], "aout")
            .contains("amix=inputs=2:duration=first"));
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("C:\\fx\\it's.mp4"), "C\\:\\\\fx\\\\it\\'s.mp4");
    }
}
