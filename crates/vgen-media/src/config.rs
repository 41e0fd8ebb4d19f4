//! Output encoding configuration.

use serde::{Deserialize, Serialize};

/// Frame, codec and timing parameters for the final encode.
///
/// ```ignore
/// let config = RenderConfig::default()
///     .with_frame_size(720, 1280)
///     .with_crf(28);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_bitrate: String,
    /// Audio sample rate used for every mixed stream
    pub sample_rate: u32,
    /// Caption fade-in and fade-out, seconds
    pub caption_fade: f64,
    /// Opacity of template video-effect overlays (0.0 - 1.0)
    pub effect_opacity: f32,
    /// FFmpeg timeout, seconds
    pub ffmpeg_timeout_secs: u64,
    /// Filter graphs longer than this go to a script file
    pub max_inline_filter_len: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 25,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            audio_bitrate: "192k".to_string(),
            sample_rate: 44100,
            caption_fade: 0.3,
            effect_opacity: 0.8,
            ffmpeg_timeout_secs: 1800,
            max_inline_filter_len: 16 * 1024,
        }
    }
}

impl RenderConfig {
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        // libx264 with yuv420p needs even dimensions.
        self.width = width.max(2) & !1;
        self.height = height.max(2) & !1;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(51);
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn with_caption_fade(mut self, seconds: f64) -> Self {
        self.caption_fade = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self
    }

    pub fn with_effect_opacity(mut self, opacity: f32) -> Self {
        self.effect_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_ffmpeg_timeout(mut self, secs: u64) -> Self {
        self.ffmpeg_timeout_secs = secs;
        self
    }

    /// `WxH` as used by lavfi sources.
    pub fn frame_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.frame_size(), "1080x1920");
        assert_eq!(config.fps, 25);
        assert_eq!(config.video_codec, "libx264");
        assert_eq!(config.audio_codec, "aac");
        assert!((config.caption_fade - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_builder_clamps() {
        let config = RenderConfig::default()
            .with_frame_size(721, 1281)
            .with_crf(80)
            .with_effect_opacity(1.5)
            .with_caption_fade(-1.0);
        assert_eq!(config.frame_size(), "720x1280");
        assert_eq!(config.crf, 51);
        assert_eq!(config.effect_opacity, 1.0);
        assert_eq!(config.caption_fade, 0.0);
    }

    #[test]
    fn test_encoder_overrides() {
        let config = RenderConfig::default().with_fps(0).with_preset("medium");
        assert_eq!(config.fps, 1);
        assert_eq!(config.preset, "medium");
        assert_eq!(RenderConfig::default().with_fps(30).fps, 30);
    }
}
