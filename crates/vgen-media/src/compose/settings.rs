//! Template configuration resolved for one render.

use vgen_models::{Template, TextPosition, VisualSettings};

use crate::config::RenderConfig;
use crate::filters::CaptionStyle;

/// Concrete parameters for one render, passed by reference through the
/// composition steps.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub caption: CaptionStyle,
    /// Narration gain
    pub narration_volume: f64,
    /// Sound-effect gain
    pub effects_volume: f64,
    /// Background music gain
    pub music_volume: f64,
    /// Whether template assets (overlays, sound effects, music) are applied
    pub effects_enabled: bool,
    pub effect_opacity: f32,
    pub sample_rate: u32,
}

impl RenderSettings {
    /// Resolve settings from an optional template.
    ///
    /// Without a template captions use the default styling, narration plays
    /// at unity gain and no effects are applied.
    pub fn resolve(template: Option<&Template>, config: &RenderConfig) -> Self {
        let visual = template
            .map(|t| t.visual_settings.clone())
            .unwrap_or_default();

        let (narration_volume, effects_volume, music_volume) = match template {
            Some(t) => (
                sanitize_gain(t.audio_settings.volume, 1.0),
                sanitize_gain(t.audio_settings.effects_volume, 0.5),
                sanitize_gain(t.audio_settings.bg_music_volume, 0.3),
            ),
            None => (1.0, 0.0, 0.0),
        };

        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            caption: caption_style(&visual, config.caption_fade),
            narration_volume,
            effects_volume,
            music_volume,
            effects_enabled: template.is_some(),
            effect_opacity: config.effect_opacity,
            sample_rate: config.sample_rate,
        }
    }
}

fn caption_style(visual: &VisualSettings, fade: f64) -> CaptionStyle {
    let margin = match visual.position {
        TextPosition::CenterBottom | TextPosition::CenterTop => visual.margin_bottom,
        TextPosition::Center => 0,
    };
    CaptionStyle {
        font: visual.font.clone(),
        font_size: visual.size.max(1),
        color: visual.color.clone(),
        stroke_width: visual.stroke_width,
        stroke_color: visual.stroke_color.clone(),
        position: visual.position,
        margin,
        fade,
    }
}

fn sanitize_gain(gain: f64, fallback: f64) -> f64 {
    if gain.is_finite() && gain >= 0.0 {
        gain
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_template() {
        let settings = RenderSettings::resolve(None, &RenderConfig::default());
        assert_eq!(settings.caption.font, "Arial-Bold");
        assert_eq!(settings.caption.font_size, 90);
        assert_eq!(settings.caption.position, TextPosition::CenterBottom);
        assert_eq!(settings.caption.margin, 100);
        assert_eq!(settings.narration_volume, 1.0);
        assert!(!settings.effects_enabled);
    }

    #[test]
    fn test_template_values_win() {
        let mut template = Template::new("t", "T");
        template.visual_settings.size = 70;
        template.visual_settings.color = "yellow".to_string();
        template.audio_settings.volume = 0.8;
        template.audio_settings.effects_volume = f64::NAN;

        let settings = RenderSettings::resolve(Some(&template), &RenderConfig::default());
        assert_eq!(settings.caption.font_size, 70);
        assert_eq!(settings.caption.color, "yellow");
        assert_eq!(settings.narration_volume, 0.8);
        assert_eq!(settings.effects_volume, 0.5);
        assert_eq!(settings.music_volume, 0.3);
        assert!(settings.effects_enabled);
    }
}
