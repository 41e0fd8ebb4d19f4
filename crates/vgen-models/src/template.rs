//! Template configuration.
//!
//! Templates are authored as JSON documents. Sections keep their authored
//! order, which is also their order on the timeline.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

use crate::pause::{PauseSchedule, PauseSpec};
use crate::timestamp::parse_duration_label;

/// Reference duration used when a template states none.
pub const DEFAULT_REFERENCE_DURATION: f64 = 45.0;

/// A named bundle of section, visual, audio and pause configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template identifier
    #[serde(alias = "template")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Duration the pause positions were authored against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_duration: Option<f64>,

    /// Human-readable duration hint, e.g. "30-60s"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_range: Option<String>,

    /// Ordered sections
    #[serde(
        default,
        serialize_with = "serialize_sections",
        deserialize_with = "deserialize_sections"
    )]
    pub sections: Vec<TemplateSection>,

    #[serde(default)]
    pub visual_settings: VisualSettings,

    #[serde(default)]
    pub audio_settings: AudioSettings,

    /// Authored pauses, keyed by kind
    #[serde(default)]
    pub pauses_strategy: PauseSchedule,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_generation: Option<ScriptGeneration>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Template {
    /// Create an empty template with default settings.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: default_version(),
            reference_duration: None,
            duration_range: None,
            sections: Vec::new(),
            visual_settings: VisualSettings::default(),
            audio_settings: AudioSettings::default(),
            pauses_strategy: PauseSchedule::new(),
            script_generation: None,
        }
    }

    /// Duration the template was authored against.
    ///
    /// The explicit field wins, then the sum of section durations, then
    /// [`DEFAULT_REFERENCE_DURATION`].
    pub fn reference_duration(&self) -> f64 {
        if let Some(d) = self.reference_duration.filter(|d| d.is_finite() && *d >= 0.0) {
            return d;
        }
        let total: f64 = self.sections.iter().map(|s| s.nominal_duration).sum();
        if total > 0.0 {
            total
        } else {
            DEFAULT_REFERENCE_DURATION
        }
    }

    /// Pauses with each spec's kind forced to the key it is filed under.
    pub fn pauses(&self) -> PauseSchedule {
        self.pauses_strategy
            .iter()
            .map(|(kind, specs)| {
                let specs = specs
                    .iter()
                    .map(|s| PauseSpec {
                        kind: kind.clone(),
                        ..s.clone()
                    })
                    .collect();
                (kind.clone(), specs)
            })
            .collect()
    }

    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&TemplateSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Total number of authored pauses.
    pub fn pause_count(&self) -> usize {
        self.pauses_strategy.values().map(Vec::len).sum()
    }

    pub fn with_section(mut self, section: TemplateSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn with_reference_duration(mut self, seconds: f64) -> Self {
        self.reference_duration = Some(seconds);
        self
    }
}

/// Prompt settings for script generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptGeneration {
    /// Prompt with a `{topic}` placeholder
    #[serde(default)]
    pub prompt_template: String,
}

impl ScriptGeneration {
    pub fn prompt_for(&self, topic: &str) -> String {
        self.prompt_template.replace("{topic}", topic)
    }
}

/// One narrative section of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSection {
    /// Section name (the key in the authored JSON)
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub tone: String,

    #[serde(default)]
    pub visual_style: String,

    #[serde(default)]
    pub narrative_purpose: String,

    /// Nominal duration in seconds
    #[serde(
        default,
        alias = "duration",
        deserialize_with = "deserialize_lenient_duration"
    )]
    pub nominal_duration: f64,

    #[serde(default)]
    pub assets: SectionAssets,
}

impl TemplateSection {
    pub fn new(name: impl Into<String>, nominal_duration: f64) -> Self {
        Self {
            name: name.into(),
            tone: String::new(),
            visual_style: String::new(),
            narrative_purpose: String::new(),
            nominal_duration,
            assets: SectionAssets::default(),
        }
    }

    pub fn with_assets(mut self, assets: SectionAssets) -> Self {
        self.assets = assets;
        self
    }
}

/// Media assets attached to a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionAssets {
    #[serde(default)]
    pub audio_effects: Vec<PathBuf>,

    #[serde(default)]
    pub video_effects: Vec<PathBuf>,

    /// Empty strings count as no music
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_path"
    )]
    pub background_music: Option<PathBuf>,
}

impl SectionAssets {
    pub fn is_empty(&self) -> bool {
        self.audio_effects.is_empty()
            && self.video_effects.is_empty()
            && self.background_music.is_none()
    }

    /// Number of referenced assets.
    pub fn count(&self) -> usize {
        self.audio_effects.len()
            + self.video_effects.len()
            + usize::from(self.background_music.is_some())
    }
}

/// Caption anchor on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    #[default]
    CenterBottom,
    Center,
    CenterTop,
}

/// Caption styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    pub font: String,
    #[serde(alias = "fontsize", alias = "font_size")]
    pub size: u32,
    pub color: String,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub position: TextPosition,
    pub margin_bottom: u32,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            font: "Arial-Bold".to_string(),
            size: 90,
            color: "white".to_string(),
            stroke_width: 4,
            stroke_color: "black".to_string(),
            position: TextPosition::CenterBottom,
            margin_bottom: 100,
        }
    }
}

/// Voice and mix levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub voice: String,
    pub rate: f64,
    /// Narration gain
    pub volume: f64,
    #[serde(alias = "background_music_volume")]
    pub bg_music_volume: f64,
    pub effects_volume: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            voice: "pt-BR-FranciscaNeural".to_string(),
            rate: 1.0,
            volume: 1.0,
            bg_music_volume: 0.3,
            effects_volume: 0.5,
        }
    }
}

fn serialize_sections<S>(sections: &[TemplateSection], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(sections.len()))?;
    for section in sections {
        map.serialize_entry(&section.name, section)?;
    }
    map.end()
}

fn deserialize_sections<'de, D>(deserializer: D) -> Result<Vec<TemplateSection>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SectionsVisitor;

    impl<'de> Visitor<'de> for SectionsVisitor {
        type Value = Vec<TemplateSection>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of section name to section")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut sections = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, mut section)) =
                access.next_entry::<String, TemplateSection>()?
            {
                section.name = name;
                sections.push(section);
            }
            Ok(sections)
        }
    }

    deserializer.deserialize_map(SectionsVisitor)
}

/// Accepts `12`, `12.5`, `"12"`, `"10s"` or `"10-20s"` (range length).
fn deserialize_optional_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from))
}

fn deserialize_lenient_duration<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) if n.is_finite() && n >= 0.0 => Ok(n),
        Raw::Number(n) => Err(de::Error::custom(format!("invalid duration {}", n))),
        Raw::Text(s) => parse_duration_label(&s).map_err(de::Error::custom),
    }
}
