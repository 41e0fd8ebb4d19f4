//! Video templates.
//!
//! Loads template documents from disk, checks their assets, suggests
//! templates for a topic and writes fallback scripts from per-template
//! pattern banks.

pub mod error;
pub mod patterns;
pub mod store;
pub mod suggest;

pub use error::{TemplateError, TemplateResult};
pub use patterns::{PatternBank, PatternScriptWriter};
pub use store::{AssetInventory, TemplateStore, TemplateSummary};
pub use suggest::{score_topic, suggest_templates, TemplateSuggestion};
