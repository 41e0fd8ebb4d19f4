//! In-memory template store backed by a directory of JSON documents.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use vgen_models::{SectionAssets, Template};

use crate::error::{TemplateError, TemplateResult};

/// Share of referenced assets that must exist for a template to be usable.
const READY_THRESHOLD: f64 = 0.7;

/// Short listing entry for a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Asset paths grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssetInventory {
    pub audio_effects: Vec<PathBuf>,
    pub video_effects: Vec<PathBuf>,
    pub background_music: Vec<PathBuf>,
}

impl AssetInventory {
    pub fn total(&self) -> usize {
        self.audio_effects.len() + self.video_effects.len() + self.background_music.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn extend(&mut self, assets: &SectionAssets) {
        self.audio_effects.extend(assets.audio_effects.iter().cloned());
        self.video_effects.extend(assets.video_effects.iter().cloned());
        self.background_music.extend(assets.background_music.iter().cloned());
    }

    fn retain_missing(mut self) -> Self {
        let missing = |p: &PathBuf| !p.exists();
        self.audio_effects.retain(missing);
        self.video_effects.retain(missing);
        self.background_music.retain(missing);
        self
    }
}

/// Templates keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Arc<Template>>,
    asset_root: Option<PathBuf>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative asset paths against `root` for templates inserted
    /// from now on.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Load every `*.json` file in `dir`.
    ///
    /// A missing directory yields an empty store. Files that fail to parse
    /// are logged and skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> TemplateResult<Self> {
        Self::new().load_from(dir)
    }

    /// Like [`TemplateStore::load_dir`] but keeps this store's settings.
    pub fn load_from(mut self, dir: impl AsRef<Path>) -> TemplateResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Templates directory not found");
            return Ok(self);
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            match load_file(&path) {
                Ok(template) => {
                    info!(id = %template.id, name = %template.name, "Loaded template");
                    self.insert(template);
                }
                Err(e) => warn!("Skipping template: {}", e),
            }
        }

        Ok(self)
    }

    /// Add or replace a template.
    pub fn insert(&mut self, mut template: Template) {
        if let Some(root) = &self.asset_root {
            resolve_assets(&mut template, root);
        }
        if self.templates.contains_key(&template.id) {
            debug!(id = %template.id, "Replacing template");
        }
        self.templates.insert(template.id.clone(), Arc::new(template));
    }

    pub fn get(&self, id: &str) -> Option<Arc<Template>> {
        self.templates.get(id).cloned()
    }

    /// Like [`TemplateStore::get`] but fails on unknown ids.
    pub fn require(&self, id: &str) -> TemplateResult<Arc<Template>> {
        self.get(id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Summaries ordered by id.
    pub fn list(&self) -> Vec<TemplateSummary> {
        self.templates
            .values()
            .map(|t| TemplateSummary {
                id: t.id.clone(),
                name: t.name.clone(),
                description: t.description.clone(),
                version: t.version.clone(),
            })
            .collect()
    }

    /// Every asset referenced by the template's sections.
    pub fn all_assets(&self, id: &str) -> TemplateResult<AssetInventory> {
        let template = self.require(id)?;
        let mut inventory = AssetInventory::default();
        for section in &template.sections {
            inventory.extend(&section.assets);
        }
        Ok(inventory)
    }

    /// Referenced assets that do not exist on disk.
    pub fn validate_assets(&self, id: &str) -> TemplateResult<AssetInventory> {
        Ok(self.all_assets(id)?.retain_missing())
    }

    /// True when the template references at least one asset and at least
    /// 70% of them exist.
    pub fn assets_ready(&self, id: &str) -> TemplateResult<bool> {
        let total = self.all_assets(id)?.total();
        if total == 0 {
            return Ok(false);
        }
        let missing = self.validate_assets(id)?.total();
        let present = (total - missing) as f64 / total as f64;
        Ok(present >= READY_THRESHOLD)
    }
}

fn load_file(path: &Path) -> TemplateResult<Template> {
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|source| TemplateError::Invalid {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_assets(template: &mut Template, root: &Path) {
    let resolve = |p: &mut PathBuf| {
        if p.is_relative() {
            *p = root.join(&*p);
        }
    };
    for section in &mut template.sections {
        let assets = &mut section.assets;
        assets.audio_effects.iter_mut().for_each(resolve);
        assets.video_effects.iter_mut().for_each(resolve);
        assets.background_music.iter_mut().for_each(resolve);
    }
}
