//! In-memory template catalog
//!
//! Templates are designed elsewhere and handed to the engine as JSON. The
//! catalog validates on insert, so a stored template always resolves.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;

use super::{Template, TemplateError};

#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Arc<DashMap<String, Arc<Template>>>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store, replacing any template with the same id
    pub fn insert(&self, template: Template) -> Result<(), TemplateError> {
        template.validate()?;
        tracing::debug!(template_id = %template.id, "Template registered");
        self.templates
            .insert(template.id.clone(), Arc::new(template));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<Template>> {
        self.templates.get(id).map(|entry| entry.value().clone())
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.templates.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Load every `*.json` file in `dir`
    ///
    /// A missing directory loads nothing. A file that fails to parse or
    /// validate aborts the load.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize, TemplateError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "Template directory not found");
            return Ok(0);
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in &paths {
            let raw = std::fs::read(path)?;
            let template: Template =
                serde_json::from_slice(&raw).map_err(|e| TemplateError::Parse {
                    source_name: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            self.insert(template)?;
        }

        tracing::info!(dir = %dir.display(), count = paths.len(), "Templates loaded");
        Ok(paths.len())
    }
}
