//! Template registry: named reference images loaded once at startup.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::capture::Frame;
use crate::config::{AutomationConfig, RelativeRect};

/// A named reference image used for matching.
///
/// Identity is the name. Templates are immutable once loaded; the registry
/// owns them for the lifetime of the run.
#[derive(Clone, Debug)]
pub struct Template {
    pub name: String,
    pub image: Frame,
    /// Optional expected region, restricting where the matcher searches.
    pub region: Option<RelativeRect>,
    /// Minimum confidence for this template to count as matched.
    pub threshold: f32,
}

/// Holds every template the classifier and engine may ask for.
#[derive(Clone, Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all image files from a directory, using the file stem as the
    /// template name. Thresholds come from the config's default with
    /// per-template overrides applied.
    pub fn load(dir: &Path, config: &AutomationConfig) -> Result<Self> {
        let mut registry = Self::new();

        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read template directory {}", dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
                .unwrap_or(false);
            if !is_image {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow!("unusable template filename {}", path.display()))?
                .to_string();

            let image = image::open(&path)
                .with_context(|| format!("failed to load template {}", path.display()))?
                .to_rgba8();

            log::debug!("loaded template \"{}\" from {}", name, path.display());
            registry.insert(Template {
                threshold: config.template_threshold(&name),
                name,
                image,
                region: None,
            });
        }

        Ok(registry)
    }

    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Fails fast if any of the given templates is absent. Called for the
    /// classifier's anchor set at startup so a missing anchor surfaces as a
    /// configuration error instead of degrading into permanent Unknown.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        for name in names {
            if !self.contains(name) {
                bail!("missing template \"{}\"", name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn template(name: &str) -> Template {
        Template {
            name: name.to_string(),
            image: Frame::from_pixel(4, 4, Rgba([255, 0, 0, 255])),
            region: None,
            threshold: 0.8,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut registry = TemplateRegistry::new();
        registry.insert(template("main_menu"));

        assert!(registry.contains("main_menu"));
        assert_eq!(registry.get("main_menu").unwrap().threshold, 0.8);
        assert!(registry.get("race_screen").is_none());
    }

    #[test]
    fn test_require_reports_missing_template() {
        let mut registry = TemplateRegistry::new();
        registry.insert(template("main_menu"));

        registry.require(&["main_menu"]).unwrap();
        let err = registry
            .require(&["main_menu", "race_screen"])
            .unwrap_err();
        assert!(err.to_string().contains("race_screen"));
    }

    #[test]
    fn test_load_from_directory_applies_threshold_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let img = Frame::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
        img.save(dir.path().join("race_screen.png")).unwrap();
        img.save(dir.path().join("main_menu.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a template").unwrap();

        let mut config = AutomationConfig::default();
        config
            .template_thresholds
            .insert("race_screen".to_string(), 0.95);

        let registry = TemplateRegistry::load(dir.path(), &config).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("race_screen").unwrap().threshold, 0.95);
        assert_eq!(
            registry.get("main_menu").unwrap().threshold,
            config.confidence_threshold
        );
    }

    #[test]
    fn test_load_missing_directory_is_fatal() {
        let config = AutomationConfig::default();
        assert!(TemplateRegistry::load(Path::new("/nonexistent/templates"), &config).is_err());
    }
}
