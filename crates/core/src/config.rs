use crate::error::ConfigError;
use crate::normalizer::KeyNormalizer;
use crate::routing::RoutingTable;
use crate::scorer::SimilarityScorer;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Store layout and search budgets. Loaded once at startup and handed to the
/// locator and handler; nothing here changes at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub originals_root: String,
    pub converted_root: String,
    /// Flat folder written by the previous conversion pipeline.
    pub legacy_converted_root: String,
    pub image_preview_root: String,
    pub redundant_prefixes: Vec<String>,
    pub convertible_extensions: Vec<String>,
    pub preview_extension: String,
    pub image_extensions: Vec<String>,
    pub scoped_page_size: usize,
    pub broad_page_size: usize,
    pub max_objects_per_prefix: usize,
    pub reference_ttl_secs: u64,
    pub routing: RoutingTable,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            originals_root: "documents".to_string(),
            converted_root: "docuworks-converted".to_string(),
            legacy_converted_root: "converted-pdf".to_string(),
            image_preview_root: "previews".to_string(),
            redundant_prefixes: vec![
                "documents".to_string(),
                "processed".to_string(),
                "docuworks-converted".to_string(),
            ],
            convertible_extensions: vec!["xdw".to_string(), "xbd".to_string()],
            preview_extension: "pdf".to_string(),
            image_extensions: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
            ],
            scoped_page_size: 100,
            broad_page_size: 1_000,
            max_objects_per_prefix: 10_000,
            reference_ttl_secs: 3_600,
            routing: RoutingTable::default(),
        }
    }
}

impl ResolverConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let roots = [
            ("originals_root", &self.originals_root),
            ("converted_root", &self.converted_root),
            ("legacy_converted_root", &self.legacy_converted_root),
            ("image_preview_root", &self.image_preview_root),
            ("preview_extension", &self.preview_extension),
        ];
        for (name, value) in roots {
            if value.trim_matches('/').is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }

        if self.convertible_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "convertible_extensions must list at least one extension".to_string(),
            ));
        }
        if self.scoped_page_size == 0 || self.broad_page_size == 0 {
            return Err(ConfigError::Invalid("page sizes must be positive".to_string()));
        }
        if self.broad_page_size > self.max_objects_per_prefix {
            return Err(ConfigError::Invalid(format!(
                "broad_page_size {} exceeds max_objects_per_prefix {}",
                self.broad_page_size, self.max_objects_per_prefix
            )));
        }
        if self.routing.is_empty() {
            return Err(ConfigError::Invalid(
                "routing table has no servers".to_string(),
            ));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> KeyNormalizer {
        KeyNormalizer::new(&self.redundant_prefixes, &self.convertible_extensions)
    }

    pub fn scorer(&self) -> SimilarityScorer {
        SimilarityScorer::new(&self.preview_extension)
    }

    pub fn is_image_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.image_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}
