//! Scene configuration
//!
//! Every section has defaults, so a config file only needs the values it
//! changes:
//!
//! ```
//! use graphscape::config::SceneConfig;
//! use graphscape::layout::LayoutShape;
//!
//! let config = SceneConfig::from_json(r#"{
//!     "initial_shape": "galaxy",
//!     "transition": { "duration": 0.8 },
//!     "flow": { "ambient_particles": 1000 }
//! }"#).unwrap();
//!
//! assert_eq!(config.initial_shape, LayoutShape::Galaxy);
//! assert_eq!(config.flow.ambient_particles, 1000);
//! assert_eq!(config.render.width, 800);
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::animation::TransitionConfig;
use crate::flow::FlowConfig;
use crate::layout::LayoutShape;
use crate::render::{HighlightConfig, RenderConfig};

/// Errors raised while loading a [`SceneConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for every scene component.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Layout applied when the scene is built
    pub initial_shape: LayoutShape,
    pub render: RenderConfig,
    pub highlight: HighlightConfig,
    pub transition: TransitionConfig,
    pub flow: FlowConfig,
}

impl SceneConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(SceneConfig::from_json("{}").unwrap(), SceneConfig::default());
    }

    #[test]
    fn test_unknown_shape_rejected() {
        let err = SceneConfig::from_json(r#"{"initial_shape": "torus"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_nested_partial_sections() {
        let config = SceneConfig::from_json(
            r#"{"highlight": {"dimmed_opacity": 0.2}, "render": {"leaf_radius": 3.0}}"#,
        )
        .unwrap();
        assert_eq!(config.highlight.dimmed_opacity, 0.2);
        assert_eq!(
            config.highlight.dimmed_scale,
            HighlightConfig::default().dimmed_scale
        );
        assert_eq!(config.render.leaf_radius, 3.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SceneConfig::load(Path::new("/nonexistent/graphscape.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
