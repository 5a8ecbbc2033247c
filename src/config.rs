//! Caller-owned render configuration shared by the emitters.
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render null properties as JSON `null` (otherwise omit them).
    pub include_nulls: bool,
    /// HAL-Forms key of the first template of a link.
    pub hal_forms_default_template: String,
    pub uber_version: String,
    /// Compact prefix bound to the Hydra core vocabulary.
    pub hydra_prefix: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            include_nulls: true,
            hal_forms_default_template: "default".to_string(),
            uber_version: "1.0".to_string(),
            hydra_prefix: "hydra".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn hydra(&self, term: &str) -> String {
        format!("{}:{term}", self.hydra_prefix)
    }
}
