//! Intrinsic configuration

use serde::Deserialize;

/// Error loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid intrinsic config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for the atomic field-updater intrinsic
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntrinsicConfig {
    /// Whether call sites are substituted at all (default: true)
    pub enabled: bool,
    /// Class declaring the reflective factory
    pub factory_class: String,
    /// Factory method name
    pub factory_method: String,
    /// Factory method descriptor
    pub factory_descriptor: String,
    /// Base class every synthesized accessor extends
    pub base_type: String,
}

impl Default for IntrinsicConfig {
    fn default() -> Self {
        IntrinsicConfig {
            enabled: true,
            factory_class: "java/util/concurrent/atomic/AtomicReferenceFieldUpdater".to_string(),
            factory_method: "newUpdater".to_string(),
            factory_descriptor: "(Ljava/lang/Class;Ljava/lang/Class;Ljava/lang/String;)Ljava/util/concurrent/atomic/AtomicReferenceFieldUpdater;".to_string(),
            base_type: "fieldcas/runtime/IntrinsicAtomicReferenceFieldUpdater".to_string(),
        }
    }
}

impl IntrinsicConfig {
    /// Parse from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether a method ref names the factory
    pub fn is_factory(&self, class: &str, name: &str, descriptor: &str) -> bool {
        class == self.factory_class && name == self.factory_method && descriptor == self.factory_descriptor
    }
}
