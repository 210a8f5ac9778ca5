use crate::error::XsltError;
use serde::{Deserialize, Serialize};
use trellis_traits::OutputMethod;

/// Default capacity of the event channel between a worker and its consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Per-transformation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Maximum number of times one rule may be active on one source node at the
    /// same time. `None` disables the guard.
    pub recursion_limit: Option<usize>,
    /// Suppress the warning issued when several rules tie for a node.
    pub quiet_conflict_warnings: bool,
    /// An output method fixed by the stylesheet. When set the engine never
    /// switches the serializer to HTML on its own.
    pub output_method: Option<OutputMethod>,
    pub channel_capacity: usize,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            recursion_limit: None,
            quiet_conflict_warnings: false,
            output_method: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TransformConfig {
    pub fn from_json(json: &str) -> Result<Self, XsltError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| XsltError::config(format!("invalid transform config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), XsltError> {
        if self.recursion_limit == Some(0) {
            return Err(XsltError::config("recursion_limit must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(XsltError::config("channel_capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    pub fn with_output_method(mut self, method: OutputMethod) -> Self {
        self.output_method = Some(method);
        self
    }
}
