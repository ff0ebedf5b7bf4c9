// TOON rendering of a finished mapping
use thiserror::Error;

use crate::core::map::ObjectMapping;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to encode object mapping as TOON: {0}")]
    Encode(String),
}

impl ObjectMapping {
    /// Render the mapping as a nested TOON document. A node reached again appears as `ref: <id>`.
    pub fn to_toon(&self) -> Result<String, RenderError> {
        toon_format::encode_default(self).map_err(|e| RenderError::Encode(e.to_string()))
    }
}
