use crate::document::model::Document;
use crate::error::Result;

pub trait DocumentSerializer: Send + Sync {
    fn serialize(&self, document: &Document) -> Result<Vec<u8>>;
}

/// Renders documents as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl DocumentSerializer for JsonSerializer {
    fn serialize(&self, document: &Document) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(document)?)
    }
}
