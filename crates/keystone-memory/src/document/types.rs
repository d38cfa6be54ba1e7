use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    /// Origin identifier (file path or URL).
    pub source: String,
    pub title: String,
    pub content_type: String,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}
