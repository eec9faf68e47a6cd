use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoredSource {
    User,
    Ai,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralKind {
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuralSegment {
    #[serde(rename = "type")]
    pub kind: StructuralKind,
}

/// A persisted segment: literal text is a bare JSON string, structural
/// markers are `{"type": "prefix"}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredSegment {
    Text(String),
    Structural(StructuralSegment),
}

impl StoredSegment {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn prefix() -> Self {
        Self::Structural(StructuralSegment {
            kind: StructuralKind::Prefix,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoredLine {
    pub source: StoredSource,
    pub segments: Vec<StoredSegment>,
}

impl StoredLine {
    #[must_use]
    pub fn new(source: StoredSource, segments: Vec<StoredSegment>) -> Self {
        Self { source, segments }
    }
}
