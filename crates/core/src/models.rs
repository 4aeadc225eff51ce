use serde::{Deserialize, Serialize};

/// Canonical view of an original document key, derived once per resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTarget {
    pub base_name: String,
    pub project_folder: Option<String>,
    pub subdirectory: Option<String>,
}

/// An object returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateObject {
    pub key: String,
    pub file_name: String,
}

impl CandidateObject {
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let file_name = key.rsplit('/').next().unwrap_or_default().to_string();
        Self { key, file_name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateObject,
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Direct,
    Scoped,
    SecondaryDirect,
    Broad,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Direct => "direct",
            Self::Scoped => "scoped",
            Self::SecondaryDirect => "secondary_direct",
            Self::Broad => "broad",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub found: bool,
    pub object_key: Option<String>,
    pub phase: Option<Phase>,
    /// Retained score; direct hits are exact structural matches and report 100.
    pub score: Option<u8>,
}

impl ResolutionResult {
    pub fn hit(phase: Phase, key: impl Into<String>, score: u8) -> Self {
        Self {
            found: true,
            object_key: Some(key.into()),
            phase: Some(phase),
            score: Some(score),
        }
    }

    pub fn not_found() -> Self {
        Self {
            found: false,
            object_key: None,
            phase: None,
            score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedObject {
    pub key: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPage {
    pub items: Vec<ListedObject>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewType {
    Pdf,
    Images,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub original_key_hint: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub found: bool,
    pub preview_type: PreviewType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

impl PreviewResponse {
    pub fn not_found(preview_type: PreviewType) -> Self {
        Self {
            found: false,
            preview_type,
            preview_ref: None,
            total_pages: None,
        }
    }
}
