//! Shared types: person identifiers, raw directory facets and projected views

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Identifiers
// ============================================================================

/// Stable identifier of one individual (the directory's `legacyCmisId`).
///
/// The directory emits ids both as JSON numbers and as strings; both forms
/// deserialize to the same canonical string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersonId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PersonId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for PersonId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for PersonId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => PersonId(text),
            RawId::Number(number) => PersonId(number.to_string()),
        })
    }
}

// ============================================================================
// Raw facets
// ============================================================================

/// Member card as returned by the directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PersonId>,
    #[serde(default)]
    pub name: Option<String>,
    /// Preferred name, used as the nickname
    #[serde(default)]
    pub spoken_name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Individual phone; preferred over the household phone
    #[serde(default)]
    pub individual_phone: Option<String>,
    /// Household phone
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Address lines carried by pre-fetched card dumps
    #[serde(rename = "_address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Vec<String>>,
}

/// Binary photo payload from the second photo stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoBytes {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Resolved photo facet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Photo {
    /// No photo available
    #[default]
    None,
    Image { content_type: String, data: Vec<u8> },
}

impl Photo {
    pub fn is_none(&self) -> bool {
        matches!(self, Photo::None)
    }

    /// Render as a `data:` URL; empty for [`Photo::None`]
    pub fn to_data_url(&self) -> String {
        match self {
            Photo::None => String::new(),
            Photo::Image { content_type, data } => format!(
                "data:{};base64,{}",
                content_type,
                base64::engine::general_purpose::STANDARD.encode(data)
            ),
        }
    }
}

impl From<PhotoBytes> for Photo {
    fn from(bytes: PhotoBytes) -> Self {
        if bytes.data.is_empty() {
            return Photo::None;
        }
        Photo::Image {
            content_type: bytes.content_type,
            data: bytes.data,
        }
    }
}

// ============================================================================
// Projected views
// ============================================================================

/// Canonical, formatted view of one person.
///
/// Derived from the cached facets on demand; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPerson {
    pub id: PersonId,
    pub name: String,
    pub nickname: String,
    pub age: Option<u32>,
    /// Single-letter tag for recognized values, raw value otherwise
    pub gender: String,
    /// Dialable form, `+1XXXXXXXXXX`
    pub phone: String,
    /// Human-readable form, `(XXX) YYY-ZZZZ`
    pub phone_display: String,
    pub email: String,
    pub address: Vec<String>,
    /// `data:` URL of the photo, empty when there is none
    pub image_data_url: String,
}

/// Per-person assignment view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub member: CachedPerson,
    pub companions: Vec<CachedPerson>,
    pub assigned_families: Vec<CachedPerson>,
    pub assigned_ministers: Vec<CachedPerson>,
}
