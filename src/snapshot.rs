//! Serde model of the raw ministering snapshot
//!
//! The directory embeds the tree in its page data:
//!
//! ```text
//! props.pageProps.initialState.ministeringData
//!   └── elders[]                 district
//!         └── companionships[]
//!               ├── ministers[]  { legacyCmisId, assignments[]? }
//!               └── assignments[]?  families shared by the pair
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::PersonId;

/// JSON pointer to the ministering data inside the page-data envelope
pub const PAGE_DATA_POINTER: &str = "/props/pageProps/initialState/ministeringData";

/// Whole snapshot: one entry per district
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "elders")]
    pub districts: Vec<District>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct District {
    #[serde(default)]
    pub district_name: Option<String>,
    pub companionships: Vec<Companionship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Companionship {
    pub ministers: Vec<Minister>,
    /// Families served jointly by every minister in the companionship
    #[serde(default)]
    pub assignments: Option<Vec<MemberRef>>,
}

impl Companionship {
    pub fn shared_assignments(&self) -> &[MemberRef] {
        self.assignments.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Minister {
    pub legacy_cmis_id: PersonId,
    #[serde(default)]
    pub name: Option<String>,
    /// Families assigned to this minister alone
    #[serde(default)]
    pub assignments: Option<Vec<MemberRef>>,
}

impl Minister {
    pub fn own_assignments(&self) -> &[MemberRef] {
        self.assignments.as_deref().unwrap_or_default()
    }
}

/// Reference to an assigned family (head of household)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub legacy_cmis_id: PersonId,
    #[serde(default)]
    pub name: Option<String>,
}

impl Snapshot {
    /// Parse the snapshot out of a page-data document or a bare
    /// `{ "elders": [...] }` document.
    pub fn from_value(value: Value) -> Result<Self> {
        let data = if value.get("props").is_some() {
            value.pointer(PAGE_DATA_POINTER).cloned().ok_or_else(|| {
                Error::MalformedSnapshot(format!("page data has no {}", PAGE_DATA_POINTER))
            })?
        } else {
            value
        };

        if data.get("elders").is_none() {
            return Err(Error::MalformedSnapshot(
                "ministering data has no `elders` list".to_string(),
            ));
        }

        serde_json::from_value(data).map_err(|e| Error::MalformedSnapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| Error::MalformedSnapshot(e.to_string()))?;
        Self::from_value(value)
    }
}
