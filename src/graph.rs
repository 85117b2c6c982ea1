//! Relation graph built from a ministering snapshot
//!
//! One forward pass over districts → companionships → ministers turns the
//! tree into three relation sets per person:
//!
//! - `companions` - other ministers in the same companionship (symmetric)
//! - `assigned_families` - people this person ministers to
//! - `assigned_ministers` - people who minister to this person (inverse of
//!   `assigned_families`)
//!
//! Every id touched during the pass gets an entry, including people that
//! only ever appear as an assigned family. Someone listed in several
//! companionships accumulates the union of their relations; the directory
//! does not say which companionship wins, so nothing is overwritten.
//!
//! The graph is immutable once built. A new snapshot means a new graph.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::snapshot::{MemberRef, Snapshot};
use crate::types::PersonId;

/// Relations of one person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEntry {
    pub companions: IndexSet<PersonId>,
    pub assigned_families: IndexSet<PersonId>,
    pub assigned_ministers: IndexSet<PersonId>,
    /// Districts in which this person serves as a minister
    pub districts: IndexSet<String>,
}

impl RelationEntry {
    /// Every related id, de-duplicated, in companions → families → ministers order
    pub fn related_ids(&self) -> IndexSet<&PersonId> {
        self.companions
            .iter()
            .chain(&self.assigned_families)
            .chain(&self.assigned_ministers)
            .collect()
    }
}

/// Person id → relations, in order of first discovery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RelationGraph {
    entries: IndexMap<PersonId, RelationEntry>,
}

impl RelationGraph {
    /// Build the graph in a single pass. All-or-nothing: on error no
    /// partial graph is returned.
    pub fn build(snapshot: &Snapshot) -> Result<Self> {
        let mut graph = Self::default();

        for (d, district) in snapshot.districts.iter().enumerate() {
            for (c, ship) in district.companionships.iter().enumerate() {
                let location = || format!("district {} companionship {}", d, c);

                for minister in &ship.ministers {
                    let m = &minister.legacy_cmis_id;
                    if m.is_empty() {
                        return Err(Error::MalformedSnapshot(format!(
                            "{}: minister without legacyCmisId",
                            location()
                        )));
                    }

                    let entry = graph.upsert(m);
                    if let Some(name) = &district.district_name {
                        entry.districts.insert(name.clone());
                    }

                    for other in &ship.ministers {
                        let n = &other.legacy_cmis_id;
                        if n == m || n.is_empty() {
                            continue;
                        }
                        graph.upsert(m).companions.insert(n.clone());
                        graph.upsert(n).companions.insert(m.clone());
                    }

                    let families = ship
                        .shared_assignments()
                        .iter()
                        .chain(minister.own_assignments());
                    for family in families {
                        graph.link(m, family, &location)?;
                    }
                }
            }
        }

        info!(
            people = graph.len(),
            districts = snapshot.districts.len(),
            "Relation graph built"
        );
        Ok(graph)
    }

    /// Parse and build from a page-data (or bare `elders`) JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Self::build(&Snapshot::from_value(value)?)
    }

    /// Parse and build from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Self::build(&Snapshot::from_json(json)?)
    }

    /// Get or create the entry for `id`
    fn upsert(&mut self, id: &PersonId) -> &mut RelationEntry {
        if !self.entries.contains_key(id) {
            debug!(id = %id, "Registering person");
        }
        self.entries.entry(id.clone()).or_default()
    }

    /// Record minister → family and its inverse
    fn link(
        &mut self,
        minister: &PersonId,
        family: &MemberRef,
        location: &dyn Fn() -> String,
    ) -> Result<()> {
        let f = &family.legacy_cmis_id;
        if f.is_empty() {
            return Err(Error::MalformedSnapshot(format!(
                "{}: assignment without legacyCmisId",
                location()
            )));
        }
        self.upsert(f).assigned_ministers.insert(minister.clone());
        self.upsert(minister).assigned_families.insert(f.clone());
        Ok(())
    }

    // ==================== Queries ====================

    pub fn get(&self, id: &PersonId) -> Option<&RelationEntry> {
        self.entries.get(id)
    }

    /// Like [`get`](Self::get) but fails with `UnknownPerson`
    pub fn entry(&self, id: &PersonId) -> Result<&RelationEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| Error::UnknownPerson(id.clone()))
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.entries.contains_key(id)
    }

    /// Known ids in discovery order
    pub fn ids(&self) -> impl Iterator<Item = &PersonId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PersonId, &RelationEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
