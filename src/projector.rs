//! Assignment projection: graph relations joined with cached facets
//!
//! Read-side only. Nothing here mutates the graph; the async variants fill
//! the cache through its normal fetch path and then project from it.

use futures::future::join_all;
use indexmap::IndexSet;
use tracing::{info, warn};

use crate::cache::{EnrichProgress, RecordCache, Schedule};
use crate::error::{Error, Result};
use crate::format::to_cached_person;
use crate::graph::RelationGraph;
use crate::types::{AssignmentView, CachedPerson, PersonId};

/// What a batch does when one person cannot be projected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Log and collect the failure, keep going
    #[default]
    SkipFailures,
    /// Abort on the first failure
    AllOrNothing,
}

/// Result of projecting every known person
#[derive(Debug, Default)]
pub struct BatchProjection {
    /// Views in discovery order
    pub views: Vec<AssignmentView>,
    pub failures: Vec<(PersonId, Error)>,
}

/// Resolve one person from the cache. Only the card is mandatory; address
/// and photo fall back to their empty sentinels.
fn resolve(id: &PersonId, cache: &RecordCache) -> Result<CachedPerson> {
    let card = cache
        .cached_card(id)
        .ok_or_else(|| Error::UnknownPerson(id.clone()))?;
    let address = cache.cached_address(id).unwrap_or_default();
    let photo = cache.cached_photo(id).unwrap_or_default();
    Ok(to_cached_person(id, &card, &address, &photo))
}

fn resolve_all(ids: &IndexSet<PersonId>, cache: &RecordCache) -> Result<Vec<CachedPerson>> {
    ids.iter().map(|id| resolve(id, cache)).collect()
}

/// Project one person from cached facets only
pub fn project(id: &PersonId, graph: &RelationGraph, cache: &RecordCache) -> Result<AssignmentView> {
    let entry = graph.entry(id)?;

    Ok(AssignmentView {
        member: resolve(id, cache)?,
        companions: resolve_all(&entry.companions, cache)?,
        assigned_families: resolve_all(&entry.assigned_families, cache)?,
        assigned_ministers: resolve_all(&entry.assigned_ministers, cache)?,
    })
}

/// Project one person, fetching whatever facets are not cached yet.
///
/// Unlike [`project`], a card that failed in transport (for the member or
/// anyone related) is reported as [`Error::Fetch`] naming that person rather
/// than as `UnknownPerson`, so callers can tell "retry later" from "not in
/// the directory".
pub async fn project_async(
    id: &PersonId,
    graph: &RelationGraph,
    cache: &RecordCache,
) -> Result<AssignmentView> {
    let entry = graph.entry(id)?;

    let mut needed: IndexSet<&PersonId> = IndexSet::new();
    needed.insert(id);
    needed.extend(entry.related_ids());

    let outcomes = join_all(needed.iter().map(|person| async move {
        (*person, cache.enrich(person).await)
    }))
    .await;

    for (person, outcome) in outcomes {
        if let Err(source) = outcome {
            return Err(Error::Fetch {
                id: person.clone(),
                source,
            });
        }
    }

    project(id, graph, cache)
}

/// Project every known person from the cache
pub fn project_all(
    graph: &RelationGraph,
    cache: &RecordCache,
    policy: BatchPolicy,
) -> Result<BatchProjection> {
    let mut batch = BatchProjection::default();

    for id in graph.ids() {
        match project(id, graph, cache) {
            Ok(view) => batch.views.push(view),
            Err(e) if policy == BatchPolicy::AllOrNothing => return Err(e),
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping person");
                batch.failures.push((id.clone(), e));
            }
        }
    }

    info!(
        projected = batch.views.len(),
        skipped = batch.failures.len(),
        "Projected assignments"
    );
    Ok(batch)
}

/// Enrich every known person under `schedule`, then project them all
pub async fn project_all_async<P>(
    graph: &RelationGraph,
    cache: &RecordCache,
    schedule: Schedule,
    policy: BatchPolicy,
    progress: P,
) -> Result<BatchProjection>
where
    P: FnMut(EnrichProgress),
{
    let report = cache
        .enrich_all(graph.ids().cloned(), schedule, progress)
        .await;

    if policy == BatchPolicy::AllOrNothing {
        if let Some((id, source)) = report.failed.into_iter().next() {
            return Err(Error::Fetch { id, source });
        }
    }

    project_all(graph, cache, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::OfflineDirectory;
    use crate::types::RawCard;
    use std::sync::Arc;

    fn card(name: &str) -> RawCard {
        RawCard {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn graph() -> RelationGraph {
        RelationGraph::from_json(
            r#"{ "elders": [{ "companionships": [{
                "ministers": [
                    { "legacyCmisId": "A", "assignments": [{ "legacyCmisId": "C" }] },
                    { "legacyCmisId": "B" }
                ]
            }]}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_project_requires_related_cards() {
        let cache = RecordCache::new(Arc::new(OfflineDirectory));
        cache.seed_card("A".into(), card("A"));
        cache.seed_card("B".into(), card("B"));

        let graph = graph();
        assert!(matches!(
            project(&"A".into(), &graph, &cache),
            Err(Error::UnknownPerson(id)) if id.as_str() == "C"
        ));

        cache.seed_card("C".into(), card("C"));
        let view = project(&"A".into(), &graph, &cache).unwrap();
        assert_eq!(view.companions.len(), 1);
        assert_eq!(view.assigned_families.len(), 1);
        assert!(view.assigned_ministers.is_empty());
    }

    #[test]
    fn test_project_all_policies() {
        let cache = RecordCache::new(Arc::new(OfflineDirectory));
        cache.seed_card("A".into(), card("A"));
        cache.seed_card("B".into(), card("B"));
        let graph = graph();

        // A and C both need C's card; B only needs A's
        let batch = project_all(&graph, &cache, BatchPolicy::SkipFailures).unwrap();
        assert_eq!(batch.views.len(), 1);
        assert_eq!(batch.views[0].member.id.as_str(), "B");
        assert_eq!(
            batch.failures.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );

        assert!(project_all(&graph, &cache, BatchPolicy::AllOrNothing).is_err());
    }
}
