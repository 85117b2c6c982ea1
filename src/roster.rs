//! Roster - one run's graph and cache bundled as an explicit context
//!
//! Independent rosters share nothing, so several runs (or tests) can live in
//! one process.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::cache::{EnrichProgress, EnrichReport, RecordCache, Schedule};
use crate::directory::MemberDirectory;
use crate::error::Result;
use crate::export::ExportDocument;
use crate::graph::RelationGraph;
use crate::projector::{self, BatchPolicy, BatchProjection};
use crate::types::{AssignmentView, PersonId};

pub struct Roster {
    graph: Arc<RelationGraph>,
    cache: RecordCache,
}

impl Roster {
    pub fn new(graph: RelationGraph, directory: Arc<dyn MemberDirectory>) -> Self {
        Self {
            graph: Arc::new(graph),
            cache: RecordCache::new(directory),
        }
    }

    /// Build the graph from page data and start with a cold cache
    pub fn from_page_data(page: Value, directory: Arc<dyn MemberDirectory>) -> Result<Self> {
        Ok(Self::new(RelationGraph::from_value(page)?, directory))
    }

    pub fn graph(&self) -> &Arc<RelationGraph> {
        &self.graph
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    /// Swap in the graph of a fresh snapshot. Cached facets are kept; they
    /// are keyed by person, not by snapshot.
    pub fn replace_graph(&mut self, graph: RelationGraph) {
        info!(people = graph.len(), "Replacing relation graph");
        self.graph = Arc::new(graph);
    }

    pub fn project(&self, id: &PersonId) -> Result<AssignmentView> {
        projector::project(id, &self.graph, &self.cache)
    }

    pub async fn project_async(&self, id: &PersonId) -> Result<AssignmentView> {
        projector::project_async(id, &self.graph, &self.cache).await
    }

    pub async fn enrich_all<P>(&self, schedule: Schedule, progress: P) -> EnrichReport
    where
        P: FnMut(EnrichProgress),
    {
        self.cache
            .enrich_all(self.graph.ids().cloned(), schedule, progress)
            .await
    }

    pub fn project_all(&self, policy: BatchPolicy) -> Result<BatchProjection> {
        projector::project_all(&self.graph, &self.cache, policy)
    }

    pub async fn project_all_async<P>(
        &self,
        schedule: Schedule,
        policy: BatchPolicy,
        progress: P,
    ) -> Result<BatchProjection>
    where
        P: FnMut(EnrichProgress),
    {
        projector::project_all_async(&self.graph, &self.cache, schedule, policy, progress).await
    }

    /// Export every person that can be projected from the cache
    pub fn export(&self) -> Result<ExportDocument> {
        let batch = self.project_all(BatchPolicy::SkipFailures)?;
        Ok(ExportDocument::new(batch.views))
    }
}
