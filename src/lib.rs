//! Ministering assignment graph and member enrichment
//!
//! Turns a ministering snapshot (districts → companionships → ministers →
//! assigned families) into a per-person relation graph, enriches people from
//! the member directory with coalesced, memoized fetches, and projects
//! per-person assignment views for export or messaging.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ministering_graph::{
//!     BatchPolicy, DirectoryClient, DirectoryConfig, ExportDocument, Roster, Schedule,
//! };
//!
//! # async fn example(page: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
//! let client = DirectoryClient::new(DirectoryConfig::default())?;
//! let roster = Roster::from_page_data(page, Arc::new(client))?;
//!
//! let batch = roster
//!     .project_all_async(Schedule::Sequential, BatchPolicy::SkipFailures, |p| {
//!         println!("{}/{}", p.done, p.total);
//!     })
//!     .await?;
//!
//! let json = ExportDocument::new(batch.views).to_json(true)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod format;
pub mod graph;
pub mod outreach;
pub mod projector;
pub mod roster;
pub mod snapshot;
pub mod types;

// Re-export main types
pub use cache::{CacheStats, EnrichProgress, EnrichReport, Facet, PhotoState, RecordCache, Schedule};
pub use client::DirectoryClient;
pub use config::{Config, DirectoryConfig};
pub use directory::{MemberDirectory, OfflineDirectory};
pub use error::{Error, FetchError, Result};
pub use export::ExportDocument;
pub use graph::{RelationEntry, RelationGraph};
pub use projector::{BatchPolicy, BatchProjection};
pub use roster::Roster;
pub use snapshot::Snapshot;
pub use types::*;
