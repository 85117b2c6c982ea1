//! Record cache - memoized, coalesced per-person facet fetches
//!
//! Each person has three facets (card, address, photo) that are fetched
//! independently. For every (id, facet) key:
//!
//! - a resolved value is returned immediately and never re-fetched;
//! - while a fetch is in flight, further callers subscribe to its result
//!   instead of dispatching another one;
//! - otherwise the caller registers the in-flight marker (synchronously,
//!   before any await) and dispatches the fetch on a spawned task.
//!
//! The fetch runs on its own task so a caller that stops awaiting does not
//! cancel it; the result still lands in the cache.
//!
//! ## Facet policies
//!
//! | Facet   | Not found            | Transport error                    |
//! |---------|----------------------|------------------------------------|
//! | card    | cached as "no card"  | returned to waiters, not cached    |
//! | address | cached as empty      | cached as empty (warning)          |
//! | photo   | cached as no photo   | cached as no photo (warning)       |
//!
//! Nothing expires. A new process starts cold.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::directory::{is_no_photo_token, MemberDirectory};
use crate::error::{FetchError, Result};
use crate::types::{PersonId, Photo, RawCard};

type Shared<T> = std::result::Result<T, FetchError>;

// =============================================================================
// Facet map
// =============================================================================

/// One independently fetchable attribute group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Card,
    Address,
    Photo,
}

impl Facet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facet::Card => "card",
            Facet::Address => "address",
            Facet::Photo => "photo",
        }
    }
}

enum Slot<T> {
    /// Fetch in flight; waiters subscribe to the sender
    Pending(broadcast::Sender<Shared<T>>),
    Resolved(T),
}

enum Claim<T> {
    Ready(T),
    /// Another caller is fetching
    Wait(broadcast::Receiver<Shared<T>>),
    /// This caller must dispatch the fetch
    Lead(broadcast::Receiver<Shared<T>>),
}

struct FacetMap<T> {
    facet: Facet,
    slots: DashMap<PersonId, Slot<T>>,
    dispatched: AtomicU64,
}

impl<T: Clone> FacetMap<T> {
    fn new(facet: Facet) -> Self {
        Self {
            facet,
            slots: DashMap::new(),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Look up the key and, if nobody holds it, register this caller as the
    /// fetcher. Runs under the shard lock, so exactly one caller leads.
    fn claim(&self, id: &PersonId) -> Claim<T> {
        match self.slots.entry(id.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Resolved(value) => Claim::Ready(value.clone()),
                Slot::Pending(sender) => {
                    debug!(id = %id, facet = self.facet.as_str(), "Joining in-flight fetch");
                    Claim::Wait(sender.subscribe())
                }
            },
            Entry::Vacant(entry) => {
                let (sender, receiver) = broadcast::channel(1);
                entry.insert(Slot::Pending(sender));
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                debug!(id = %id, facet = self.facet.as_str(), "Dispatching fetch");
                Claim::Lead(receiver)
            }
        }
    }

    /// Store the outcome and wake every waiter.
    ///
    /// Errors evict the in-flight marker without caching anything, so a later
    /// call may retry. A key that is already resolved (seeded while the fetch
    /// was in flight) keeps its value; the late result is dropped.
    fn complete(&self, id: &PersonId, result: Shared<T>) {
        let sender = match self.slots.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if matches!(entry.get(), Slot::Resolved(_)) {
                    debug!(id = %id, facet = self.facet.as_str(), "Dropping late result");
                    return;
                }
                let previous = match &result {
                    Ok(value) => entry.insert(Slot::Resolved(value.clone())),
                    Err(_) => entry.remove(),
                };
                match previous {
                    Slot::Pending(sender) => Some(sender),
                    Slot::Resolved(_) => None,
                }
            }
            Entry::Vacant(entry) => {
                if let Ok(value) = &result {
                    entry.insert(Slot::Resolved(value.clone()));
                }
                None
            }
        };

        if let Some(sender) = sender {
            // Receivers may have dropped
            let _ = sender.send(result);
        }
    }

    fn peek(&self, id: &PersonId) -> Option<T> {
        self.slots.get(id).and_then(|slot| match slot.value() {
            Slot::Resolved(value) => Some(value.clone()),
            Slot::Pending(_) => None,
        })
    }

    fn stats(&self) -> FacetStats {
        let mut stats = FacetStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            ..Default::default()
        };
        for slot in self.slots.iter() {
            match slot.value() {
                Slot::Resolved(_) => stats.resolved += 1,
                Slot::Pending(_) => stats.in_flight += 1,
            }
        }
        stats
    }
}

/// Resolve a key through `map`, dispatching `fetch` only if this caller leads.
async fn get_or_fetch<T, F, Fut>(map: &Arc<FacetMap<T>>, id: &PersonId, fetch: F) -> Shared<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Shared<T>> + Send + 'static,
{
    let mut receiver = match map.claim(id) {
        Claim::Ready(value) => return Ok(value),
        Claim::Wait(receiver) => receiver,
        Claim::Lead(receiver) => {
            let task = tokio::spawn(fetch());
            let map = Arc::clone(map);
            let id = id.clone();
            // A panicking fetch must still clear the in-flight marker
            tokio::spawn(async move {
                let result = task.await.unwrap_or_else(|e| {
                    warn!(id = %id, facet = map.facet.as_str(), error = %e, "Fetch task failed");
                    Err(FetchError::Abandoned)
                });
                map.complete(&id, result);
            });
            receiver
        }
    };

    receiver.recv().await.unwrap_or(Err(FetchError::Abandoned))
}

// =============================================================================
// Photo state machine
// =============================================================================

/// Progress of the two-stage photo resolution for one person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PhotoState {
    #[default]
    Unresolved,
    /// Waiting for the photo token
    TokenPending,
    /// Token obtained, bytes not yet requested
    TokenResolved,
    /// Terminal: no photo (sentinel token, missing token, or an error)
    NoPhoto,
    /// Waiting for the image bytes
    BytesPending,
    /// Terminal: image bytes cached
    Resolved,
}

fn transition(states: &DashMap<PersonId, PhotoState>, id: &PersonId, next: PhotoState) {
    let previous = states.insert(id.clone(), next).unwrap_or_default();
    debug!(id = %id, from = ?previous, to = ?next, "Photo state");
}

async fn resolve_photo(
    directory: &dyn MemberDirectory,
    states: &DashMap<PersonId, PhotoState>,
    id: &PersonId,
) -> Photo {
    let token = match directory.fetch_photo_token(id).await {
        Ok(Some(token)) if !is_no_photo_token(&token) => token,
        Ok(_) | Err(FetchError::NotFound(_)) => {
            transition(states, id, PhotoState::NoPhoto);
            return Photo::None;
        }
        Err(e) => {
            warn!(id = %id, error = %e, "Could not fetch photo token");
            transition(states, id, PhotoState::NoPhoto);
            return Photo::None;
        }
    };

    transition(states, id, PhotoState::TokenResolved);
    transition(states, id, PhotoState::BytesPending);

    match directory.fetch_photo_bytes(&token).await {
        Ok(bytes) => {
            let photo = Photo::from(bytes);
            let state = if photo.is_none() {
                PhotoState::NoPhoto
            } else {
                PhotoState::Resolved
            };
            transition(states, id, state);
            photo
        }
        Err(e) => {
            warn!(id = %id, error = %e, "Could not fetch photo");
            transition(states, id, PhotoState::NoPhoto);
            Photo::None
        }
    }
}

// =============================================================================
// Record cache
// =============================================================================

/// Batch scheduling policy. Both produce the same final cache contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// One person at a time
    Sequential,
    /// Up to `limit` people in flight
    Concurrent { limit: usize },
}

/// Progress after each person in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichProgress {
    pub done: usize,
    pub total: usize,
}

/// Outcome of a batch enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// People whose card resolved
    pub enriched: usize,
    /// People the directory has no card for
    pub missing: Vec<PersonId>,
    /// People whose card fetch failed in transport
    pub failed: Vec<(PersonId, FetchError)>,
}

impl EnrichReport {
    fn record(&mut self, id: PersonId, outcome: Shared<Option<RawCard>>) {
        match outcome {
            Ok(Some(_)) => self.enriched += 1,
            Ok(None) => self.missing.push(id),
            Err(e) => self.failed.push((id, e)),
        }
    }

    fn done(&self) -> usize {
        self.enriched + self.missing.len() + self.failed.len()
    }
}

/// Per-facet counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FacetStats {
    /// Fetches dispatched to the directory
    pub dispatched: u64,
    pub resolved: usize,
    pub in_flight: usize,
}

/// Cache-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cards: FacetStats,
    pub addresses: FacetStats,
    pub photos: FacetStats,
}

/// Memoizing, coalescing store of per-person facets.
///
/// Cheap to clone; clones share the same maps.
#[derive(Clone)]
pub struct RecordCache {
    directory: Arc<dyn MemberDirectory>,
    cards: Arc<FacetMap<Option<RawCard>>>,
    addresses: Arc<FacetMap<Vec<String>>>,
    photos: Arc<FacetMap<Photo>>,
    photo_states: Arc<DashMap<PersonId, PhotoState>>,
}

impl RecordCache {
    pub fn new(directory: Arc<dyn MemberDirectory>) -> Self {
        Self {
            directory,
            cards: Arc::new(FacetMap::new(Facet::Card)),
            addresses: Arc::new(FacetMap::new(Facet::Address)),
            photos: Arc::new(FacetMap::new(Facet::Photo)),
            photo_states: Arc::new(DashMap::new()),
        }
    }

    // =========================================================================
    // Facet access
    // =========================================================================

    /// Card facet. `Ok(None)` when the directory has no card for `id`.
    pub async fn card(&self, id: &PersonId) -> Shared<Option<RawCard>> {
        let directory = Arc::clone(&self.directory);
        let owned = id.clone();

        get_or_fetch(&self.cards, id, move || async move {
            match directory.fetch_card(&owned).await {
                Ok(Some(card)) => Ok(Some(card)),
                Ok(None) | Err(FetchError::NotFound(_)) => {
                    warn!(id = %owned, "No card in directory");
                    Ok(None)
                }
                Err(e) => {
                    warn!(id = %owned, error = %e, "Card fetch failed");
                    Err(e)
                }
            }
        })
        .await
    }

    /// Address facet; best-effort, empty on any error
    pub async fn address(&self, id: &PersonId) -> Vec<String> {
        let directory = Arc::clone(&self.directory);
        let owned = id.clone();

        get_or_fetch(&self.addresses, id, move || async move {
            match directory.fetch_address_lines(&owned).await {
                Ok(lines) => Ok(lines),
                Err(e) => {
                    warn!(id = %owned, error = %e, "Address unavailable");
                    Ok(Vec::new())
                }
            }
        })
        .await
        .unwrap_or_default()
    }

    /// Photo facet; best-effort, [`Photo::None`] on any error
    pub async fn photo(&self, id: &PersonId) -> Photo {
        let directory = Arc::clone(&self.directory);
        let states = Arc::clone(&self.photo_states);
        let owned = id.clone();

        get_or_fetch(&self.photos, id, move || {
            transition(&states, &owned, PhotoState::TokenPending);
            async move { Ok(resolve_photo(directory.as_ref(), &states, &owned).await) }
        })
        .await
        .unwrap_or_default()
    }

    /// Resolve all three facets of one person concurrently; returns the card
    pub async fn enrich(&self, id: &PersonId) -> Shared<Option<RawCard>> {
        let (card, _, _) = tokio::join!(self.card(id), self.address(id), self.photo(id));
        card
    }

    /// Enrich a batch of people under the given schedule
    pub async fn enrich_all<I, P>(
        &self,
        ids: I,
        schedule: Schedule,
        mut progress: P,
    ) -> EnrichReport
    where
        I: IntoIterator<Item = PersonId>,
        P: FnMut(EnrichProgress),
    {
        let ids: Vec<PersonId> = ids.into_iter().collect();
        let total = ids.len();
        let mut report = EnrichReport::default();

        info!(total = total, schedule = ?schedule, "Enriching people");

        match schedule {
            Schedule::Sequential => {
                for id in ids {
                    let outcome = self.enrich(&id).await;
                    report.record(id, outcome);
                    progress(EnrichProgress {
                        done: report.done(),
                        total,
                    });
                }
            }
            Schedule::Concurrent { limit } => {
                let mut outcomes = stream::iter(ids)
                    .map(|id| async move {
                        let outcome = self.enrich(&id).await;
                        (id, outcome)
                    })
                    .buffer_unordered(limit.max(1));

                while let Some((id, outcome)) = outcomes.next().await {
                    report.record(id, outcome);
                    progress(EnrichProgress {
                        done: report.done(),
                        total,
                    });
                }
            }
        }

        // Completion order is arbitrary under concurrency
        report.missing.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));

        info!(
            enriched = report.enriched,
            missing = report.missing.len(),
            failed = report.failed.len(),
            "Enrichment complete"
        );
        report
    }

    // =========================================================================
    // Cache-only reads
    // =========================================================================

    /// Resolved card, if any. `None` both for unresolved and "no card".
    pub fn cached_card(&self, id: &PersonId) -> Option<RawCard> {
        self.cards.peek(id).flatten()
    }

    pub fn cached_address(&self, id: &PersonId) -> Option<Vec<String>> {
        self.addresses.peek(id)
    }

    pub fn cached_photo(&self, id: &PersonId) -> Option<Photo> {
        self.photos.peek(id)
    }

    pub fn photo_state(&self, id: &PersonId) -> PhotoState {
        self.photo_states
            .get(id)
            .map(|state| *state.value())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cards: self.cards.stats(),
            addresses: self.addresses.stats(),
            photos: self.photos.stats(),
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Resolve a card (and its `_address`, if carried) without fetching
    pub fn seed_card(&self, id: PersonId, card: RawCard) {
        if let Some(lines) = card.address.clone() {
            self.addresses.complete(&id, Ok(lines));
        }
        self.cards.complete(&id, Ok(Some(card)));
    }

    pub fn seed_cards<I>(&self, cards: I) -> usize
    where
        I: IntoIterator<Item = (PersonId, RawCard)>,
    {
        let mut count = 0;
        for (id, card) in cards {
            self.seed_card(id, card);
            count += 1;
        }
        debug!(count = count, "Seeded cards");
        count
    }

    /// Seed from a card dump: a JSON object of id → card
    pub fn seed_cards_from_json(&self, json: &str) -> Result<usize> {
        let cards: HashMap<PersonId, RawCard> = serde_json::from_str(json)?;
        Ok(self.seed_cards(cards))
    }
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("stats", &self.stats())
            .finish()
    }
}
