//! Record cache integration tests: coalescing, memoization, degradation

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::FakeDirectory;
use futures::future::join_all;
use ministering_graph::{
    FetchError, MemberDirectory, PersonId, Photo, PhotoBytes, PhotoState, RawCard, RecordCache,
    Schedule,
};

fn id(raw: &str) -> PersonId {
    PersonId::from(raw)
}

#[tokio::test]
async fn test_concurrent_gets_dispatch_one_fetch() {
    let mut directory = FakeDirectory::with_delay(Duration::from_millis(20));
    directory.add_person("1", "Molly");
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    let person = id("1");
    let results = join_all((0..16).map(|_| cache.card(&person))).await;

    assert_eq!(directory.card_calls(), 1);
    for result in results {
        assert_eq!(result.unwrap().unwrap().name.as_deref(), Some("Molly"));
    }
    assert_eq!(cache.stats().cards.dispatched, 1);
    assert_eq!(cache.stats().cards.in_flight, 0);
}

#[tokio::test]
async fn test_resolved_values_are_not_refetched() {
    let mut directory = FakeDirectory::default();
    directory.add_person("1", "Arthur");
    directory
        .addresses
        .insert(id("1"), vec!["The Burrow".into(), "Ottery St Catchpole".into()]);
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    for _ in 0..3 {
        cache.enrich(&id("1")).await.unwrap();
    }

    assert_eq!(directory.card_calls(), 1);
    assert_eq!(directory.address_calls(), 1);
    assert_eq!(directory.token_calls(), 1);
    assert_eq!(
        cache.cached_address(&id("1")),
        Some(vec!["The Burrow".to_string(), "Ottery St Catchpole".to_string()])
    );
}

#[tokio::test]
async fn test_missing_card_is_memoized() {
    let directory = Arc::new(FakeDirectory::default());
    let cache = RecordCache::new(directory.clone());

    assert_eq!(cache.card(&id("ghost")).await, Ok(None));
    assert_eq!(cache.card(&id("ghost")).await, Ok(None));
    assert_eq!(directory.card_calls(), 1);
    assert_eq!(cache.cached_card(&id("ghost")), None);
}

#[tokio::test]
async fn test_card_transport_error_reaches_every_waiter_and_is_retried() {
    let mut directory = FakeDirectory::with_delay(Duration::from_millis(10));
    directory.broken_cards.push(id("1"));
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    let person = id("1");
    let results = join_all((0..4).map(|_| cache.card(&person))).await;
    for result in results {
        assert!(matches!(result, Err(FetchError::Server { status: 503, .. })));
    }
    assert_eq!(directory.card_calls(), 1);

    // Nothing cached, so the next call tries again
    assert!(cache.card(&person).await.is_err());
    assert_eq!(directory.card_calls(), 2);
}

#[tokio::test]
async fn test_address_error_degrades_to_empty() {
    let mut directory = FakeDirectory::default();
    directory.broken_addresses.push(id("1"));
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    assert!(cache.address(&id("1")).await.is_empty());
    assert!(cache.address(&id("1")).await.is_empty());
    assert_eq!(cache.cached_address(&id("1")), Some(vec![]));
    assert_eq!(directory.address_calls(), 1);
}

#[tokio::test]
async fn test_no_photo_tokens_skip_bytes_stage() {
    let mut directory = FakeDirectory::default();
    directory.add_photo("1", "images/nophoto.svg", b"unused");
    directory.add_photo("2", "images/nohousehold.svg", b"unused");
    directory.add_photo("3", "", b"unused");
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    for raw in ["1", "2", "3", "4"] {
        assert_eq!(cache.photo(&id(raw)).await, Photo::None);
        assert_eq!(cache.photo_state(&id(raw)), PhotoState::NoPhoto);
    }

    assert_eq!(directory.token_calls(), 4);
    assert_eq!(directory.bytes_calls(), 0);
}

#[tokio::test]
async fn test_photo_two_stage_resolution() {
    let mut directory = FakeDirectory::with_delay(Duration::from_millis(10));
    directory.add_photo("1", "https://photos.example.org/t/abc", &[0xFF, 0xD8, 0xFF]);
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());
    let person = id("1");

    assert_eq!(cache.photo_state(&person), PhotoState::Unresolved);

    let pending = {
        let cache = cache.clone();
        let person = person.clone();
        tokio::spawn(async move { cache.photo(&person).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(cache.photo_state(&person), PhotoState::TokenPending);

    let photos = join_all((0..5).map(|_| cache.photo(&person))).await;
    let first = pending.await.unwrap();

    assert_eq!(cache.photo_state(&person), PhotoState::Resolved);
    assert_eq!(first.to_data_url(), "data:image/jpeg;base64,/9j/");
    assert!(photos.iter().all(|photo| *photo == first));
    assert_eq!(directory.token_calls(), 1);
    assert_eq!(directory.bytes_calls(), 1);
}

#[tokio::test]
async fn test_missing_photo_bytes_degrade_to_no_photo() {
    let mut directory = FakeDirectory::default();
    directory
        .photo_tokens
        .insert(id("1"), "https://photos.example.org/t/gone".into());
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    assert_eq!(cache.photo(&id("1")).await, Photo::None);
    assert_eq!(cache.photo_state(&id("1")), PhotoState::NoPhoto);
    assert_eq!(directory.bytes_calls(), 1);
}

#[tokio::test]
async fn test_abandoned_caller_does_not_cancel_fetch() {
    let mut directory = FakeDirectory::with_delay(Duration::from_millis(30));
    directory.add_person("1", "Ginny");
    let directory = Arc::new(directory);
    let cache = RecordCache::new(directory.clone());

    let abandoned = tokio::time::timeout(Duration::from_millis(5), cache.card(&id("1"))).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(cache.cached_card(&id("1")).is_some());
    assert_eq!(directory.card_calls(), 1);
}

#[tokio::test]
async fn test_sequential_and_concurrent_batches_agree() {
    let build = || {
        let mut directory = FakeDirectory::with_delay(Duration::from_millis(2));
        for (raw, name) in [("1", "Fred"), ("2", "George"), ("3", "Percy"), ("5", "Bill")] {
            directory.add_person(raw, name);
        }
        directory.addresses.insert(id("2"), vec!["Joke Shop".into()]);
        directory.add_photo("3", "https://photos.example.org/t/percy", &[1, 2, 3]);
        directory.broken_cards.push(id("4"));
        Arc::new(directory)
    };
    let ids: Vec<PersonId> = ["1", "2", "3", "4", "5", "6"].into_iter().map(id).collect();

    let sequential_dir = build();
    let sequential = RecordCache::new(sequential_dir.clone());
    let mut ticks = Vec::new();
    let sequential_report = sequential
        .enrich_all(ids.clone(), Schedule::Sequential, |p| ticks.push(p.done))
        .await;
    assert_eq!(ticks, vec![1, 2, 3, 4, 5, 6]);

    let concurrent_dir = build();
    let concurrent = RecordCache::new(concurrent_dir.clone());
    let concurrent_report = concurrent
        .enrich_all(ids.clone(), Schedule::Concurrent { limit: 3 }, |_| {})
        .await;

    assert_eq!(sequential_report, concurrent_report);
    assert_eq!(sequential_report.enriched, 4);
    assert_eq!(sequential_report.missing, vec![id("6")]);
    assert_eq!(sequential_report.failed.len(), 1);

    for person in &ids {
        assert_eq!(sequential.cached_card(person), concurrent.cached_card(person));
        assert_eq!(sequential.cached_address(person), concurrent.cached_address(person));
        assert_eq!(sequential.cached_photo(person), concurrent.cached_photo(person));
    }
    assert_eq!(sequential_dir.card_calls(), concurrent_dir.card_calls());
}

/// Directory whose card lookups crash
struct CrashingDirectory;

#[async_trait]
impl MemberDirectory for CrashingDirectory {
    async fn fetch_card(&self, id: &PersonId) -> Result<Option<RawCard>, FetchError> {
        panic!("card lookup crashed for {}", id);
    }

    async fn fetch_address_lines(&self, _id: &PersonId) -> Result<Vec<String>, FetchError> {
        Ok(Vec::new())
    }

    async fn fetch_photo_token(&self, _id: &PersonId) -> Result<Option<String>, FetchError> {
        Ok(None)
    }

    async fn fetch_photo_bytes(&self, token: &str) -> Result<PhotoBytes, FetchError> {
        Err(FetchError::NotFound(token.to_string()))
    }
}

#[tokio::test]
async fn test_crashed_fetch_is_abandoned_not_stuck() {
    let cache = RecordCache::new(Arc::new(CrashingDirectory));
    let person = id("1");

    let first = tokio::time::timeout(Duration::from_secs(2), cache.card(&person))
        .await
        .expect("first call must not hang");
    assert_eq!(first, Err(FetchError::Abandoned));

    // The key is free again, so the next call dispatches a new fetch
    let second = tokio::time::timeout(Duration::from_secs(2), cache.card(&person))
        .await
        .expect("second call must not hang");
    assert_eq!(second, Err(FetchError::Abandoned));

    let stats = cache.stats().cards;
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.resolved, 0);
}

#[tokio::test]
async fn test_seed_during_fetch_is_not_overwritten() {
    let directory = Arc::new(FakeDirectory::with_delay(Duration::from_millis(30)));
    let cache = RecordCache::new(directory.clone());
    let person = id("1");

    let waiter = {
        let cache = cache.clone();
        let person = person.clone();
        tokio::spawn(async move { cache.card(&person).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    cache.seed_card(
        person.clone(),
        RawCard {
            name: Some("Seeded".into()),
            ..Default::default()
        },
    );
    assert_eq!(
        cache.cached_card(&person).and_then(|card| card.name),
        Some("Seeded".to_string())
    );

    let waited = waiter.await.unwrap().unwrap();
    assert_eq!(waited.and_then(|card| card.name), Some("Seeded".to_string()));

    // Let the directory answer "no card" for the stale fetch
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(directory.card_calls(), 1);
    assert_eq!(
        cache.cached_card(&person).and_then(|card| card.name),
        Some("Seeded".to_string())
    );
}
