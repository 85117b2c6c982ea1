//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ministering_graph::{FetchError, MemberDirectory, PersonId, PhotoBytes, RawCard};

/// In-memory directory that counts every call and answers after a delay
#[derive(Default)]
pub struct FakeDirectory {
    pub cards: HashMap<PersonId, RawCard>,
    pub addresses: HashMap<PersonId, Vec<String>>,
    pub photo_tokens: HashMap<PersonId, String>,
    pub photos: HashMap<String, PhotoBytes>,
    /// Ids whose card fetch fails in transport
    pub broken_cards: Vec<PersonId>,
    /// Ids whose address fetch fails
    pub broken_addresses: Vec<PersonId>,
    pub delay: Duration,

    pub card_calls: AtomicUsize,
    pub address_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub bytes_calls: AtomicUsize,
    pub card_requests: Mutex<Vec<PersonId>>,
}

impl FakeDirectory {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn add_person(&mut self, id: &str, name: &str) {
        self.cards.insert(
            PersonId::from(id),
            RawCard {
                id: Some(PersonId::from(id)),
                name: Some(name.to_string()),
                spoken_name: Some(name.to_string()),
                age: Some(40),
                gender: Some("FEMALE".into()),
                phone: Some("801-555-0100".into()),
                email: Some(format!("{}@Example.org", name)),
                ..Default::default()
            },
        );
    }

    pub fn add_photo(&mut self, id: &str, token: &str, data: &[u8]) {
        self.photo_tokens
            .insert(PersonId::from(id), token.to_string());
        self.photos.insert(
            token.to_string(),
            PhotoBytes {
                content_type: "image/jpeg".into(),
                data: data.to_vec(),
            },
        );
    }

    pub fn card_calls(&self) -> usize {
        self.card_calls.load(Ordering::SeqCst)
    }

    pub fn address_calls(&self) -> usize {
        self.address_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn bytes_calls(&self) -> usize {
        self.bytes_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl MemberDirectory for FakeDirectory {
    async fn fetch_card(&self, id: &PersonId) -> Result<Option<RawCard>, FetchError> {
        self.card_calls.fetch_add(1, Ordering::SeqCst);
        self.card_requests.lock().unwrap().push(id.clone());
        self.pause().await;
        if self.broken_cards.contains(id) {
            return Err(FetchError::Server {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(self.cards.get(id).cloned())
    }

    async fn fetch_address_lines(&self, id: &PersonId) -> Result<Vec<String>, FetchError> {
        self.address_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.broken_addresses.contains(id) {
            return Err(FetchError::Http("connection reset".into()));
        }
        Ok(self.addresses.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_photo_token(&self, id: &PersonId) -> Result<Option<String>, FetchError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.photo_tokens.get(id).cloned())
    }

    async fn fetch_photo_bytes(&self, token: &str) -> Result<PhotoBytes, FetchError> {
        self.bytes_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.photos
            .get(token)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(token.to_string()))
    }
}

/// One companionship {A, B}; A alone is assigned family C
pub const PAIR_SNAPSHOT: &str = r#"{
  "props": { "pageProps": { "initialState": { "ministeringData": {
    "elders": [{
      "districtName": "District 1",
      "companionships": [{
        "ministers": [
          { "legacyCmisId": "A", "assignments": [{ "legacyCmisId": "C" }] },
          { "legacyCmisId": "B" }
        ]
      }]
    }]
  }}}}
}"#;

/// Two districts, shared companionship assignments, a repeated minister
pub const WARD_SNAPSHOT: &str = r#"{
  "elders": [
    {
      "districtName": "North",
      "companionships": [
        {
          "ministers": [{ "legacyCmisId": 101 }, { "legacyCmisId": 102 }],
          "assignments": [{ "legacyCmisId": 201 }, { "legacyCmisId": 202 }]
        },
        {
          "ministers": [{ "legacyCmisId": 103 }, { "legacyCmisId": 104 }, { "legacyCmisId": 105 }],
          "assignments": [{ "legacyCmisId": 203 }, { "legacyCmisId": 101 }]
        }
      ]
    },
    {
      "districtName": "South",
      "companionships": [
        {
          "ministers": [{ "legacyCmisId": 106 }, { "legacyCmisId": 101 }],
          "assignments": null
        },
        {
          "ministers": [{ "legacyCmisId": 107 }],
          "assignments": [{ "legacyCmisId": 204 }, { "legacyCmisId": 202 }]
        }
      ]
    }
  ]
}"#;
