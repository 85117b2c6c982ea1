//! Member directory collaborator
//!
//! The cache never talks HTTP itself; it drives any [`MemberDirectory`].
//! [`DirectoryClient`](crate::client::DirectoryClient) is the networked
//! implementation, [`OfflineDirectory`] answers "not found" to everything so
//! a run can work purely from seeded cards.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{PersonId, PhotoBytes, RawCard};

/// Photo tokens the directory hands out when a person has no approved photo
pub const NO_PHOTO_TOKENS: [&str; 2] = ["images/nophoto.svg", "images/nohousehold.svg"];

/// Whether a photo token means "no photo" without needing the bytes stage
pub fn is_no_photo_token(token: &str) -> bool {
    let token = token.trim();
    token.is_empty() || NO_PHOTO_TOKENS.contains(&token)
}

/// Source of the three per-person facets
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Member card; `None` when the directory does not know the id
    async fn fetch_card(&self, id: &PersonId) -> Result<Option<RawCard>, FetchError>;

    /// Residential address lines
    async fn fetch_address_lines(&self, id: &PersonId) -> Result<Vec<String>, FetchError>;

    /// First photo stage: a transient token/URL, `None` when there is no photo
    async fn fetch_photo_token(&self, id: &PersonId) -> Result<Option<String>, FetchError>;

    /// Second photo stage: the image behind a token
    async fn fetch_photo_bytes(&self, token: &str) -> Result<PhotoBytes, FetchError>;
}

/// Directory with no backing service
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineDirectory;

#[async_trait]
impl MemberDirectory for OfflineDirectory {
    async fn fetch_card(&self, _id: &PersonId) -> Result<Option<RawCard>, FetchError> {
        Ok(None)
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
