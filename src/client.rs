//! HTTP client for the member directory
//!
//! # Example
//!
//! ```rust,no_run
//! use ministering_graph::{DirectoryClient, DirectoryConfig, MemberDirectory, PersonId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DirectoryClient::new(DirectoryConfig {
//!     base_url: "http://localhost:8080".into(),
//!     ..Default::default()
//! })?;
//!
//! let card = client.fetch_card(&PersonId::from("3711842")).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::DirectoryConfig;
use crate::directory::MemberDirectory;
use crate::error::FetchError;
use crate::types::{PersonId, PhotoBytes, RawCard};

/// Content type assumed when the photo response carries none
const DEFAULT_PHOTO_CONTENT_TYPE: &str = "image/jpeg";

// ==================== Response shapes ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    #[serde(default)]
    individual: Option<ProfileIndividual>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileIndividual {
    #[serde(default)]
    residential_address: Option<ResidentialAddress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResidentialAddress {
    #[serde(default)]
    formatted_lines: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoTokenResponse {
    #[serde(default)]
    image: Option<PhotoTokenImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoTokenImage {
    #[serde(default)]
    token_url: Option<String>,
}

/// HTTP implementation of [`MemberDirectory`]
pub struct DirectoryClient {
    config: DirectoryConfig,
    client: Client,
}

impl DirectoryClient {
    /// Create a new directory client
    pub fn new(config: DirectoryConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn card_url(&self, id: &PersonId) -> String {
        format!(
            "{}/services/member-card?id={}&includePriesthood=true&lang={}&type=INDIVIDUAL",
            self.base_url(),
            urlencoding::encode(id.as_str()),
            urlencoding::encode(&self.config.lang)
        )
    }

    fn profile_url(&self, id: &PersonId) -> String {
        format!(
            "{}/records/member-profile/service/{}?lang={}",
            self.base_url(),
            urlencoding::encode(id.as_str()),
            urlencoding::encode(&self.config.lang)
        )
    }

    fn photo_token_url(&self, id: &PersonId) -> String {
        format!(
            "{}/services/photos/manage-photos/approved-image-individual/{}?lang={}&addable=false",
            self.base_url(),
            urlencoding::encode(id.as_str()),
            urlencoding::encode(&self.config.lang)
        )
    }

    // ==================== Helper Methods ====================

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, FetchError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(response.url().to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status,
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MemberDirectory for DirectoryClient {
    async fn fetch_card(&self, id: &PersonId) -> Result<Option<RawCard>, FetchError> {
        let url = self.card_url(id);
        debug!(id = %id, "Fetching member card");

        let response = self.client.get(&url).send().await?;
        match self.handle_response::<Option<RawCard>>(response).await {
            Ok(card) => Ok(card),
            Err(FetchError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch_address_lines(&self, id: &PersonId) -> Result<Vec<String>, FetchError> {
        let url = self.profile_url(id);
        debug!(id = %id, "Fetching member profile");

        let response = self.client.get(&url).send().await?;
        let profile: ProfileResponse = self.handle_response(response).await?;

        Ok(profile
            .individual
            .and_then(|individual| individual.residential_address)
            .map(|address| address.formatted_lines)
            .unwrap_or_default())
    }

    async fn fetch_photo_token(&self, id: &PersonId) -> Result<Option<String>, FetchError> {
        let url = self.photo_token_url(id);
        debug!(id = %id, "Fetching photo token");

        let response = self.client.get(&url).send().await?;
        let body: PhotoTokenResponse = self.handle_response(response).await?;

        Ok(body
            .image
            .and_then(|image| image.token_url)
            .filter(|token| !token.is_empty()))
    }

    async fn fetch_photo_bytes(&self, token: &str) -> Result<PhotoBytes, FetchError> {
        let url = format!(
            "{}/{}",
            token.trim_end_matches('/'),
            self.config.photo_size
        );

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status,
                message: body,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_PHOTO_CONTENT_TYPE)
            .to_string();

        Ok(PhotoBytes {
            content_type,
            data: response.bytes().await?.to_vec(),
        })
    }
}
