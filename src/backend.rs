//! Network access: the application backend and the external card-data service.
//!
//! The store only talks to [`CollectionBackend`]; [`HttpBackend`] is the
//! production implementation over `reqwest`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{Card, Collection};
use crate::opt::Config;

mod card_api;
mod collection_api;

pub use card_api::{CardDataClient, MIN_SEARCH_QUERY_LEN};
pub use collection_api::BackendClient;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCardRequest {
    pub collection_id: String,
    pub card_name: String,
    pub card_set: String,
    pub collector_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveCardRequest {
    pub card_id: String,
    pub collection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePrintRequest {
    pub card_id: String,
    pub new_print_id: String,
    pub collection_id: String,
}

/// Every remote call the store makes. Backend calls take the bearer token
/// explicitly; card-data calls are anonymous.
#[async_trait]
pub trait CollectionBackend: Send + Sync + 'static {
    async fn list_collections(&self, token: &str, user_id: &str)
        -> Result<Vec<Collection>, ApiError>;

    async fn get_collection_cards(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
    ) -> Result<Vec<Card>, ApiError>;

    async fn create_collection(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Collection, ApiError>;

    async fn rename_collection(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
        name: &str,
    ) -> Result<(), ApiError>;

    async fn delete_collection(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
    ) -> Result<(), ApiError>;

    async fn add_card_to_collection(
        &self,
        token: &str,
        request: &AddCardRequest,
    ) -> Result<Card, ApiError>;

    async fn remove_card_from_collection(
        &self,
        token: &str,
        request: &RemoveCardRequest,
    ) -> Result<(), ApiError>;

    async fn update_card_print(
        &self,
        token: &str,
        request: &UpdatePrintRequest,
    ) -> Result<Card, ApiError>;

    async fn search_cards(&self, query: &str) -> Result<Vec<Card>, ApiError>;

    async fn fetch_prints(&self, card_name: &str) -> Result<Vec<Card>, ApiError>;

    async fn fetch_random_card(&self) -> Result<Card, ApiError>;

    /// Never fails: a missing ruling list and a failed fetch look the same.
    async fn get_rulings(&self, rulings_uri: &str) -> Vec<String>;
}

/// Both HTTP clients behind one [`CollectionBackend`].
pub struct HttpBackend {
    backend: BackendClient,
    cards: CardDataClient,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("deckbox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpBackend {
            backend: BackendClient::new(http.clone(), &config.backend_url),
            cards: CardDataClient::new(http, &config.card_api_url),
        })
    }
}

#[async_trait]
impl CollectionBackend for HttpBackend {
    async fn list_collections(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<Vec<Collection>, ApiError> {
        self.backend.list_collections(token, user_id).await
    }

    async fn get_collection_cards(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
    ) -> Result<Vec<Card>, ApiError> {
        self.backend
            .get_collection_cards(token, user_id, collection_id)
            .await
    }

    async fn create_collection(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Collection, ApiError> {
        self.backend.create_collection(token, user_id, name).await
    }

    async fn rename_collection(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        self.backend
            .rename_collection(token, user_id, collection_id, name)
            .await
    }

    async fn delete_collection(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
    ) -> Result<(), ApiError> {
        self.backend
            .delete_collection(token, user_id, collection_id)
            .await
    }

    async fn add_card_to_collection(
        &self,
        token: &str,
        request: &AddCardRequest,
    ) -> Result<Card, ApiError> {
        self.backend.add_card_to_collection(token, request).await
    }

    async fn remove_card_from_collection(
        &self,
        token: &str,
        request: &RemoveCardRequest,
    ) -> Result<(), ApiError> {
        self.backend.remove_card_from_collection(token, request).await
    }

    async fn update_card_print(
        &self,
        token: &str,
        request: &UpdatePrintRequest,
    ) -> Result<Card, ApiError> {
        self.backend.update_card_print(token, request).await
    }

    async fn search_cards(&self, query: &str) -> Result<Vec<Card>, ApiError> {
        self.cards.search_cards(query).await
    }

    async fn fetch_prints(&self, card_name: &str) -> Result<Vec<Card>, ApiError> {
        self.cards.fetch_prints(card_name).await
    }

    async fn fetch_random_card(&self) -> Result<Card, ApiError> {
        self.cards.fetch_random_card().await
    }

    async fn get_rulings(&self, rulings_uri: &str) -> Vec<String> {
        self.cards.get_rulings(rulings_uri).await
    }
}

/// Maps a non-2xx response to [`ApiError::HttpStatus`].
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ApiError::HttpStatus {
        status: status.as_u16(),
        message,
    })
}

async fn parse_json<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
    check_status(resp)
        .await?
        .json::<R>()
        .await
        .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
}
