use serde::Deserialize;
use serde_json::json;

use super::{check_status, parse_json, AddCardRequest, RemoveCardRequest, UpdatePrintRequest};
use crate::error::ApiError;
use crate::models::collection::CreatedCollectionPayload;
use crate::models::{Card, Collection, CollectionPayload, MembershipPayload};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardsInCollectionResponse {
    #[serde(default)]
    cards_in_collections: Vec<MembershipPayload>,
}

#[derive(Deserialize)]
struct MembershipResponse {
    card: MembershipPayload,
}

/// Client for the application backend. Every request carries the bearer token.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        BackendClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub async fn list_collections(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<Vec<Collection>, ApiError> {
        let resp = self
            .http
            .get(self.url(&format!("collections/{}", user_id)))
            .bearer_auth(token)
            .send()
            .await?;

        let collections: Vec<CollectionPayload> = parse_json(resp).await?;
        Ok(collections
            .into_iter()
            .map(CollectionPayload::into_collection)
            .collect())
    }

    pub async fn get_collection_cards(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
    ) -> Result<Vec<Card>, ApiError> {
        let resp = self
            .http
            .get(self.url(&format!("cardsInCollection/{}/{}", user_id, collection_id)))
            .bearer_auth(token)
            .send()
            .await?;

        let body: CardsInCollectionResponse = parse_json(resp).await?;
        Ok(body
            .cards_in_collections
            .into_iter()
            .map(MembershipPayload::into_card)
            .collect())
    }

    pub async fn create_collection(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<Collection, ApiError> {
        let resp = self
            .http
            .post(self.url("collections"))
            .bearer_auth(token)
            .json(&json!({ "name": name, "id": user_id }))
            .send()
            .await?;

        let created: CreatedCollectionPayload = parse_json(resp).await?;
        Ok(created.into_collection())
    }

    pub async fn rename_collection(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        let resp = self
            .http
            .put(self.url(&format!("collections/{}/{}", user_id, collection_id)))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await?;

        check_status(resp).await.map(|_| ())
    }

    pub async fn delete_collection(
        &self,
        token: &str,
        user_id: &str,
        collection_id: &str,
    ) -> Result<(), ApiError> {
        let resp = self
            .http
            .delete(self.url(&format!("collections/{}/{}", user_id, collection_id)))
            .bearer_auth(token)
            .send()
            .await?;

        check_status(resp).await.map(|_| ())
    }

    /// The backend resolves the print against the card-data service itself.
    pub async fn add_card_to_collection(
        &self,
        token: &str,
        request: &AddCardRequest,
    ) -> Result<Card, ApiError> {
        let resp = self
            .http
            .post(self.url("addCard"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let body: MembershipResponse = parse_json(resp).await?;
        Ok(body.card.into_card())
    }

    pub async fn remove_card_from_collection(
        &self,
        token: &str,
        request: &RemoveCardRequest,
    ) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(self.url("removeCard"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        check_status(resp).await.map(|_| ())
    }

    pub async fn update_card_print(
        &self,
        token: &str,
        request: &UpdatePrintRequest,
    ) -> Result<Card, ApiError> {
        let resp = self
            .http
            .post(self.url("updateCardPrint"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let body: MembershipResponse = parse_json(resp).await?;
        Ok(body.card.into_card())
    }
}
