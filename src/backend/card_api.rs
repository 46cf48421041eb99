use reqwest::StatusCode;
use serde::Deserialize;

use super::parse_json;
use crate::error::ApiError;
use crate::models::{Card, CardPayload};

/// Shorter queries are answered locally with an empty list.
pub const MIN_SEARCH_QUERY_LEN: usize = 3;

#[derive(Deserialize)]
struct CardListResponse {
    #[serde(default)]
    data: Vec<CardPayload>,
}

#[derive(Deserialize)]
struct RulingsResponse {
    #[serde(default)]
    data: Vec<RulingPayload>,
}

#[derive(Deserialize)]
struct RulingPayload {
    #[serde(default)]
    comment: Option<String>,
}

/// Read-only client for the external card-data service.
pub struct CardDataClient {
    http: reqwest::Client,
    base_url: String,
}

impl CardDataClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        CardDataClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn search_cards(&self, query: &str) -> Result<Vec<Card>, ApiError> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_QUERY_LEN {
            return Ok(Vec::new());
        }
        self.card_list(&[("q", query.to_string())]).await
    }

    /// Every printing of the card with exactly this name.
    pub async fn fetch_prints(&self, card_name: &str) -> Result<Vec<Card>, ApiError> {
        let card_name = card_name.trim();
        if card_name.is_empty() {
            return Ok(Vec::new());
        }
        self.card_list(&[
            ("q", format!("!\"{}\"", card_name)),
            ("unique", "prints".to_string()),
        ])
        .await
    }

    pub async fn fetch_random_card(&self) -> Result<Card, ApiError> {
        let resp = self
            .http
            .get(format!("{}/cards/random", self.base_url))
            .send()
            .await?;

        let card: CardPayload = parse_json(resp).await?;
        Ok(card.into_card(None))
    }

    pub async fn get_rulings(&self, rulings_uri: &str) -> Vec<String> {
        match self.try_get_rulings(rulings_uri).await {
            Ok(rulings) => rulings,
            Err(err) => {
                tracing::warn!("failed to fetch rulings from {}: {}", rulings_uri, err);
                Vec::new()
            }
        }
    }

    async fn try_get_rulings(&self, rulings_uri: &str) -> Result<Vec<String>, ApiError> {
        let resp = self.http.get(rulings_uri).send().await?;
        let body: RulingsResponse = parse_json(resp).await?;
        Ok(body
            .data
            .into_iter()
            .filter_map(|ruling| ruling.comment)
            .filter(|comment| !comment.trim().is_empty())
            .collect())
    }

    /// The search endpoint answers "no matches" with 404; that is an empty list here.
    async fn card_list(&self, query: &[(&str, String)]) -> Result<Vec<Card>, ApiError> {
        let resp = self
            .http
            .get(format!("{}/cards/search", self.base_url))
            .query(query)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let body: CardListResponse = parse_json(resp).await?;
        Ok(body
            .data
            .into_iter()
            .map(|card| card.into_card(None))
            .collect())
    }
}
