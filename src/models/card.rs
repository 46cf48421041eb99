use std::fmt::{self, Display, Formatter};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::wire::{de_count, de_opt_id, first_object, value_to_price};

/// Placeholder for text fields a payload did not carry.
pub const NOT_AVAILABLE: &str = "N/A";

lazy_static! {
    static ref MANA_SYMBOL: Regex = Regex::new(r"\{([^}]+)\}").unwrap();
}

/// One card's membership in the selected collection, or a search result
/// from the card-data service (then `count` is `None`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub set: String,
    pub set_name: Option<String>,
    pub collector_number: Option<String>,
    pub price: Option<f64>,
    pub price_foil: Option<f64>,
    pub oracle_text: String,
    pub rulings_uri: Option<String>,
    pub rulings: Option<Vec<String>>,
    pub mana_cost: Option<String>,
    pub count: Option<u32>,
}

impl Card {
    /// Owned quantity; a record without a count stands for a single copy.
    pub fn quantity(&self) -> u32 {
        self.count.unwrap_or(1)
    }

    pub fn mana_symbols(&self) -> Vec<String> {
        self.mana_cost.as_deref().map(mana_symbols).unwrap_or_default()
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let price = match self.price {
            Some(price) => format!("€{:.2}", price),
            None => NOT_AVAILABLE.to_string(),
        };
        write!(
            f,
            "[{:^6}] {:>3}x {:30} {:>8}  ({})",
            self.set.to_uppercase(),
            self.quantity(),
            self.name,
            price,
            self.id
        )
    }
}

/// Splits a cost like `{2}{W}{U/P}` into `["2", "W", "U/P"]`.
pub fn mana_symbols(mana_cost: &str) -> Vec<String> {
    MANA_SYMBOL
        .captures_iter(mana_cost)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// `image_uris` arrives as an object on the card-data service and as an
/// array of objects on the backend join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageUris {
    normal: Option<String>,
    png: Option<String>,
    large: Option<String>,
}

impl ImageUris {
    fn best(&self) -> Option<String> {
        [&self.png, &self.normal, &self.large]
            .into_iter()
            .flatten()
            .next()
            .cloned()
    }
}

impl<'de> Deserialize<'de> for ImageUris {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Some(map) = first_object(value) else {
            return Ok(ImageUris::default());
        };
        let field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(ImageUris {
            normal: field("normal"),
            png: field("png"),
            large: field("large"),
        })
    }
}

/// Same object-or-array ambiguity as [`ImageUris`], with prices as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prices {
    eur: Option<f64>,
    eur_foil: Option<f64>,
}

impl<'de> Deserialize<'de> for Prices {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Some(map) = first_object(value) else {
            return Ok(Prices::default());
        };
        let price = |key: &str| map.get(key).and_then(value_to_price);

        Ok(Prices {
            eur: price("eur"),
            eur_foil: price("eur_foil").or_else(|| price("eurFoil")),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CardFacePayload {
    #[serde(alias = "imageUris")]
    image_uris: ImageUris,
    oracle_text: Option<String>,
    mana_cost: Option<String>,
}

/// Raw card object as sent by either service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CardPayload {
    #[serde(deserialize_with = "de_opt_id")]
    id: Option<String>,
    name: Option<String>,
    #[serde(alias = "imageUris")]
    image_uris: ImageUris,
    set: Option<String>,
    set_name: Option<String>,
    #[serde(deserialize_with = "de_opt_id")]
    collector_number: Option<String>,
    prices: Prices,
    oracle_text: Option<String>,
    rulings_uri: Option<String>,
    mana_cost: Option<String>,
    card_faces: Vec<CardFacePayload>,
}

impl CardPayload {
    /// The one place wire shapes become a [`Card`]. Missing text becomes
    /// [`NOT_AVAILABLE`]; double-faced cards borrow from their front face.
    pub fn into_card(self, count: Option<u32>) -> Card {
        let front = self.card_faces.into_iter().next().unwrap_or_default();
        let image_url = self
            .image_uris
            .best()
            .or_else(|| front.image_uris.best());

        Card {
            id: self.id.unwrap_or_else(not_available),
            name: self.name.unwrap_or_else(not_available),
            image_url: image_url.unwrap_or_else(not_available),
            set: self
                .set
                .or_else(|| self.set_name.clone())
                .unwrap_or_else(not_available),
            set_name: self.set_name,
            collector_number: self.collector_number,
            price: self.prices.eur,
            price_foil: self.prices.eur_foil,
            oracle_text: self
                .oracle_text
                .or(front.oracle_text)
                .unwrap_or_else(not_available),
            rulings_uri: self.rulings_uri,
            rulings: None,
            mana_cost: self.mana_cost.or(front.mana_cost),
            count,
        }
    }
}

fn not_available() -> String {
    String::from(NOT_AVAILABLE)
}

/// A `{ card, count }` row from the backend's card-in-collection join.
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipPayload {
    #[serde(default)]
    card: CardPayload,
    #[serde(default, deserialize_with = "de_count")]
    count: Option<u32>,
}

impl MembershipPayload {
    pub fn into_card(self) -> Card {
        self.card.into_card(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_join_shape() {
        let row: MembershipPayload = serde_json::from_value(json!({
            "count": 3,
            "card": {
                "id": "c-1",
                "name": "Lightning Bolt",
                "image_uris": [{ "png": "bolt.png", "normal": "bolt.jpg" }],
                "set": "lea",
                "prices": [{ "eur": "1.50" }],
                "oracle_text": "Lightning Bolt deals 3 damage to any target.",
                "rulings_uri": "https://cards.test/rulings/c-1",
                "mana_cost": "{R}"
            }
        }))
        .unwrap();

        let card = row.into_card();
        assert_eq!(card.id, "c-1");
        assert_eq!(card.image_url, "bolt.png");
        assert_eq!(card.set, "lea");
        assert_eq!(card.price, Some(1.5));
        assert_eq!(card.count, Some(3));
        assert_eq!(card.rulings_uri.as_deref(), Some("https://cards.test/rulings/c-1"));
        assert_eq!(card.mana_symbols(), vec!["R"]);
    }

    #[test]
    fn test_missing_fields_fall_back_to_sentinel() {
        let row: MembershipPayload = serde_json::from_value(json!({
            "count": 1,
            "card": { "id": 99, "name": "Mystery" }
        }))
        .unwrap();

        let card = row.into_card();
        assert_eq!(card.id, "99");
        assert_eq!(card.image_url, NOT_AVAILABLE);
        assert_eq!(card.set, NOT_AVAILABLE);
        assert_eq!(card.oracle_text, NOT_AVAILABLE);
        assert_eq!(card.price, None);
        assert_eq!(card.mana_cost, None);
    }

    #[test]
    fn test_card_data_shape_with_faces() {
        let payload: CardPayload = serde_json::from_value(json!({
            "id": "dfc",
            "name": "Delver of Secrets // Insectile Aberration",
            "set": "isd",
            "set_name": "Innistrad",
            "collector_number": "51",
            "prices": { "eur": null, "eur_foil": 2.25 },
            "card_faces": [
                {
                    "image_uris": { "normal": "front.jpg" },
                    "oracle_text": "At the beginning of your upkeep...",
                    "mana_cost": "{U}"
                },
                { "image_uris": { "normal": "back.jpg" } }
            ]
        }))
        .unwrap();

        let card = payload.into_card(None);
        assert_eq!(card.image_url, "front.jpg");
        assert_eq!(card.oracle_text, "At the beginning of your upkeep...");
        assert_eq!(card.mana_cost.as_deref(), Some("{U}"));
        assert_eq!(card.price, None);
        assert_eq!(card.price_foil, Some(2.25));
        assert_eq!(card.set_name.as_deref(), Some("Innistrad"));
        assert_eq!(card.collector_number.as_deref(), Some("51"));
        assert_eq!(card.quantity(), 1);
    }

    #[test]
    fn test_mana_symbols() {
        assert_eq!(mana_symbols("{2}{W}{U}"), vec!["2", "W", "U"]);
        assert_eq!(mana_symbols("{W/U}{X}"), vec!["W/U", "X"]);
        assert!(mana_symbols("").is_empty());
    }
}
