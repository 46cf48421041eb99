use std::fmt::{self, Display, Formatter};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::wire::{value_to_id, value_to_price};

const PENDING_ID_ALPHABET: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];
const PENDING_ID_LENGTH: usize = 10;

/// Identity of a collection. A `Pending` id is generated locally while the
/// create request is in flight and is never sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionId {
    Pending(String),
    Persisted(String),
}

impl CollectionId {
    pub fn new_pending() -> Self {
        CollectionId::Pending(nanoid::nanoid!(PENDING_ID_LENGTH, &PENDING_ID_ALPHABET))
    }

    pub fn server_id(&self) -> Option<&str> {
        match self {
            CollectionId::Persisted(id) => Some(id),
            CollectionId::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CollectionId::Pending(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            CollectionId::Pending(id) | CollectionId::Persisted(id) => id,
        }
    }
}

impl Display for CollectionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CollectionId::Persisted(id) => f.pad(id),
            CollectionId::Pending(id) => f.pad(&format!("pending:{}", id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

impl Collection {
    pub fn pending(name: &str) -> Self {
        Collection {
            id: CollectionId::new_pending(),
            name: name.to_string(),
            price: None,
            image_url: None,
        }
    }

    pub fn has_server_id(&self, id: &str) -> bool {
        self.id.server_id() == Some(id)
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.price {
            Some(price) => write!(f, "{:<12} {:30} €{:.2}", self.id, self.name, price),
            None => write!(f, "{:<12} {:30}", self.id, self.name),
        }
    }
}

/// Backend collection record. The first of `image`, `imageUrl` and
/// `image_url` present is the image; repeated keys are not an error.
#[derive(Debug, Clone)]
pub struct CollectionPayload {
    id: String,
    name: Option<String>,
    price: Option<f64>,
    image: Option<String>,
}

const IMAGE_KEYS: [&str; 3] = ["image", "imageUrl", "image_url"];

impl<'de> Deserialize<'de> for CollectionPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Value::Object(map) = Value::deserialize(deserializer)? else {
            return Err(D::Error::custom("collection is not an object"));
        };
        let id = map
            .get("id")
            .and_then(value_to_id)
            .ok_or_else(|| D::Error::missing_field("id"))?;

        Ok(CollectionPayload {
            id,
            name: map.get("name").and_then(Value::as_str).map(str::to_string),
            price: map.get("price").and_then(value_to_price),
            image: IMAGE_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string),
        })
    }
}

impl CollectionPayload {
    pub fn into_collection(self) -> Collection {
        Collection {
            id: CollectionId::Persisted(self.id),
            name: self.name.unwrap_or_default(),
            price: self.price,
            image_url: self.image,
        }
    }
}

/// Create responses come back either bare or as `{ "collection": {...} }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CreatedCollectionPayload {
    Wrapped { collection: CollectionPayload },
    Bare(CollectionPayload),
}

impl CreatedCollectionPayload {
    pub fn into_collection(self) -> Collection {
        match self {
            CreatedCollectionPayload::Wrapped { collection }
            | CreatedCollectionPayload::Bare(collection) => collection.into_collection(),
        }
    }
}
