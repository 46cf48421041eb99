use std::io;

use reqwest::Url;

use crate::context::SessionStorage;
use crate::models::{Identity, Session};

pub const TOKEN_KEY: &str = "token";
pub const USERNAME_KEY: &str = "username";
pub const USER_ID_KEY: &str = "id";

const CALLBACK_KEYS: [&str; 3] = [TOKEN_KEY, USERNAME_KEY, USER_ID_KEY];

/// Restores the session saved by a previous sign-in. A token without a
/// username is treated as signed out.
pub fn hydrate(storage: &dyn SessionStorage) -> Session {
    let read = |key: &str| storage.read_data(key).filter(|value| !value.is_empty());

    match (read(TOKEN_KEY), read(USERNAME_KEY)) {
        (Some(token), Some(username)) => Session::SignedIn(Identity {
            token,
            username,
            user_id: read(USER_ID_KEY),
        }),
        (Some(_), None) => {
            tracing::warn!("stored token has no username; starting signed out");
            Session::SignedOut
        }
        _ => Session::SignedOut,
    }
}

pub fn persist(storage: &dyn SessionStorage, identity: &Identity) -> io::Result<()> {
    storage.write_data(TOKEN_KEY, &identity.token)?;
    storage.write_data(USERNAME_KEY, &identity.username)?;
    match &identity.user_id {
        Some(user_id) => storage.write_data(USER_ID_KEY, user_id),
        None => storage.remove_data(USER_ID_KEY),
    }
}

/// Removes all three keys, attempting each even if an earlier one fails.
pub fn clear(storage: &dyn SessionStorage) -> io::Result<()> {
    CALLBACK_KEYS
        .iter()
        .map(|key| storage.remove_data(key))
        .fold(Ok(()), |acc, result| acc.and(result))
}

/// Parameters handed over by the identity provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
}

impl CallbackParams {
    pub fn from_url(url: &Url) -> Self {
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
        };
        CallbackParams {
            token: param(TOKEN_KEY),
            username: param(USERNAME_KEY),
            user_id: param(USER_ID_KEY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.username.is_none() && self.user_id.is_none()
    }
}

/// Drops the callback parameters from `url`, keeping every other query pair.
pub fn strip_callback_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !CALLBACK_KEYS.contains(&&**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut stripped = url.clone();
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
