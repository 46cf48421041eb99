//! Session and collection state for one user.
//!
//! [`CollectionStore`] owns a [`StoreState`] snapshot behind a `watch`
//! channel: readers take cheap snapshots or subscribe to changes, and every
//! transition is applied under the channel's write lock. Fetches that can
//! race (the collection list and the selected collection's cards) are
//! guarded by a [`RequestSeq`], so only the most recently started request
//! may commit its result.

use std::sync::Arc;

use itertools::Itertools;
use reqwest::Url;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{AddCardRequest, CollectionBackend, RemoveCardRequest, UpdatePrintRequest};
use crate::card_filter;
use crate::context::SessionStorage;
use crate::error::{ApiError, StoreError, StoreResult};
use crate::models::{Card, Collection, CollectionId, Identity, Session};

mod sequence;
pub mod session;

use sequence::{RequestSeq, Ticket};
use session::CallbackParams;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub session: Session,
    pub collections: Vec<Collection>,
    /// Collection whose cards are in `cards`.
    pub selected_collection_id: Option<String>,
    /// Collection whose cards are being fetched; becomes the selection on success.
    pub pending_collection_id: Option<String>,
    pub cards: Vec<Card>,
}

/// Whether a fetch committed its result or was overtaken by a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Superseded,
}

pub struct CollectionStore {
    state: watch::Sender<StoreState>,
    backend: Arc<dyn CollectionBackend>,
    storage: Arc<dyn SessionStorage>,
    sign_in_url: String,
    collections_seq: RequestSeq,
    cards_seq: RequestSeq,
}

fn logged<T>(result: Result<T, ApiError>, action: &str) -> StoreResult<T> {
    result.map_err(|err| {
        warn!("failed to {}: {}", action, err);
        StoreError::from(err)
    })
}

fn upsert_card(cards: &mut Vec<Card>, card: Card) {
    match cards.iter().position(|existing| existing.id == card.id) {
        Some(index) => cards[index] = card,
        None => cards.push(card),
    }
}

impl CollectionStore {
    /// Builds the store and restores any session left in `storage`.
    pub fn new(
        backend: Arc<dyn CollectionBackend>,
        storage: Arc<dyn SessionStorage>,
        sign_in_url: impl Into<String>,
    ) -> Self {
        let session = session::hydrate(storage.as_ref());
        if let Some(username) = session.username() {
            info!("restored session for {}", username);
        }

        let (state, _) = watch::channel(StoreState {
            session,
            ..StoreState::default()
        });

        CollectionStore {
            state,
            backend,
            storage,
            sign_in_url: sign_in_url.into(),
            collections_seq: RequestSeq::default(),
            cards_seq: RequestSeq::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.state.borrow().collections.clone()
    }

    pub fn selected_collection_id(&self) -> Option<String> {
        self.state.borrow().selected_collection_id.clone()
    }

    pub fn pending_collection_id(&self) -> Option<String> {
        self.state.borrow().pending_collection_id.clone()
    }

    pub fn selected_collection(&self) -> Option<Collection> {
        let state = self.state.borrow();
        let selected = state.selected_collection_id.as_deref()?;
        state
            .collections
            .iter()
            .find(|collection| collection.has_server_id(selected))
            .cloned()
    }

    pub fn cards(&self) -> Vec<Card> {
        self.state.borrow().cards.clone()
    }

    pub fn card(&self, card_id: &str) -> Option<Card> {
        self.state
            .borrow()
            .cards
            .iter()
            .find(|card| card.id == card_id)
            .cloned()
    }

    /// Copies owned in the selected collection.
    pub fn card_count(&self) -> u32 {
        self.state.borrow().cards.iter().map(Card::quantity).sum()
    }

    /// Value of the selected collection; unpriced cards count as zero.
    pub fn total_price(&self) -> f64 {
        self.state
            .borrow()
            .cards
            .iter()
            .filter_map(|card| card.price.map(|price| price * f64::from(card.quantity())))
            .sum()
    }

    pub fn filter_cards(&self, query: &str) -> Vec<Card> {
        card_filter::filter_cards(&self.state.borrow().cards, query)
    }

    /// Where the user has to go to sign in. Completion arrives through
    /// [`CollectionStore::consume_callback`].
    pub fn sign_in(&self) -> &str {
        info!("sign in at {}", self.sign_in_url);
        &self.sign_in_url
    }

    /// Stores a fresh identity. Data loaded for a previous user is dropped.
    pub fn complete_sign_in(&self, token: &str, username: &str, user_id: &str) -> StoreResult<()> {
        let (token, username, user_id) = (token.trim(), username.trim(), user_id.trim());
        if token.is_empty() || username.is_empty() || user_id.is_empty() {
            return Err(StoreError::InvalidCallback(
                "token, username and id must all be present".to_string(),
            ));
        }

        let identity = Identity {
            token: token.to_string(),
            username: username.to_string(),
            user_id: Some(user_id.to_string()),
        };
        if self.state.borrow().session.identity() == Some(&identity) {
            debug!("sign-in for {} already applied", identity.username);
            return Ok(());
        }

        session::persist(self.storage.as_ref(), &identity)?;
        info!("signed in as {}", identity.username);

        self.state.send_modify(|state| {
            self.collections_seq.invalidate();
            self.cards_seq.invalidate();
            *state = StoreState {
                session: Session::SignedIn(identity),
                ..StoreState::default()
            };
        });
        Ok(())
    }

    /// Completes sign-in from the identity provider's redirect. Returns the
    /// redirect with the credentials removed, or `None` when `callback_url`
    /// carries no credentials at all.
    pub fn consume_callback(&self, callback_url: &str) -> StoreResult<Option<Url>> {
        let url = Url::parse(callback_url)
            .map_err(|err| StoreError::InvalidCallback(err.to_string()))?;

        let params = CallbackParams::from_url(&url);
        if params.is_empty() {
            return Ok(None);
        }

        match params {
            CallbackParams {
                token: Some(token),
                username: Some(username),
                user_id: Some(user_id),
            } => {
                self.complete_sign_in(&token, &username, &user_id)?;
                Ok(Some(session::strip_callback_params(&url)))
            }
            _ => Err(StoreError::InvalidCallback(
                "callback is missing token, username or id".to_string(),
            )),
        }
    }

    /// Forgets the identity and everything loaded for it. In-flight fetches
    /// are superseded, so they cannot repopulate the cleared state.
    pub fn sign_out(&self) -> StoreResult<()> {
        self.state.send_modify(|state| {
            self.collections_seq.invalidate();
            self.cards_seq.invalidate();
            *state = StoreState::default();
        });
        info!("signed out");

        session::clear(self.storage.as_ref())?;
        Ok(())
    }

    fn token(&self) -> StoreResult<String> {
        self.state
            .borrow()
            .session
            .token()
            .map(str::to_string)
            .ok_or(StoreError::SignedOut)
    }

    fn user_credentials(&self) -> StoreResult<(String, String)> {
        let state = self.state.borrow();
        let identity = state.session.identity().ok_or(StoreError::SignedOut)?;
        let user_id = identity.user_id.clone().ok_or(StoreError::MissingUserId)?;
        Ok((identity.token.clone(), user_id))
    }

    fn selected_or_err(&self) -> StoreResult<String> {
        self.selected_collection_id().ok_or(StoreError::NoSelection)
    }

    /// Runs `apply` only while `ticket` is still the newest request of `seq`.
    /// The check and the write happen under the same lock.
    fn apply_if_current(
        &self,
        seq: &RequestSeq,
        ticket: Ticket,
        apply: impl FnOnce(&mut StoreState),
    ) -> Outcome {
        let applied = self.state.send_if_modified(|state| {
            if !seq.is_current(ticket) {
                return false;
            }
            apply(state);
            true
        });

        if applied {
            Outcome::Applied
        } else {
            Outcome::Superseded
        }
    }

    /// Collections that exist on the server only; pending ids are rejected.
    fn persisted_collection(&self, collection_id: &str) -> StoreResult<()> {
        let state = self.state.borrow();
        let found = state
            .collections
            .iter()
            .find(|collection| collection.id.as_str() == collection_id);

        match found.map(|collection| &collection.id) {
            Some(CollectionId::Persisted(_)) => Ok(()),
            Some(CollectionId::Pending(_)) => {
                Err(StoreError::PendingCollection(collection_id.to_string()))
            }
            None => Err(StoreError::UnknownCollection(collection_id.to_string())),
        }
    }

    /// Ids not in the list are left for the server to judge.
    fn reject_pending(&self, collection_id: &str) -> StoreResult<()> {
        match self.persisted_collection(collection_id) {
            Err(StoreError::UnknownCollection(_)) => Ok(()),
            other => other,
        }
    }

    fn clear_selection(&self) {
        self.state.send_if_modified(|state| {
            self.cards_seq.invalidate();
            let changed = state.selected_collection_id.is_some()
                || state.pending_collection_id.is_some()
                || !state.cards.is_empty();

            state.selected_collection_id = None;
            state.pending_collection_id = None;
            state.cards.clear();
            changed
        });
    }

    /// Replaces the collection list with the server's. Collections still
    /// being created stay at the end of the list. A list fetched before a
    /// local create, rename or delete committed is discarded.
    pub async fn load_collections(&self) -> StoreResult<Outcome> {
        let (token, user_id) = self.user_credentials()?;
        let ticket = self.collections_seq.begin();

        let fetched = logged(
            self.backend.list_collections(&token, &user_id).await,
            "load collections",
        )?;
        let fetched: Vec<Collection> = fetched
            .into_iter()
            .unique_by(|collection| collection.id.clone())
            .collect();
        let count = fetched.len();

        let outcome = self.apply_if_current(&self.collections_seq, ticket, |state| {
            let pending: Vec<Collection> = state
                .collections
                .drain(..)
                .filter(|collection| collection.id.is_pending())
                .collect();
            state.collections = fetched;
            state.collections.extend(pending);
        });

        match outcome {
            Outcome::Applied => info!("loaded {} collections", count),
            Outcome::Superseded => debug!("discarded stale collection list"),
        }
        Ok(outcome)
    }

    /// Creates a collection. A placeholder with a pending id is listed
    /// immediately and swapped for the server's record once it answers.
    pub async fn add_collection(&self, name: &str) -> StoreResult<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let (token, user_id) = self.user_credentials()?;

        let placeholder = Collection::pending(name);
        let pending_id = placeholder.id.clone();
        self.state.send_modify(|state| {
            self.collections_seq.invalidate();
            state.collections.push(placeholder);
        });

        match self.backend.create_collection(&token, &user_id, name).await {
            Ok(created) => {
                let saved = created.clone();
                self.state.send_if_modified(|state| {
                    self.collections_seq.invalidate();
                    let Some(index) = state
                        .collections
                        .iter()
                        .position(|collection| collection.id == pending_id)
                    else {
                        return false;
                    };

                    if state.collections.iter().any(|collection| collection.id == saved.id) {
                        state.collections.remove(index);
                    } else {
                        state.collections[index] = saved;
                    }
                    true
                });

                info!("created collection {} ({})", created.name, created.id);
                Ok(created)
            }
            Err(err) => {
                warn!("failed to create collection {:?}: {}", name, err);
                self.state.send_if_modified(|state| {
                    let before = state.collections.len();
                    state.collections.retain(|collection| collection.id != pending_id);
                    state.collections.len() != before
                });
                Err(err.into())
            }
        }
    }

    /// Renames after the server confirms.
    pub async fn rename_collection(&self, collection_id: &str, name: &str) -> StoreResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        self.persisted_collection(collection_id)?;
        let (token, user_id) = self.user_credentials()?;

        logged(
            self.backend
                .rename_collection(&token, &user_id, collection_id, name)
                .await,
            "rename collection",
        )?;

        self.state.send_if_modified(|state| {
            self.collections_seq.invalidate();
            match state
                .collections
                .iter_mut()
                .find(|collection| collection.has_server_id(collection_id))
            {
                Some(collection) => {
                    collection.name = name.to_string();
                    true
                }
                None => false,
            }
        });
        info!("renamed collection {} to {:?}", collection_id, name);
        Ok(())
    }

    /// Deletes after the server confirms. Deleting the selected collection
    /// clears the selection.
    pub async fn remove_collection(&self, collection_id: &str) -> StoreResult<()> {
        self.persisted_collection(collection_id)?;
        let (token, user_id) = self.user_credentials()?;

        logged(
            self.backend
                .delete_collection(&token, &user_id, collection_id)
                .await,
            "delete collection",
        )?;

        self.state.send_modify(|state| {
            self.collections_seq.invalidate();
            state
                .collections
                .retain(|collection| !collection.has_server_id(collection_id));

            let shown = state.selected_collection_id.as_deref() == Some(collection_id)
                || state.pending_collection_id.as_deref() == Some(collection_id);
            if shown {
                self.cards_seq.invalidate();
                state.selected_collection_id = None;
                state.pending_collection_id = None;
                state.cards.clear();
            }
        });
        info!("deleted collection {}", collection_id);
        Ok(())
    }

    /// Selecting the collection that is already selected (or loading)
    /// deselects it; `None` always deselects.
    pub async fn select_collection(&self, collection_id: Option<&str>) -> StoreResult<Outcome> {
        let Some(collection_id) = collection_id else {
            self.clear_selection();
            return Ok(Outcome::Applied);
        };

        let current = {
            let state = self.state.borrow();
            state
                .pending_collection_id
                .clone()
                .or_else(|| state.selected_collection_id.clone())
        };
        if current.as_deref() == Some(collection_id) {
            info!("deselected collection {}", collection_id);
            self.clear_selection();
            return Ok(Outcome::Applied);
        }

        self.load_cards_for_collection(collection_id).await
    }

    /// Fetches the cards of `collection_id` and makes it the selection. The
    /// previous selection and its cards stay visible until the fetch succeeds.
    pub async fn load_cards_for_collection(&self, collection_id: &str) -> StoreResult<Outcome> {
        self.reject_pending(collection_id)?;
        let (token, user_id) = self.user_credentials()?;

        let ticket = self.cards_seq.begin();
        self.apply_if_current(&self.cards_seq, ticket, |state| {
            state.pending_collection_id = Some(collection_id.to_string());
        });

        match self
            .backend
            .get_collection_cards(&token, &user_id, collection_id)
            .await
        {
            Ok(cards) => {
                let count = cards.len();
                let outcome = self.apply_if_current(&self.cards_seq, ticket, |state| {
                    state.selected_collection_id = Some(collection_id.to_string());
                    state.pending_collection_id = None;
                    state.cards = cards;
                });

                match outcome {
                    Outcome::Applied => {
                        info!("selected collection {} with {} cards", collection_id, count)
                    }
                    Outcome::Superseded => {
                        debug!("discarded stale cards for collection {}", collection_id)
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!("failed to load cards for collection {}: {}", collection_id, err);
                self.apply_if_current(&self.cards_seq, ticket, |state| {
                    state.pending_collection_id = None;
                });
                Err(err.into())
            }
        }
    }

    /// Local insert into the visible list; replaces a card with the same id.
    pub fn add_card(&self, card: Card) {
        self.state.send_modify(|state| upsert_card(&mut state.cards, card));
    }

    /// Removes the card right away and puts it back at its old position if
    /// the server refuses.
    pub async fn remove_card(&self, card_id: &str) -> StoreResult<()> {
        let token = self.token()?;
        let collection_id = self.selected_or_err()?;

        let mut removed = None;
        self.state.send_if_modified(|state| {
            match state.cards.iter().position(|card| card.id == card_id) {
                Some(index) => {
                    removed = Some((index, state.cards.remove(index)));
                    true
                }
                None => false,
            }
        });
        let Some((index, card)) = removed else {
            return Err(StoreError::UnknownCard(card_id.to_string()));
        };

        let request = RemoveCardRequest {
            card_id: card_id.to_string(),
            collection_id: collection_id.clone(),
        };
        match self
            .backend
            .remove_card_from_collection(&token, &request)
            .await
        {
            Ok(()) => {
                info!("removed card {} from collection {}", card_id, collection_id);
                Ok(())
            }
            Err(err) => {
                warn!("failed to remove card {}, restoring it: {}", card_id, err);
                self.state.send_if_modified(|state| {
                    let same_view =
                        state.selected_collection_id.as_deref() == Some(collection_id.as_str());
                    if !same_view || state.cards.iter().any(|existing| existing.id == card.id) {
                        return false;
                    }
                    let index = index.min(state.cards.len());
                    state.cards.insert(index, card);
                    true
                });
                Err(err.into())
            }
        }
    }

    /// Adds a printing to the selected collection and shows the stored record.
    pub async fn add_card_to_selected(
        &self,
        card_name: &str,
        card_set: &str,
        collector_number: &str,
    ) -> StoreResult<Card> {
        let token = self.token()?;
        let collection_id = self.selected_or_err()?;

        let request = AddCardRequest {
            collection_id: collection_id.clone(),
            card_name: card_name.to_string(),
            card_set: card_set.to_string(),
            collector_number: collector_number.to_string(),
        };
        let card = logged(
            self.backend.add_card_to_collection(&token, &request).await,
            "add card",
        )?;

        let shown = card.clone();
        self.state.send_if_modified(|state| {
            if state.selected_collection_id.as_deref() != Some(collection_id.as_str()) {
                return false;
            }
            upsert_card(&mut state.cards, shown);
            true
        });
        info!("added {} to collection {}", card.name, collection_id);
        Ok(card)
    }

    /// Switches a card to another printing. The record the server returns is
    /// authoritative: it replaces the old entry in place, or is merged into
    /// an entry that already has its id.
    pub async fn change_card_print(&self, card_id: &str, new_print_id: &str) -> StoreResult<Card> {
        let token = self.token()?;
        let collection_id = self.selected_or_err()?;
        if self.card(card_id).is_none() {
            return Err(StoreError::UnknownCard(card_id.to_string()));
        }

        let request = UpdatePrintRequest {
            card_id: card_id.to_string(),
            new_print_id: new_print_id.to_string(),
            collection_id: collection_id.clone(),
        };
        let updated = logged(
            self.backend.update_card_print(&token, &request).await,
            "change card print",
        )?;

        let shown = updated.clone();
        self.state.send_if_modified(|state| {
            if state.selected_collection_id.as_deref() != Some(collection_id.as_str()) {
                return false;
            }
            let Some(index) = state.cards.iter().position(|card| card.id == card_id) else {
                return false;
            };

            let duplicate = state
                .cards
                .iter()
                .position(|card| card.id == shown.id)
                .filter(|&existing| existing != index);
            match duplicate {
                Some(existing) => {
                    state.cards[existing] = shown;
                    state.cards.remove(index);
                }
                None => state.cards[index] = shown,
            }
            true
        });
        info!("card {} is now print {}", card_id, updated.id);
        Ok(updated)
    }

    /// Fetches the rulings of a loaded card and keeps them on the card.
    pub async fn load_rulings(&self, card_id: &str) -> StoreResult<Vec<String>> {
        let rulings_uri = self
            .card(card_id)
            .ok_or_else(|| StoreError::UnknownCard(card_id.to_string()))?
            .rulings_uri;

        let rulings = match rulings_uri {
            Some(uri) => self.backend.get_rulings(&uri).await,
            None => Vec::new(),
        };

        self.state.send_if_modified(|state| {
            match state.cards.iter_mut().find(|card| card.id == card_id) {
                Some(card) => {
                    card.rulings = Some(rulings.clone());
                    true
                }
                None => false,
            }
        });
        Ok(rulings)
    }

    pub async fn search_cards(&self, query: &str) -> StoreResult<Vec<Card>> {
        logged(self.backend.search_cards(query).await, "search cards")
    }

    pub async fn fetch_prints(&self, card_name: &str) -> StoreResult<Vec<Card>> {
        logged(self.backend.fetch_prints(card_name).await, "fetch prints")
    }

    pub async fn random_card(&self) -> StoreResult<Card> {
        logged(self.backend.fetch_random_card().await, "fetch a random card")
    }
}
