pub mod card;
pub mod collection;
pub mod session;
mod wire;

pub use card::{mana_symbols, Card, CardPayload, MembershipPayload, NOT_AVAILABLE};
pub use collection::{Collection, CollectionId, CollectionPayload};
pub use session::{Identity, Session};
