/// Signed-in user as delivered by the identity provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub token: String,
    pub username: String,
    pub user_id: Option<String>,
}

/// `SignedIn` always carries a token, so "authenticated" and "has a token" cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    SignedOut,
    SignedIn(Identity),
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::SignedIn(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::SignedIn(identity) => Some(identity),
            Session::SignedOut => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.identity().map(|identity| identity.token.as_str())
    }

    pub fn username(&self) -> Option<&str> {
        self.identity().map(|identity| identity.username.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity().and_then(|identity| identity.user_id.as_deref())
    }
}
