//! Token and identity shared by the façade and the connection manager.

use tokio::sync::RwLock;

use crate::user::{User, UserUpdate};

#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<String>>,
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
            user: RwLock::new(None),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn set_user(&self, user: Option<User>) {
        *self.user.write().await = user;
    }

    /// Merges `update` into the current identity; returns false if there is none.
    pub async fn update_user(&self, update: UserUpdate) -> bool {
        match self.user.write().await.as_mut() {
            Some(user) => {
                user.update(update);
                true
            }
            None => false,
        }
    }

    /// Forgets both the token and the identity.
    pub async fn clear(&self) {
        self.set_token(None).await;
        self.set_user(None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_requires_identity() {
        let session = Session::default();
        assert!(!session.update_user(UserUpdate::default()).await);

        session.set_user(Some(User::new("admin").unwrap())).await;
        let update = UserUpdate {
            email: Some("a@b.c".into()),
            ..UserUpdate::default()
        };
        assert!(session.update_user(update).await);
        assert_eq!(session.user().await.unwrap().email.as_deref(), Some("a@b.c"));
    }

    #[tokio::test]
    async fn clear_forgets_everything() {
        let session = Session::with_token(Some("t".into()));
        session.set_user(Some(User::new("admin").unwrap())).await;
        session.clear().await;
        assert!(session.token().await.is_none());
        assert!(session.user().await.is_none());
    }
}
