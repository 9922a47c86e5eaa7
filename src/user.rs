//! The signed-in identity.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Session identity returned by `/login` and by the socket handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    username: String,
    #[serde(default, deserialize_with = "text_or_none")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "text_or_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub libraries: BTreeSet<String>,
}

/// Partial update for a [`User`]; `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Option<BTreeSet<String>>,
    #[serde(default)]
    pub libraries: Option<BTreeSet<String>>,
    /// Only sent to the server by `WrangleBot::save_user`; never stored locally.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Result<Self> {
        let username = username.into();
        if username.is_empty() {
            return Err(Error::MissingUsername);
        }
        Ok(Self {
            username,
            first_name: None,
            last_name: None,
            email: None,
            roles: BTreeSet::new(),
            libraries: BTreeSet::new(),
        })
    }

    /// Builds a user from a server payload such as `{token, username, roles, ...}`.
    ///
    /// Unknown fields are ignored; a missing or empty `username` fails.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value.get("username").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {}
            _ => return Err(Error::MissingUsername),
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// First character of the username, for avatars and the like.
    pub fn short_code(&self) -> String {
        self.username.chars().take(1).collect()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn has_library(&self, library: &str) -> bool {
        self.libraries.contains(library)
    }

    pub fn update(&mut self, update: UserUpdate) {
        if let Some(first_name) = update.first_name {
            self.first_name = Some(first_name);
        }
        if let Some(last_name) = update.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
        if let Some(roles) = update.roles {
            self.roles = roles;
        }
        if let Some(libraries) = update.libraries {
            self.libraries = libraries;
        }
    }
}

/// `null` reads as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keeps string values only; anything else reads as absent.
fn text_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}
