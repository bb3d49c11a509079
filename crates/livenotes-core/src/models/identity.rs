//! Signed-in principal

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const FALLBACK_FIRST_NAME: &str = "there";
const FALLBACK_DISPLAY_NAME: &str = "User";
const UNKNOWN_MEMBER_SINCE: &str = "Unknown";

/// Opaque, stable identifier of an identity as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IdentityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The authenticated principal.
///
/// Every attribute besides `id` comes from the identity provider and may be
/// missing, so all of them are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Account creation time (Unix ms)
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl Identity {
    /// Identity carrying only an identifier.
    pub fn new(id: impl Into<IdentityId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            avatar_url: None,
            created_at: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    #[must_use]
    pub const fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// First word of the display name, if there is one.
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
    }

    /// Short greeting line, e.g. `Hello, Ada`.
    pub fn greeting(&self) -> String {
        format!("Hello, {}", self.first_name().unwrap_or(FALLBACK_FIRST_NAME))
    }

    pub fn display_name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(FALLBACK_DISPLAY_NAME)
    }

    /// Account age rendered as `<Month> <YYYY>` in UTC, or `Unknown`.
    pub fn member_since(&self) -> String {
        self.member_since_in(&Utc)
    }

    pub fn member_since_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        self.created_at
            .and_then(DateTime::from_timestamp_millis)
            .map_or_else(
                || UNKNOWN_MEMBER_SINCE.to_string(),
                |created| created.with_timezone(tz).format("%B %Y").to_string(),
            )
    }
}
