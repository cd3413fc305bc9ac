//! The `Invite` model.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::client::HttpClient;
use crate::error::ApiError;
use crate::models::User;
use crate::snowflake::Snowflake;

/// Public host for shareable invite links.
pub const INVITE_URL: &str = "https://discord.gg";

#[derive(Deserialize)]
struct RawInvite {
    code: String,
    #[serde(default)]
    guild: Option<RawPartial>,
    #[serde(default)]
    channel: Option<RawPartial>,
    #[serde(default)]
    inviter: Option<Value>,
    #[serde(default)]
    approximate_member_count: Option<u64>,
    #[serde(default)]
    approximate_presence_count: Option<u64>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawPartial {
    id: Snowflake,
    #[serde(default)]
    name: Option<String>,
}

/// An invite code and the guild/channel it leads to.
///
/// Member counts are only present when requested with `with_counts`, and the
/// expiry only with `with_expiration`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    code: String,
    guild_id: Option<Snowflake>,
    guild_name: Option<String>,
    channel_id: Option<Snowflake>,
    channel_name: Option<String>,
    inviter: Option<User>,
    approximate_member_count: Option<u64>,
    approximate_presence_count: Option<u64>,
    expires_at: Option<DateTime<Utc>>,
}

impl Invite {
    pub fn from_value(client: &HttpClient, value: &Value) -> Result<Self, ApiError> {
        Self::from_value_with_cdn(client.cdn(), value)
    }

    pub(crate) fn from_value_with_cdn(cdn: Arc<str>, value: &Value) -> Result<Self, ApiError> {
        let raw = RawInvite::deserialize(value).map_err(ApiError::decode)?;
        let inviter = raw
            .inviter
            .as_ref()
            .map(|v| User::from_value_with_cdn(cdn, v))
            .transpose()?;
        let (guild_id, guild_name) = split_partial(raw.guild);
        let (channel_id, channel_name) = split_partial(raw.channel);

        Ok(Self {
            code: raw.code,
            guild_id,
            guild_name,
            channel_id,
            channel_name,
            inviter,
            approximate_member_count: raw.approximate_member_count,
            approximate_presence_count: raw.approximate_presence_count,
            expires_at: raw.expires_at,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn url(&self) -> String {
        format!("{INVITE_URL}/{}", self.code)
    }

    pub fn guild_id(&self) -> Option<Snowflake> {
        self.guild_id
    }

    pub fn guild_name(&self) -> Option<&str> {
        self.guild_name.as_deref()
    }

    pub fn channel_id(&self) -> Option<Snowflake> {
        self.channel_id
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.channel_name.as_deref()
    }

    pub fn inviter(&self) -> Option<&User> {
        self.inviter.as_ref()
    }

    pub fn approximate_member_count(&self) -> Option<u64> {
        self.approximate_member_count
    }

    pub fn approximate_presence_count(&self) -> Option<u64> {
        self.approximate_presence_count
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

fn split_partial(partial: Option<RawPartial>) -> (Option<Snowflake>, Option<String>) {
    match partial {
        Some(p) => (Some(p.id), p.name),
        None => (None, None),
    }
}
