//! The `User` model.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::Asset;
use crate::client::HttpClient;
use crate::error::ApiError;
use crate::snowflake::Snowflake;

/// Account flag bitfield. `UserFlags::NONE` is the value for absent flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserFlags(u64);

impl UserFlags {
    pub const NONE: Self = Self(0);
    pub const STAFF: Self = Self(1 << 0);
    pub const PARTNER: Self = Self(1 << 1);
    pub const HYPESQUAD: Self = Self(1 << 2);
    pub const BUG_HUNTER_LEVEL_1: Self = Self(1 << 3);
    pub const HYPESQUAD_ONLINE_HOUSE_1: Self = Self(1 << 6);
    pub const HYPESQUAD_ONLINE_HOUSE_2: Self = Self(1 << 7);
    pub const HYPESQUAD_ONLINE_HOUSE_3: Self = Self(1 << 8);
    pub const PREMIUM_EARLY_SUPPORTER: Self = Self(1 << 9);
    pub const TEAM_PSEUDO_USER: Self = Self(1 << 10);
    pub const BUG_HUNTER_LEVEL_2: Self = Self(1 << 14);
    pub const VERIFIED_BOT: Self = Self(1 << 16);
    pub const VERIFIED_DEVELOPER: Self = Self(1 << 17);
    pub const CERTIFIED_MODERATOR: Self = Self(1 << 18);
    pub const BOT_HTTP_INTERACTIONS: Self = Self(1 << 19);
    pub const ACTIVE_DEVELOPER: Self = Self(1 << 22);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for UserFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Paid subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum PremiumType {
    #[default]
    None,
    NitroClassic,
    Nitro,
    NitroBasic,
    Unknown(u8),
}

impl From<u8> for PremiumType {
    fn from(raw: u8) -> Self {
        match raw {
            0 => PremiumType::None,
            1 => PremiumType::NitroClassic,
            2 => PremiumType::Nitro,
            3 => PremiumType::NitroBasic,
            other => PremiumType::Unknown(other),
        }
    }
}

impl From<PremiumType> for u8 {
    fn from(kind: PremiumType) -> Self {
        match kind {
            PremiumType::None => 0,
            PremiumType::NitroClassic => 1,
            PremiumType::Nitro => 2,
            PremiumType::NitroBasic => 3,
            PremiumType::Unknown(raw) => raw,
        }
    }
}

#[derive(Deserialize)]
struct RawUser {
    id: Snowflake,
    username: String,
    discriminator: String,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default)]
    bot: bool,
    #[serde(default)]
    mfa_enabled: bool,
    #[serde(default)]
    banner: Option<String>,
    #[serde(default)]
    accent_color: Option<u32>,
    #[serde(default)]
    flags: UserFlags,
    #[serde(default)]
    premium_type: PremiumType,
    #[serde(default)]
    public_flags: UserFlags,
}

/// Wire shape written by [`User::to_value`]. Absent optionals are omitted.
#[derive(Serialize)]
struct WireUser<'a> {
    id: Snowflake,
    username: &'a str,
    discriminator: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<&'a str>,
    bot: bool,
    mfa_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    banner: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accent_color: Option<u32>,
    flags: UserFlags,
    premium_type: PremiumType,
    public_flags: UserFlags,
}

/// A platform account.
///
/// Values are built once by [`User::from_value`] and never change afterwards;
/// fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: Snowflake,
    name: String,
    discriminator: String,
    avatar_hash: Option<String>,
    avatar: Asset,
    bot: bool,
    mfa_enabled: bool,
    banner_hash: Option<String>,
    banner: Option<Asset>,
    accent_color: Option<u32>,
    flags: UserFlags,
    premium_type: PremiumType,
    public_flags: UserFlags,
}

impl User {
    /// Builds a user from a raw JSON object returned by the API.
    ///
    /// Missing `bot`/`mfa_enabled` read as false and missing flags as
    /// `UserFlags::NONE`. Without an avatar hash the avatar is the default
    /// one selected by the discriminator.
    pub fn from_value(client: &HttpClient, value: &Value) -> Result<Self, ApiError> {
        Self::from_value_with_cdn(client.cdn(), value)
    }

    pub(crate) fn from_value_with_cdn(cdn: Arc<str>, value: &Value) -> Result<Self, ApiError> {
        let raw = RawUser::deserialize(value).map_err(ApiError::decode)?;
        let discriminator_index: u64 = raw.discriminator.parse().map_err(|_| {
            ApiError::Decode(format!("invalid discriminator {:?}", raw.discriminator))
        })?;

        let avatar = match raw.avatar.as_deref() {
            Some(hash) if !hash.is_empty() => Asset::from_user_avatar(Arc::clone(&cdn), raw.id, hash),
            _ => Asset::from_default_user_avatar(Arc::clone(&cdn), discriminator_index),
        };
        let banner = raw
            .banner
            .as_deref()
            .filter(|hash| !hash.is_empty())
            .map(|hash| Asset::from_user_banner(cdn, raw.id, hash));

        Ok(Self {
            id: raw.id,
            name: raw.username,
            discriminator: raw.discriminator,
            avatar_hash: raw.avatar.filter(|h| !h.is_empty()),
            avatar,
            bot: raw.bot,
            mfa_enabled: raw.mfa_enabled,
            banner_hash: raw.banner.filter(|h| !h.is_empty()),
            banner,
            accent_color: raw.accent_color,
            flags: raw.flags,
            premium_type: raw.premium_type,
            public_flags: raw.public_flags,
        })
    }

    /// Serializes back to the wire mapping, leaving out absent optionals.
    pub fn to_value(&self) -> Result<Value, ApiError> {
        let wire = WireUser {
            id: self.id,
            username: &self.name,
            discriminator: &self.discriminator,
            avatar: self.avatar_hash.as_deref(),
            bot: self.bot,
            mfa_enabled: self.mfa_enabled,
            banner: self.banner_hash.as_deref(),
            accent_color: self.accent_color,
            flags: self.flags,
            premium_type: self.premium_type,
            public_flags: self.public_flags,
        };
        serde_json::to_value(wire).map_err(|e| ApiError::Encode(e.to_string()))
    }

    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn avatar(&self) -> &Asset {
        &self.avatar
    }

    /// The custom avatar hash, if the user set one.
    pub fn avatar_hash(&self) -> Option<&str> {
        self.avatar_hash.as_deref()
    }

    pub fn is_bot(&self) -> bool {
        self.bot
    }

    pub fn mfa_enabled(&self) -> bool {
        self.mfa_enabled
    }

    pub fn banner(&self) -> Option<&Asset> {
        self.banner.as_ref()
    }

    pub fn accent_color(&self) -> Option<u32> {
        self.accent_color
    }

    pub fn flags(&self) -> UserFlags {
        self.flags
    }

    pub fn premium_type(&self) -> PremiumType {
        self.premium_type
    }

    pub fn public_flags(&self) -> UserFlags {
        self.public_flags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.id.created_at()
    }

    /// Text that mentions this user in a message.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// `name#discriminator`.
    pub fn tag(&self) -> String {
        format!("{}#{}", self.name, self.discriminator)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.discriminator)
    }
}
