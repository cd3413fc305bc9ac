//! CDN asset references (avatars, banners).
//!
//! # Design
//! An `Asset` carries the CDN root it was built against instead of a handle to
//! the client, so models stay plain values with no back-reference cycle.

use std::fmt;
use std::sync::Arc;

use crate::error::ApiError;
use crate::snowflake::Snowflake;

/// Public CDN host.
pub const CDN_URL: &str = "https://cdn.discordapp.com";

/// Number of built-in default avatars selected by discriminator.
pub const DEFAULT_AVATAR_COUNT: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    cdn: Arc<str>,
    /// Hash for custom assets, the index for default avatars.
    key: String,
    path: String,
    animated: bool,
    format: ImageFormat,
    size: Option<u16>,
}

impl Asset {
    pub fn from_user_avatar(cdn: Arc<str>, user_id: Snowflake, hash: &str) -> Self {
        Self::custom(cdn, format!("avatars/{user_id}/{hash}"), hash, 1024)
    }

    pub fn from_default_user_avatar(cdn: Arc<str>, index: u64) -> Self {
        let index = index % DEFAULT_AVATAR_COUNT;
        Self {
            cdn,
            key: index.to_string(),
            path: format!("embed/avatars/{index}"),
            animated: false,
            format: ImageFormat::Png,
            size: None,
        }
    }

    pub fn from_user_banner(cdn: Arc<str>, user_id: Snowflake, hash: &str) -> Self {
        Self::custom(cdn, format!("banners/{user_id}/{hash}"), hash, 512)
    }

    fn custom(cdn: Arc<str>, path: String, hash: &str, size: u16) -> Self {
        let animated = hash.starts_with("a_");
        Self {
            cdn,
            key: hash.to_string(),
            path,
            animated,
            format: if animated {
                ImageFormat::Gif
            } else {
                ImageFormat::Png
            },
            size: Some(size),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn url(&self) -> String {
        let base = format!(
            "{}/{}.{}",
            self.cdn.trim_end_matches('/'),
            self.path,
            self.format.extension()
        );
        match self.size {
            Some(size) => format!("{base}?size={size}"),
            None => base,
        }
    }

    /// Size must be a power of two between 16 and 4096.
    pub fn with_size(&self, size: u16) -> Result<Self, ApiError> {
        if !size.is_power_of_two() || !(16..=4096).contains(&size) {
            return Err(ApiError::InvalidArgument(format!(
                "asset size must be a power of 2 between 16 and 4096, got {size}"
            )));
        }
        Ok(Self {
            size: Some(size),
            ..self.clone()
        })
    }

    pub fn with_format(&self, format: ImageFormat) -> Result<Self, ApiError> {
        if format == ImageFormat::Gif && !self.animated {
            return Err(ApiError::InvalidArgument(
                "non-animated assets cannot be rendered as gif".to_string(),
            ));
        }
        Ok(Self {
            format,
            ..self.clone()
        })
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
