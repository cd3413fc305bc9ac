//! Typed API objects built from raw JSON responses.
//!
//! # Design
//! Each model has a private `Raw*` serde shape for the wire and a public
//! type with private fields. The public type is only produced by its
//! `from_value` factory, which fills defaults and derives computed parts
//! such as CDN assets, so callers never observe a half-built value.

pub mod invite;
pub mod user;

pub use invite::Invite;
pub use user::{PremiumType, User, UserFlags};
