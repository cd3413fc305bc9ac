//! Async REST client core for the chat platform API.
//!
//! # Overview
//! A `Route` pins one API call to a method, an encoded path and an API
//! version. `HttpClient` turns routes into HTTP requests, executes them on a
//! shared connection pool and classifies the responses. Endpoint methods on
//! `HttpClient` (see [`endpoints`]) wrap one remote operation each, and the
//! [`models`] factories turn decoded JSON into typed values.
//!
//! # Design
//! - Building a request and parsing a response are pure functions; only
//!   `HttpClient::send` performs I/O.
//! - Optional parameters use [`MaybeUnset`] so "omit" and "send null" stay
//!   distinct.
//! - Models have private fields and are only built through `from_value`.
//! - The crate emits `tracing` events but never installs a subscriber.

pub mod asset;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod models;
pub mod route;
pub mod snowflake;
pub mod unset;

pub use asset::{Asset, ImageFormat};
pub use client::{ApiResponse, HttpClient, RequestOptions};
pub use config::ClientConfig;
pub use endpoints::{GetInviteParams, ModifyCurrentUser};
pub use error::{ApiError, ConfigError, ErrorBody, ErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use models::{Invite, PremiumType, User, UserFlags};
pub use route::{ApiVersion, Route};
pub use snowflake::Snowflake;
pub use unset::{MaybeUnset, QueryBuilder};
