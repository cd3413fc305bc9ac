//! One method per remote operation.
//!
//! # Design
//! Endpoints are inherent methods on [`HttpClient`](crate::HttpClient), split
//! by resource. Each raw method builds a `Route`, marshals its parameters and
//! returns the decoded `ApiResponse`. The `fetch_*` / `edit_*` variants feed
//! that response to the matching model factory.
//!
//! Optional parameters are `MaybeUnset`: unset ones are never transmitted.

pub mod invite;
pub mod user;

pub use invite::GetInviteParams;
pub use user::ModifyCurrentUser;
