//! Invite endpoints.

use crate::client::{ApiResponse, HttpClient, RequestOptions};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::models::Invite;
use crate::snowflake::Snowflake;
use crate::unset::{MaybeUnset, QueryBuilder};

/// Query parameters for [`HttpClient::get_invite`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetInviteParams {
    /// Include approximate member and presence counts.
    pub with_counts: MaybeUnset<bool>,
    /// Include the expiration date.
    pub with_expiration: MaybeUnset<bool>,
    pub guild_scheduled_event_id: MaybeUnset<Snowflake>,
}

impl GetInviteParams {
    pub fn query(&self) -> Vec<(String, String)> {
        QueryBuilder::new()
            .push("with_counts", &self.with_counts)
            .push("with_expiration", &self.with_expiration)
            .push("guild_scheduled_event_id", &self.guild_scheduled_event_id)
            .build()
    }
}

impl HttpClient {
    /// `GET /invites/{invite_code}`
    pub async fn get_invite(
        &self,
        invite_code: &str,
        params: &GetInviteParams,
    ) -> Result<ApiResponse, ApiError> {
        let route = self.route_with(HttpMethod::Get, "/invites/{}", &[invite_code])?;
        self.request(&route, RequestOptions::new().with_query(params.query()))
            .await
    }

    /// `DELETE /invites/{invite_code}`. The reason lands in the audit log.
    pub async fn delete_invite(
        &self,
        invite_code: &str,
        reason: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let route = self.route_with(HttpMethod::Delete, "/invites/{}", &[invite_code])?;
        self.request(
            &route,
            RequestOptions::new().with_reason(reason.map(str::to_string)),
        )
        .await
    }

    pub async fn fetch_invite(
        &self,
        invite_code: &str,
        params: &GetInviteParams,
    ) -> Result<Invite, ApiError> {
        let response = self.get_invite(invite_code, params).await?;
        Invite::from_value(self, &response.data)
    }
}
