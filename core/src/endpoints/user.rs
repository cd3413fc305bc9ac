//! User endpoints.

use serde::Serialize;

use crate::client::{ApiResponse, HttpClient, RequestOptions};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::models::User;
use crate::snowflake::Snowflake;
use crate::unset::MaybeUnset;

/// JSON body for [`HttpClient::modify_current_user`].
///
/// `avatar` and `banner` take image data URIs; `MaybeUnset::Null` removes
/// the current image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModifyCurrentUser {
    #[serde(skip_serializing_if = "MaybeUnset::is_unset")]
    pub username: MaybeUnset<String>,
    #[serde(skip_serializing_if = "MaybeUnset::is_unset")]
    pub avatar: MaybeUnset<String>,
    #[serde(skip_serializing_if = "MaybeUnset::is_unset")]
    pub banner: MaybeUnset<String>,
}

impl HttpClient {
    /// `GET /users/@me`
    pub async fn get_current_user(&self) -> Result<ApiResponse, ApiError> {
        let route = self.route(HttpMethod::Get, "/users/@me");
        self.request(&route, RequestOptions::new()).await
    }

    /// `GET /users/{user_id}`
    pub async fn get_user(&self, user_id: Snowflake) -> Result<ApiResponse, ApiError> {
        let user_id = user_id.to_string();
        let route = self.route_with(HttpMethod::Get, "/users/{}", &[user_id.as_str()])?;
        self.request(&route, RequestOptions::new()).await
    }

    /// `PATCH /users/@me`
    pub async fn modify_current_user(
        &self,
        changes: &ModifyCurrentUser,
    ) -> Result<ApiResponse, ApiError> {
        let route = self.route(HttpMethod::Patch, "/users/@me");
        self.request(&route, RequestOptions::new().with_body(changes)?)
            .await
    }

    pub async fn fetch_current_user(&self) -> Result<User, ApiError> {
        let response = self.get_current_user().await?;
        User::from_value(self, &response.data)
    }

    pub async fn fetch_user(&self, user_id: Snowflake) -> Result<User, ApiError> {
        let response = self.get_user(user_id).await?;
        User::from_value(self, &response.data)
    }

    pub async fn edit_current_user(&self, changes: &ModifyCurrentUser) -> Result<User, ApiError> {
        let response = self.modify_current_user(changes).await?;
        User::from_value(self, &response.data)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_changes_serialize_to_empty_object() {
        let body = serde_json::to_value(ModifyCurrentUser::default()).unwrap();
        assert_eq!(body, json!({}));
    }

    #[test]
    fn null_and_values_are_kept_apart() {
        let changes = ModifyCurrentUser {
            username: "nelly".to_string().into(),
            avatar: MaybeUnset::Null,
            banner: MaybeUnset::Unset,
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            json!({ "username": "nelly", "avatar": null })
        );
    }

    #[test]
    fn current_user_route_follows_configured_version() {
        let client = HttpClient::new(
            crate::ClientConfig::default().with_api_version(crate::ApiVersion::V10),
        )
        .unwrap();
        let route = client.route(HttpMethod::Get, "/users/@me");
        assert_eq!(route.url(), "https://discord.com/api/v10/users/@me");
    }
}
