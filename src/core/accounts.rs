//! OAuth account linking.
//!
//! The bot never exchanges OAuth codes itself. The authorization link sends
//! the user to Discord; whatever receives the redirect stores the resulting
//! access token through [`link_access_token`].

use super::records::load_user;
use crate::{
    config::OAuthSettings,
    errors::{Error, Result, TicketResult},
    store::{KeyValueStore, keys},
};
use serde_json::json;
use tracing::{info, instrument};
use url::Url;

const AUTHORIZE_ENDPOINT: &str = "https://discord.com/oauth2/authorize";
const BASE_SCOPES: &str = "identify guilds role_connections.write";
const COMMANDS_SCOPE: &str = "applications.commands";

/// Builds the Discord OAuth2 authorization URL.
///
/// `include_commands_scope` adds `applications.commands`, which lets the
/// user install the app's commands for their own account.
pub fn authorization_url(oauth: &OAuthSettings, include_commands_scope: bool) -> Result<Url> {
    let scope = if include_commands_scope {
        format!("{BASE_SCOPES} {COMMANDS_SCOPE}")
    } else {
        BASE_SCOPES.to_string()
    };
    Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("client_id", oauth.application_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", oauth.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ],
    )
    .map_err(|e| Error::Config {
        message: format!("Invalid OAuth authorization URL: {e}"),
    })
}

/// The user's stored access token, if any.
pub async fn access_token(store: &dyn KeyValueStore, user_id: &str) -> TicketResult<Option<String>> {
    let user = load_user(store, user_id).await?;
    Ok(user.access_token.filter(|token| !token.is_empty()))
}

/// Stores the OAuth access token granted by the user.
///
/// Only `accessToken` is merged; the user's ticket slot is left alone.
#[instrument(skip(store, access_token))]
pub async fn link_access_token(
    store: &dyn KeyValueStore,
    user_id: &str,
    access_token: &str,
) -> TicketResult<()> {
    store
        .update(&keys::user(user_id), json!({ "accessToken": access_token }))
        .await?;
    info!("Linked OAuth access token");
    Ok(())
}

/// Forgets the user's access token, so `/create` asks for authorization again.
#[instrument(skip(store))]
pub async fn unlink_access_token(store: &dyn KeyValueStore, user_id: &str) -> TicketResult<()> {
    store
        .update(&keys::user(user_id), json!({ "accessToken": null }))
        .await?;
    info!("Removed OAuth access token");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_store;

    fn oauth() -> OAuthSettings {
        OAuthSettings {
            application_id: "1453302198086664248".into(),
            redirect_uri: "https://tickets.example.com/callback".into(),
        }
    }

    #[test]
    fn test_authorization_url_scopes() {
        let url = authorization_url(&oauth(), false).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("client_id".into(), "1453302198086664248".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            "https://tickets.example.com/callback".into()
        )));
        assert!(params.contains(&(
            "scope".into(),
            "identify guilds role_connections.write".into()
        )));

        let with_commands = authorization_url(&oauth(), true).unwrap();
        let scope = with_commands
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(scope.ends_with("applications.commands"));
    }

    #[tokio::test]
    async fn test_link_and_unlink_token() -> Result<()> {
        let store = setup_test_store().await?;
        assert_eq!(access_token(&store, "u1").await?, None);

        link_access_token(&store, "u1", "tok-1").await?;
        assert_eq!(access_token(&store, "u1").await?, Some("tok-1".into()));

        unlink_access_token(&store, "u1").await?;
        assert_eq!(access_token(&store, "u1").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_token_counts_as_missing() -> Result<()> {
        let store = setup_test_store().await?;
        link_access_token(&store, "u1", "").await?;
        assert_eq!(access_token(&store, "u1").await?, None);
        Ok(())
    }
}
