//! OAuth implicit flow helpers: building the authorization dialog URL and
//! reading the access token back from the URL the user is redirected to.

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    #[serde(default = "default_dialog_url")]
    pub dialog_url: Url,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scope")]
    pub scope: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dialog_url: default_dialog_url(),
            client_id: default_client_id(),
            redirect_uri: default_redirect_uri(),
            scope: default_scope(),
        }
    }
}

fn default_dialog_url() -> Url {
    Url::parse("https://stackoverflow.com/oauth/dialog").unwrap()
}

fn default_client_id() -> String {
    String::from("25628")
}

fn default_redirect_uri() -> String {
    String::from("https://stackexchange.com")
}

fn default_scope() -> String {
    String::from("no_expiry")
}

pub fn authorize_url(config: &AuthConfig) -> Url {
    let mut url = config.dialog_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scope);
    url
}

/// Extracts `access_token` from a redirect URL, looking at the fragment first
/// and then at the query string.
///
/// Input that isn't a URL is read as a bare `key=value&...` parameter list.
pub fn token_from_redirect(redirect: &str) -> Option<String> {
    let redirect = redirect.trim();
    let candidates = match Url::parse(redirect) {
        Ok(url) => vec![
            url.fragment().map(String::from),
            url.query().map(String::from),
        ],
        Err(_) => vec![Some(redirect.trim_start_matches('#').to_string())],
    };

    candidates.into_iter().flatten().find_map(|params| {
        form_urlencoded::parse(params.as_bytes())
            .find(|(k, _)| k == "access_token")
            .map(|(_, v)| v.into_owned())
            .filter(|token| !token.is_empty())
    })
}
