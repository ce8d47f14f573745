use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use http::Method;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::signer::{self, percent_encode};
use crate::{
    OAUTH_CONSUMER_KEY, OAUTH_KEY_PREFIX, OAUTH_NONCE_KEY, OAUTH_SIGNATURE_KEY,
    OAUTH_SIGNATURE_METHOD_KEY, OAUTH_TIMESTAMP_KEY, OAUTH_TOKEN_KEY, OAUTH_VERIFIER_KEY,
    OAUTH_VERSION_KEY, REALM_KEY,
};

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LENGTH: usize = 32;

/// Consumer and token secrets used to sign requests.
///
/// The consumer pair is fixed at construction. The token, token secret and
/// verifier are filled in as the handshake progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    consumer_key: String,
    consumer_secret: String,
    #[serde(default)]
    oauth_token: String,
    #[serde(default)]
    oauth_token_secret: String,
    #[serde(default)]
    oauth_verifier: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Credential {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            ..Default::default()
        }
    }

    /// Attach an existing token pair, e.g. an access token persisted earlier.
    pub fn token<TKey, TSecret>(self, token: TKey, token_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Credential {
            oauth_token: token.into(),
            oauth_token_secret: token_secret.into(),
            ..self
        }
    }

    pub fn expires_at(self, expires_at: DateTime<Utc>) -> Self {
        Credential {
            expires_at: Some(expires_at),
            ..self
        }
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }

    pub fn oauth_token(&self) -> &str {
        &self.oauth_token
    }

    pub fn oauth_token_secret(&self) -> &str {
        &self.oauth_token_secret
    }

    pub fn oauth_verifier(&self) -> &str {
        &self.oauth_verifier
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn set_token<TKey, TSecret>(&mut self, token: TKey, token_secret: TSecret)
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        self.oauth_token = token.into();
        self.oauth_token_secret = token_secret.into();
    }

    /// Replace the token only, keeping the current secret.
    pub fn set_oauth_token<T: Into<String>>(&mut self, token: T) {
        self.oauth_token = token.into();
    }

    pub fn set_verifier<T: Into<String>>(&mut self, verifier: T) {
        self.oauth_verifier = verifier.into();
    }

    pub fn set_expires_at(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.expires_at = expires_at;
    }

    /// Drop token, token secret and verifier.
    pub fn clear_token(&mut self) {
        self.oauth_token.clear();
        self.oauth_token_secret.clear();
        self.oauth_verifier.clear();
    }

    /// `true` iff an expiry is set and lies in the past.
    pub fn is_token_expired(&self) -> bool {
        self.expires_at.map_or(false, |at| at < Utc::now())
    }

    /// Returns the signed `oauth_*` parameter set for a request.
    ///
    /// `normalized_url` must already have its query folded into
    /// `parameters`. Caller-supplied `oauth_*` parameters (such as
    /// `oauth_callback`) join the returned set and override generated
    /// values of the same name. `oauth_signature` is computed last, over
    /// every other parameter.
    pub fn authorization_parameters(
        &self,
        method: &Method,
        normalized_url: &Url,
        parameters: &[(String, String)],
        options: &OAuthParameters,
    ) -> BTreeMap<String, String> {
        let mut oauth = self.control_parameters(options);
        let mut others: Vec<(&str, &str)> = Vec::new();
        for (key, value) in parameters {
            if key.starts_with(OAUTH_KEY_PREFIX) {
                oauth.insert(key.clone(), value.clone());
            } else {
                others.push((key.as_str(), value.as_str()));
            }
        }

        let mut signing_set = others;
        signing_set.extend(oauth.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let signature = signer::sign(
            method,
            normalized_url,
            &signing_set,
            &self.consumer_secret,
            &self.oauth_token_secret,
        );

        oauth.insert(OAUTH_SIGNATURE_KEY.to_string(), signature);
        oauth
    }

    /// Builds the complete `Authorization` header value for a request.
    pub fn authorization_header(
        &self,
        method: &Method,
        normalized_url: &Url,
        parameters: &[(String, String)],
        options: &OAuthParameters,
    ) -> String {
        let oauth = self.authorization_parameters(method, normalized_url, parameters, options);
        authorization_header_value(&oauth, options.realm.as_deref())
    }

    fn control_parameters(&self, options: &OAuthParameters) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(OAUTH_CONSUMER_KEY.to_string(), self.consumer_key.clone());
        if !self.oauth_token.is_empty() {
            params.insert(OAUTH_TOKEN_KEY.to_string(), self.oauth_token.clone());
        }
        params.insert(OAUTH_SIGNATURE_METHOD_KEY.to_string(), SIGNATURE_METHOD.to_string());
        let timestamp = options
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp().max(0) as u64);
        params.insert(OAUTH_TIMESTAMP_KEY.to_string(), timestamp.to_string());
        let nonce = options.nonce.clone().unwrap_or_else(generate_nonce);
        params.insert(OAUTH_NONCE_KEY.to_string(), nonce);
        if options.version {
            params.insert(OAUTH_VERSION_KEY.to_string(), OAUTH_VERSION.to_string());
        }
        if !self.oauth_verifier.is_empty() {
            params.insert(OAUTH_VERIFIER_KEY.to_string(), self.oauth_verifier.clone());
        }
        params
    }
}

/// Formats `OAuth k1="v1", k2="v2"` with each key and value percent-encoded.
/// Only `oauth_*` entries of `parameters` are emitted; `realm` goes first.
pub fn authorization_header_value(parameters: &BTreeMap<String, String>, realm: Option<&str>) -> String {
    let realm = realm.map(|r| format!("{}=\"{}\"", REALM_KEY, percent_encode(r)));
    let components = realm
        .into_iter()
        .chain(
            parameters
                .iter()
                .filter(|(k, _)| k.starts_with(OAUTH_KEY_PREFIX))
                .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v))),
        )
        .collect::<Vec<_>>();
    format!("OAuth {}", components.join(", "))
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Per-client tweaks to the generated `oauth_*` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthParameters {
    nonce: Option<String>,
    realm: Option<String>,
    timestamp: Option<u64>,
    version: bool,
}

impl Default for OAuthParameters {
    fn default() -> Self {
        OAuthParameters {
            nonce: None,
            realm: None,
            timestamp: None,
            version: true,
        }
    }
}

impl OAuthParameters {
    pub fn new() -> Self {
        Default::default()
    }

    /// Pin the oauth_nonce value. Only useful for reproducing a known signature.
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<String>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the realm value
    pub fn realm<T>(self, realm: T) -> Self
    where
        T: Into<String>,
    {
        OAuthParameters {
            realm: Some(realm.into()),
            ..self
        }
    }

    /// Pin the oauth_timestamp value.
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }

    /// set the oauth_version value (boolean)
    ///
    /// # Note
    /// When the version has value `true` (the default), oauth_version will be
    /// set with "1.0". Otherwise, oauth_version will not be included in your
    /// request. In oauth1, oauth_version value must be "1.0" or not specified.
    pub fn version<T>(self, version: T) -> Self
    where
        T: Into<bool>,
    {
        OAuthParameters {
            version: version.into(),
            ..self
        }
    }

    pub fn get_realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }
}
