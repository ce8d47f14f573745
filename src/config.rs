//! Configuration for a three-legged OAuth 1.0a handshake.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{DEFAULT_CHARSET, DEFAULT_TIMEOUT};
use crate::request::ParamsLocation;
use crate::{Error, Result};

const DEFAULT_CALLBACK_URL: &str = "oob";

const CONSUMER_KEY: &str = "consumerKey";
const CONSUMER_SECRET: &str = "consumerSecret";
const REQUEST_TOKEN_URL: &str = "requestTokenUrl";
const AUTHORIZE_URL: &str = "authorizeUrl";
const ACCESS_TOKEN_URL: &str = "accessTokenUrl";
const CALLBACK_URL: &str = "callbackUrl";

/// Consumer credentials, provider endpoints and per-request options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth1Config {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub request_token_url: String,
    pub authorize_url: String,
    pub access_token_url: String,
    /// Sent as `oauth_callback`; `oob` selects the out-of-band (PIN) flow.
    #[serde(default = "default_callback_url")]
    pub callback_url: String,
    /// Accept a callback without `oauth_verifier`, as some providers send.
    #[serde(default)]
    pub allow_missing_oauth_verifier: bool,
    #[serde(default)]
    pub params_location: ParamsLocation,
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
    #[serde(default = "default_charset")]
    pub charset: String,
}

fn default_callback_url() -> String {
    DEFAULT_CALLBACK_URL.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl OAuth1Config {
    pub fn builder() -> OAuth1ConfigBuilder {
        OAuth1ConfigBuilder::new()
    }

    /// Reads the dictionary form: `consumerKey`, `consumerSecret`,
    /// `requestTokenUrl`, `authorizeUrl`, `accessTokenUrl` and optionally
    /// `callbackUrl`. Other options take their defaults.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self> {
        let mut builder = OAuth1ConfigBuilder::new();
        if let Some(v) = parameters.get(CONSUMER_KEY) {
            builder = builder.consumer_key(v.as_str());
        }
        if let Some(v) = parameters.get(CONSUMER_SECRET) {
            builder = builder.consumer_secret(v.as_str());
        }
        if let Some(v) = parameters.get(REQUEST_TOKEN_URL) {
            builder = builder.request_token_url(v.as_str());
        }
        if let Some(v) = parameters.get(AUTHORIZE_URL) {
            builder = builder.authorize_url(v.as_str());
        }
        if let Some(v) = parameters.get(ACCESS_TOKEN_URL) {
            builder = builder.access_token_url(v.as_str());
        }
        if let Some(v) = parameters.get(CALLBACK_URL) {
            builder = builder.callback_url(v.as_str());
        }
        builder.build()
    }

    /// The dictionary form read by [`OAuth1Config::from_parameters`].
    pub fn parameters(&self) -> HashMap<String, String> {
        [
            (CONSUMER_KEY, &self.consumer_key),
            (CONSUMER_SECRET, &self.consumer_secret),
            (REQUEST_TOKEN_URL, &self.request_token_url),
            (AUTHORIZE_URL, &self.authorize_url),
            (ACCESS_TOKEN_URL, &self.access_token_url),
            (CALLBACK_URL, &self.callback_url),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Checks the fields a handshake cannot do without.
    pub fn validate(&self) -> Result<()> {
        if self.consumer_key.is_empty() {
            return Err(Error::Configuration("consumer_key is empty".to_string()));
        }
        if self.consumer_secret.is_empty() {
            return Err(Error::Configuration("consumer_secret is empty".to_string()));
        }
        for (name, value) in &[
            ("request_token_url", &self.request_token_url),
            ("authorize_url", &self.authorize_url),
            ("access_token_url", &self.access_token_url),
        ] {
            Url::parse(value).map_err(|e| Error::Configuration(format!("{} {:?} : {}", name, value, e)))?;
        }
        Ok(())
    }
}

/// Fluent builder for [`OAuth1Config`].
#[derive(Debug, Clone, Default)]
pub struct OAuth1ConfigBuilder {
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    request_token_url: Option<String>,
    authorize_url: Option<String>,
    access_token_url: Option<String>,
    callback_url: Option<String>,
    allow_missing_oauth_verifier: bool,
    params_location: ParamsLocation,
    timeout: Option<Duration>,
    charset: Option<String>,
}

impl OAuth1ConfigBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn consumer_key(mut self, consumer_key: impl Into<String>) -> Self {
        self.consumer_key = Some(consumer_key.into());
        self
    }

    pub fn consumer_secret(mut self, consumer_secret: impl Into<String>) -> Self {
        self.consumer_secret = Some(consumer_secret.into());
        self
    }

    pub fn request_token_url(mut self, url: impl Into<String>) -> Self {
        self.request_token_url = Some(url.into());
        self
    }

    pub fn authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = Some(url.into());
        self
    }

    pub fn access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = Some(url.into());
        self
    }

    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn allow_missing_oauth_verifier(mut self, allow: bool) -> Self {
        self.allow_missing_oauth_verifier = allow;
        self
    }

    pub fn params_location(mut self, location: ParamsLocation) -> Self {
        self.params_location = location;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when a required field is missing or empty,
    /// or an endpoint is not an absolute URL.
    pub fn build(self) -> Result<OAuth1Config> {
        fn required(value: Option<String>, field: &str) -> Result<String> {
            value.ok_or_else(|| Error::Configuration(format!("missing field {}", field)))
        }

        let config = OAuth1Config {
            consumer_key: required(self.consumer_key, "consumer_key")?,
            consumer_secret: required(self.consumer_secret, "consumer_secret")?,
            request_token_url: required(self.request_token_url, "request_token_url")?,
            authorize_url: required(self.authorize_url, "authorize_url")?,
            access_token_url: required(self.access_token_url, "access_token_url")?,
            callback_url: self.callback_url.unwrap_or_else(default_callback_url),
            allow_missing_oauth_verifier: self.allow_missing_oauth_verifier,
            params_location: self.params_location,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            charset: self.charset.unwrap_or_else(default_charset),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twitter() -> OAuth1ConfigBuilder {
        OAuth1ConfigBuilder::new()
            .consumer_key("key")
            .consumer_secret("secret")
            .request_token_url("https://api.twitter.com/oauth/request_token")
            .authorize_url("https://api.twitter.com/oauth/authorize")
            .access_token_url("https://api.twitter.com/oauth/access_token")
    }

    #[test]
    fn builder_defaults() {
        let config = twitter().build().unwrap();
        assert_eq!(config.callback_url, "oob");
        assert!(!config.allow_missing_oauth_verifier);
        assert_eq!(config.params_location, ParamsLocation::AuthorizationHeader);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.charset, "utf-8");
    }

    #[test]
    fn builder_rejects_missing_and_invalid_fields() {
        let missing = OAuth1ConfigBuilder::new().consumer_key("key").build();
        assert!(matches!(missing, Err(Error::Configuration(ref m)) if m.contains("consumer_secret")));

        let empty = twitter().consumer_key("").build();
        assert!(matches!(empty, Err(Error::Configuration(_))));

        let relative = twitter().authorize_url("/oauth/authorize").build();
        assert!(matches!(relative, Err(Error::Configuration(ref m)) if m.contains("authorize_url")));
    }

    #[test]
    fn dictionary_form_round_trips() {
        let config = twitter().callback_url("myapp://callback").build().unwrap();
        let parameters = config.parameters();
        assert_eq!(parameters["consumerKey"], "key");
        assert_eq!(parameters["callbackUrl"], "myapp://callback");
        assert_eq!(OAuth1Config::from_parameters(&parameters).unwrap(), config);

        let mut without_callback = parameters;
        without_callback.remove("callbackUrl");
        let config = OAuth1Config::from_parameters(&without_callback).unwrap();
        assert_eq!(config.callback_url, "oob");
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let config: OAuth1Config = serde_json::from_str(
            r#"{
                "consumerKey": "key",
                "consumerSecret": "secret",
                "requestTokenUrl": "https://example.com/request_token",
                "authorizeUrl": "https://example.com/authorize",
                "accessTokenUrl": "https://example.com/access_token",
                "allowMissingOauthVerifier": true,
                "paramsLocation": "RequestUriQuery",
                "timeout": 15
            }"#,
        )
        .unwrap();
        assert!(config.allow_missing_oauth_verifier);
        assert_eq!(config.params_location, ParamsLocation::RequestUriQuery);
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert_eq!(config.callback_url, "oob");
        assert!(config.validate().is_ok());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 15);
        assert_eq!(json["charset"], "utf-8");
    }
}
