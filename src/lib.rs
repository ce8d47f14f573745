/*!
reqwest-oauth1-flow: the OAuth 1.0a three-legged handshake and request signing, on reqwest.

# Overview

This library signs requests with HMAC-SHA1 as described in
[RFC 5849](https://tools.ietf.org/html/rfc5849), places the OAuth parameters
either in an `Authorization` header or inline with the request parameters,
and drives the request token / user authorization / access token handshake.

# How to use

## Basic usecase 1 - sending the tweet

```ignore
use reqwest_oauth1_flow::{Client, Credential};

// prepare authorization info
let consumer_key = "[CONSUMER_KEY]";
let consumer_secret = "[CONSUMER_SECRET]";
let access_token = "[ACCESS_TOKEN]";
let token_secret = "[TOKEN_SECRET]";

let credential = Credential::new(consumer_key, consumer_secret)
  .token(access_token, token_secret);

// sample: send new tweet to twitter
let endpoint = "https://api.twitter.com/1.1/statuses/update.json";

let client = Client::with_credential(credential);
let resp = client
    .post(endpoint)
    .parameter("status", "Hello, Twitter!")
    .send()
    .await?;
```

## Basic usecase 2 - Acquiring OAuth token & secret

```ignore
use reqwest_oauth1_flow::{CallbackDelivery, OAuth1, OAuth1Config};
use url::Url;

let config = OAuth1Config::builder()
    .consumer_key("[CONSUMER_KEY]")
    .consumer_secret("[CONSUMER_SECRET]")
    .request_token_url("https://api.twitter.com/oauth/request_token")
    .authorize_url("https://api.twitter.com/oauth/authorize")
    .access_token_url("https://api.twitter.com/oauth/access_token")
    .callback_url("myapp://oauth-callback")
    .build()?;

let oauth = OAuth1::new(config)?;
let handshake = oauth.authorize(
    |url: Url, delivery: CallbackDelivery| {
        // open `url` in a browser; hand the redirect back with
        // `delivery.deliver(callback_url)`
    },
    |outcome| match outcome {
        Ok(success) => println!(
            "your token and secret is: \n token: {}\n secret: {}",
            success.credential.oauth_token(),
            success.credential.oauth_token_secret()
        ),
        Err(e) => eprintln!("authorization failed: {}", e),
    },
);
// `handshake.cancel()` abandons the whole flow.
```
*/
mod client;
mod config;
mod credential;
mod dispatcher;
mod error;
mod handshake;
mod multipart;
mod request;
mod signer;
mod token_reader;
mod transport;

// exposed to external program
pub use client::Client;
pub use config::{OAuth1Config, OAuth1ConfigBuilder};
pub use credential::{authorization_header_value, Credential, OAuthParameters};
pub use dispatcher::{
    classify, CallbackQueue, Dispatcher, InFlightRequest, RequestHandle, RequestState, Response,
};
pub use error::{
    BoxError, Error, HttpStatusError, RemoteError, RemoteErrorKind, Result, TokenReaderError,
    TokenReaderResult,
};
pub use handshake::{
    parse_callback, AuthorizationUrlHandler, CallbackDelivery, CallbackParameters, Handshake,
    HandshakeState, OAuth1, TokenSuccess,
};
pub use multipart::{FormDataEncoder, MultipartBody, MultipartEncoder, Part};
pub use request::{Parameters, ParamsLocation, RequestBuilder, RequestSpec, WireRequest};
pub use signer::{
    normalized_signing_url, percent_decode, percent_encode, sign, signature_base_string,
    signing_key,
};
pub use token_reader::{read_oauth_token, TokenReader, TokenReaderFuture, TokenResponse};
pub use transport::{RawResponse, ReqwestTransport, Transport};
#[cfg(feature = "mocks")]
pub use transport::{MockReply, MockTransport};

// exposed constant variables
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";
/// Represents `realm`.
pub const REALM_KEY: &str = "realm";

// crate-private constant variables
pub(crate) const OAUTH_KEY_PREFIX: &str = "oauth_";
pub(crate) const OAUTH_SIGNATURE_METHOD_KEY: &str = "oauth_signature_method";
pub(crate) const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub(crate) const OAUTH_TOKEN_KEY: &str = "oauth_token";
pub(crate) const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";
pub(crate) const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
