//! The three-legged OAuth 1.0a authorization flow.
//!
//! A handshake obtains a request token, hands the user off to the
//! provider's authorization page and exchanges the verifier returned on the
//! callback URL for an access token.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{instrument, warn};
use url::Url;

use crate::client::Client;
use crate::config::OAuth1Config;
use crate::credential::Credential;
use crate::signer::{percent_decode, percent_encode};
use crate::token_reader::{TokenReader, TokenResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::{Error, Result, OAUTH_CALLBACK_KEY, OAUTH_TOKEN_KEY, OAUTH_VERIFIER_KEY};

const TOKEN_ALIAS_KEY: &str = "token";
const MISSING_CALLBACK_PARAMETERS: &str = "oauth_token or oauth_verifier not returned";

/// Presents the authorization URL to the user.
///
/// Implementations decide how the page is shown. Once the provider
/// redirects back, the full callback URL goes to
/// [`CallbackDelivery::deliver`]. Dropping `delivery` without calling it
/// ends the handshake with [`Error::Cancelled`].
pub trait AuthorizationUrlHandler: Send + Sync {
    fn handle(&self, url: Url, delivery: CallbackDelivery);
}

impl<F> AuthorizationUrlHandler for F
where
    F: Fn(Url, CallbackDelivery) + Send + Sync,
{
    fn handle(&self, url: Url, delivery: CallbackDelivery) {
        self(url, delivery)
    }
}

/// Single-use channel that carries the callback URL back to its handshake.
#[derive(Debug)]
pub struct CallbackDelivery {
    sender: oneshot::Sender<Url>,
}

impl CallbackDelivery {
    /// Returns `false` if the handshake is no longer waiting.
    pub fn deliver(self, callback: Url) -> bool {
        self.sender.send(callback).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    RequestingToken,
    AwaitingUserAuthorization,
    ExchangingAccessToken,
    Completed,
    Failed,
    Cancelled,
}

impl HandshakeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HandshakeState::Completed | HandshakeState::Failed | HandshakeState::Cancelled
        )
    }
}

/// Result of a completed handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSuccess {
    /// The credential holding the access token.
    pub credential: Credential,
    /// Every parameter of the access token response.
    pub parameters: HashMap<String, String>,
}

/// What the provider put on the callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParameters {
    pub oauth_token: String,
    pub oauth_verifier: Option<String>,
}

/// Reads `oauth_token` and `oauth_verifier` from a callback URL.
///
/// The fragment, when not empty, is read after the query and overrides it.
/// A `token` parameter takes the place of `oauth_token`.
pub fn parse_callback(callback: &Url, allow_missing_oauth_verifier: bool) -> Result<CallbackParameters> {
    let mut parameters: HashMap<&str, &str> = HashMap::new();
    if let Some(query) = callback.query() {
        parameters.extend(raw_pairs(query));
    }
    if let Some(fragment) = callback.fragment().filter(|f| !f.is_empty()) {
        parameters.extend(raw_pairs(fragment));
    }
    if let Some(token) = parameters.get(TOKEN_ALIAS_KEY).copied() {
        parameters.insert(OAUTH_TOKEN_KEY, token);
    }

    let verifier = parameters.get(OAUTH_VERIFIER_KEY).copied();
    match parameters.get(OAUTH_TOKEN_KEY) {
        Some(token) if verifier.is_some() || allow_missing_oauth_verifier => Ok(CallbackParameters {
            oauth_token: percent_decode(token)?,
            oauth_verifier: verifier.map(percent_decode).transpose()?,
        }),
        _ => Err(Error::OAuthProtocol(MISSING_CALLBACK_PARAMETERS.to_string())),
    }
}

fn raw_pairs(input: &str) -> impl Iterator<Item = (&str, &str)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

/// Runs the OAuth 1.0a handshake against one provider.
pub struct OAuth1<T: Transport = ReqwestTransport> {
    config: OAuth1Config,
    client: Client<T>,
}

impl<T: Transport> Clone for OAuth1<T> {
    fn clone(&self) -> Self {
        OAuth1 {
            config: self.config.clone(),
            client: self.client.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for OAuth1<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth1")
            .field("request_token_url", &self.config.request_token_url)
            .field("authorize_url", &self.config.authorize_url)
            .field("access_token_url", &self.config.access_token_url)
            .finish()
    }
}

impl OAuth1<ReqwestTransport> {
    pub fn new(config: OAuth1Config) -> Result<Self> {
        OAuth1::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: Transport> OAuth1<T> {
    pub fn with_transport(config: OAuth1Config, transport: T) -> Result<Self> {
        config.validate()?;
        let client = Client::with_transport(
            Credential::new(config.consumer_key.as_str(), config.consumer_secret.as_str()),
            transport,
        )
        .params_location(config.params_location)
        .charset(config.charset.as_str())
        .timeout(config.timeout);
        Ok(OAuth1 { config, client })
    }

    pub fn config(&self) -> &OAuth1Config {
        &self.config
    }

    /// The client signing the handshake requests. After completion it
    /// holds the access token and can be used for API calls.
    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    pub fn credential(&self) -> Credential {
        self.client.credential()
    }

    /// Leg 1: obtain a request token and store it in the credential.
    ///
    /// Any token left from an earlier handshake is dropped first.
    #[instrument(skip_all, fields(url = %self.config.request_token_url))]
    pub async fn post_request_token(&self) -> Result<TokenResponse> {
        self.client.update_credential(Credential::clear_token);
        let token = self
            .client
            .post(&self.config.request_token_url)
            .parameter(OAUTH_CALLBACK_KEY, self.config.callback_url.as_str())
            .check_token_expiration(false)
            .send()
            .await?
            .parse_oauth_token()?;
        self.client
            .update_credential(|c| c.set_token(token.oauth_token.as_str(), token.oauth_token_secret.as_str()));
        tracing::debug!("request token acquired");
        Ok(token)
    }

    /// The page the user must visit to authorize `request_token`.
    pub fn authorize_url(&self, request_token: &str) -> Result<Url> {
        let endpoint = &self.config.authorize_url;
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}{}={}",
            endpoint,
            separator,
            OAUTH_TOKEN_KEY,
            percent_encode(request_token)
        );
        Url::parse(&url).map_err(|e| Error::OAuthProtocol(format!("failed to create authorize URL {} : {}", url, e)))
    }

    /// Leg 2 completion: take the token and verifier from the callback URL.
    pub fn accept_callback(&self, callback: &Url) -> Result<CallbackParameters> {
        let parameters = parse_callback(callback, self.config.allow_missing_oauth_verifier)?;
        self.client.update_credential(|c| {
            c.set_oauth_token(parameters.oauth_token.as_str());
            if let Some(ref verifier) = parameters.oauth_verifier {
                c.set_verifier(verifier.as_str());
            }
        });
        Ok(parameters)
    }

    /// Leg 3: exchange the authorized request token for an access token.
    #[instrument(skip_all, fields(url = %self.config.access_token_url))]
    pub async fn post_access_token(&self) -> Result<TokenSuccess> {
        let credential = self.client.credential();
        let mut builder = self
            .client
            .post(&self.config.access_token_url)
            .parameter(OAUTH_TOKEN_KEY, credential.oauth_token())
            .check_token_expiration(false);
        if !credential.oauth_verifier().is_empty() {
            builder = builder.parameter(OAUTH_VERIFIER_KEY, credential.oauth_verifier());
        }
        let token = builder.send().await?.parse_oauth_token()?;

        self.client.update_credential(|c| {
            c.set_token(token.oauth_token.as_str(), token.oauth_token_secret.as_str());
            c.set_verifier("");
        });
        tracing::debug!("access token acquired");
        Ok(TokenSuccess {
            credential: self.client.credential(),
            parameters: token.parameters(),
        })
    }

    /// Runs all three legs, waiting on `handler` for the callback URL.
    pub async fn authorize_with_callback_url<H>(&self, handler: &H) -> Result<TokenSuccess>
    where
        H: AuthorizationUrlHandler + ?Sized,
    {
        let (states, _) = watch::channel(HandshakeState::Idle);
        self.run(handler, &states).await
    }

    /// Starts the handshake in the background.
    ///
    /// `on_outcome` receives the result on the client's callback queue,
    /// unless [`Handshake::cancel`] is called first.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn authorize<H, F>(&self, handler: H, on_outcome: F) -> Handshake
    where
        H: AuthorizationUrlHandler + 'static,
        F: FnOnce(Result<TokenSuccess>) + Send + 'static,
    {
        let (states, receiver) = watch::channel(HandshakeState::Idle);
        let states = Arc::new(states);
        let this = self.clone();
        let task_states = Arc::clone(&states);
        let task = tokio::spawn(async move {
            let outcome = this.run(&handler, &task_states).await;
            let terminal = if outcome.is_ok() {
                HandshakeState::Completed
            } else {
                HandshakeState::Failed
            };
            if !advance(&task_states, terminal) {
                return;
            }
            this.client
                .dispatcher()
                .queue()
                .deliver(move || on_outcome(outcome))
                .await;
        });
        Handshake { task, states, receiver }
    }

    async fn run<H>(&self, handler: &H, states: &watch::Sender<HandshakeState>) -> Result<TokenSuccess>
    where
        H: AuthorizationUrlHandler + ?Sized,
    {
        let result = self.legs(handler, states).await;
        if let Err(ref e) = result {
            warn!(error = %e, "OAuth1 handshake failed");
        }
        result
    }

    async fn legs<H>(&self, handler: &H, states: &watch::Sender<HandshakeState>) -> Result<TokenSuccess>
    where
        H: AuthorizationUrlHandler + ?Sized,
    {
        advance(states, HandshakeState::RequestingToken);
        let request_token = self.post_request_token().await?;

        let url = self.authorize_url(&request_token.oauth_token)?;
        advance(states, HandshakeState::AwaitingUserAuthorization);
        let (sender, receiver) = oneshot::channel();
        handler.handle(url, CallbackDelivery { sender });
        let callback = receiver.await.map_err(|_| Error::Cancelled)?;
        self.accept_callback(&callback)?;

        advance(states, HandshakeState::ExchangingAccessToken);
        self.post_access_token().await
    }
}

/// Moves to `next` unless a terminal state was already reached.
fn advance(states: &watch::Sender<HandshakeState>, next: HandshakeState) -> bool {
    states.send_if_modified(|state| {
        if state.is_terminal() {
            false
        } else {
            *state = next;
            true
        }
    })
}

/// Handle on a handshake started with [`OAuth1::authorize`].
#[derive(Debug)]
pub struct Handshake {
    task: JoinHandle<()>,
    states: Arc<watch::Sender<HandshakeState>>,
    receiver: watch::Receiver<HandshakeState>,
}

impl Handshake {
    pub fn state(&self) -> HandshakeState {
        *self.receiver.borrow()
    }

    /// Follow state changes.
    pub fn subscribe(&self) -> watch::Receiver<HandshakeState> {
        self.receiver.clone()
    }

    /// Stops whichever leg is running, including the request on the wire,
    /// and suppresses the outcome. Does nothing once the handshake has
    /// finished.
    pub fn cancel(&self) {
        if advance(&self.states, HandshakeState::Cancelled) {
            tracing::debug!("handshake cancelled");
            self.task.abort();
        }
    }
}
