// ----------------------------------------------------------------------------
// This source code contains derived artifacts from seanmonstar's `reqwest`.
// for further information(including license information),
// please visit their repository: https://github.com/seanmonstar/reqwest .
// ----------------------------------------------------------------------------
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use http::Method;

use crate::credential::{Credential, OAuthParameters};
use crate::dispatcher::Dispatcher;
use crate::request::{ParamsLocation, RequestBuilder, RequestSpec, WireRequest};
use crate::transport::{ReqwestTransport, Transport};
use crate::{Error, Result};

pub(crate) const DEFAULT_CHARSET: &str = "utf-8";
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Signs and sends requests with one [`Credential`].
///
/// Clones share the credential and the outcome queue.
pub struct Client<T: Transport = ReqwestTransport> {
    dispatcher: Dispatcher<T>,
    credential: Arc<RwLock<Credential>>,
    params_location: ParamsLocation,
    oauth_parameters: OAuthParameters,
    charset: String,
    timeout: Option<Duration>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Client {
            dispatcher: self.dispatcher.clone(),
            credential: Arc::clone(&self.credential),
            params_location: self.params_location,
            oauth_parameters: self.oauth_parameters.clone(),
            charset: self.charset.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Transport> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("consumer_key", &self.credential().consumer_key().to_string())
            .field("params_location", &self.params_location)
            .field("charset", &self.charset)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Client<ReqwestTransport> {
    /// Constructs a new `Client` holding only the consumer pair.
    ///
    /// This method calls reqwest::Client::new() internally.
    pub fn new<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Client::with_credential(Credential::new(consumer_key, consumer_secret))
    }

    pub fn with_credential(credential: Credential) -> Self {
        Client::with_transport(credential, ReqwestTransport::new())
    }
}

impl<T: Transport> Client<T> {
    /// Constructs a new `Client` sending through `transport`.
    pub fn with_transport(credential: Credential, transport: T) -> Self {
        Client {
            dispatcher: Dispatcher::new(transport),
            credential: Arc::new(RwLock::new(credential)),
            params_location: ParamsLocation::default(),
            oauth_parameters: OAuthParameters::default(),
            charset: DEFAULT_CHARSET.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Where OAuth parameters go for requests built by this client.
    pub fn params_location(self, params_location: ParamsLocation) -> Self {
        Client {
            params_location,
            ..self
        }
    }

    pub fn oauth_parameters(self, oauth_parameters: OAuthParameters) -> Self {
        Client {
            oauth_parameters,
            ..self
        }
    }

    /// Charset label advertised on form bodies. Bodies are always UTF-8.
    pub fn charset<S: Into<String>>(self, charset: S) -> Self {
        Client {
            charset: charset.into(),
            ..self
        }
    }

    /// Default timeout for each request. 60 seconds unless set.
    pub fn timeout(self, timeout: Duration) -> Self {
        Client {
            timeout: Some(timeout),
            ..self
        }
    }

    /// A snapshot of the current credential.
    pub fn credential(&self) -> Credential {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutates the shared credential in place.
    pub fn update_credential<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Credential) -> R,
    {
        let mut credential = self.credential.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut credential)
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Signs `spec` with the current credential.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::TokenExpired`] if `check_token_expiration` is set
    /// and the credential has expired, and with [`Error::RequestCreation`]
    /// if the request cannot be laid out.
    pub fn prepare(&self, spec: &RequestSpec, check_token_expiration: bool) -> Result<WireRequest> {
        let credential = self.credential.read().unwrap_or_else(PoisonError::into_inner);
        if check_token_expiration && credential.is_token_expired() {
            tracing::debug!(url = %spec.url(), "refusing to sign with an expired token");
            return Err(Error::TokenExpired);
        }
        spec.build(&credential, &self.oauth_parameters, &self.charset)
    }

    /// Convenience method to make a `GET` request to a URL.
    ///
    /// # Errors
    ///
    /// Sending fails whenever supplied `Url` cannot be parsed.
    pub fn get(&self, url: &str) -> RequestBuilder<'_, T> {
        self.request(Method::GET, url)
    }

    /// Convenience method to make a `POST` request to a URL.
    ///
    /// # Errors
    ///
    /// Sending fails whenever supplied `Url` cannot be parsed.
    pub fn post(&self, url: &str) -> RequestBuilder<'_, T> {
        self.request(Method::POST, url)
    }

    /// Convenience method to make a `PUT` request to a URL.
    ///
    /// # Errors
    ///
    /// Sending fails whenever supplied `Url` cannot be parsed.
    pub fn put(&self, url: &str) -> RequestBuilder<'_, T> {
        self.request(Method::PUT, url)
    }

    /// Convenience method to make a `PATCH` request to a URL.
    ///
    /// # Errors
    ///
    /// Sending fails whenever supplied `Url` cannot be parsed.
    pub fn patch(&self, url: &str) -> RequestBuilder<'_, T> {
        self.request(Method::PATCH, url)
    }

    /// Convenience method to make a `DELETE` request to a URL.
    ///
    /// # Errors
    ///
    /// Sending fails whenever supplied `Url` cannot be parsed.
    pub fn delete(&self, url: &str) -> RequestBuilder<'_, T> {
        self.request(Method::DELETE, url)
    }

    /// Convenience method to make a `HEAD` request to a URL.
    ///
    /// # Errors
    ///
    /// Sending fails whenever supplied `Url` cannot be parsed.
    pub fn head(&self, url: &str) -> RequestBuilder<'_, T> {
        self.request(Method::HEAD, url)
    }

    /// Start building a `Request` with the `Method` and `Url`.
    ///
    /// Returns a `RequestBuilder`, which will allow setting parameters,
    /// headers and request body before sending.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder<'_, T> {
        let location = self.params_location;
        let timeout = self.timeout;
        let spec = RequestSpec::parse(method, url).map(|spec| {
            let spec = spec.params_location(location);
            match timeout {
                Some(timeout) => spec.timeout(timeout),
                None => spec,
            }
        });
        RequestBuilder::new(self, spec)
    }
}
