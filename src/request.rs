// ----------------------------------------------------------------------------
// This source code contains derived artifacts from seanmonstar's `reqwest`.
// for further information(including license information),
// please visit their repository: https://github.com/seanmonstar/reqwest .
// ----------------------------------------------------------------------------
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::client::Client;
use crate::credential::{authorization_header_value, Credential, OAuthParameters};
use crate::dispatcher::{RequestHandle, Response};
use crate::multipart::{MultipartEncoder, Part};
use crate::signer::normalized_signing_url;
use crate::transport::Transport;
use crate::{Error, Result, OAUTH_KEY_PREFIX};

/// Logical request parameters. Values are usually strings; other JSON values
/// are kept as-is in JSON bodies and rendered as text everywhere else.
pub type Parameters = BTreeMap<String, Value>;

const JSON_MEDIA_TYPE: &str = "application/json";
const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Where the `oauth_*` parameters travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamsLocation {
    /// In an `Authorization: OAuth ...` header.
    #[default]
    AuthorizationHeader,
    /// Alongside the ordinary parameters, in the query string or form body.
    RequestUriQuery,
}

/// A request ready for the transport. Nothing modifies it after it is built.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

/// Description of a request before signing.
///
/// Setters consume and return the spec; [`RequestSpec::build`] turns it into
/// a [`WireRequest`].
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    parameters: Parameters,
    headers: HeaderMap,
    body: Option<Bytes>,
    params_location: ParamsLocation,
    timeout: Option<Duration>,
    error: Option<String>,
}

impl RequestSpec {
    pub fn new(method: Method, url: Url) -> Self {
        RequestSpec {
            method,
            url,
            parameters: Parameters::new(),
            headers: HeaderMap::new(),
            body: None,
            params_location: ParamsLocation::default(),
            timeout: None,
            error: None,
        }
    }

    /// Like [`RequestSpec::new`] for a URL given as text.
    pub fn parse(method: Method, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::RequestCreation(format!("invalid URL {} : {}", url, e)))?;
        Ok(RequestSpec::new(method, parsed))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn parameter<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameters<I, K, V>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a `Header` to this Request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name: std::result::Result<HeaderName, http::Error> = HeaderName::try_from(key).map_err(Into::into);
        let value: std::result::Result<HeaderValue, http::Error> = HeaderValue::try_from(value).map_err(Into::into);
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) | (_, Err(e)) => {
                self.error.get_or_insert_with(|| format!("invalid header : {}", e));
            }
        }
        self
    }

    /// Add a set of Headers to the existing ones on this Request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Set a raw body. The parameters are then used for signing only.
    pub fn body<T: Into<Bytes>>(mut self, body: T) -> Self {
        self.body = Some(body.into());
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

    fn has_json_content_type(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.to_ascii_lowercase().contains(JSON_MEDIA_TYPE))
    }

    /// Signs the request with `credential` and lays it out for the wire.
    ///
    /// Parameters found in the URL's query string are signed together with
    /// the explicit ones. A JSON body is never signed. With
    /// [`ParamsLocation::AuthorizationHeader`] no `oauth_*` key is left in
    /// the query string or body.
    pub fn build(&self, credential: &Credential, options: &OAuthParameters, charset: &str) -> Result<WireRequest> {
        if let Some(ref e) = self.error {
            return Err(Error::RequestCreation(e.clone()));
        }

        let signing_url = normalized_signing_url(&self.url);
        let existing_query: Vec<(String, String)> = self.url.query_pairs().into_owned().collect();
        let sends_body = is_body_method(&self.method);
        let json_body = sends_body && self.has_json_content_type();

        let mut signing_parameters: Vec<(String, String)> = if json_body {
            Vec::new()
        } else {
            self.parameters
                .iter()
                .map(|(k, v)| (k.clone(), parameter_text(v)))
                .collect()
        };
        signing_parameters.extend(existing_query.iter().cloned());

        let oauth = credential.authorization_parameters(&self.method, &signing_url, &signing_parameters, options);

        let mut headers = HeaderMap::new();
        let outgoing: Parameters = match self.params_location {
            ParamsLocation::AuthorizationHeader => {
                let value = authorization_header_value(&oauth, options.get_realm());
                let value = HeaderValue::from_str(&value)
                    .map_err(|e| Error::RequestCreation(format!("invalid authorization header : {}", e)))?;
                headers.insert(AUTHORIZATION, value);
                self.parameters
                    .iter()
                    .filter(|(k, _)| !k.starts_with(OAUTH_KEY_PREFIX))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            }
            ParamsLocation::RequestUriQuery => {
                let mut merged = self.parameters.clone();
                merged.extend(oauth.into_iter().map(|(k, v)| (k, Value::String(v))));
                merged
            }
        };
        let strip_oauth = self.params_location == ParamsLocation::AuthorizationHeader;

        let mut url = self.url.clone();
        let mut body = None;
        let mut query_additions = Vec::new();
        if let Some(ref raw) = self.body {
            body = Some(raw.clone());
            if !strip_oauth {
                // The body is opaque, so the signature rides in the query.
                query_additions = outgoing
                    .iter()
                    .filter(|(k, _)| k.starts_with(OAUTH_KEY_PREFIX))
                    .map(|(k, v)| (k.clone(), parameter_text(v)))
                    .collect();
            }
        } else if !outgoing.is_empty() {
            if !sends_body {
                query_additions = outgoing.iter().map(|(k, v)| (k.clone(), parameter_text(v))).collect();
            } else if json_body {
                let json = serde_json::to_vec(&outgoing)
                    .map_err(|e| Error::RequestCreation(format!("failed to encode JSON body : {}", e)))?;
                body = Some(Bytes::from(json));
            } else {
                body = Some(Bytes::from(form_encode(outgoing.iter())?));
                if !self.headers.contains_key(CONTENT_TYPE) {
                    let content_type = format!("{}; charset={}", FORM_MEDIA_TYPE, charset);
                    let content_type = HeaderValue::from_str(&content_type)
                        .map_err(|e| Error::RequestCreation(format!("invalid charset {} : {}", charset, e)))?;
                    headers.insert(CONTENT_TYPE, content_type);
                }
            }
        }
        rebuild_query(&mut url, &existing_query, query_additions, strip_oauth)?;

        for name in self.headers.keys() {
            let keep_generated = *name == AUTHORIZATION && strip_oauth;
            if !keep_generated {
                headers.remove(name);
            }
            for value in self.headers.get_all(name) {
                headers.append(name.clone(), value.clone());
            }
        }

        Ok(WireRequest {
            method: self.method.clone(),
            url,
            headers,
            body,
            timeout: self.timeout,
        })
    }
}

fn is_body_method(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

fn parameter_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn form_encode<'a, I>(parameters: I) -> Result<String>
where
    I: Iterator<Item = (&'a String, &'a Value)>,
{
    let pairs: Vec<(&str, String)> = parameters.map(|(k, v)| (k.as_str(), parameter_text(v))).collect();
    serde_urlencoded::to_string(pairs).map_err(|e| Error::RequestCreation(format!("failed to encode parameters : {}", e)))
}

/// Appends `additions` to the query of `url`, dropping `oauth_*` pairs
/// already present when `strip_oauth` is set. The URL is left untouched
/// when there is nothing to change.
fn rebuild_query(
    url: &mut Url,
    existing: &[(String, String)],
    additions: Vec<(String, String)>,
    strip_oauth: bool,
) -> Result<()> {
    let has_oauth = strip_oauth && existing.iter().any(|(k, _)| k.starts_with(OAUTH_KEY_PREFIX));
    if additions.is_empty() && !has_oauth {
        return Ok(());
    }

    let pairs: Vec<(String, String)> = existing
        .iter()
        .filter(|(k, _)| !(strip_oauth && k.starts_with(OAUTH_KEY_PREFIX)))
        .cloned()
        .chain(additions)
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let query = serde_urlencoded::to_string(&pairs)
            .map_err(|e| Error::RequestCreation(format!("failed to encode query : {}", e)))?;
        url.set_query(Some(&query));
    }
    Ok(())
}

/// A [`RequestSpec`] bound to the [`Client`] that will sign and send it.
pub struct RequestBuilder<'a, T: Transport> {
    client: &'a Client<T>,
    spec: std::result::Result<RequestSpec, String>,
    check_token_expiration: bool,
}

impl<'a, T: Transport> RequestBuilder<'a, T> {
    pub(crate) fn new(client: &'a Client<T>, spec: Result<RequestSpec>) -> Self {
        RequestBuilder {
            client,
            spec: spec.map_err(|e| match e {
                Error::RequestCreation(message) => message,
                other => other.to_string(),
            }),
            check_token_expiration: true,
        }
    }

    fn pass_through<F>(self, f: F) -> Self
    where
        F: FnOnce(RequestSpec) -> RequestSpec,
    {
        RequestBuilder {
            spec: self.spec.map(f),
            ..self
        }
    }

    fn prepare(&self) -> Result<WireRequest> {
        match self.spec {
            Ok(ref spec) => self.client.prepare(spec, self.check_token_expiration),
            Err(ref e) => Err(Error::RequestCreation(e.clone())),
        }
    }

    /// Add one parameter. It goes to the query string for GET, HEAD and
    /// DELETE and to the body otherwise.
    pub fn parameter<K: Into<String>, V: Into<Value>>(self, key: K, value: V) -> Self {
        self.pass_through(|s| s.parameter(key, value))
    }

    pub fn parameters<I, K, V>(self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.pass_through(|s| s.parameters(parameters))
    }

    /// Add a `Header` to this Request.
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.pass_through(|s| s.header(key, value))
    }

    /// Add a set of Headers to the existing ones on this Request.
    ///
    /// The headers will be merged in to any already set.
    pub fn headers(self, headers: HeaderMap) -> Self {
        self.pass_through(|s| s.headers(headers))
    }

    /// Send the parameters as a JSON object. JSON bodies are not signed.
    pub fn json(self) -> Self {
        self.pass_through(|mut s| {
            s.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
            s
        })
    }

    /// Set the request body.
    pub fn body<B: Into<Bytes>>(self, body: B) -> Self {
        self.pass_through(|s| s.body(body))
    }

    /// Enables a request timeout, overriding the client default.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.pass_through(|s| s.timeout(timeout))
    }

    pub fn params_location(self, location: ParamsLocation) -> Self {
        self.pass_through(|s| s.params_location(location))
    }

    /// Sends a multipart/form-data body built by `encoder`.
    ///
    /// The parameters set on this builder are signed but not sent; add them
    /// to `parts` with [`Part::text`] if the server expects them in the body.
    pub fn multipart<E: MultipartEncoder + ?Sized>(self, parts: &[Part], encoder: &E) -> Self {
        let encoded = encoder.encode(parts);
        let content_type = format!("multipart/form-data; boundary={}", encoded.boundary);
        self.header(CONTENT_TYPE, content_type).body(encoded.body)
    }

    /// Whether to fail with [`Error::TokenExpired`] before sending when the
    /// credential has expired. Enabled by default.
    pub fn check_token_expiration(self, check: bool) -> Self {
        RequestBuilder {
            check_token_expiration: check,
            ..self
        }
    }

    /// The request described so far, or `None` if its URL was invalid.
    pub fn spec(&self) -> Option<&RequestSpec> {
        self.spec.as_ref().ok()
    }

    /// Sign the request and return what would be sent.
    pub fn build(self) -> Result<WireRequest> {
        self.prepare()
    }

    /// Dispatch the request; `on_outcome` receives its result exactly once
    /// unless the request is cancelled first.
    ///
    /// Failures detected before dispatch are returned here and
    /// `on_outcome` is never called.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F>(self, on_outcome: F) -> Result<RequestHandle>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let request = self.prepare()?;
        Ok(self.client.dispatcher().execute(request, on_outcome))
    }

    /// Constructs the Request and sends it to the target URL.
    ///
    /// # Errors
    ///
    /// This method fails if the request could not be built, the transport
    /// failed, or the server answered with a status of 400 or above.
    pub async fn send(self) -> Result<Response> {
        let request = self.prepare()?;
        self.client.dispatcher().send(request).await
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;
    use serde_json::json;

    use super::*;
    use crate::transport::MockTransport;

    fn extract_header_parameters(auth_header: &str) -> BTreeMap<String, String> {
        let content = auth_header.strip_prefix("OAuth ").unwrap();
        content
            .split(',')
            .filter_map(|item| item.trim().split_once('='))
            .map(|(k, v)| {
                let v = percent_encoding::percent_decode_str(v.trim_matches('"'))
                    .decode_utf8_lossy()
                    .to_string();
                (k.to_string(), v)
            })
            .collect()
    }

    fn extract_signature(req: &WireRequest) -> String {
        let header = req.headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        extract_header_parameters(header)["oauth_signature"].clone()
    }

    fn body_text(req: &WireRequest) -> String {
        String::from_utf8(req.body.as_ref().unwrap().to_vec()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn sign_post_query() {
        // https://tools.ietf.org/html/rfc5849
        let credential = Credential::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44");
        let options = OAuthParameters::new()
            .nonce("wIjqoS")
            .timestamp(137_131_200u64)
            .realm("photos")
            .version(false);

        let req = RequestSpec::new(Method::POST, url("https://photos.example.net/initiate"))
            .parameter("oauth_callback", "http://printer.example.com/ready")
            .build(&credential, &options, "utf-8")
            .unwrap();

        assert_eq!(extract_signature(&req), "74KNZJeDHnMBp0EMJ9ZHt/XKycU=");
        let header = req.headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(header.starts_with("OAuth realm=\"photos\", "));
        assert!(req.body.is_none());
    }

    #[test]
    fn sign_get_query() {
        // https://tools.ietf.org/html/rfc5849
        let credential =
            Credential::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44").token("nnch734d00sl2jdk", "pfkkdhi9sl3r4s00");
        let options = OAuthParameters::new()
            .nonce("chapoH")
            .timestamp(137_131_202u64)
            .realm("Photos")
            .version(false);

        let req = RequestSpec::new(
            Method::GET,
            url("http://photos.example.net/photos?file=vacation.jpg&size=original"),
        )
        .build(&credential, &options, "utf-8")
        .unwrap();

        assert_eq!(extract_signature(&req), "MdpQcU8iPSUjWoN/UDMsK2sui9I=");
        assert_eq!(req.url.query(), Some("file=vacation.jpg&size=original"));
    }

    #[test]
    fn sign_post_body() {
        // https://developer.twitter.com/ja/docs/basics/authentication/guides/creating-a-signature
        let credential = Credential::new("xvz1evFS4wEEPTGEFPHBog", "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw").token(
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        );
        let options = OAuthParameters::new()
            .nonce("kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg")
            .timestamp(1_318_622_958u64);

        let req = RequestSpec::new(Method::POST, url("https://api.twitter.com/1.1/statuses/update.json"))
            .parameter("include_entities", "true")
            .parameter("status", "Hello Ladies + Gentlemen, a signed OAuth request!")
            .build(&credential, &options, "utf-8")
            .unwrap();

        assert_eq!(extract_signature(&req), "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
        assert_eq!(
            body_text(&req),
            "include_entities=true&status=Hello+Ladies+%2B+Gentlemen%2C+a+signed+OAuth+request%21"
        );
        assert_eq!(
            req.headers.get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded; charset=utf-8"
        );
    }

    #[test]
    fn capture_unicode_form_body() {
        let credential = Credential::new("key", "secret");
        let req = RequestSpec::new(Method::POST, url("https://photos.example.net/initiate"))
            .parameter("少女", "終末旅行")
            .build(&credential, &OAuthParameters::new(), "utf-8")
            .unwrap();
        assert_eq!(body_text(&req), "%E5%B0%91%E5%A5%B3=%E7%B5%82%E6%9C%AB%E6%97%85%E8%A1%8C");
    }

    #[test]
    fn header_placement_keeps_oauth_out_of_query_and_body() {
        let credential = Credential::new("key", "secret").token("tok", "toksecret");
        let get = RequestSpec::new(Method::GET, url("https://api.example.com/r?oauth_nonce=stale&page=2"))
            .parameter("oauth_callback", "oob")
            .parameter("q", "rust")
            .build(&credential, &OAuthParameters::new(), "utf-8")
            .unwrap();
        assert!(get.url.query_pairs().all(|(k, _)| !k.starts_with("oauth_")));
        assert_eq!(get.url.query(), Some("page=2&q=rust"));

        let post = RequestSpec::new(Method::POST, url("https://api.example.com/r"))
            .parameter("oauth_callback", "oob")
            .parameter("q", "rust")
            .build(&credential, &OAuthParameters::new(), "utf-8")
            .unwrap();
        assert_eq!(body_text(&post), "q=rust");
        let header = post.headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        let params = extract_header_parameters(header);
        assert_eq!(params["oauth_callback"], "oob");
        assert_eq!(params["oauth_token"], "tok");
    }

    #[test]
    fn query_placement_puts_oauth_inline() {
        let credential = Credential::new("key", "secret").token("tok", "toksecret");
        let get = RequestSpec::new(Method::GET, url("https://api.example.com/r?page=2"))
            .parameter("q", "rust")
            .params_location(ParamsLocation::RequestUriQuery)
            .build(&credential, &OAuthParameters::new(), "utf-8")
            .unwrap();

        assert!(get.headers.get(AUTHORIZATION).is_none());
        let keys: Vec<String> = get.url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        for expected in &[
            "page",
            "q",
            "oauth_consumer_key",
            "oauth_token",
            "oauth_nonce",
            "oauth_timestamp",
            "oauth_signature_method",
            "oauth_version",
            "oauth_signature",
        ] {
            assert!(keys.iter().any(|k| k == expected), "missing {} in {:?}", expected, keys);
        }

        let post = RequestSpec::new(Method::POST, url("https://api.example.com/r"))
            .parameter("q", "rust")
            .params_location(ParamsLocation::RequestUriQuery)
            .build(&credential, &OAuthParameters::new(), "utf-8")
            .unwrap();
        assert!(post.headers.get(AUTHORIZATION).is_none());
        let body = body_text(&post);
        assert!(body.contains("oauth_signature="), "{}", body);
        assert!(body.contains("q=rust"), "{}", body);
    }

    #[test]
    fn json_body_is_not_signed() {
        let credential = Credential::new("key", "secret");
        let options = OAuthParameters::new().nonce("n").timestamp(1u64);
        let target = url("https://api.example.com/items");

        let req = RequestSpec::new(Method::POST, target.clone())
            .header(CONTENT_TYPE, "application/json")
            .parameter("name", "widget")
            .parameter("count", 3)
            .build(&credential, &options, "utf-8")
            .unwrap();

        let body: Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "widget", "count": 3}));
        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/json");

        let unsigned = credential.authorization_parameters(&Method::POST, &target, &[], &options);
        assert_eq!(extract_signature(&req), unsigned["oauth_signature"]);
    }

    #[test]
    fn raw_body_overrides_parameters() {
        let credential = Credential::new("key", "secret");
        let options = OAuthParameters::new().nonce("n").timestamp(1u64);
        let target = url("https://upload.example.com/media");

        let req = RequestSpec::new(Method::POST, target.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .parameter("media_type", "image/png")
            .body(&b"\x89PNG"[..])
            .build(&credential, &options, "utf-8")
            .unwrap();

        assert_eq!(req.body.as_deref(), Some(&b"\x89PNG"[..]));
        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/octet-stream");
        let signed_with = vec![("media_type".to_string(), "image/png".to_string())];
        let expected = credential.authorization_parameters(&Method::POST, &target, &signed_with, &options);
        assert_eq!(extract_signature(&req), expected["oauth_signature"]);
    }

    #[test]
    fn raw_body_with_query_placement_signs_in_query() {
        let credential = Credential::new("key", "secret").token("tok", "toksecret");
        let options = OAuthParameters::new().nonce("n").timestamp(1u64);
        let target = url("https://upload.example.com/media?kind=avatar");

        let req = RequestSpec::new(Method::POST, target.clone())
            .parameter("media_type", "image/png")
            .params_location(ParamsLocation::RequestUriQuery)
            .body(&b"\x89PNG"[..])
            .build(&credential, &options, "utf-8")
            .unwrap();

        assert!(req.headers.get(AUTHORIZATION).is_none());
        assert_eq!(req.body.as_deref(), Some(&b"\x89PNG"[..]));

        let query: BTreeMap<String, String> = req.url.query_pairs().into_owned().collect();
        assert_eq!(query["kind"], "avatar");
        assert_eq!(query["oauth_consumer_key"], "key");
        assert_eq!(query["oauth_token"], "tok");
        assert!(!query.contains_key("media_type"));

        let signed_with = vec![
            ("media_type".to_string(), "image/png".to_string()),
            ("kind".to_string(), "avatar".to_string()),
        ];
        let expected = credential.authorization_parameters(
            &Method::POST,
            &url("https://upload.example.com/media"),
            &signed_with,
            &options,
        );
        assert_eq!(query["oauth_signature"], expected["oauth_signature"]);
    }

    #[test]
    fn json_replaces_an_earlier_content_type() {
        let client = Client::with_transport(Credential::new("key", "secret"), MockTransport::new());
        let req = client
            .post("https://api.example.com/items")
            .header(CONTENT_TYPE, "text/plain")
            .parameter("name", "widget")
            .json()
            .build()
            .unwrap();

        assert_eq!(req.headers.get_all(CONTENT_TYPE).iter().count(), 1);
        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        let body: Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({"name": "widget"}));
    }

    #[test]
    fn explicit_headers_win_but_authorization_is_kept() {
        let credential = Credential::new("key", "secret");
        let req = RequestSpec::new(Method::POST, url("https://api.example.com/r"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(AUTHORIZATION, "Extra token")
            .parameter("a", "b")
            .build(&credential, &OAuthParameters::new(), "iso-8859-1")
            .unwrap();

        assert_eq!(req.headers.get(CONTENT_TYPE).unwrap(), "application/x-www-form-urlencoded");
        let auth: Vec<&str> = req
            .headers
            .get_all(AUTHORIZATION)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(auth.len(), 2);
        assert!(auth[0].starts_with("OAuth "));
        assert_eq!(auth[1], "Extra token");
    }

    #[test]
    fn delete_parameters_go_to_query() {
        let credential = Credential::new("key", "secret");
        let req = RequestSpec::new(Method::DELETE, url("https://api.example.com/r/1"))
            .parameter("force", true)
            .build(&credential, &OAuthParameters::new(), "utf-8")
            .unwrap();
        assert_eq!(req.url.query(), Some("force=true"));
        assert!(req.body.is_none());
    }

    #[test]
    fn invalid_url_is_request_creation_error() {
        let credential = Credential::new("key", "secret");
        assert!(matches!(
            RequestSpec::parse(Method::GET, "not a url"),
            Err(Error::RequestCreation(_))
        ));
        let spec = RequestSpec::parse(Method::GET, "https://api.example.com/?a=1").unwrap();
        assert!(spec.build(&credential, &OAuthParameters::new(), "utf-8").is_ok());
    }

    #[test]
    fn invalid_header_is_request_creation_error() {
        let credential = Credential::new("key", "secret");
        let result = RequestSpec::new(Method::GET, url("https://api.example.com/"))
            .header("bad header", "x")
            .build(&credential, &OAuthParameters::new(), "utf-8");
        assert!(matches!(result, Err(Error::RequestCreation(_))));
    }
}
