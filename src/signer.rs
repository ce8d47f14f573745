//! OAuth 1.0a signature base string and HMAC-SHA1 signing (RFC 5849 §3.4).

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::Method;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use ring::hmac;
use url::Url;

use crate::{Error, Result};

/// Everything except the RFC 3986 unreserved set is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `input` as required for OAuth parameters (uppercase hex).
pub fn percent_encode(input: &str) -> Cow<'_, str> {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).into()
}

/// Reverses [`percent_encode`].
///
/// Escapes that do not decode to valid UTF-8 are reported instead of being
/// replaced, since a silently altered value would corrupt any signature
/// computed over it.
pub fn percent_decode(input: &str) -> Result<String> {
    percent_decode_str(input)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| Error::OAuthProtocol(format!("{} is not valid percent-encoded UTF-8: {}", input, e)))
}

/// Strips the query and fragment of `url`, leaving scheme, host, port and path.
pub fn normalized_signing_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_query(None);
    normalized.set_fragment(None);
    normalized
}

/// Builds `METHOD&url&parameters`.
///
/// Every pair is encoded, then the pairs are sorted by key and value.
/// Repeated keys are all kept.
pub fn signature_base_string<K, V>(method: &Method, normalized_url: &Url, parameters: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut encoded: Vec<(Cow<'_, str>, Cow<'_, str>)> = parameters
        .iter()
        .map(|(k, v)| (percent_encode(k.as_ref()), percent_encode(v.as_ref())))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        percent_encode(normalized_url.as_str()),
        percent_encode(&parameter_string)
    )
}

/// `consumer_secret&token_secret`; the token part is empty before a request
/// token has been issued.
pub fn signing_key(consumer_secret: &str, token_secret: &str) -> String {
    format!("{}&{}", percent_encode(consumer_secret), percent_encode(token_secret))
}

/// Computes the base64 HMAC-SHA1 signature of a request.
pub fn sign<K, V>(
    method: &Method,
    normalized_url: &Url,
    parameters: &[(K, V)],
    consumer_secret: &str,
    token_secret: &str,
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let base_string = signature_base_string(method, normalized_url, parameters);
    tracing::trace!(base_string = %base_string, "computed OAuth signature base string");

    let key = hmac::Key::new(
        hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        signing_key(consumer_secret, token_secret).as_bytes(),
    );
    let tag = hmac::sign(&key, base_string.as_bytes());
    STANDARD.encode(tag.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc5849_parameters() -> Vec<(&'static str, &'static str)> {
        vec![
            ("file", "vacation.jpg"),
            ("size", "original"),
            ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
            ("oauth_token", "nnch734d00sl2jdk"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "137131202"),
            ("oauth_nonce", "chapoH"),
        ]
    }

    #[test]
    fn rfc5849_base_string() {
        let url = Url::parse("http://photos.example.net/photos").unwrap();
        let base = signature_base_string(&Method::GET, &url, &rfc5849_parameters());
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26\
             oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3DchapoH%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D137131202%26\
             oauth_token%3Dnnch734d00sl2jdk%26size%3Doriginal"
        );
    }

    #[test]
    fn rfc5849_signature() {
        let url = Url::parse("http://photos.example.net/photos").unwrap();
        let signature = sign(
            &Method::GET,
            &url,
            &rfc5849_parameters(),
            "kd94hf93k423kf44",
            "pfkkdhi9sl3r4s00",
        );
        assert_eq!(signature, "MdpQcU8iPSUjWoN/UDMsK2sui9I=");
    }

    #[test]
    fn duplicate_keys_sorted_by_value() {
        let url = Url::parse("https://example.com/r").unwrap();
        let params = [("b", "x"), ("a", "2"), ("a", "1")];
        let base = signature_base_string(&Method::POST, &url, &params);
        assert!(base.ends_with("&a%3D1%26a%3D2%26b%3Dx"), "{}", base);
    }

    #[test]
    fn empty_token_secret_keeps_trailing_ampersand() {
        assert_eq!(signing_key("kd94hf93k423kf44", ""), "kd94hf93k423kf44&");
        assert_eq!(signing_key("a b", "c&d"), "a%20b&c%26d");
    }

    #[test]
    fn normalized_url_drops_query_and_fragment() {
        let url = Url::parse("https://Example.com:8443/a/b?x=1&y=2#frag").unwrap();
        assert_eq!(normalized_signing_url(&url).as_str(), "https://example.com:8443/a/b");

        let default_port = Url::parse("http://example.com:80/p?q").unwrap();
        assert_eq!(normalized_signing_url(&default_port).as_str(), "http://example.com/p");
    }

    #[test]
    fn encoding_uses_unreserved_set() {
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("a-b.c_d~e"), "a-b.c_d~e");
        assert_eq!(percent_encode("*!'()"), "%2A%21%27%28%29");
        assert_eq!(percent_encode("☃"), "%E2%98%83");
    }

    #[test]
    fn encoding_round_trips() {
        for s in &["", "plain", "with space", "少女終末旅行", "%41 literal", "a=b&c=d", "🦀"] {
            assert_eq!(percent_decode(&percent_encode(s)).unwrap(), *s);
        }
    }

    #[test]
    fn invalid_utf8_escape_is_an_error() {
        assert!(matches!(percent_decode("%FF%FE"), Err(Error::OAuthProtocol(_))));
    }
}
