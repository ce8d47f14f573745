use std::{collections::HashMap, future::Future};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dispatcher::Response;
use crate::{Error, Result, TokenReaderError, TokenReaderResult, OAUTH_TOKEN_KEY, OAUTH_TOKEN_SECRET_KEY};

/// Represents response of token acquisition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    pub oauth_token_secret: String,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl TokenResponse {
    /// Every parameter of the response, token and secret included.
    pub fn parameters(&self) -> HashMap<String, String> {
        let mut all = self.remain.clone();
        all.insert(OAUTH_TOKEN_KEY.to_string(), self.oauth_token.clone());
        all.insert(OAUTH_TOKEN_SECRET_KEY.to_string(), self.oauth_token_secret.clone());
        all
    }
}

/// Add parse_oauth_token feature to [`Response`].
// this trait is sealed
pub trait TokenReader: private::Sealed {
    fn parse_oauth_token(&self) -> Result<TokenResponse>;
}

impl TokenReader for Response {
    fn parse_oauth_token(&self) -> Result<TokenResponse> {
        Ok(read_oauth_token(&self.text())?)
    }
}

/// Add parse_oauth_token feature to Future of [`Response`].
// this trait is also sealed
#[async_trait(?Send)]
pub trait TokenReaderFuture: private::SealedWrapper {
    async fn parse_oauth_token(self) -> Result<TokenResponse>;
}

#[async_trait(?Send)]
impl<T, E> TokenReaderFuture for T
where
    T: Future<Output = std::result::Result<Response, E>>,
    E: Into<Error> + 'static,
{
    async fn parse_oauth_token(self) -> Result<TokenResponse> {
        match self.await {
            Ok(resp) => resp.parse_oauth_token(),
            Err(err) => Err(err.into()),
        }
    }
}

/// Decodes an `application/x-www-form-urlencoded` token endpoint body.
pub fn read_oauth_token(text: &str) -> TokenReaderResult<TokenResponse> {
    let mut destructured = url::form_urlencoded::parse(text.as_bytes())
        .into_owned()
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured.remove(OAUTH_TOKEN_KEY);
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (oauth_token, oauth_token_secret) {
        (Some(t), Some(s)) => Ok(TokenResponse {
            oauth_token: t,
            oauth_token_secret: s,
            remain: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text.to_string())),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text.to_string(),
        )),
    }
}

mod private {
    use std::future::Future;

    use crate::dispatcher::Response;
    use crate::Error;

    pub trait Sealed {}
    impl Sealed for Response {}
    pub trait SealedWrapper {}
    impl<T, E> SealedWrapper for T
    where
        T: Future<Output = Result<Response, E>>,
        E: Into<Error>,
    {
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use url::Url;

    use super::*;

    fn response(body: &'static str) -> Response {
        Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            url: Url::parse("https://api.example.com/oauth/request_token").unwrap(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn parse_response_typical() {
        let resp_str_sample = "oauth_token=Z6eEdO8MOmk394WozF5oKyuAv855l4Mlqo7hhlSLik&oauth_token_secret=Kd75W4OQfb2oJTV0vzGzeXftVAwgMnEK9MumzYcM&oauth_callback_confirmed=true";
        for parsed in &[
            read_oauth_token(resp_str_sample).unwrap(),
            serde_urlencoded::from_str::<TokenResponse>(resp_str_sample).unwrap(),
            response(resp_str_sample).parse_oauth_token().unwrap(),
        ] {
            assert_eq!(parsed.oauth_token, "Z6eEdO8MOmk394WozF5oKyuAv855l4Mlqo7hhlSLik");
            assert_eq!(parsed.oauth_token_secret, "Kd75W4OQfb2oJTV0vzGzeXftVAwgMnEK9MumzYcM");
            assert_eq!(parsed.remain.len(), 1);
            assert_eq!(parsed.remain["oauth_callback_confirmed"], "true");
            assert_eq!(parsed.parameters().len(), 3);
        }
    }

    #[test]
    fn parse_response_edge() {
        let resp_str_sample = "oauth_token==&oauth_token_secret=&keyonly=&keyonly2&=&&";
        let parsed = read_oauth_token(resp_str_sample).unwrap();
        assert_eq!(parsed.oauth_token, "=");
        assert_eq!(parsed.oauth_token_secret, "");
        assert_eq!(parsed.remain.len(), 3);
        assert_eq!(parsed.remain["keyonly"], "");
        assert_eq!(parsed.remain["keyonly2"], "");
        assert_eq!(parsed.remain[""], "");
    }

    #[test]
    fn parse_decodes_values() {
        let parsed = read_oauth_token("oauth_token=a%2Fb&oauth_token_secret=c+d%26e&screen_name=%E5%B0%91%E5%A5%B3")
            .unwrap();
        assert_eq!(parsed.oauth_token, "a/b");
        assert_eq!(parsed.oauth_token_secret, "c d&e");
        assert_eq!(parsed.remain["screen_name"], "少女");
    }

    #[test]
    fn parse_minimal() {
        let parsed = read_oauth_token("oauth_token&oauth_token_secret").unwrap();
        assert_eq!(parsed.oauth_token, "");
        assert_eq!(parsed.oauth_token_secret, "");
        assert_eq!(parsed.remain.len(), 0);
    }

    #[test]
    fn parse_token_notfound() {
        let resp_str_sample = "oauth_token_secret=";
        match read_oauth_token(resp_str_sample) {
            Err(TokenReaderError::TokenKeyNotFound(key, resp_str)) => {
                assert_eq!(key, OAUTH_TOKEN_KEY);
                assert_eq!(resp_str, resp_str_sample)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parse_token_secret_notfound() {
        let resp_str_sample = "oauth_token=";
        match read_oauth_token(resp_str_sample) {
            Err(TokenReaderError::TokenKeyNotFound(key, resp_str)) => {
                assert_eq!(key, OAUTH_TOKEN_SECRET_KEY);
                assert_eq!(resp_str, resp_str_sample)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn parse_from_future() {
        let ok = async { Ok::<_, Error>(response("oauth_token=t&oauth_token_secret=s")) };
        let parsed = ok.parse_oauth_token().await.unwrap();
        assert_eq!(parsed.oauth_token, "t");

        let failed = async { Err::<Response, _>(Error::Cancelled) };
        assert!(matches!(failed.parse_oauth_token().await, Err(Error::Cancelled)));

        let malformed = async { Ok::<_, Error>(response("denied=true")) };
        assert!(matches!(
            malformed.parse_oauth_token().await,
            Err(Error::TokenReader(TokenReaderError::TokenKeyNotFound(_, _)))
        ));
    }
}
