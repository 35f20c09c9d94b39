// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use reqwest::{
    Method, StatusCode,
    header::{COOKIE, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use sweep_engine::{Entity, RawResponse};
use sweep_http::RequestBuilderExt as _;
use tracing::{debug, warn};
use url::Url;

use crate::{CollectError, Session, SessionError, TokenError, TokenRetry};

const SESSION_CHECK_PATH: &str = "i/i/my_tie";
const TOKEN_PATH: &str = "dc/common/tbs";

#[derive(Deserialize)]
struct TokenResponse {
    tbs: String,
}

/// An authenticated connection to the service
///
/// Cheap to clone, clones share the underlying HTTP client.
#[derive(Clone)]
pub struct TiebaConnection {
    base_url: Url,
    cookie: HeaderValue,
    user_agent: Option<HeaderValue>,
    token_retry: TokenRetry,
    http_client: reqwest::Client,
}

impl TiebaConnection {
    /// Create a connection sending the given session's cookies
    ///
    /// # Errors
    ///
    /// Returns an error if the cookies can't be sent as a header
    pub fn new(
        base_url: Url,
        session: &Session,
        http_client: reqwest::Client,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            base_url,
            cookie: session.header_value()?,
            user_agent: None,
            token_retry: TokenRetry::default(),
            http_client,
        })
    }

    /// Override the user agent of the HTTP client
    ///
    /// # Errors
    ///
    /// Returns an error if the user agent can't be sent as a header
    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, SessionError> {
        self.user_agent = Some(HeaderValue::from_str(user_agent)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_token_retry(mut self, token_retry: TokenRetry) -> Self {
        self.token_retry = token_retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn builder(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .header(COOKIE, self.cookie.clone());

        match &self.user_agent {
            Some(user_agent) => builder.header(USER_AGENT, user_agent.clone()),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> Result<reqwest::RequestBuilder, url::ParseError> {
        Ok(self.builder(Method::GET, self.base_url.join(path)?))
    }

    fn post(&self, path: &str) -> Result<reqwest::RequestBuilder, url::ParseError> {
        Ok(self.builder(Method::POST, self.base_url.join(path)?))
    }

    /// Check that the session is still logged in
    ///
    /// Expired sessions get redirected away from the user's own pages.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Expired`] if the session is not logged in, or
    /// [`SessionError::Http`] if the service could not be reached
    #[tracing::instrument(name = "tieba.validate_session", skip_all, err(Debug))]
    pub async fn validate_session(&self) -> Result<(), SessionError> {
        let check_url = self.base_url.join(SESSION_CHECK_PATH)?;
        let response = self
            .builder(Method::GET, check_url.clone())
            .send_traced()
            .await
            .map_err(|e| {
                // Expired sessions can bounce between login pages forever
                if e.is_redirect() {
                    SessionError::Expired
                } else {
                    SessionError::Http(e)
                }
            })?;

        if response.status() != StatusCode::OK || response.url().path() != check_url.path() {
            debug!(
                status = response.status().as_u16(),
                final_url = %response.url(),
                "Session check did not land on the expected page"
            );
            return Err(SessionError::Expired);
        }

        Ok(())
    }

    /// Fetch the HTML of a listing page
    ///
    /// # Errors
    ///
    /// Returns an error if the page could not be fetched, or if the service
    /// answered with an error status
    pub async fn fetch_listing(&self, path: &str, page: u32) -> Result<String, CollectError> {
        let response = self
            .get(path)?
            .query(&[("pn", page)])
            .send_traced()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    async fn fetch_token_once(&self) -> Result<String, TokenError> {
        let response: TokenResponse = self
            .get(TOKEN_PATH)?
            .send_traced()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.tbs.is_empty() {
            return Err(TokenError::Empty);
        }

        Ok(response.tbs)
    }

    /// Fetch a fresh anti-forgery token, retrying with an exponential backoff
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Exhausted`] once all attempts failed
    #[tracing::instrument(name = "tieba.fetch_token", skip_all, err(Debug))]
    pub async fn fetch_token(&self) -> Result<String, TokenError> {
        let mut attempt = 1;
        loop {
            match self.fetch_token_once().await {
                Ok(token) => return Ok(token),
                Err(err) if attempt >= self.token_retry.max_attempts => {
                    return Err(TokenError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.token_retry.backoff(attempt);
                    warn!(
                        error = &err as &dyn std::error::Error,
                        attempt,
                        ?delay,
                        "Failed to fetch the anti-forgery token, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Post the fields of an entity as a form
    ///
    /// Transport errors are not errors here, they are reported as
    /// [`RawResponse::NoResponse`] for the classifier to handle.
    pub async fn post_form(&self, path: &str, entity: &Entity) -> RawResponse {
        let form: Vec<(&str, &str)> = entity.iter().collect();

        let request = match self.post(path) {
            Ok(request) => request,
            Err(err) => return RawResponse::no_response(format!("invalid URL {path:?}: {err}")),
        };

        let response = match request.form(&form).send_traced().await {
            Ok(response) => response,
            Err(err) => return RawResponse::no_response(err.to_string()),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => RawResponse::received(status, body),
            Err(err) => RawResponse::no_response(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string, header, method, path, query_param},
    };

    use super::*;

    async fn connection(server: &MockServer) -> TiebaConnection {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let session = Session::from_raw_cookie("BDUSS=secret; STOKEN=other").unwrap();
        let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();

        TiebaConnection::new(base_url, &session, sweep_http::reqwest_client())
            .unwrap()
            .with_token_retry(TokenRetry {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            })
    }

    #[tokio::test]
    async fn valid_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/my_tie"))
            .and(header("cookie", "BDUSS=secret; STOKEN=other"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        connection(&server).await.validate_session().await.unwrap();
    }

    #[tokio::test]
    async fn redirected_session_is_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/my_tie"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/passport/login"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/passport/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("please log in"))
            .mount(&server)
            .await;

        let result = connection(&server).await.validate_session().await;
        assert_matches!(result, Err(SessionError::Expired));
    }

    #[tokio::test]
    async fn login_redirect_loop_is_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/my_tie"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/passport/login"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/passport/login"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/passport/login"))
            .mount(&server)
            .await;

        let result = connection(&server).await.validate_session().await;
        assert_matches!(result, Err(SessionError::Expired));
    }

    #[tokio::test]
    async fn error_status_session_is_expired() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/my_tie"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = connection(&server).await.validate_session().await;
        assert_matches!(result, Err(SessionError::Expired));
    }

    #[tokio::test]
    async fn custom_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/my_tie"))
            .and(header("user-agent", "Firefox"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        connection(&server)
            .await
            .with_user_agent("Firefox")
            .unwrap()
            .validate_session()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fetch_listing_sends_the_page_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/fans"))
            .and(query_param("pn", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_string("page four"))
            .expect(1)
            .mount(&server)
            .await;

        let body = connection(&server)
            .await
            .fetch_listing("i/i/fans", 4)
            .await
            .unwrap();
        assert_eq!(body, "page four");
    }

    #[tokio::test]
    async fn fetch_listing_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/fans"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = connection(&server).await.fetch_listing("i/i/fans", 1).await;
        assert_matches!(result, Err(CollectError::Http(_)));
    }

    #[tokio::test]
    async fn token_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dc/common/tbs"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dc/common/tbs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tbs": "0123456789abcdef01",
                "is_login": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = connection(&server).await.fetch_token().await.unwrap();
        assert_eq!(token, "0123456789abcdef01");
    }

    #[tokio::test]
    async fn token_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dc/common/tbs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tbs": "" })))
            .expect(3)
            .mount(&server)
            .await;

        let result = connection(&server).await.fetch_token().await;
        let last = assert_matches!(
            result,
            Err(TokenError::Exhausted { attempts: 3, last }) => last
        );
        assert_matches!(*last, TokenError::Empty);
    }

    #[tokio::test]
    async fn post_form_sends_entity_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/i/commit"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("cmd=add_black_list&tbs=abc&portrait=tb.1.xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"no":0}"#))
            .expect(1)
            .mount(&server)
            .await;

        let entity = Entity::new()
            .with("cmd", "add_black_list")
            .with("tbs", "abc")
            .with("portrait", "tb.1.xyz");

        let response = connection(&server).await.post_form("i/commit", &entity).await;
        assert_eq!(response, RawResponse::received(200, r#"{"no":0}"#));
    }

    #[tokio::test]
    async fn post_form_without_response() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let session = Session::from_raw_cookie("BDUSS=secret").unwrap();
        // Nothing listens on the discard port
        let base_url = Url::parse("http://127.0.0.1:9/").unwrap();
        let connection =
            TiebaConnection::new(base_url, &session, sweep_http::reqwest_client()).unwrap();

        let response = connection.post_form("i/commit", &Entity::new()).await;
        assert_matches!(response, RawResponse::NoResponse { .. });
    }

    #[tokio::test]
    async fn unresolvable_paths_are_not_requested() {
        let server = MockServer::start().await;
        let connection = connection(&server).await;
        let broken = "http://[not-an-address/";

        let result = connection.fetch_listing(broken, 1).await;
        assert_matches!(result, Err(CollectError::InvalidUrl(_)));

        let response = connection.post_form(broken, &Entity::new()).await;
        let reason = assert_matches!(response, RawResponse::NoResponse { reason } => reason);
        assert!(reason.contains("invalid URL"));

        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests.is_empty());
    }
}
