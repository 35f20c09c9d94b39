// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{fmt, str::FromStr};

use sweep_engine::{
    BoxError, Category, Classifier as _, DeletionOutcome, Entity, FieldMatch, JsonClassifier,
    RawResponse,
};
use thiserror::Error;
use tracing::warn;

use crate::{TiebaConnection, parse};

/// Set when the daily deletion quota is used up
const QUOTA_EXHAUSTED: FieldMatch = FieldMatch::new("err_code", 220_034);
const SUCCESS: FieldMatch = FieldMatch::new("no", 0);

/// Everything the service lets a user clean up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Thread,
    Reply,
    FollowedBa,
    Concern,
    Fan,
}

impl CategoryKind {
    /// All categories, in processing order
    pub const ALL: [Self; 5] = [
        Self::Thread,
        Self::Reply,
        Self::FollowedBa,
        Self::Concern,
        Self::Fan,
    ];

    /// Stable name, used in the configuration and on the command line
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Reply => "reply",
            Self::FollowedBa => "followed_ba",
            Self::Concern => "concern",
            Self::Fan => "fan",
        }
    }

    const fn listing_path(self) -> &'static str {
        match self {
            Self::Thread => "i/i/my_tie",
            Self::Reply => "i/i/my_reply",
            Self::FollowedBa => "f/like/mylike",
            Self::Concern => "i/i/concern",
            Self::Fan => "i/i/fans",
        }
    }

    const fn delete_path(self) -> &'static str {
        match self {
            Self::Thread | Self::Reply => "f/commit/post/delete",
            Self::FollowedBa => "f/like/commit/delete",
            Self::Concern => "home/post/unfollow",
            Self::Fan => "i/commit",
        }
    }

    /// Posts need a fresh token for each delete, other listings embed one
    const fn needs_fresh_token(self) -> bool {
        matches!(self, Self::Thread | Self::Reply)
    }

    fn classifier(self) -> JsonClassifier {
        let classifier = JsonClassifier::new(SUCCESS);
        match self {
            Self::Thread | Self::Reply => classifier.halt_on(QUOTA_EXHAUSTED),
            Self::FollowedBa | Self::Concern | Self::Fan => classifier,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("unknown category {0:?}, expected one of thread, reply, followed_ba, concern, fan")]
pub struct UnknownCategory(String);

impl FromStr for CategoryKind {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

/// A [`Category`] backed by the service's web pages
pub struct TiebaCategory {
    kind: CategoryKind,
    connection: TiebaConnection,
    classifier: JsonClassifier,
}

impl TiebaCategory {
    #[must_use]
    pub fn new(kind: CategoryKind, connection: TiebaConnection) -> Self {
        Self {
            kind,
            connection,
            classifier: kind.classifier(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> CategoryKind {
        self.kind
    }
}

#[async_trait::async_trait]
impl Category for TiebaCategory {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn volatile_fields(&self) -> &[&'static str] {
        &["tbs"]
    }

    #[tracing::instrument(
        name = "tieba.collect",
        skip_all,
        fields(category = self.kind.name(), page = page),
        err(Debug),
    )]
    async fn collect(&self, page: u32) -> Result<Vec<Entity>, BoxError> {
        let html = self
            .connection
            .fetch_listing(self.kind.listing_path(), page)
            .await?;

        Ok(parse::entities(self.kind, &html)?)
    }

    async fn delete(&self, entity: &Entity) -> RawResponse {
        if !self.kind.needs_fresh_token() {
            return self
                .connection
                .post_form(self.kind.delete_path(), entity)
                .await;
        }

        let token = match self.connection.fetch_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(
                    error = &err as &dyn std::error::Error,
                    %entity,
                    "Not deleting, no anti-forgery token"
                );
                return RawResponse::no_response(err.to_string());
            }
        };

        let form = entity.clone().with("tbs", token);
        self.connection
            .post_form(self.kind.delete_path(), &form)
            .await
    }

    fn classify(&self, response: &RawResponse) -> DeletionOutcome {
        self.classifier.classify(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use serde_json::json;
    use sweep_engine::{Engine, FailureReason, HaltReason, Progress, RunConfig, RunResult};
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string, method, path, query_param},
    };

    use super::*;
    use crate::{CollectError, Session, TokenRetry};

    async fn connection(server: &MockServer) -> TiebaConnection {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let session = Session::from_raw_cookie("BDUSS=secret").unwrap();
        let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();

        TiebaConnection::new(base_url, &session, sweep_http::reqwest_client())
            .unwrap()
            .with_token_retry(TokenRetry {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
            })
    }

    fn enabled() -> RunConfig {
        RunConfig {
            enable: true,
            ..RunConfig::default()
        }
    }

    #[test]
    fn names_round_trip() {
        for kind in CategoryKind::ALL {
            assert_eq!(kind.name().parse::<CategoryKind>().unwrap(), kind);
        }

        assert!("threads".parse::<CategoryKind>().is_err());
    }

    #[test]
    fn quota_halts_posts_only() {
        let body = RawResponse::received(200, r#"{"no": 1, "err_code": 220034}"#);

        assert_matches!(
            CategoryKind::Reply.classifier().classify(&body),
            DeletionOutcome::HaltRequested { .. }
        );
        assert_matches!(
            CategoryKind::Fan.classifier().classify(&body),
            DeletionOutcome::SoftFailure(FailureReason::Rejected { .. })
        );
    }

    #[tokio::test]
    async fn thread_delete_uses_a_fresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dc/common/tbs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tbs": "fresh" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/f/commit/post/delete"))
            .and(body_string("tid=1&pid=2&tbs=fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "no": 0, "err_code": 0 })))
            .expect(1)
            .mount(&server)
            .await;

        let category = TiebaCategory::new(CategoryKind::Thread, connection(&server).await);
        let response = category
            .delete(&Entity::new().with("tid", "1").with("pid", "2"))
            .await;

        assert_eq!(category.classify(&response), DeletionOutcome::Success);
    }

    #[tokio::test]
    async fn missing_token_is_no_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dc/common/tbs"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let category = TiebaCategory::new(CategoryKind::Reply, connection(&server).await);
        let response = category
            .delete(&Entity::new().with("tid", "1").with("pid", "2"))
            .await;

        assert_matches!(response, RawResponse::NoResponse { .. });
        assert_matches!(
            category.classify(&response),
            DeletionOutcome::SoftFailure(FailureReason::NoResponse { .. })
        );
    }

    #[tokio::test]
    async fn collect_error_keeps_its_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/fans"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<input class="btn_follow" portrait="tb.1.x">"#),
            )
            .mount(&server)
            .await;

        let category = TiebaCategory::new(CategoryKind::Fan, connection(&server).await);
        let err = category.collect(1).await.unwrap_err();
        assert_matches!(err.downcast_ref::<CollectError>(), Some(CollectError::MissingToken));
    }

    #[tokio::test]
    async fn unfollows_every_followed_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/concern"))
            .and(query_param("pn", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"
                    <input class="btn_unfollow" portrait="tb.1.a" tbs="t1">
                    <input class="btn_unfollow" portrait="tb.1.b" tbs="t1">
                "#,
            ))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        // Once everyone is unfollowed the listing is empty
        Mock::given(method("GET"))
            .and(path("/i/i/concern"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<ul></ul>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/home/post/unfollow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "no": 0 })))
            .expect(2)
            .mount(&server)
            .await;

        let category = TiebaCategory::new(CategoryKind::Concern, connection(&server).await);
        let result = Engine::new(Duration::ZERO, Progress::default())
            .run(&category, &enabled())
            .await
            .unwrap();

        let stats = assert_matches!(result, RunResult::Exhausted(stats) => stats);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.last_page, 1);
    }

    #[tokio::test]
    async fn daily_quota_halts_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/i/i/my_tie"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"
                    <a class="thread_title" href="/p/10?pid=20">a</a>
                    <a class="thread_title" href="/p/11?pid=21">b</a>
                "#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dc/common/tbs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tbs": "t" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/f/commit/post/delete"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "no": 220_034, "err_code": 220_034 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let category = TiebaCategory::new(CategoryKind::Thread, connection(&server).await);
        let result = Engine::new(Duration::ZERO, Progress::default())
            .run(&category, &enabled())
            .await
            .unwrap();

        assert_matches!(
            result,
            RunResult::Halted {
                reason: HaltReason::Requested { .. },
                ..
            }
        );
    }
}
