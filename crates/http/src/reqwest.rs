// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{sync::LazyLock, time::Duration};

use headers::{ContentLength, HeaderMapExt as _, UserAgent};
use opentelemetry::{
    KeyValue,
    metrics::{Histogram, UpDownCounter},
};
use opentelemetry_semantic_conventions::{
    attribute::{HTTP_REQUEST_BODY_SIZE, HTTP_RESPONSE_BODY_SIZE},
    metric::{HTTP_CLIENT_ACTIVE_REQUESTS, HTTP_CLIENT_REQUEST_DURATION},
    trace::{
        ERROR_TYPE, HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, SERVER_ADDRESS, SERVER_PORT,
        URL_FULL, URL_SCHEME, USER_AGENT_ORIGINAL,
    },
};
use reqwest::{Request, Response, redirect};
use rustls_platform_verifier::ConfigVerifierExt;
use tokio::time::Instant;
use tracing::{Instrument, Span, field::Empty};

use crate::METER;

static USER_AGENT: &str = concat!("tieba-sweep/", env!("CARGO_PKG_VERSION"));

/// Expired sessions bounce through a couple of login pages, anything longer
/// is a loop
const MAX_REDIRECTS: usize = 5;

static HTTP_REQUESTS_DURATION_HISTOGRAM: LazyLock<Histogram<u64>> = LazyLock::new(|| {
    METER
        .u64_histogram(HTTP_CLIENT_REQUEST_DURATION)
        .with_unit("ms")
        .with_description("Duration of HTTP client requests")
        .build()
});

static HTTP_REQUESTS_IN_FLIGHT: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    METER
        .i64_up_down_counter(HTTP_CLIENT_ACTIVE_REQUESTS)
        .with_unit("{requests}")
        .with_description("Number of HTTP client requests in flight")
        .build()
});

/// Create the [`reqwest::Client`] shared by every call to the service
///
/// # Panics
///
/// Panics if the client fails to build, which should never happen
#[must_use]
pub fn client() -> reqwest::Client {
    // `use_preconfigured_tls` accepts `Any`; the annotation catches API
    // changes in rustls-platform-verifier
    let tls_config: rustls::ClientConfig =
        rustls::ClientConfig::with_platform_verifier().expect("failed to create TLS config");

    reqwest::Client::builder()
        .use_preconfigured_tls(tls_config)
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("failed to create HTTP client")
}

/// What gets recorded about an outgoing request, before it is sent
struct RequestAttributes {
    method: String,
    scheme: String,
    server_address: Option<String>,
    server_port: Option<u16>,
}

impl RequestAttributes {
    fn new(request: &Request) -> Self {
        let url = request.url();
        Self {
            method: request.method().to_string(),
            scheme: url.scheme().to_owned(),
            server_address: url.host_str().map(ToOwned::to_owned),
            server_port: url.port_or_known_default(),
        }
    }

    fn span(&self, request: &Request) -> Span {
        let headers = request.headers();
        let user_agent = headers
            .typed_get::<UserAgent>()
            .map(tracing::field::display);
        let body_size = headers.typed_get().map(|ContentLength(len)| len);

        // Listing and token URLs carry the page in the query, forms carry
        // the token in the body; neither is worth recording
        let mut url = request.url().clone();
        url.set_query(None);

        tracing::info_span!(
            "http.client.request",
            "otel.kind" = "client",
            "otel.status_code" = Empty,
            { HTTP_REQUEST_METHOD } = self.method,
            { URL_FULL } = %url,
            { HTTP_RESPONSE_STATUS_CODE } = Empty,
            { SERVER_ADDRESS } = self.server_address,
            { SERVER_PORT } = self.server_port,
            { HTTP_REQUEST_BODY_SIZE } = body_size,
            { HTTP_RESPONSE_BODY_SIZE } = Empty,
            { USER_AGENT_ORIGINAL } = user_agent,
            "http.redirected_to" = Empty,
            "rust.error" = Empty,
        )
    }

    fn metric_labels(&self) -> Vec<KeyValue> {
        let mut labels = vec![
            KeyValue::new(HTTP_REQUEST_METHOD, self.method.clone()),
            KeyValue::new(URL_SCHEME, self.scheme.clone()),
        ];

        if let Some(server_address) = &self.server_address {
            labels.push(KeyValue::new(SERVER_ADDRESS, server_address.clone()));
        }

        if let Some(server_port) = self.server_port {
            labels.push(KeyValue::new(SERVER_PORT, i64::from(server_port)));
        }

        labels
    }
}

fn record_response(span: &Span, request_path: &str, response: &Response) {
    span.record("otel.status_code", "OK");
    span.record(HTTP_RESPONSE_STATUS_CODE, response.status().as_u16());

    if let Some(ContentLength(content_length)) = response.headers().typed_get() {
        span.record(HTTP_RESPONSE_BODY_SIZE, content_length);
    }

    if response.url().path() != request_path {
        span.record("http.redirected_to", response.url().path());
    }
}

async fn send_traced(request: reqwest::RequestBuilder) -> Result<Response, reqwest::Error> {
    let start = Instant::now();
    let (client, request) = request.build_split();
    let request = request?;

    let attributes = RequestAttributes::new(&request);
    let span = attributes.span(&request);
    let mut labels = attributes.metric_labels();
    let request_path = request.url().path().to_owned();

    HTTP_REQUESTS_IN_FLIGHT.add(1, &labels);
    async move {
        let span = Span::current();
        let result = client.execute(request).await;

        HTTP_REQUESTS_IN_FLIGHT.add(-1, &labels);
        let duration = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);

        match &result {
            Ok(response) => {
                record_response(&span, &request_path, response);
                labels.push(KeyValue::new(
                    HTTP_RESPONSE_STATUS_CODE,
                    i64::from(response.status().as_u16()),
                ));
            }
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("rust.error", err as &dyn std::error::Error);
                let error_type = if err.is_timeout() {
                    "TIMEOUT"
                } else {
                    "NO_RESPONSE"
                };
                labels.push(KeyValue::new(ERROR_TYPE, error_type));
            }
        }

        HTTP_REQUESTS_DURATION_HISTOGRAM.record(duration, &labels);
        result
    }
    .instrument(span)
    .await
}

/// Send a [`reqwest::RequestBuilder`] inside an `http.client.request` span,
/// recording the request duration
pub trait RequestBuilderExt {
    /// Send the request with a tracing span.
    fn send_traced(self) -> impl Future<Output = Result<Response, reqwest::Error>> + Send;
}

impl RequestBuilderExt for reqwest::RequestBuilder {
    fn send_traced(self) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        send_traced(self)
    }
}
