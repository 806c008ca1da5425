//! The client façade: verbs, registration, and the shared call pipeline.
//!
//! Every verb funnels into one `perform` routine: merge headers, run the
//! request mutators, resolve the target against the base address, dispatch,
//! settle the outcome into an [`ApiResponse`], run the response mutators,
//! fan out to the monitors. HTTP- and network-level failures are settled,
//! never raised; the `Err` side of a verb's return covers programming
//! errors only.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use lazy_static::lazy_static;
use log::trace;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{self, ClientConfig};
use crate::errors::ApiClientError;
use crate::headers;
use crate::net;
use crate::query::QueryParams;
use crate::response::ApiResponse;
use crate::transform::{
    self, CallOptions, Monitor, RequestContext, RequestTransform, ResponseTransform,
};

lazy_static! {
    // Non-standard verbs the transport passes through untouched.
    static ref LINK: Method = Method::from_bytes(b"LINK").expect("LINK is a valid method token");
    static ref UNLINK: Method =
        Method::from_bytes(b"UNLINK").expect("UNLINK is a valid method token");
}

struct ClientState {
    transport: reqwest::Client,
    base_url: RwLock<Url>,
    default_headers: RwLock<HeaderMap>,
    timeout: Duration,
    cancel: Option<CancellationToken>,
    request_transforms: RwLock<Vec<Arc<dyn RequestTransform>>>,
    response_transforms: RwLock<Vec<Arc<dyn ResponseTransform>>>,
    monitors: RwLock<Vec<Arc<dyn Monitor>>>,
}

/// HTTP client façade that settles every call into an [`ApiResponse`].
///
/// Cloning is cheap and clones share state: registrations, default-header
/// edits and base-address changes made through one clone are visible
/// through the others. Any number of calls may be in flight concurrently;
/// only the mutators within one call are sequential.
#[derive(Clone)]
pub struct ApiClient {
    state: Arc<ClientState>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with default configuration for the given base
    /// address.
    pub fn new(base_url: &str) -> Result<ApiClient, ApiClientError> {
        ApiClient::with_config(ClientConfig::new(base_url))
    }

    /// Create a client from a full configuration.
    ///
    /// This is the one place the façade raises for anything other than a
    /// programming error in a call: malformed construction options.
    pub fn with_config(config: ClientConfig) -> Result<ApiClient, ApiClientError> {
        config.validate()?;
        let base_url = config::parse_base_url(&config.base_url)?;

        let transport = match config.transport {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder();
                if let Some(ua) = &config.user_agent {
                    builder = builder.user_agent(ua);
                }
                if let Some(max) = config.max_redirects {
                    builder = builder.redirect(reqwest::redirect::Policy::limited(max));
                }
                builder.build()?
            }
        };

        let default_headers = headers::merge(&headers::default_headers(), &config.default_headers);

        Ok(ApiClient {
            state: Arc::new(ClientState {
                transport,
                base_url: RwLock::new(base_url),
                default_headers: RwLock::new(default_headers),
                timeout: config.timeout,
                cancel: config.cancel,
                request_transforms: RwLock::new(Vec::new()),
                response_transforms: RwLock::new(Vec::new()),
                monitors: RwLock::new(Vec::new()),
            }),
        })
    }

    // ---------- configuration ----------

    /// Replace the base address for calls dispatched after this returns.
    ///
    /// In-flight calls already resolved their absolute target and are not
    /// retargeted.
    pub fn set_base_url(&self, base_url: &str) -> Result<&Self, ApiClientError> {
        let parsed = config::parse_base_url(base_url)?;
        *self.state.base_url.write().unwrap() = parsed;
        Ok(self)
    }

    /// Current base address.
    pub fn base_url(&self) -> Url {
        self.state.base_url.read().unwrap().clone()
    }

    /// Set or replace one instance-level default header.
    ///
    /// Calls already past their header merge are unaffected; concurrent
    /// calls that have not merged yet pick the new value up. There is no
    /// isolation over this field.
    pub fn set_default_header(&self, name: HeaderName, value: HeaderValue) -> &Self {
        self.state
            .default_headers
            .write()
            .unwrap()
            .insert(name, value);
        self
    }

    /// Snapshot of the instance-level default headers.
    pub fn default_headers(&self) -> HeaderMap {
        self.state.default_headers.read().unwrap().clone()
    }

    // ---------- registration ----------

    /// Append a request mutator. Mutators run before dispatch, in
    /// registration order. There is no way to remove one.
    pub fn on_request(&self, transform: impl RequestTransform + 'static) -> &Self {
        self.state
            .request_transforms
            .write()
            .unwrap()
            .push(Arc::new(transform));
        self
    }

    /// Append a response mutator. Mutators run after the result settles,
    /// in registration order. There is no way to remove one.
    pub fn on_response(&self, transform: impl ResponseTransform + 'static) -> &Self {
        self.state
            .response_transforms
            .write()
            .unwrap()
            .push(Arc::new(transform));
        self
    }

    /// Append a passive monitor. Monitors observe the final result after
    /// the response mutators, in registration order; a panicking monitor
    /// is isolated from the call and from later monitors.
    pub fn on_monitor(&self, monitor: impl Monitor + 'static) -> &Self {
        self.state.monitors.write().unwrap().push(Arc::new(monitor));
        self
    }

    #[cfg(test)]
    fn registered(&self) -> (usize, usize, usize) {
        (
            self.state.request_transforms.read().unwrap().len(),
            self.state.response_transforms.read().unwrap().len(),
            self.state.monitors.read().unwrap().len(),
        )
    }

    // ---------- verbs ----------

    pub async fn get(
        &self,
        path: &str,
        query: impl Into<QueryParams>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_without_body(Method::GET, path, query.into(), options)
            .await
    }

    pub async fn delete(
        &self,
        path: &str,
        query: impl Into<QueryParams>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_without_body(Method::DELETE, path, query.into(), options)
            .await
    }

    pub async fn head(
        &self,
        path: &str,
        query: impl Into<QueryParams>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_without_body(Method::HEAD, path, query.into(), options)
            .await
    }

    pub async fn link(
        &self,
        path: &str,
        query: impl Into<QueryParams>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_without_body(LINK.clone(), path, query.into(), options)
            .await
    }

    pub async fn unlink(
        &self,
        path: &str,
        query: impl Into<QueryParams>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_without_body(UNLINK.clone(), path, query.into(), options)
            .await
    }

    pub async fn post(
        &self,
        path: &str,
        body: impl Into<Option<Value>>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_with_body(Method::POST, path, body.into(), options)
            .await
    }

    pub async fn put(
        &self,
        path: &str,
        body: impl Into<Option<Value>>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_with_body(Method::PUT, path, body.into(), options)
            .await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: impl Into<Option<Value>>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        self.request_with_body(Method::PATCH, path, body.into(), options)
            .await
    }

    async fn request_without_body(
        &self,
        method: Method,
        path: &str,
        query: QueryParams,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        let mut options = options.unwrap_or_default();
        // The explicit query argument wins over anything in the options
        // bag; an absent argument already normalized to empty.
        options.query = query;
        self.perform(method, path, options).await
    }

    async fn request_with_body(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: Option<CallOptions>,
    ) -> Result<ApiResponse, ApiClientError> {
        let mut options = options.unwrap_or_default();
        // The explicit body argument wins over anything in the options bag.
        options.body = body;
        self.perform(method, path, options).await
    }

    // ---------- pipeline ----------

    async fn perform(
        &self,
        method: Method,
        path: &str,
        options: CallOptions,
    ) -> Result<ApiResponse, ApiClientError> {
        let state = &self.state;

        let merged = headers::merge(&state.default_headers.read().unwrap(), &options.headers);

        let mut ctx = RequestContext {
            path: path.to_string(),
            method,
            options: CallOptions {
                headers: merged,
                ..options
            },
        };

        // Snapshot the registration lists up front; registrations made
        // while this call is in flight do not affect it.
        let request_transforms = state.request_transforms.read().unwrap().clone();
        let response_transforms = state.response_transforms.read().unwrap().clone();
        let monitors = state.monitors.read().unwrap().clone();
        trace!(
            "performing {} {} ({} request transforms, {} response transforms, {} monitors)",
            ctx.method,
            ctx.path,
            request_transforms.len(),
            response_transforms.len(),
            monitors.len()
        );

        transform::run_request_transforms(&request_transforms, &mut ctx)
            .await
            .map_err(ApiClientError::RequestTransform)?;

        // The base address is read at dispatch time; a set_base_url after
        // this point affects only later calls.
        let base = state.base_url.read().unwrap().clone();
        let target = base
            .join(&ctx.path)
            .map_err(|source| ApiClientError::InvalidPath {
                path: ctx.path.clone(),
                source,
            })?;

        let body = if net::fetch::carries_body(&ctx.method) {
            match &ctx.options.body {
                Some(body) => Some(serde_json::to_vec(body)?),
                None => None,
            }
        } else {
            None
        };

        let (outcome, duration) = net::dispatch(
            &state.transport,
            target,
            ctx.method.clone(),
            &ctx.options,
            body,
            state.timeout,
            state.cancel.as_ref(),
        )
        .await;

        let RequestContext { options: sent, .. } = ctx;
        let mut response = ApiResponse::from_outcome(outcome, duration, sent);

        transform::run_response_transforms(&response_transforms, &mut response)
            .await
            .map_err(ApiClientError::ResponseTransform)?;

        transform::run_monitors(&monitors, &response);

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issue;
    use crate::response::{Fault, ABORTED_STATUS};
    use crate::transform::TransformStep;
    use anyhow::Result;
    use futures::future::BoxFuture;
    use httpmock::prelude::*;
    // Both globs above export a `Method`; the mock server's wins here.
    use httpmock::Method;
    use serde_json::json;
    use std::net::TcpListener;
    use std::sync::Mutex;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn mock_body() -> Value {
        json!({"a": {"b": [3, 2, 1]}})
    }

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.base_url()).unwrap()
    }

    /// An address nothing listens on.
    fn dead_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }

    #[test]
    fn construction_rejects_malformed_base_urls() {
        let err = ApiClient::new("not a url").unwrap_err();
        assert!(matches!(err, ApiClientError::Config(_)));
    }

    #[test]
    fn registration_chains_and_appends() {
        let client = ApiClient::new("http://localhost:42069").unwrap();

        client
            .on_request(
                |_ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                    Ok(TransformStep::Done)
                },
            )
            .on_response(
                |_response: &mut ApiResponse| -> Result<TransformStep<ApiResponse>> {
                    Ok(TransformStep::Done)
                },
            )
            .on_monitor(|_response: &ApiResponse| {});

        assert_eq!(client.registered(), (1, 1, 1));
    }

    #[tokio::test]
    async fn get_parses_a_json_body() {
        init_logging();
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/number/200");
            then.status(200).json_body(mock_body());
        });

        let client = client_for(&server);
        let result = client.get("/number/200", (), None).await.unwrap();

        assert!(result.ok());
        assert_eq!(result.issue(), Issue::None);
        assert_eq!(result.status(), Some(200));
        assert_eq!(result.body(), Some(&mock_body()));
        assert!(result.original_error().is_none());
    }

    #[tokio::test]
    async fn get_404_with_empty_body_settles_as_client_error() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/missing");
            then.status(404);
        });

        let client = client_for(&server);
        let result = client.get("/missing", (), None).await.unwrap();

        assert!(!result.ok());
        assert_eq!(result.status(), Some(404));
        assert_eq!(result.issue(), Issue::ClientError);
        assert_eq!(result.body(), None);
        assert!(matches!(result.original_error(), Some(Fault::Status(404))));
    }

    #[tokio::test]
    async fn duration_covers_the_transport_wait() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/sleep/150");
            then.status(200)
                .json_body(mock_body())
                .delay(Duration::from_millis(150));
        });

        let client = client_for(&server);
        let options = CallOptions {
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let result = client.get("/sleep/150", (), Some(options)).await.unwrap();

        assert!(result.ok());
        assert!(result.duration() >= Duration::from_millis(150));
        assert!(result.duration() <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn deadline_before_any_response_settles_as_timeout() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let client = client_for(&server);
        let options = CallOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let result = client.get("/slow", (), Some(options)).await.unwrap();

        assert!(!result.ok());
        assert_eq!(result.issue(), Issue::TimeoutError);
        assert_eq!(result.status(), Some(408));
        match result.original_error() {
            Some(Fault::Transport(error)) => assert!(error.is_timeout()),
            other => panic!("expected a transport fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_token_settles_as_abort() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/sleep/150");
            then.status(200).delay(Duration::from_millis(150));
        });

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let client = client_for(&server);
        let options = CallOptions {
            timeout: Some(Duration::from_millis(200)),
            cancel: Some(token),
            ..Default::default()
        };
        let result = client.get("/sleep/150", (), Some(options)).await.unwrap();

        assert!(!result.ok());
        assert_eq!(result.issue(), Issue::AbortError);
        assert_eq!(result.status(), Some(ABORTED_STATUS));
        assert!(matches!(result.original_error(), Some(Fault::Aborted)));
        // The abort record carries no options.
        assert!(result.options().is_none());
    }

    #[tokio::test]
    async fn refused_connection_settles_without_a_status() {
        let client = ApiClient::new(&dead_base_url()).unwrap();
        let result = client.get("/number/200", (), None).await.unwrap();

        assert!(!result.ok());
        assert_eq!(result.status(), None);
        assert_eq!(result.issue(), Issue::ConnectionError);
    }

    #[tokio::test]
    async fn request_transform_can_rewrite_the_path() {
        let server = MockServer::start();
        let _created = server.mock(|when, then| {
            when.method(Method::GET).path("/number/201");
            then.status(201).json_body(mock_body());
        });
        let ok = server.mock(|when, then| {
            when.method(Method::GET).path("/number/200");
            then.status(200).json_body(mock_body());
        });

        let client = client_for(&server);
        client.on_request(
            |ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                ctx.path = ctx.path.replace("/201", "/200");
                Ok(TransformStep::Done)
            },
        );

        let result = client.get("/number/201", (), None).await.unwrap();

        assert_eq!(result.status(), Some(200));
        assert_eq!(ok.calls(), 1);
    }

    #[tokio::test]
    async fn async_transform_effects_are_visible_at_dispatch() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/echo")
                .header("x-first", "yes")
                .query_param("x", "2");
            then.status(200).json_body(json!({"echo": true}));
        });

        let client = client_for(&server);

        // Synchronous mutator first.
        client.on_request(
            |ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                ctx.options
                    .headers
                    .insert("x-first", HeaderValue::from_static("yes"));
                Ok(TransformStep::Done)
            },
        );

        // Then an asynchronous second phase that sees the first mutation
        // and adds its own.
        client.on_request(
            |_ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                Ok(TransformStep::Chain(Box::new(
                    |ctx: &mut RequestContext| -> BoxFuture<'_, Result<()>> {
                        Box::pin(async move {
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            assert!(ctx.options.headers.contains_key("x-first"));
                            ctx.options.query.set("x", "2");
                            Ok(())
                        })
                    },
                )))
            },
        );

        let result = client.get("/echo", [("x", "1")], None).await.unwrap();

        assert_eq!(result.status(), Some(200));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn transform_can_edit_query_parameters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/number/200")
                .query_param("x", "2")
                .query_param("y", "1");
            then.status(200).json_body(mock_body());
        });

        let client = client_for(&server);
        client.on_request(
            |ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                ctx.options.query.set("x", "2");
                ctx.options.query.set("y", "1");
                ctx.options.query.remove("z");
                Ok(TransformStep::Done)
            },
        );

        let result = client
            .get("/number/200", [("x", "1"), ("z", "4")], None)
            .await
            .unwrap();

        assert_eq!(result.status(), Some(200));
        assert_eq!(mock.calls(), 1);

        // The result reflects the options as sent.
        let sent = result.options().unwrap();
        assert_eq!(sent.query.get("x"), Some("2"));
        assert_eq!(sent.query.get("y"), Some("1"));
        assert_eq!(sent.query.get("z"), None);
    }

    #[tokio::test]
    async fn request_transform_errors_propagate_to_the_caller() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET).path("/never");
            then.status(200);
        });

        let client = client_for(&server);
        client.on_request(
            |_ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                anyhow::bail!("refused by transform")
            },
        );

        let err = client.get("/never", (), None).await.unwrap_err();

        assert!(matches!(err, ApiClientError::RequestTransform(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn panicking_monitor_is_isolated() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/observed");
            then.status(200).json_body(json!({"watched": true}));
        });

        let seen = Arc::new(Mutex::new(None));
        let tail = seen.clone();

        let client = client_for(&server);
        client
            .on_monitor(|_response: &ApiResponse| panic!("monitor blew up"))
            .on_monitor(move |response: &ApiResponse| {
                *tail.lock().unwrap() = response.status();
            });

        let result = client.get("/observed", (), None).await.unwrap();

        // The call is unaffected and the later monitor still ran.
        assert!(result.ok());
        assert_eq!(result.body(), Some(&json!({"watched": true})));
        assert_eq!(*seen.lock().unwrap(), Some(200));
    }

    #[tokio::test]
    async fn per_call_headers_override_defaults() {
        let server = MockServer::start();
        let default_hit = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/default")
                .header("x-token", "default");
            then.status(200);
        });
        let override_hit = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/override")
                .header("x-token", "per-call");
            then.status(200);
        });

        let config = ClientConfig::builder(server.base_url())
            .default_header(
                HeaderName::from_static("x-token"),
                HeaderValue::from_static("default"),
            )
            .build()
            .unwrap();
        let client = ApiClient::with_config(config).unwrap();

        // No per-call header: the client default goes out.
        let result = client.get("/default", (), None).await.unwrap();
        assert_eq!(result.status(), Some(200));
        assert_eq!(default_hit.calls(), 1);

        // Same-named per-call header replaces the default.
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("per-call"));
        let options = CallOptions {
            headers,
            ..Default::default()
        };
        let result = client.get("/override", (), Some(options)).await.unwrap();
        assert_eq!(result.status(), Some(200));
        assert_eq!(override_hit.calls(), 1);
    }

    #[tokio::test]
    async fn default_header_mutation_affects_later_calls() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/tagged")
                .header("x-tag", "late");
            then.status(200);
        });

        let client = client_for(&server);
        client.set_default_header(
            HeaderName::from_static("x-tag"),
            HeaderValue::from_static("late"),
        );

        let result = client.get("/tagged", (), None).await.unwrap();
        assert_eq!(result.status(), Some(200));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn post_serializes_the_structured_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/post")
                .header("content-type", "application/json")
                .json_body(json!({"a": "hi"}));
            then.status(200).json_body(json!({"a": "hi"}));
        });

        let client = client_for(&server);
        let result = client.post("/post", json!({"a": "hi"}), None).await.unwrap();

        assert_eq!(result.status(), Some(200));
        assert_eq!(result.body(), Some(&json!({"a": "hi"})));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn request_transform_can_overwrite_the_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/post")
                .json_body(json!({"a": "hi"}));
            then.status(200).json_body(json!({"a": "hi"}));
        });

        let client = client_for(&server);
        client.on_request(
            |ctx: &mut RequestContext| -> Result<TransformStep<RequestContext>> {
                ctx.options.body = Some(json!({"a": "hi"}));
                Ok(TransformStep::Done)
            },
        );

        let result = client.post("/post", mock_body(), None).await.unwrap();

        assert_eq!(result.status(), Some(200));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn put_survives_an_empty_body() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::PUT).path("/post");
            then.status(200).json_body(json!({}));
        });

        let client = client_for(&server);
        let result = client.put("/post", json!({}), None).await.unwrap();

        assert_eq!(result.status(), Some(200));
    }

    #[tokio::test]
    async fn query_parameters_are_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET)
                .path("/echo")
                .query_param("query", "Hello,Bun!");
            then.status(200).json_body(json!({"echo": "Hello,Bun!"}));
        });

        let client = client_for(&server);
        let result = client
            .get("/echo", [("query", "Hello,Bun!")], None)
            .await
            .unwrap();

        assert_eq!(result.issue(), Issue::None);
        assert_eq!(result.body(), Some(&json!({"echo": "Hello,Bun!"})));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn absent_query_normalizes_to_empty() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET).path("/echo");
            then.status(200).json_body(json!({"echo": null}));
        });

        let client = client_for(&server);

        let with_unit = client.get("/echo", (), None).await.unwrap();
        let with_none = client.get("/echo", None::<QueryParams>, None).await.unwrap();

        assert_eq!(with_unit.body(), Some(&json!({"echo": null})));
        assert_eq!(with_none.body(), Some(&json!({"echo": null})));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn link_and_unlink_pass_through() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.path("/linked");
            then.status(200).json_body(json!({"echo": null}));
        });

        let client = client_for(&server);

        let linked = client.link("/linked", (), None).await.unwrap();
        let unlinked = client.unlink("/linked", (), None).await.unwrap();

        assert_eq!(linked.issue(), Issue::None);
        assert_eq!(unlinked.issue(), Issue::None);
    }

    #[tokio::test]
    async fn head_returns_no_body() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::HEAD).path("/exists");
            then.status(200);
        });

        let client = client_for(&server);
        let result = client.head("/exists", (), None).await.unwrap();

        assert!(result.ok());
        assert_eq!(result.body(), None);
    }

    #[tokio::test]
    async fn non_json_success_body_settles_as_unknown() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/text");
            then.status(200).body("not json");
        });

        let client = client_for(&server);
        let result = client.get("/text", (), None).await.unwrap();

        assert!(!result.ok());
        assert_eq!(result.issue(), Issue::UnknownError);
        assert_eq!(result.status(), Some(200));
        match result.original_error() {
            Some(Fault::BodyDecode { text, .. }) => assert_eq!(text, "not json"),
            other => panic!("expected BodyDecode, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_transform_rewrites_the_result_before_monitors() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/raw");
            then.status(200).json_body(json!({"raw": true}));
        });

        let observed = Arc::new(Mutex::new(None));
        let tail = observed.clone();

        let client = client_for(&server);
        client
            .on_response(
                |response: &mut ApiResponse| -> Result<TransformStep<ApiResponse>> {
                    if let ApiResponse::Ok(success) = response {
                        success.body = Some(json!({"replaced": true}));
                    }
                    Ok(TransformStep::Done)
                },
            )
            .on_monitor(move |response: &ApiResponse| {
                *tail.lock().unwrap() = response.body().cloned();
            });

        let result = client.get("/raw", (), None).await.unwrap();

        assert_eq!(result.body(), Some(&json!({"replaced": true})));
        assert_eq!(*observed.lock().unwrap(), Some(json!({"replaced": true})));
    }

    #[tokio::test]
    async fn set_base_url_redirects_later_calls() {
        let first = MockServer::start();
        let second = MockServer::start();
        let _m1 = first.mock(|when, then| {
            when.method(Method::GET).path("/ping");
            then.status(200).json_body(json!({"server": 1}));
        });
        let _m2 = second.mock(|when, then| {
            when.method(Method::GET).path("/ping");
            then.status(200).json_body(json!({"server": 2}));
        });

        let client = ApiClient::new(&first.base_url()).unwrap();

        let before = client.get("/ping", (), None).await.unwrap();
        assert_eq!(before.body(), Some(&json!({"server": 1})));

        client.set_base_url(&second.base_url()).unwrap();
        assert_eq!(client.base_url().as_str(), second.url("/").as_str());

        let after = client.get("/ping", (), None).await.unwrap();
        assert_eq!(after.body(), Some(&json!({"server": 2})));
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_client() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(Method::GET).path("/concurrent");
            then.status(200).json_body(json!({"ok": true}));
        });

        let client = client_for(&server);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.get("/concurrent", (), None).await })
            })
            .collect();

        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            assert!(result.ok());
        }
    }
}
