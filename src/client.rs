//! Request executor and response handler.
//!
//! Every call made through [`ApiClient::send`] resolves to an [`Envelope`]: transport, parse,
//! and server failures are folded into [`Failure`] values instead of propagating as errors.
//! A 401 on an authenticated first attempt enters the refresh protocol: the caller either
//! performs the single in-flight refresh or queues behind it, and then replays its original
//! request exactly once.

// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	envelope::{Envelope, Failure, WireEnvelope},
	http::{ApiHttpClient, HttpRequest, HttpResponse},
	nav::{LogNavigator, Navigator},
	obs::{self, CallKind, CallOutcome, CallSpan},
	refresh::{RefreshCoordinator, RefreshOutcome, RefreshTicket},
	session::{Session, TokenSecret},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestHttpClient};

/// Authenticates a user.
pub const LOGIN_ENDPOINT: &str = "/v1/user/login";
/// Invalidates the session server-side.
pub const LOGOUT_ENDPOINT: &str = "/v1/user/logout";
/// Exchanges the refresh credential for a new pair.
pub const REFRESH_ENDPOINT: &str = "/v1/user/refresh_token";

type EnvelopeFuture<'a> = Pin<Box<dyn Future<Output = Envelope<Value>> + 'a + Send>>;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient>;

/// Per-call request parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOptions {
	/// HTTP method; defaults to `GET`.
	pub method: Method,
	/// JSON body, sent for every method except `GET`.
	pub body: Option<Value>,
	/// Extra headers merged over the defaults.
	pub headers: BTreeMap<String, String>,
	/// Attach the stored access credential; defaults to `true`.
	pub require_auth: bool,
}
impl RequestOptions {
	/// Options for `method` with every other field defaulted.
	pub fn new(method: Method) -> Self {
		Self { method, ..Default::default() }
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Adds or replaces a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Overrides whether the access credential is attached.
	pub fn with_auth(mut self, require_auth: bool) -> Self {
		self.require_auth = require_auth;

		self
	}

	/// Sends the request without the access credential.
	pub fn without_auth(self) -> Self {
		self.with_auth(false)
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self { method: Method::GET, body: None, headers: BTreeMap::new(), require_auth: true }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attempt {
	First,
	Replay,
}

/// Authenticated API client.
///
/// The client owns the transport, the credential session, and the refresh coordinator, so a
/// single instance (shared by reference or behind an [`Arc`]) is the unit of coordination:
/// concurrent callers on the same instance share one in-flight refresh. Clones share the same
/// coordinator and session.
pub struct ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// HTTP transport used for every outbound request.
	pub http_client: Arc<C>,
	/// Persisted credential session.
	pub session: Session,
	/// Validated configuration.
	pub config: ClientConfig,
	/// Redirect capability invoked when the session cannot be recovered.
	pub navigator: Arc<dyn Navigator>,
	/// Refreshing flag and pending-request queue.
	pub refresh: Arc<RefreshCoordinator>,
}
impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_http_client(
		config: ClientConfig,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			session: Session::new(store),
			config,
			navigator: Arc::new(LogNavigator),
			refresh: Default::default(),
		}
	}

	/// Replaces the navigator used after an unrecoverable refresh failure.
	pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
		self.navigator = navigator;

		self
	}

	/// Sends a request and decodes the payload into `T`.
	pub async fn send<T>(&self, endpoint: &str, options: RequestOptions) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.send_value(endpoint, options).await.decode()
	}

	/// Sends a request and returns the raw JSON payload.
	pub async fn send_value(&self, endpoint: &str, options: RequestOptions) -> Envelope<Value> {
		const KIND: CallKind = CallKind::Request;

		let span = CallSpan::new(KIND, "send");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let envelope = span.instrument(self.dispatch(endpoint, &options, Attempt::First)).await;

		obs::record_call_outcome(KIND, CallOutcome::of(envelope.is_success()));

		envelope
	}

	/// Authenticated `GET`.
	pub async fn get<T>(&self, endpoint: &str) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.send(endpoint, RequestOptions::default()).await
	}

	/// Authenticated `POST` with a JSON body.
	pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.send_json(endpoint, Method::POST, body).await
	}

	/// Authenticated `PUT` with a JSON body.
	pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.send_json(endpoint, Method::PUT, body).await
	}

	/// Authenticated `DELETE`.
	pub async fn delete<T>(&self, endpoint: &str) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		self.send(endpoint, RequestOptions::new(Method::DELETE)).await
	}

	/// Maps a response obtained outside [`ApiClient::send`], assuming it was sent with the
	/// currently stored credential.
	pub async fn handle_response(
		&self,
		response: HttpResponse,
		endpoint: &str,
		options: &RequestOptions,
	) -> Envelope<Value> {
		let sent_token = match self.session.access_token().await {
			Ok(token) => token,
			Err(e) => return Failure::from(e).into(),
		};

		self.handle(response, endpoint, options, Attempt::First, sent_token).await
	}

	async fn send_json<T, B>(&self, endpoint: &str, method: Method, body: &B) -> Envelope<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		match serde_json::to_value(body) {
			Ok(body) => self.send(endpoint, RequestOptions::new(method).with_body(body)).await,
			Err(e) => Failure::invalid_request(e).into(),
		}
	}

	fn dispatch<'a>(
		&'a self,
		endpoint: &'a str,
		options: &'a RequestOptions,
		attempt: Attempt,
	) -> EnvelopeFuture<'a> {
		Box::pin(async move {
			let (request, sent_token) = match self.build_request(endpoint, options).await {
				Ok(built) => built,
				Err(e) => {
					obs::event!(warn, error = %e, endpoint, "request could not be built");

					return Failure::from(e).into();
				},
			};
			let response = match self.http_client.execute(request).await {
				Ok(response) => response,
				Err(e) => {
					obs::event!(warn, error = %e, endpoint, "API request failed");

					#[cfg(not(feature = "tracing"))]
					let _ = e;

					return Failure::network().into();
				},
			};

			self.handle(response, endpoint, options, attempt, sent_token).await
		})
	}

	async fn build_request(
		&self,
		endpoint: &str,
		options: &RequestOptions,
	) -> Result<(HttpRequest, Option<TokenSecret>)> {
		let url = self
			.config
			.endpoint_url(endpoint)
			.map_err(|e| Error::invalid_request(format!("endpoint `{endpoint}` is invalid: {e}")))?;
		let uri = url
			.as_str()
			.parse::<Uri>()
			.map_err(|e| Error::invalid_request(format!("endpoint `{endpoint}` is invalid: {e}")))?;
		let mut headers = HeaderMap::new();

		headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		for (name, value) in &options.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|e| Error::invalid_request(format!("header `{name}` is invalid: {e}")))?;
			let value = HeaderValue::from_str(value)
				.map_err(|e| Error::invalid_request(format!("header `{name}` is invalid: {e}")))?;

			headers.insert(name, value);
		}

		let sent_token =
			if options.require_auth { self.session.access_token().await? } else { None };

		if let Some(token) = &sent_token {
			let mut value = HeaderValue::from_str(token.expose()).map_err(|_| {
				Error::invalid_request("stored access credential is not a valid header value")
			})?;

			value.set_sensitive(true);
			headers.insert(self.config.access_header.clone(), value);
		}

		let body = match &options.body {
			Some(body) if options.method != Method::GET => serde_json::to_vec(body)
				.map_err(|e| Error::invalid_request(format!("body could not be encoded: {e}")))?,
			_ => Vec::new(),
		};
		let mut request = HttpRequest::new(body);

		*request.method_mut() = options.method.clone();
		*request.uri_mut() = uri;
		*request.headers_mut() = headers;

		Ok((request, sent_token))
	}

	async fn handle(
		&self,
		response: HttpResponse,
		endpoint: &str,
		options: &RequestOptions,
		attempt: Attempt,
		sent_token: Option<TokenSecret>,
	) -> Envelope<Value> {
		let status = response.status();

		if status == StatusCode::UNAUTHORIZED
			&& attempt == Attempt::First
			&& options.require_auth
			&& !is_refresh_endpoint(endpoint)
		{
			return self.recover(endpoint, options, sent_token).await;
		}

		match serde_json::from_slice::<Value>(response.body()) {
			Ok(body) => WireEnvelope::from_value(body).into_envelope(status.as_u16()),
			Err(e) => {
				obs::event!(
					debug,
					error = %e,
					endpoint,
					status = status.as_u16(),
					"response body is not JSON"
				);

				#[cfg(not(feature = "tracing"))]
				let _ = e;

				Failure::parse().into()
			},
		}
	}

	/// Refresh protocol entered after a 401 on an authenticated first attempt.
	async fn recover(
		&self,
		endpoint: &str,
		options: &RequestOptions,
		sent_token: Option<TokenSecret>,
	) -> Envelope<Value> {
		match self.session.access_token().await {
			// Rotated by another caller: retry with the stored credential.
			Ok(Some(current)) if sent_token.as_ref() != Some(&current) => {
				obs::event!(debug, endpoint, "access credential rotated; replaying");

				return self.replay(endpoint, options).await;
			},
			// Cleared by a failed refresh: the session is already over.
			Ok(None) if sent_token.is_some() => {
				obs::event!(debug, endpoint, "access credential cleared; session over");

				return Failure::session_expired().into();
			},
			Ok(_) => (),
			Err(e) => return Failure::from(e).into(),
		}

		match self.refresh.begin() {
			RefreshTicket::Follower(waiter) => match waiter.await {
				RefreshOutcome::Expired => Failure::session_expired().into(),
				RefreshOutcome::Refreshed | RefreshOutcome::Abandoned =>
					self.replay(endpoint, options).await,
			},
			RefreshTicket::Leader(lease) => {
				let refreshed = self.refresh_token().await;

				if refreshed.payload().is_some() {
					let queued = lease.settle(RefreshOutcome::Refreshed);

					obs::event!(debug, endpoint, queued, "credential refreshed; replaying");

					#[cfg(not(feature = "tracing"))]
					let _ = queued;

					return self.replay(endpoint, options).await;
				}

				obs::event!(
					warn,
					endpoint,
					reason = refreshed.message(),
					"credential refresh failed; ending session"
				);

				if let Err(e) = self.session.clear().await {
					obs::event!(warn, error = %e, "failed to clear credentials");

					#[cfg(not(feature = "tracing"))]
					let _ = e;
				}

				lease.settle(RefreshOutcome::Expired);
				self.navigator.redirect(&self.config.login_path);

				Failure::session_expired().into()
			},
		}
	}

	fn replay<'a>(&'a self, endpoint: &'a str, options: &'a RequestOptions) -> EnvelopeFuture<'a> {
		self.refresh.metrics.record_replay();

		self.dispatch(endpoint, options, Attempt::Replay)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient> {
	/// Creates a client with its own reqwest transport built from `config`.
	pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::from_config(&config)?;

		Ok(Self::with_http_client(config, store, http_client))
	}
}
impl<C> Clone for ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			session: self.session.clone(),
			config: self.config.clone(),
			navigator: self.navigator.clone(),
			refresh: self.refresh.clone(),
		}
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("refreshing", &self.refresh.is_refreshing())
			.finish()
	}
}

fn is_refresh_endpoint(endpoint: &str) -> bool {
	endpoint.split('?').next() == Some(REFRESH_ENDPOINT)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn refresh_endpoint_detection_ignores_queries() {
		assert!(is_refresh_endpoint(REFRESH_ENDPOINT));
		assert!(is_refresh_endpoint("/v1/user/refresh_token?retry=1"));
		assert!(!is_refresh_endpoint(LOGIN_ENDPOINT));
	}

	#[test]
	fn options_default_to_authenticated_get() {
		let options = RequestOptions::default();

		assert_eq!(options.method, Method::GET);
		assert!(options.require_auth);
		assert!(options.body.is_none());

		let options = RequestOptions::new(Method::POST)
			.with_body(serde_json::json!({ "a": 1 }))
			.with_header("x-trace", "1")
			.without_auth();

		assert!(!options.require_auth);
		assert_eq!(options.headers.get("x-trace").map(String::as_str), Some("1"));
	}
}
