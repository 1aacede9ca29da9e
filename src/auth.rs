//! Login, logout, and refresh accessors layered over the executor.

// crates.io
use ::http::Method;
// self
use crate::{
	_prelude::*,
	client::{ApiClient, LOGIN_ENDPOINT, LOGOUT_ENDPOINT, REFRESH_ENDPOINT, RequestOptions},
	envelope::{Envelope, Failure},
	http::ApiHttpClient,
	obs::{self, CallKind, CallOutcome, CallSpan},
	session::CredentialPair,
};

/// Credentials submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
	/// Account name; remembered locally after a successful login.
	#[serde(rename = "Username")]
	pub username: String,
	/// Account password.
	#[serde(rename = "Password")]
	pub password: String,
}
impl LoginRequest {
	/// Builds a login request.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: password.into() }
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Currently remembered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
	/// Username persisted at login.
	pub username: String,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

impl<C> ApiClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Authenticates without a credential header and persists the issued pair on success.
	pub async fn login(&self, credentials: &LoginRequest) -> Envelope<CredentialPair> {
		const KIND: CallKind = CallKind::Login;

		let span = CallSpan::new(KIND, "login");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let envelope = span
			.instrument(async move {
				let body = match serde_json::to_value(credentials) {
					Ok(body) => body,
					Err(e) => return Failure::invalid_request(e).into(),
				};
				let options = RequestOptions::new(Method::POST).with_body(body).without_auth();
				let pair = match self.send::<CredentialPair>(LOGIN_ENDPOINT, options).await {
					Envelope::Success { payload: Some(pair), .. } => pair,
					other => return other,
				};

				if let Err(e) = self.session.save_login(&pair, &credentials.username).await {
					obs::event!(warn, error = %e, "failed to persist login credentials");

					return Failure::from(e).into();
				}

				Envelope::success("Login succeeded.", Some(pair))
			})
			.await;

		obs::record_call_outcome(KIND, CallOutcome::of(envelope.is_success()));

		envelope
	}

	/// Ends the session: best-effort server logout, then local credentials are always cleared.
	///
	/// The server call is skipped when no access credential is stored.
	pub async fn logout(&self) {
		const KIND: CallKind = CallKind::Logout;

		let span = CallSpan::new(KIND, "logout");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		span.instrument(async move {
			if matches!(self.session.access_token().await, Ok(Some(_))) {
				let envelope = self.get::<Value>(LOGOUT_ENDPOINT).await;

				if envelope.is_success() {
					obs::event!(debug, "server-side logout succeeded");
				} else {
					obs::event!(warn, reason = envelope.message(), "server-side logout failed");
				}
			}

			self.clear_session().await;
		})
		.await;

		obs::record_call_outcome(KIND, CallOutcome::Success);
	}

	/// Exchanges the stored refresh credential for a new pair.
	///
	/// Fails fast when no refresh credential is stored. Any failure clears the persisted
	/// session; success stores the new pair.
	pub async fn refresh_token(&self) -> Envelope<CredentialPair> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refresh_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let envelope = span
			.instrument(async move {
				let refresh = match self.session.refresh_token().await {
					Ok(Some(refresh)) => refresh,
					Ok(None) => return Failure::missing_refresh_token().into(),
					Err(e) => return Failure::from(e).into(),
				};
				let body = RefreshBody { refresh_token: refresh.expose() };
				let body = match serde_json::to_value(body) {
					Ok(body) => body,
					Err(e) => return Failure::invalid_request(e).into(),
				};
				let options = RequestOptions::new(Method::POST).with_body(body).without_auth();
				let envelope = self.send::<CredentialPair>(REFRESH_ENDPOINT, options).await;
				let pair = match envelope {
					Envelope::Success { payload: Some(pair), .. } => pair,
					Envelope::Success { payload: None, .. } => {
						self.clear_session().await;

						return Failure::parse().into();
					},
					Envelope::Failure(failure) => {
						self.clear_session().await;

						return failure.into();
					},
				};

				if let Err(e) = self.session.save_pair(&pair).await {
					obs::event!(warn, error = %e, "failed to persist refreshed credentials");

					return Failure::from(e).into();
				}

				Envelope::success("Token refreshed.", Some(pair))
			})
			.await;

		obs::record_call_outcome(KIND, CallOutcome::of(envelope.is_success()));

		envelope
	}

	/// `true` when an access credential and the logged-in marker are stored.
	pub async fn is_logged_in(&self) -> bool {
		self.session.is_logged_in().await.unwrap_or(false)
	}

	/// Username remembered from the last login.
	pub async fn current_user(&self) -> Option<CurrentUser> {
		self.session.username().await.ok().flatten().map(|username| CurrentUser { username })
	}

	/// Removes every persisted session key; failures are logged, never surfaced.
	pub async fn clear_session(&self) {
		if let Err(e) = self.session.clear().await {
			obs::event!(warn, error = %e, "failed to clear persisted credentials");

			#[cfg(not(feature = "tracing"))]
			let _ = e;
		}
	}
}
