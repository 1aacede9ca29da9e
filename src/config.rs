//! Client configuration: backend base URL, credential header, login path, and timeout.

// std
use std::{env, time::Duration};
// crates.io
use ::http::HeaderName;
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable holding the backend base URL.
pub const ENV_BASE_URL: &str = "CONSOLE_API_BASE_URL";
/// Environment variable overriding the access credential header name.
pub const ENV_ACCESS_HEADER: &str = "CONSOLE_API_ACCESS_HEADER";
/// Environment variable overriding the unauthenticated entry point.
pub const ENV_LOGIN_PATH: &str = "CONSOLE_API_LOGIN_PATH";
/// Environment variable holding the transport timeout in whole seconds.
pub const ENV_TIMEOUT_SECS: &str = "CONSOLE_API_TIMEOUT_SECS";

/// Default header carrying the access credential.
pub const DEFAULT_ACCESS_HEADER: &str = "x-access-token";
/// Default unauthenticated entry point.
pub const DEFAULT_LOGIN_PATH: &str = "/";

/// Validated client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Backend base URL; endpoints are appended verbatim.
	pub base_url: Url,
	/// Header the access credential is sent under.
	pub access_header: HeaderName,
	/// Location the navigator is sent to after an unrecoverable refresh failure.
	pub login_path: String,
	/// Transport timeout applied by the default reqwest client.
	pub timeout: Option<Duration>,
}
impl ClientConfig {
	/// Starts a builder for the provided base URL.
	pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Loads configuration from `CONSOLE_API_*` environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		let base_url = env::var(ENV_BASE_URL)
			.map_err(|_| ConfigError::MissingVariable { name: ENV_BASE_URL })?;
		let mut builder = Self::builder(base_url);

		if let Ok(header) = env::var(ENV_ACCESS_HEADER) {
			builder = builder.access_header(header);
		}
		if let Ok(path) = env::var(ENV_LOGIN_PATH) {
			builder = builder.login_path(path);
		}
		if let Ok(raw) = env::var(ENV_TIMEOUT_SECS) {
			let secs = raw
				.trim()
				.parse::<u64>()
				.ok()
				.filter(|secs| *secs > 0)
				.ok_or(ConfigError::InvalidTimeout { value: raw.clone() })?;

			builder = builder.timeout(Duration::from_secs(secs));
		}

		builder.build()
	}

	/// Joins the base URL with an endpoint path (which may carry a query string).
	pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
		let base = self.base_url.as_str().trim_end_matches('/');

		if endpoint.starts_with('/') {
			Url::parse(&format!("{base}{endpoint}"))
		} else {
			Url::parse(&format!("{base}/{endpoint}"))
		}
	}
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	base_url: String,
	access_header: String,
	login_path: String,
	timeout: Option<Duration>,
}
impl ClientConfigBuilder {
	fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			access_header: DEFAULT_ACCESS_HEADER.into(),
			login_path: DEFAULT_LOGIN_PATH.into(),
			timeout: None,
		}
	}

	/// Overrides the access credential header name.
	pub fn access_header(mut self, name: impl Into<String>) -> Self {
		self.access_header = name.into();

		self
	}

	/// Overrides the unauthenticated entry point.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Sets the transport timeout.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Validates and builds the configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = Url::parse(self.base_url.trim())
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { scheme: base_url.scheme().into() });
		}

		let access_header = HeaderName::from_bytes(self.access_header.trim().as_bytes())
			.map_err(|source| ConfigError::InvalidHeaderName { source })?;

		if !self.login_path.starts_with('/') {
			return Err(ConfigError::InvalidLoginPath { path: self.login_path });
		}

		Ok(ClientConfig {
			base_url,
			access_header,
			login_path: self.login_path,
			timeout: self.timeout,
		})
	}
}
