//! Credential session persisted through a [`CredentialStore`].
//!
//! Four string keys make up a session: the access credential, the refresh credential, the
//! logged-in marker, and the last-known username. They are always cleared together.

// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreError},
};

/// Storage key for the access credential.
pub const ACCESS_TOKEN_KEY: &str = "access-token";
/// Storage key for the refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refresh-token";
/// Storage key for the logged-in marker.
pub const LOGGED_IN_KEY: &str = "isLoggedIn";
/// Storage key for the last-known username.
pub const USERNAME_KEY: &str = "username";

const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USERNAME_KEY, LOGGED_IN_KEY];

/// Redacted token wrapper keeping credentials out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access + refresh credentials issued by login or refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived credential attached to authenticated requests.
	pub access_token: TokenSecret,
	/// Long-lived credential exchanged for a new pair.
	pub refresh_token: TokenSecret,
}
impl CredentialPair {
	/// Builds a pair from raw strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}
}

/// Typed view over the credential keys held in a [`CredentialStore`].
#[derive(Clone)]
pub struct Session {
	store: Arc<dyn CredentialStore>,
}
impl Session {
	/// Wraps the provided store.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self { store }
	}

	/// Underlying store handle.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Stored access credential, if any.
	pub async fn access_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.store.get(ACCESS_TOKEN_KEY).await?.map(TokenSecret::new))
	}

	/// Stored refresh credential, if any.
	pub async fn refresh_token(&self) -> Result<Option<TokenSecret>, StoreError> {
		Ok(self.store.get(REFRESH_TOKEN_KEY).await?.map(TokenSecret::new))
	}

	/// Last-known username.
	pub async fn username(&self) -> Result<Option<String>, StoreError> {
		self.store.get(USERNAME_KEY).await
	}

	/// `true` when an access credential exists and the logged-in marker is set.
	pub async fn is_logged_in(&self) -> Result<bool, StoreError> {
		let token = self.store.get(ACCESS_TOKEN_KEY).await?;
		let flag = self.store.get(LOGGED_IN_KEY).await?;

		Ok(token.is_some_and(|t| !t.is_empty()) && flag.as_deref() == Some("true"))
	}

	/// Persists a freshly issued pair together with the username that logged in.
	pub async fn save_login(
		&self,
		pair: &CredentialPair,
		username: &str,
	) -> Result<(), StoreError> {
		self.save_pair(pair).await?;
		self.store.set(USERNAME_KEY, username.to_owned()).await
	}

	/// Persists a rotated pair; the username is left untouched.
	pub async fn save_pair(&self, pair: &CredentialPair) -> Result<(), StoreError> {
		self.store.set(ACCESS_TOKEN_KEY, pair.access_token.expose().to_owned()).await?;
		self.store.set(REFRESH_TOKEN_KEY, pair.refresh_token.expose().to_owned()).await?;
		self.store.set(LOGGED_IN_KEY, "true".into()).await
	}

	/// Removes every session key, attempting all of them even if one fails.
	pub async fn clear(&self) -> Result<(), StoreError> {
		let mut first_error = None;

		for key in SESSION_KEYS {
			if let Err(e) = self.store.remove(key).await {
				first_error.get_or_insert(e);
			}
		}

		first_error.map_or(Ok(()), Err)
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Session(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn session() -> (Session, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());

		(Session::new(backend.clone()), backend)
	}

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn credential_pair_reads_wire_fields() {
		let pair: CredentialPair =
			serde_json::from_str(r#"{"access_token":"A1","refresh_token":"R1"}"#)
				.expect("Credential pair should decode from wire JSON.");

		assert_eq!(pair, CredentialPair::new("A1", "R1"));
		assert!(!format!("{pair:?}").contains("A1"));
	}

	#[tokio::test]
	async fn login_then_clear_empties_every_key() {
		let (session, backend) = session();

		session
			.save_login(&CredentialPair::new("A1", "R1"), "ops")
			.await
			.expect("Saving login should succeed.");

		assert!(session.is_logged_in().await.expect("Logged-in check should succeed."));
		assert_eq!(backend.peek(USERNAME_KEY).as_deref(), Some("ops"));
		assert_eq!(backend.len(), 4);

		session.clear().await.expect("Clearing the session should succeed.");

		assert!(backend.is_empty());
		assert!(!session.is_logged_in().await.expect("Logged-in check should succeed."));
	}

	#[tokio::test]
	async fn rotation_keeps_username() {
		let (session, backend) = session();

		session
			.save_login(&CredentialPair::new("A1", "R1"), "ops")
			.await
			.expect("Saving login should succeed.");
		session
			.save_pair(&CredentialPair::new("A2", "R2"))
			.await
			.expect("Saving rotated pair should succeed.");

		assert_eq!(backend.peek(ACCESS_TOKEN_KEY).as_deref(), Some("A2"));
		assert_eq!(backend.peek(REFRESH_TOKEN_KEY).as_deref(), Some("R2"));
		assert_eq!(backend.peek(USERNAME_KEY).as_deref(), Some("ops"));
	}
}
