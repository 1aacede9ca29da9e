//! Uniform response envelope returned by every API call, success or failure.
//!
//! Servers answer in a few shapes (`{code, msg, data}`, `{success, message, data}`,
//! `{statusCode, message, payload}`). [`WireEnvelope`] normalizes them at the boundary so
//! downstream code only ever matches on [`Envelope`].

// self
use crate::{_prelude::*, store::StoreError};

/// Status code carried by every successful envelope.
pub const STATUS_OK: i64 = 200;

/// Category of a failed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
	/// Network unreachable, DNS failure, or timeout.
	Transport,
	/// Body was not JSON or the payload did not match the expected type.
	Parse,
	/// HTTP success, but the server reported a failure status.
	Application,
	/// Non-success HTTP status.
	Http,
	/// Authorization failed and the credential could not be refreshed.
	SessionExpired,
	/// No refresh credential is stored.
	MissingCredential,
	/// Request could not be assembled locally.
	InvalidRequest,
	/// Credential storage failed.
	Storage,
}
impl FailureKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FailureKind::Transport => "transport",
			FailureKind::Parse => "parse",
			FailureKind::Application => "application",
			FailureKind::Http => "http",
			FailureKind::SessionExpired => "session_expired",
			FailureKind::MissingCredential => "missing_credential",
			FailureKind::InvalidRequest => "invalid_request",
			FailureKind::Storage => "storage",
		}
	}
}
impl Display for FailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure half of an [`Envelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
	/// Failure category.
	pub kind: FailureKind,
	/// Status code reported to callers; never 200.
	pub status: i64,
	/// Human-readable message suitable for inline display.
	pub message: String,
}
impl Failure {
	/// Creates a failure, bumping a 200 status to 500 so success stays unambiguous.
	pub fn new(kind: FailureKind, status: i64, message: impl Into<String>) -> Self {
		let status = if status == STATUS_OK { 500 } else { status };

		Self { kind, status, message: message.into() }
	}

	/// Transport failure (network unreachable, DNS, timeout).
	pub fn network() -> Self {
		Self::new(FailureKind::Transport, 500, "Network error, please check your connection.")
	}

	/// Body could not be parsed or decoded.
	pub fn parse() -> Self {
		Self::new(FailureKind::Parse, 500, "Failed to parse the response.")
	}

	/// Refresh failed; the user must log in again.
	pub fn session_expired() -> Self {
		Self::new(FailureKind::SessionExpired, 401, "Session expired, please log in again.")
	}

	/// No refresh credential is stored.
	pub fn missing_refresh_token() -> Self {
		Self::new(FailureKind::MissingCredential, 400, "No refresh token found.")
	}

	/// Credential storage is unavailable.
	pub fn storage() -> Self {
		Self::new(FailureKind::Storage, 500, "Credential storage is unavailable.")
	}

	/// Request could not be built locally.
	pub fn invalid_request(reason: impl Display) -> Self {
		let message = format!("Request could not be built: {reason}.");

		Self::new(FailureKind::InvalidRequest, 400, message)
	}
}
impl Display for Failure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} ({}): {}", self.kind, self.status, self.message)
	}
}
impl From<&Error> for Failure {
	fn from(err: &Error) -> Self {
		match err {
			Error::Storage(_) => Self::storage(),
			Error::Config(e) => Self::invalid_request(e),
			Error::Transport(_) => Self::network(),
			Error::Decode { .. } => Self::parse(),
			Error::InvalidRequest { reason } => Self::invalid_request(reason),
		}
	}
}
impl From<Error> for Failure {
	fn from(err: Error) -> Self {
		Self::from(&err)
	}
}
impl From<StoreError> for Failure {
	fn from(_: StoreError) -> Self {
		Self::storage()
	}
}

/// Uniform result of an API call.
#[derive(Clone, Debug, PartialEq)]
pub enum Envelope<T> {
	/// Call succeeded (`status_code() == 200`).
	Success {
		/// Server-supplied or fixed success message.
		message: String,
		/// Decoded payload, when the server sent one.
		payload: Option<T>,
	},
	/// Call failed.
	Failure(Failure),
}
impl<T> Envelope<T> {
	/// Builds a success envelope.
	pub fn success(message: impl Into<String>, payload: Option<T>) -> Self {
		Self::Success { message: message.into(), payload }
	}

	/// Returns 200 on success, otherwise the failure status.
	pub fn status_code(&self) -> i64 {
		match self {
			Self::Success { .. } => STATUS_OK,
			Self::Failure(failure) => failure.status,
		}
	}

	/// Returns the envelope message.
	pub fn message(&self) -> &str {
		match self {
			Self::Success { message, .. } => message,
			Self::Failure(failure) => &failure.message,
		}
	}

	/// Returns `true` for [`Envelope::Success`].
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success { .. })
	}

	/// Borrows the payload, if any.
	pub fn payload(&self) -> Option<&T> {
		match self {
			Self::Success { payload, .. } => payload.as_ref(),
			Self::Failure(_) => None,
		}
	}

	/// Consumes the envelope, returning the payload, if any.
	pub fn into_payload(self) -> Option<T> {
		match self {
			Self::Success { payload, .. } => payload,
			Self::Failure(_) => None,
		}
	}

	/// Borrows the failure, if any.
	pub fn failure(&self) -> Option<&Failure> {
		match self {
			Self::Success { .. } => None,
			Self::Failure(failure) => Some(failure),
		}
	}

	/// Converts into a standard [`Result`](std::result::Result).
	pub fn into_result(self) -> std::result::Result<Option<T>, Failure> {
		match self {
			Self::Success { payload, .. } => Ok(payload),
			Self::Failure(failure) => Err(failure),
		}
	}

	/// Maps the payload type.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
		match self {
			Self::Success { message, payload } =>
				Envelope::Success { message, payload: payload.map(f) },
			Self::Failure(failure) => Envelope::Failure(failure),
		}
	}
}
impl Envelope<Value> {
	/// Decodes the raw JSON payload into `T`; a mismatch yields the parse failure.
	pub fn decode<T>(self) -> Envelope<T>
	where
		T: DeserializeOwned,
	{
		match self {
			Self::Success { message, payload: None | Some(Value::Null) } =>
				Envelope::Success { message, payload: None },
			Self::Success { message, payload: Some(value) } =>
				match serde_path_to_error::deserialize(value) {
					Ok(payload) => Envelope::Success { message, payload: Some(payload) },
					Err(e) => {
						let err = Error::from(e);

						crate::obs::event!(warn, error = ?err, "payload has an unexpected shape");

						Envelope::Failure(Failure::from(err))
					},
				},
			Self::Failure(failure) => Envelope::Failure(failure),
		}
	}
}
impl<T> From<Failure> for Envelope<T> {
	fn from(failure: Failure) -> Self {
		Self::Failure(failure)
	}
}

/// Lenient view over a raw server body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WireEnvelope {
	/// `code` or `statusCode`.
	pub code: Option<i64>,
	/// `msg`, falling back to `message`.
	pub msg: Option<String>,
	/// `data` or `payload`.
	pub data: Option<Value>,
	/// `success`, when the server uses the boolean variant.
	pub success: Option<bool>,
}
impl WireEnvelope {
	/// Extracts known fields from a parsed body; non-object bodies yield an empty view.
	pub fn from_value(body: Value) -> Self {
		let Value::Object(mut map) = body else {
			return Self::default();
		};
		let code = map.get("code").or_else(|| map.get("statusCode")).and_then(Value::as_i64);
		let msg = map
			.get("msg")
			.and_then(Value::as_str)
			.or_else(|| map.get("message").and_then(Value::as_str))
			.map(ToOwned::to_owned);
		let success = map.get("success").and_then(Value::as_bool);
		let data = map.remove("data").or_else(|| map.remove("payload"));

		Self { code, msg, data, success }
	}

	/// Maps the wire view into an envelope given the HTTP status.
	pub fn into_envelope(self, http_status: u16) -> Envelope<Value> {
		let http_ok = (200..300).contains(&http_status);

		if !http_ok {
			let status = match self.code {
				Some(code) if code != STATUS_OK => code,
				_ => i64::from(http_status),
			};
			let message = self.msg.unwrap_or_else(|| format!("Request failed ({http_status})"));

			return Envelope::Failure(Failure::new(FailureKind::Http, status, message));
		}
		if self.success == Some(false) {
			let status = self.code.filter(|code| *code != STATUS_OK).unwrap_or(500);
			let message = self.msg.unwrap_or_else(|| "Operation failed".into());

			return Envelope::Failure(Failure::new(FailureKind::Application, status, message));
		}

		let code = self.code.unwrap_or(STATUS_OK);

		if code == STATUS_OK {
			let message = self.msg.unwrap_or_else(|| "OK".into());

			Envelope::Success { message, payload: self.data }
		} else {
			let message = self.msg.unwrap_or_else(|| format!("Request failed ({code})"));

			Envelope::Failure(Failure::new(FailureKind::Application, code, message))
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn canonical_shape_maps_to_success() {
		let envelope = WireEnvelope::from_value(json!({
			"code": 200,
			"msg": "ok",
			"data": { "total": 3 }
		}))
		.into_envelope(200);

		assert_eq!(envelope.status_code(), 200);
		assert_eq!(envelope.message(), "ok");
		assert_eq!(envelope.payload(), Some(&json!({ "total": 3 })));
	}

	#[test]
	fn variant_shapes_normalize_identically() {
		let a = WireEnvelope::from_value(json!({ "success": true, "message": "done", "data": 1 }))
			.into_envelope(200);
		let b =
			WireEnvelope::from_value(json!({ "statusCode": 200, "message": "done", "payload": 1 }))
				.into_envelope(200);

		assert_eq!(a, b);
		assert_eq!(a, Envelope::success("done", Some(json!(1))));
	}

	#[test]
	fn missing_fields_default_to_ok() {
		let envelope = WireEnvelope::from_value(json!({})).into_envelope(201);

		assert_eq!(envelope, Envelope::success("OK", None));
	}

	#[test]
	fn application_failures_keep_server_code_and_message() {
		let envelope = WireEnvelope::from_value(json!({ "code": 40001, "msg": "duplicate key" }))
			.into_envelope(200);
		let failure = envelope.failure().expect("Non-200 code should be a failure.");

		assert_eq!(failure.kind, FailureKind::Application);
		assert_eq!(failure.status, 40001);
		assert_eq!(failure.message, "duplicate key");

		let envelope = WireEnvelope::from_value(json!({ "success": false })).into_envelope(200);

		assert_eq!(envelope.status_code(), 500);
		assert_eq!(envelope.message(), "Operation failed");
	}

	#[test]
	fn http_failures_fall_back_to_status() {
		let envelope = WireEnvelope::from_value(json!({ "error": "boom" })).into_envelope(503);

		assert_eq!(envelope.status_code(), 503);
		assert_eq!(envelope.message(), "Request failed (503)");

		let envelope = WireEnvelope::from_value(json!({ "code": 200, "message": "nope" }))
			.into_envelope(404);

		assert_eq!(envelope.status_code(), 404);
		assert_eq!(envelope.message(), "nope");
	}

	#[test]
	fn decode_reports_type_mismatch_as_parse_failure() {
		#[derive(Debug, Deserialize, PartialEq)]
		struct Page {
			total: u32,
		}

		let ok = Envelope::success("OK", Some(json!({ "total": 2 }))).decode::<Page>();

		assert_eq!(ok.into_payload(), Some(Page { total: 2 }));

		let bad = Envelope::success("OK", Some(json!({ "total": "two" }))).decode::<Page>();

		assert_eq!(bad.failure().map(|f| f.kind), Some(FailureKind::Parse));

		let empty = Envelope::success("OK", Some(Value::Null)).decode::<Page>();

		assert!(empty.is_success());
		assert!(empty.payload().is_none());
	}

	#[test]
	fn failures_never_report_success_status() {
		let failure = Failure::new(FailureKind::Application, STATUS_OK, "odd");

		assert_ne!(failure.status, STATUS_OK);
	}
}
