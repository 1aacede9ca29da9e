//! Redirect capability used when a session cannot be recovered.

// self
use crate::_prelude::*;

/// Sends the application to another location (the login screen after a failed refresh).
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Redirects to `location`.
	fn redirect(&self, location: &str);
}

/// Navigator for headless use; logs the redirect and does nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNavigator;
impl Navigator for LogNavigator {
	fn redirect(&self, location: &str) {
		crate::obs::event!(info, location, "session ended; redirecting to login");

		#[cfg(not(feature = "tracing"))]
		let _ = location;
	}
}

/// Navigator that remembers every redirect, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator(Mutex<Vec<String>>);
impl RecordingNavigator {
	/// Redirects recorded so far.
	pub fn history(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	/// Most recent redirect, if any.
	pub fn last(&self) -> Option<String> {
		self.0.lock().last().cloned()
	}
}
impl Navigator for RecordingNavigator {
	fn redirect(&self, location: &str) {
		self.0.lock().push(location.to_owned());
	}
}
