//! Response classification hooks used by the dispatcher.
//!
//! A strategy only sees crate-owned data (status, decoded body, preview), so custom rules never
//! depend on the HTTP stack behind the transport.

// self
use crate::{_prelude::*, config::DEFAULT_AUTH_FAILURE_CODE};

/// Decides whether a response is a success, an authentication rejection, or an API failure.
pub trait ResponseStrategy
where
	Self: Send + Sync,
{
	/// Classifies one response.
	fn classify(&self, ctx: &ResponseContext<'_>) -> ResponseKind;
}

/// Response categories understood by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
	/// The call succeeded; the decoded body is returned to the caller.
	Success,
	/// The platform rejected the token; the dispatcher refreshes and resends.
	AuthFailure,
	/// The platform rejected the call for another reason; surfaced without retry.
	ApiFailure,
}

/// Response data passed to [`ResponseStrategy::classify`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResponseContext<'a> {
	/// HTTP status code.
	pub status: u16,
	/// Decoded body, or `None` when the body was not JSON.
	pub body: Option<&'a JsonValue>,
}
impl<'a> ResponseContext<'a> {
	/// Creates a context from a status and optional decoded body.
	pub fn new(status: u16, body: Option<&'a JsonValue>) -> Self {
		Self { status, body }
	}

	/// Returns the body's business `code`, accepting numbers and numeric strings.
	pub fn code(&self) -> Option<i64> {
		match self.body?.get("code")? {
			JsonValue::Number(number) => number.as_i64(),
			JsonValue::String(text) => text.trim().parse().ok(),
			_ => None,
		}
	}

	/// Returns the body's `message`, when present.
	pub fn message(&self) -> Option<&'a str> {
		self.body?.get("message")?.as_str()
	}
}

/// Default classification for open API responses.
///
/// HTTP 401 and any body `code` listed in `auth_failure_codes` are authentication failures.
/// Other error statuses and non-zero codes are API failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultResponseStrategy {
	auth_failure_codes: Vec<i64>,
}
impl DefaultResponseStrategy {
	/// Creates a strategy treating `codes` as authentication failures.
	pub fn new(codes: impl IntoIterator<Item = i64>) -> Self {
		Self { auth_failure_codes: codes.into_iter().collect() }
	}

	/// Returns the body codes treated as authentication failures.
	pub fn auth_failure_codes(&self) -> &[i64] {
		&self.auth_failure_codes
	}
}
impl Default for DefaultResponseStrategy {
	fn default() -> Self {
		Self::new([DEFAULT_AUTH_FAILURE_CODE])
	}
}
impl ResponseStrategy for DefaultResponseStrategy {
	fn classify(&self, ctx: &ResponseContext<'_>) -> ResponseKind {
		let code = ctx.code();

		if ctx.status == 401 {
			return ResponseKind::AuthFailure;
		}
		if code.is_some_and(|code| self.auth_failure_codes.contains(&code)) {
			return ResponseKind::AuthFailure;
		}
		if ctx.status >= 400 {
			return ResponseKind::ApiFailure;
		}

		match code {
			Some(code) if code != 0 => ResponseKind::ApiFailure,
			_ => ResponseKind::Success,
		}
	}
}
