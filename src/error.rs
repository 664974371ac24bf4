//! Client-level error types shared across the token manager, dispatcher, and caches.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Cache backend failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Response body could not be decoded.
	#[error(transparent)]
	Decoding(#[from] DecodingError),

	/// The token endpoint did not issue a token, or the platform kept rejecting the token after
	/// every permitted refresh.
	#[error("Authentication failed: {message}. response: {response}")]
	Authentication {
		/// Human-readable summary of the failure.
		message: String,
		/// Decoded response body kept for diagnostics.
		response: JsonValue,
	},
	/// The platform rejected the call for a reason unrelated to authentication.
	#[error("Request failed with status {status}: {message}.")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Platform business code, when the body carried one.
		code: Option<i64>,
		/// Platform- or client-supplied message.
		message: String,
		/// Decoded response body (`null` when the body was not JSON).
		response: JsonValue,
	},
}
impl Error {
	/// Returns `true` for [`Error::Authentication`].
	pub fn is_authentication(&self) -> bool {
		matches!(self, Self::Authentication { .. })
	}

	/// Returns the decoded response attached to authentication or API failures.
	pub fn response(&self) -> Option<&JsonValue> {
		match self {
			Self::Authentication { response, .. } | Self::Api { response, .. } => Some(response),
			_ => None,
		}
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Credential identifier failed validation.
	#[error(transparent)]
	InvalidAppId(#[from] crate::auth::AppIdError),
	/// Credential secret is empty.
	#[error("Client secret cannot be empty.")]
	EmptySecret,
	/// Base URL cannot be parsed or joined with a request path.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Cache key override or prefix produced an empty key.
	#[error("Cache key cannot be empty.")]
	EmptyCacheKey,
	/// Token time-to-live must be positive.
	#[error("Token TTL must be positive.")]
	NonPositiveTtl,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network or timeout).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Request path, when known.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request to {path} timed out.")]
	Timeout {
		/// Request path.
		path: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error with no path context.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { path: "<unknown>".into(), source: Box::new(src) }
	}

	/// Wraps a transport-specific network error raised while calling `path`.
	pub fn network_at(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Response decoding failures.
#[derive(Debug, ThisError)]
pub enum DecodingError {
	/// Body is not valid JSON.
	#[error("Response body is not valid JSON: {preview}")]
	InvalidJson {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// Leading part of the body for diagnostics.
		preview: String,
	},
	/// Body carries extra content after the JSON value.
	#[error("Response body has trailing data after the JSON value: {preview}")]
	TrailingData {
		/// Parser failure at the trailing content.
		#[source]
		source: serde_json::Error,
		/// Leading part of the body for diagnostics.
		preview: String,
	},
	/// Response `data` did not match the requested type.
	#[error("Response data does not match the expected shape.")]
	UnexpectedShape {
		/// Path-aware deserialization failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
