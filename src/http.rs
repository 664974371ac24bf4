//! Transport primitives for calls against the open API.
//!
//! [`HttpTransport`] is the client's only dependency on an HTTP stack. It performs one raw
//! request described by a [`TransportRequest`] and hands back the status plus the undecoded body;
//! [`decode_json`] turns that body into a [`JsonValue`]. The token manager and dispatcher never
//! talk to reqwest directly, so tests and custom stacks can plug in their own transport.

// crates.io
use serde::de::DeserializeOwned;
#[cfg(feature = "reqwest")] use reqwest::header::CONTENT_TYPE;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppId},
	error::{DecodingError, TransportError},
};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// Header carrying the application identifier on authenticated calls.
pub const APP_ID_HEADER: &str = "X-Tsign-Open-App-Id";
/// Header carrying the bearer token on authenticated calls.
pub const TOKEN_HEADER: &str = "X-Tsign-Open-Token";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to execute a single open API request.
///
/// Implementations resolve `request.path` against their configured base URL, place GET params in
/// the query string and POST params in a JSON body, and attach [`APP_ID_HEADER`] +
/// [`TOKEN_HEADER`] when `request.auth` is present. They report any HTTP status as a successful
/// [`TransportResponse`]; only failures to obtain a response are [`TransportError`]s.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the raw response.
	fn send(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// HTTP methods used by the open API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// `GET`, params encoded as a query string.
	Get,
	/// `POST`, params encoded as a JSON body.
	Post,
}
impl Method {
	/// Returns the canonical method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Identity attached to authenticated calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestAuth {
	/// Application identifier sent in [`APP_ID_HEADER`].
	pub app_id: AppId,
	/// Bearer token sent in [`TOKEN_HEADER`].
	pub token: AccessToken,
}

/// One raw outbound request.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the transport's base URL (e.g. `/v1/oauth2/access_token`).
	pub path: String,
	/// Request parameters.
	pub params: JsonMap<String, JsonValue>,
	/// Authentication headers; `None` for the token endpoint itself.
	pub auth: Option<RequestAuth>,
}
impl TransportRequest {
	/// Creates an unauthenticated request without params.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), params: JsonMap::new(), auth: None }
	}

	/// Replaces the params.
	pub fn with_params(mut self, params: JsonMap<String, JsonValue>) -> Self {
		self.params = params;

		self
	}

	/// Attaches authentication headers.
	pub fn with_auth(mut self, auth: RequestAuth) -> Self {
		self.auth = Some(auth);

		self
	}

	/// Flattens params into query pairs; nested values are sent as compact JSON.
	pub fn query_pairs(&self) -> Vec<(String, String)> {
		self.params
			.iter()
			.map(|(key, value)| {
				let value = match value {
					JsonValue::String(text) => text.clone(),
					JsonValue::Null => String::new(),
					other => other.to_string(),
				};

				(key.clone(), value)
			})
			.collect()
	}
}

/// Raw response returned by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Undecoded body bytes.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Creates a response from its parts.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns a truncated, lossy UTF-8 rendering of the body for diagnostics.
	pub fn body_preview(&self) -> String {
		body_preview(&self.body)
	}
}

/// Decodes a raw response body as JSON.
pub fn decode_json(body: &[u8]) -> Result<JsonValue, DecodingError> {
	let mut de = serde_json::Deserializer::from_slice(body);
	let value = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| DecodingError::InvalidJson { source, preview: body_preview(body) })?;

	de.end()
		.map_err(|source| DecodingError::TrailingData { source, preview: body_preview(body) })?;

	Ok(value)
}

/// Deserializes a decoded value into `D`, reporting the failing path.
pub fn decode_value<D>(value: JsonValue) -> Result<D, DecodingError>
where
	D: DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| DecodingError::UnexpectedShape { source })
}

pub(crate) fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);

	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return text.into_owned();
	}

	let mut buf = String::new();

	for (idx, ch) in text.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}

		buf.push(ch);
	}

	buf
}

/// reqwest-backed [`HttpTransport`] bound to one base URL.
///
/// Redirects are not followed; the open API answers directly and a redirect would replay
/// credentials against another host.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with its own reqwest client using `timeout` for every call.
	pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ConfigError> {
		let client = Self::client_builder(timeout).build()?;

		Ok(Self::with_client(client, base_url))
	}

	/// Returns a reqwest builder with the call timeout set and redirects disabled.
	///
	/// Callers that need extra TLS or proxy settings can extend it and hand the built client to
	/// [`ReqwestTransport::with_client`].
	pub fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
		ReqwestClient::builder()
			.timeout(timeout.unsigned_abs())
			.redirect(reqwest::redirect::Policy::none())
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, base_url: Url) -> Self {
		Self { client, base_url }
	}

	/// Builds a transport from the base URL and timeout in `config`.
	pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
		Self::new(config.resolved_base_url()?, config.timeout)
	}

	/// Returns the base URL requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	async fn execute(
		&self,
		request: TransportRequest,
	) -> Result<TransportResponse, TransportError> {
		let path = request.path.as_str();
		let url = self.base_url.join(path).map_err(|e| TransportError::network_at(path, e))?;
		let mut builder = match request.method {
			Method::Get => self.client.get(url).query(&request.query_pairs()),
			Method::Post => {
				let body = serde_json::to_vec(&request.params)
					.map_err(|e| TransportError::network_at(path, e))?;

				self.client.post(url).header(CONTENT_TYPE, "application/json").body(body)
			},
		};

		if let Some(auth) = &request.auth {
			let app_id: &str = &auth.app_id;

			builder = builder
				.header(APP_ID_HEADER, app_id)
				.header(TOKEN_HEADER, auth.token.expose());
		}

		let response = builder.send().await.map_err(|e| map_reqwest_error(path, e))?;
		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(|e| map_reqwest_error(path, e))?;

		Ok(TransportResponse::new(status, body.to_vec()))
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: TransportRequest) -> TransportFuture<'_> {
		Box::pin(self.execute(request))
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(path: &str, err: ReqwestError) -> TransportError {
	if err.is_timeout() {
		TransportError::Timeout { path: path.to_owned() }
	} else {
		TransportError::network_at(path, err)
	}
}
