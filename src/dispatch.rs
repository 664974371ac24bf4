//! Authenticated request dispatch with bounded forced-refresh retries.
//!
//! Every call obtains a token from the [`TokenManager`], attaches it, and classifies the response
//! through a [`ResponseStrategy`]. An authentication rejection forces a token refresh and resends
//! the same request, at most `max_retries` times; any other failure is surfaced immediately.

mod metrics;
pub mod strategy;

pub use metrics::DispatchMetrics;
pub use strategy::{DefaultResponseStrategy, ResponseContext, ResponseKind, ResponseStrategy};

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	config::{ClientConfig, DEFAULT_MAX_RETRIES},
	http::{self, HttpTransport, Method, RequestAuth, TransportRequest, TransportResponse},
	obs::{self, OpKind, OpOutcome, OpSpan},
	token::TokenManager,
};

/// Description of one open API call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL.
	pub path: String,
	/// Query (GET) or JSON body (POST) params.
	pub params: JsonMap<String, JsonValue>,
}
impl RequestDescriptor {
	/// Creates a GET descriptor without params.
	pub fn get(path: impl Into<String>) -> Self {
		Self { method: Method::Get, path: path.into(), params: JsonMap::new() }
	}

	/// Creates a POST descriptor without params.
	pub fn post(path: impl Into<String>) -> Self {
		Self { method: Method::Post, path: path.into(), params: JsonMap::new() }
	}

	/// Replaces the params.
	pub fn with_params(mut self, params: JsonMap<String, JsonValue>) -> Self {
		self.params = params;

		self
	}

	/// Sets a single param.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.params.insert(key.into(), value.into());

		self
	}

	fn to_request(&self, auth: RequestAuth) -> TransportRequest {
		TransportRequest::new(self.method, self.path.clone())
			.with_params(self.params.clone())
			.with_auth(auth)
	}
}

/// Retry bookkeeping scoped to one dispatch call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryState {
	/// Forced-refresh retries consumed so far.
	pub attempt: u32,
	/// Retry budget.
	pub max_retries: u32,
}
impl RetryState {
	/// Starts a fresh budget.
	pub fn new(max_retries: u32) -> Self {
		Self { attempt: 0, max_retries }
	}

	/// Returns `true` while another forced refresh is allowed.
	pub fn can_retry(&self) -> bool {
		self.attempt < self.max_retries
	}

	/// Consumes one retry.
	pub fn record_retry(&mut self) {
		self.attempt += 1;
	}
}

/// Result of a single send.
#[derive(Debug)]
pub enum AttemptOutcome {
	/// The response was classified as a success.
	Success(JsonValue),
	/// The platform rejected the token; the carried error is surfaced once retries run out.
	RetryableAuthFailure(Error),
	/// Any other failure; surfaced without retry.
	TerminalFailure(Error),
}

/// Sends authenticated requests and retries authentication rejections with a fresh token.
pub struct Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	tokens: Arc<TokenManager<T>>,
	strategy: Arc<dyn ResponseStrategy>,
	max_retries: u32,
	metrics: Arc<DispatchMetrics>,
}
impl<T> Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a dispatcher sharing the manager's transport, with the default strategy and retry
	/// budget.
	pub fn new(tokens: impl Into<Arc<TokenManager<T>>>) -> Self {
		Self {
			tokens: tokens.into(),
			strategy: Arc::new(DefaultResponseStrategy::default()),
			max_retries: DEFAULT_MAX_RETRIES,
			metrics: Arc::new(DispatchMetrics::default()),
		}
	}

	/// Creates a dispatcher using the retry budget and auth failure codes in `config`.
	pub fn from_config(config: &ClientConfig, tokens: impl Into<Arc<TokenManager<T>>>) -> Self {
		Self::new(tokens)
			.with_max_retries(config.max_retries)
			.with_strategy(DefaultResponseStrategy::new(config.auth_failure_codes.iter().copied()))
	}

	/// Overrides the number of forced-refresh retries.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Replaces the response classification strategy.
	pub fn with_strategy<S>(mut self, strategy: S) -> Self
	where
		S: 'static + ResponseStrategy,
	{
		self.strategy = Arc::new(strategy);

		self
	}

	/// Returns the retry budget.
	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}

	/// Returns the token manager.
	pub fn tokens(&self) -> &Arc<TokenManager<T>> {
		&self.tokens
	}

	/// Returns the dispatcher's counters.
	pub fn metrics(&self) -> &Arc<DispatchMetrics> {
		&self.metrics
	}

	/// Sends `descriptor` with a valid token and returns the decoded response body.
	///
	/// Authentication rejections trigger a forced refresh and a resend, at most `max_retries`
	/// times, after which the last rejection is returned as [`Error::Authentication`]. Transport,
	/// decoding, and API failures are returned on the first occurrence.
	pub async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<JsonValue> {
		const KIND: OpKind = OpKind::Dispatch;

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let span = OpSpan::new(KIND, "dispatch");
		let result = span.instrument(self.run(&descriptor)).await;

		match &result {
			Ok(_) => {
				self.metrics.record_success();
				obs::record_op_outcome(KIND, OpOutcome::Success);
			},
			Err(_e) => {
				self.metrics.record_failure();
				obs::record_op_outcome(KIND, OpOutcome::Failure);
				obs::event!(
					warn,
					path = %descriptor.path,
					error = %_e,
					"Dispatch failed."
				);
			},
		}

		result
	}

	/// Dispatches and deserializes the response's `data` member into `D`.
	///
	/// A missing `data` member is treated as `null`.
	pub async fn dispatch_data<D>(&self, descriptor: RequestDescriptor) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let data = match self.dispatch(descriptor).await? {
			JsonValue::Object(mut body) => body.remove("data").unwrap_or(JsonValue::Null),
			_ => JsonValue::Null,
		};

		Ok(http::decode_value(data)?)
	}

	/// Dispatches a GET request.
	pub async fn get(
		&self,
		path: impl Into<String>,
		params: JsonMap<String, JsonValue>,
	) -> Result<JsonValue> {
		self.dispatch(RequestDescriptor::get(path).with_params(params)).await
	}

	/// Dispatches a POST request.
	pub async fn post(
		&self,
		path: impl Into<String>,
		params: JsonMap<String, JsonValue>,
	) -> Result<JsonValue> {
		self.dispatch(RequestDescriptor::post(path).with_params(params)).await
	}

	async fn run(&self, descriptor: &RequestDescriptor) -> Result<JsonValue> {
		let mut state = RetryState::new(self.max_retries);
		let mut force_refresh = false;

		loop {
			let token = self.tokens.token(force_refresh).await?;
			let auth = RequestAuth { app_id: self.tokens.app_id().clone(), token };

			self.metrics.record_attempt();

			match self.attempt(descriptor, auth).await {
				AttemptOutcome::Success(body) => return Ok(body),
				AttemptOutcome::TerminalFailure(e) => return Err(e),
				AttemptOutcome::RetryableAuthFailure(e) => {
					if !state.can_retry() {
						return Err(e);
					}

					state.record_retry();
					self.metrics.record_forced_refresh();
					obs::record_op_outcome(OpKind::Dispatch, OpOutcome::Retry);
					obs::event!(
						warn,
						path = %descriptor.path,
						retry = state.attempt,
						max_retries = state.max_retries,
						"Token rejected; forcing a refresh before resending."
					);

					force_refresh = true;
				},
			}
		}
	}

	async fn attempt(&self, descriptor: &RequestDescriptor, auth: RequestAuth) -> AttemptOutcome {
		match self.tokens.transport().send(descriptor.to_request(auth)).await {
			Ok(response) => self.classify(descriptor, response),
			Err(e) => AttemptOutcome::TerminalFailure(e.into()),
		}
	}

	fn classify(
		&self,
		descriptor: &RequestDescriptor,
		response: TransportResponse,
	) -> AttemptOutcome {
		let decoded = http::decode_json(&response.body);
		let ctx = ResponseContext::new(response.status, decoded.as_ref().ok());
		let kind = self.strategy.classify(&ctx);
		let code = ctx.code();
		let message = ctx.message().map(str::to_owned);

		match (kind, decoded) {
			(ResponseKind::Success, Ok(body)) => AttemptOutcome::Success(body),
			(ResponseKind::Success, Err(e)) => AttemptOutcome::TerminalFailure(e.into()),
			(ResponseKind::AuthFailure, decoded) => {
				let detail = message.unwrap_or_else(|| response.body_preview());

				AttemptOutcome::RetryableAuthFailure(Error::Authentication {
					message: format!(
						"{} {} was rejected with status {}: {detail}",
						descriptor.method, descriptor.path, response.status
					),
					response: decoded.unwrap_or(JsonValue::Null),
				})
			},
			(ResponseKind::ApiFailure, decoded) => AttemptOutcome::TerminalFailure(Error::Api {
				status: response.status,
				code,
				message: message.unwrap_or_else(|| response.body_preview()),
				response: decoded.unwrap_or(JsonValue::Null),
			}),
		}
	}
}
impl<T> Clone for Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			tokens: self.tokens.clone(),
			strategy: self.strategy.clone(),
			max_retries: self.max_retries,
			metrics: self.metrics.clone(),
		}
	}
}
impl<T> Debug for Dispatcher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("tokens", &self.tokens)
			.field("max_retries", &self.max_retries)
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{ScriptedReply, ScriptedTransport, test_cache};

	fn dispatcher(transport: ScriptedTransport) -> Dispatcher<ScriptedTransport> {
		let (_, cache) = test_cache();
		let credential = crate::auth::Credential::new("7438807123", "secret-value")
			.expect("Credential fixture should be valid.");

		Dispatcher::new(TokenManager::new(credential, cache, transport))
	}

	#[test]
	fn retry_state_tracks_budget() {
		let mut state = RetryState::new(1);

		assert!(state.can_retry());

		state.record_retry();

		assert!(!state.can_retry());
		assert_eq!(state.attempt, 1);
		assert!(!RetryState::new(0).can_retry());
	}

	#[test]
	fn descriptor_builders_collect_params() {
		let descriptor = RequestDescriptor::post("/v3/sign-flow/create-by-file")
			.with_param("docs", serde_json::json!([{ "fileId": "f-1" }]))
			.with_param("autoStart", true);

		assert_eq!(descriptor.method, Method::Post);
		assert_eq!(descriptor.params.len(), 2);
		assert_eq!(descriptor.params.get("autoStart"), Some(&JsonValue::Bool(true)));
	}

	#[tokio::test]
	async fn rejection_then_success_refreshes_once() {
		let transport = ScriptedTransport::issuing_tokens(2);

		transport.push_api_reply(ScriptedReply::Json(
			200,
			serde_json::json!({ "code": 401, "message": "token已失效" }),
		));
		transport.push_api_reply(ScriptedReply::Json(200, serde_json::json!({ "code": 0 })));

		let dispatcher = dispatcher(transport);

		dispatcher
			.dispatch(RequestDescriptor::get("/v1/accounts"))
			.await
			.expect("Dispatch should recover after one refresh.");

		let transport = dispatcher.tokens().transport();
		let tokens_sent: Vec<_> = transport
			.requests()
			.into_iter()
			.filter_map(|req| req.auth.map(|auth| auth.token.into_inner()))
			.collect();

		assert_eq!(tokens_sent, vec!["tok-1".to_owned(), "tok-2".to_owned()]);
		assert_eq!(transport.token_requests(), 2);
		assert_eq!(dispatcher.metrics().forced_refreshes(), 1);
	}

	#[tokio::test]
	async fn exhausted_retries_surface_authentication_error() {
		let transport = ScriptedTransport::issuing_tokens(3);

		transport.push_api_reply(ScriptedReply::Json(
			401,
			serde_json::json!({ "code": 401, "message": "token已失效" }),
		));

		let dispatcher = dispatcher(transport);
		let err = dispatcher
			.dispatch(RequestDescriptor::get("/v1/accounts"))
			.await
			.expect_err("Persistent rejection should fail.");

		assert!(err.is_authentication());
		assert_eq!(dispatcher.tokens().transport().api_requests(), 3);
		assert_eq!(dispatcher.metrics().attempts(), 3);
	}

	#[tokio::test]
	async fn transport_failures_are_not_retried() {
		let transport = ScriptedTransport::issuing_tokens(1);

		transport.push_api_reply(ScriptedReply::NetworkFailure("connection reset".into()));

		let dispatcher = dispatcher(transport);
		let err = dispatcher
			.dispatch(RequestDescriptor::get("/v1/accounts"))
			.await
			.expect_err("Network failure should surface.");

		assert!(matches!(err, Error::Transport(_)));
		assert_eq!(dispatcher.tokens().transport().api_requests(), 1);
		assert_eq!(dispatcher.metrics().forced_refreshes(), 0);
	}

	#[tokio::test]
	async fn non_json_error_body_becomes_api_error() {
		let transport = ScriptedTransport::issuing_tokens(1);

		transport.push_api_reply(ScriptedReply::Raw(503, b"upstream unavailable".to_vec()));

		let dispatcher = dispatcher(transport);
		let err = dispatcher
			.dispatch(RequestDescriptor::get("/v1/accounts"))
			.await
			.expect_err("503 should fail.");

		match err {
			Error::Api { status, code, message, response } => {
				assert_eq!(status, 503);
				assert_eq!(code, None);
				assert_eq!(message, "upstream unavailable");
				assert_eq!(response, JsonValue::Null);
			},
			other => panic!("Expected an API error, got {other:?}."),
		}
		assert_eq!(dispatcher.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn non_json_success_body_is_a_decoding_error() {
		let transport = ScriptedTransport::issuing_tokens(1);

		transport.push_api_reply(ScriptedReply::Raw(200, b"OK".to_vec()));

		let err = dispatcher(transport)
			.dispatch(RequestDescriptor::get("/v1/accounts"))
			.await
			.expect_err("Plain text body should fail to decode.");

		assert!(matches!(err, Error::Decoding(_)));
	}

	#[tokio::test]
	async fn dispatch_data_decodes_data_member() {
		#[derive(Debug, Deserialize)]
		#[serde(rename_all = "camelCase")]
		struct Flow {
			sign_flow_id: String,
		}

		let transport = ScriptedTransport::issuing_tokens(1);

		transport.push_api_reply(ScriptedReply::Json(
			200,
			serde_json::json!({ "code": 0, "message": "成功", "data": { "signFlowId": "sf-9" } }),
		));

		let flow: Flow = dispatcher(transport)
			.dispatch_data(RequestDescriptor::post("/v3/sign-flow/create-by-file"))
			.await
			.expect("Data member should decode.");

		assert_eq!(flow.sign_flow_id, "sf-9");
	}

	#[tokio::test]
	async fn dispatch_data_reports_shape_mismatch() {
		let transport = ScriptedTransport::issuing_tokens(1);

		transport
			.push_api_reply(ScriptedReply::Json(200, serde_json::json!({ "code": 0, "data": 7 })));

		let err = dispatcher(transport)
			.dispatch_data::<Vec<String>>(RequestDescriptor::get("/v1/docs"))
			.await
			.expect_err("Number should not decode into a list.");

		assert!(matches!(err, Error::Decoding(_)));
	}
}
