//! Request dispatcher every endpoint wrapper funnels through.
//!
//! [`Dispatcher::execute`] resolves the request URL (absolute `http(s)` URLs such as
//! pagination links are used verbatim, anything else is appended to the API base),
//! encodes query parameters, attaches the provider's `Authorization` header, sends the
//! request through the retrying transport, and classifies the response:
//!
//! | Response                | Outcome                                            |
//! |-------------------------|----------------------------------------------------|
//! | `429`                   | [`Error::RateLimitReached`] with the `Retry-After` hint |
//! | `4xx` with a body       | [`Error::DeviceNotFound`] or [`Error::Request`]    |
//! | `4xx` without a body    | [`Error::Request`] with an empty message           |
//! | `5xx`                   | [`Error::Server`]                                  |
//! | `204` or an empty body  | `Ok(None)`                                         |
//! | anything else           | parsed JSON, or [`Error::Decode`]                  |

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{Method, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	catalog::IdentifierNormalizer,
	error::{ConfigError, TransportError},
	http,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	params::{ParamValue, QueryParams},
	provider::TokenProvider,
	service::ServiceDescriptor,
	transport::{RetryPolicy, RetryingTransport},
};

const MESSAGE_PREVIEW_LIMIT: usize = 256;
const NO_ACTIVE_DEVICE: &str = "NO_ACTIVE_DEVICE";

/// One outbound API call.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
	/// HTTP verb.
	pub method: Method,
	/// Path relative to the API base, or an absolute URL.
	pub path: String,
	/// Query parameters, encoded at send time.
	pub query: QueryParams,
	/// JSON body, if any.
	pub body: Option<Value>,
}
impl RequestSpec {
	/// Creates a request without query parameters or body.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: QueryParams::new(), body: None }
	}

	/// `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// `PUT` request.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Replaces the query parameters.
	pub fn with_query(mut self, query: QueryParams) -> Self {
		self.query = query;

		self
	}

	/// Adds or replaces one query parameter.
	pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
		self.query.insert(name, value);

		self
	}

	/// Sets the JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}
}

/// Paging object returned by list endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
	/// Items on this page.
	pub items: Vec<T>,
	/// Link to this page.
	#[serde(default)]
	pub href: Option<String>,
	/// Requested page size.
	#[serde(default)]
	pub limit: Option<u64>,
	/// Offset of the first item.
	#[serde(default)]
	pub offset: Option<u64>,
	/// Total number of items across pages.
	#[serde(default)]
	pub total: Option<u64>,
	/// Absolute URL of the next page.
	#[serde(default)]
	pub next: Option<String>,
	/// Absolute URL of the previous page.
	#[serde(default)]
	pub previous: Option<String>,
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
	provider: Arc<dyn TokenProvider>,
	descriptor: Option<ServiceDescriptor>,
	timeout: Option<StdDuration>,
	retry_policy: RetryPolicy,
	http_client: Option<ReqwestClient>,
}
impl DispatcherBuilder {
	/// Creates a builder around `provider`.
	pub fn new(provider: impl 'static + TokenProvider) -> Self {
		Self {
			provider: Arc::new(provider),
			descriptor: None,
			timeout: None,
			retry_policy: RetryPolicy::default(),
			http_client: None,
		}
	}

	/// Targets a non-default service (defaults to [`ServiceDescriptor::spotify`]).
	pub fn descriptor(mut self, descriptor: ServiceDescriptor) -> Self {
		self.descriptor = Some(descriptor);

		self
	}

	/// Applies a per-request timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Overrides the transport retry policy.
	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Supplies a pre-built HTTP client.
	pub fn http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Validates the configuration and builds the dispatcher.
	pub fn build(self) -> Result<Dispatcher> {
		let descriptor = match self.descriptor {
			Some(descriptor) => descriptor,
			None => ServiceDescriptor::spotify().map_err(ConfigError::from)?,
		};
		let client = match self.http_client {
			Some(client) => client,
			None => ReqwestClient::builder().build().map_err(ConfigError::from)?,
		};

		Ok(Dispatcher {
			descriptor,
			provider: self.provider,
			transport: RetryingTransport::new(client, self.retry_policy),
			timeout: self.timeout,
		})
	}
}
impl Debug for DispatcherBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DispatcherBuilder")
			.field("descriptor", &self.descriptor)
			.field("timeout", &self.timeout)
			.field("retry_policy", &self.retry_policy)
			.finish()
	}
}

/// Authenticated, retrying API client.
pub struct Dispatcher {
	descriptor: ServiceDescriptor,
	provider: Arc<dyn TokenProvider>,
	transport: RetryingTransport,
	timeout: Option<StdDuration>,
}
impl Dispatcher {
	/// Creates a builder around `provider`.
	pub fn builder(provider: impl 'static + TokenProvider) -> DispatcherBuilder {
		DispatcherBuilder::new(provider)
	}

	/// Returns the service descriptor.
	pub fn descriptor(&self) -> &ServiceDescriptor {
		&self.descriptor
	}

	/// Returns an identifier normalizer for the service's URI scheme.
	pub fn normalizer(&self) -> IdentifierNormalizer {
		self.descriptor.normalizer()
	}

	/// Sends `spec` and returns the JSON payload, or `None` for empty responses.
	pub async fn execute(&self, spec: RequestSpec) -> Result<Option<Value>> {
		self.fetch(&spec).await.map(|(_, payload)| payload)
	}

	/// Like [`execute`](Self::execute), decoding the payload into `T`.
	pub async fn execute_as<T>(&self, spec: RequestSpec) -> Result<Option<T>>
	where
		T: DeserializeOwned,
	{
		let (status, payload) = self.fetch(&spec).await?;

		payload
			.map(|value| {
				serde_path_to_error::deserialize(value)
					.map_err(|source| Error::Decode { status, source })
			})
			.transpose()
	}

	/// `GET` shorthand.
	pub async fn get(&self, path: &str, query: QueryParams) -> Result<Option<Value>> {
		self.execute(RequestSpec::get(path).with_query(query)).await
	}

	/// `POST` shorthand.
	pub async fn post(
		&self,
		path: &str,
		query: QueryParams,
		body: Option<Value>,
	) -> Result<Option<Value>> {
		self.execute(RequestSpec { body, ..RequestSpec::post(path).with_query(query) }).await
	}

	/// `PUT` shorthand.
	pub async fn put(
		&self,
		path: &str,
		query: QueryParams,
		body: Option<Value>,
	) -> Result<Option<Value>> {
		self.execute(RequestSpec { body, ..RequestSpec::put(path).with_query(query) }).await
	}

	/// `DELETE` shorthand.
	pub async fn delete(
		&self,
		path: &str,
		query: QueryParams,
		body: Option<Value>,
	) -> Result<Option<Value>> {
		self.execute(RequestSpec { body, ..RequestSpec::delete(path).with_query(query) }).await
	}

	/// Follows the `next` link of a paging object; `None` on the last page.
	pub async fn next_page(&self, page: &Value) -> Result<Option<Value>> {
		self.follow(page.get("next")).await
	}

	/// Follows the `previous` link of a paging object; `None` on the first page.
	pub async fn previous_page(&self, page: &Value) -> Result<Option<Value>> {
		self.follow(page.get("previous")).await
	}

	/// Typed [`next_page`](Self::next_page).
	pub async fn next_page_as<T>(&self, page: &Page<T>) -> Result<Option<Page<T>>>
	where
		T: DeserializeOwned,
	{
		self.follow_as(page.next.as_deref()).await
	}

	/// Typed [`previous_page`](Self::previous_page).
	pub async fn previous_page_as<T>(&self, page: &Page<T>) -> Result<Option<Page<T>>>
	where
		T: DeserializeOwned,
	{
		self.follow_as(page.previous.as_deref()).await
	}

	async fn follow(&self, link: Option<&Value>) -> Result<Option<Value>> {
		match link.and_then(Value::as_str).filter(|url| !url.is_empty()) {
			Some(url) => self.execute(RequestSpec::get(url)).await,
			None => Ok(None),
		}
	}

	async fn follow_as<T>(&self, link: Option<&str>) -> Result<Option<Page<T>>>
	where
		T: DeserializeOwned,
	{
		match link.filter(|url| !url.is_empty()) {
			Some(url) => self.execute_as(RequestSpec::get(url)).await,
			None => Ok(None),
		}
	}

	async fn fetch(&self, spec: &RequestSpec) -> Result<(u16, Option<Value>)> {
		const KIND: FlowKind = FlowKind::ApiRequest;

		let span = FlowSpan::new(KIND, "execute");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send(spec, &span)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send(&self, spec: &RequestSpec, span: &FlowSpan) -> Result<(u16, Option<Value>)> {
		let url = self.resolve_url(&spec.path)?;
		let query = spec.query.encode();
		let header = self.provider.authorization_header().await?;
		let mut builder = self
			.transport
			.client()
			.request(spec.method.clone(), url)
			.header(AUTHORIZATION, header);

		if !query.is_empty() {
			builder = builder.query(&query);
		}
		if let Some(body) = &spec.body {
			builder = builder.json(body);
		}
		if let Some(timeout) = self.timeout {
			builder = builder.timeout(timeout);
		}

		let request = builder.build().map_err(ConfigError::from)?;
		let response = self.transport.send(request).await?;
		let status = response.status().as_u16();
		let retry_after = http::parse_retry_after(response.headers());

		span.record_status(status);

		let body = response.bytes().await.map_err(TransportError::from)?;
		let payload = classify(status, retry_after, &body, spec.query.contains_key("device_id"))?;

		Ok((status, payload))
	}

	fn resolve_url(&self, path: &str) -> Result<Url> {
		let raw = if path.starts_with("http://") || path.starts_with("https://") {
			path.to_owned()
		} else {
			format!("{}{}", self.descriptor.endpoints.api_base, path.trim_start_matches('/'))
		};

		Url::parse(&raw).map_err(|source| ConfigError::InvalidRequestUrl { url: raw, source }.into())
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("api_base", &self.descriptor.endpoints.api_base.as_str())
			.field("timeout", &self.timeout)
			.field("retry_policy", self.transport.policy())
			.finish()
	}
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
	Structured {
		#[serde(default)]
		message: String,
		#[serde(default)]
		reason: Option<String>,
	},
	Plain(String),
}

fn classify(
	status: u16,
	retry_after: Option<Duration>,
	body: &[u8],
	device_request: bool,
) -> Result<Option<Value>> {
	match status {
		429 => Err(Error::RateLimitReached { retry_after }),
		400..=499 if body.is_empty() => Err(Error::Request { status, message: String::new() }),
		400..=499 => {
			let (message, reason) = match decode::<ErrorEnvelope>(body) {
				Ok(ErrorEnvelope { error: ErrorDetail::Structured { message, reason } }) =>
					(message, reason),
				Ok(ErrorEnvelope { error: ErrorDetail::Plain(message) }) => (message, None),
				Err(_) => (preview(body), None),
			};

			if (status == 404 && device_request) || reason.as_deref() == Some(NO_ACTIVE_DEVICE) {
				Err(Error::DeviceNotFound { message })
			} else {
				Err(Error::Request { status, message })
			}
		},
		500..=599 => Err(Error::Server { status }),
		204 => Ok(None),
		_ if body.is_empty() => Ok(None),
		_ => decode(body).map(Some).map_err(|source| Error::Decode { status, source }),
	}
}

fn decode<T>(body: &[u8]) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(body))
}

fn preview(body: &[u8]) -> String {
	String::from_utf8_lossy(body).trim().chars().take(MESSAGE_PREVIEW_LIMIT).collect()
}
