//! Transport primitives for outbound backend calls.
//!
//! [`ProxyTransport`] is the proxy's only dependency on an HTTP stack. It performs exactly one
//! network exchange per call and never retries; status interpretation, refresh, and replay live
//! above it. A response with an error status is still `Ok`; `Err` means no response arrived.

pub mod params;

pub use params::*;

// std
use std::ops::Deref;
// crates.io
use http::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, HttpError, TransportError},
};

/// Boxed future returned by [`ProxyTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP clients able to execute one outbound request.
///
/// Implementations must be `Send + Sync + 'static` so one transport can serve every session
/// concurrently.
pub trait ProxyTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns whatever the peer answered.
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_>;
}

/// Fully resolved request ready to hit the wire.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute destination URL, query included.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Serialized body, if any.
	pub body: Option<Vec<u8>>,
}
impl OutboundRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Bearer token carried in the `Authorization` header, if any.
	pub fn bearer(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
	}
}

/// Undecoded response as produced by a transport.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// Status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Convenience constructor for a JSON response.
	pub fn json(status: StatusCode, data: &Value) -> Self {
		let mut headers = HeaderMap::new();

		headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Self { status, headers, body: data.to_string().into_bytes() }
	}
}

/// Decoded backend response handed back to callers.
#[derive(Clone, Debug)]
pub struct ProxyResponse {
	/// Status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// JSON body, a JSON string for non-JSON text, or `null` for an empty body.
	pub data: Value,
}
impl From<RawResponse> for ProxyResponse {
	fn from(raw: RawResponse) -> Self {
		Self { status: raw.status, headers: raw.headers, data: decode_data(&raw.body) }
	}
}

impl From<RawResponse> for HttpError {
	fn from(raw: RawResponse) -> Self {
		let ProxyResponse { status, headers, data } = raw.into();

		Self { status, headers, data }
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ProxyTransport for ReqwestTransport {
	fn send(&self, request: OutboundRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let OutboundRequest { method, url, headers, body } = request;
			let mut builder = self.0.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(RawResponse { status, headers, body })
		})
	}
}

/// Resolves `path` against `base` the way route handlers expect.
///
/// Absolute `http(s)` paths bypass the base. Otherwise exactly one `/` separates the base and
/// the path, so a base with a path prefix keeps it.
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url, ConfigError> {
	if path.starts_with("http://") || path.starts_with("https://") {
		return Url::parse(path).map_err(|source| ConfigError::InvalidUrl { what: "request", source });
	}

	let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path.trim_start_matches('/'));

	Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { what: "request", source })
}

/// Ensures a configured base URL can carry request paths.
pub(crate) fn validate_base(what: &'static str, url: &Url) -> Result<(), ConfigError> {
	if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() {
		Ok(())
	} else {
		Err(ConfigError::UnsupportedUrl { what, url: url.to_string() })
	}
}

fn decode_data(body: &[u8]) -> Value {
	if body.is_empty() {
		return Value::Null;
	}

	serde_json::from_slice(body)
		.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Test URL should parse.")
	}

	#[test]
	fn join_url_normalizes_slashes_and_keeps_prefix() {
		let base = url("https://api.example.com/v2/");

		assert_eq!(
			join_url(&base, "/members/me").expect("Join should succeed.").as_str(),
			"https://api.example.com/v2/members/me"
		);
		assert_eq!(
			join_url(&url("https://api.example.com"), "members?page=2")
				.expect("Join should succeed.")
				.as_str(),
			"https://api.example.com/members?page=2"
		);
		assert_eq!(
			join_url(&base, "https://maps.example.org/geo").expect("Join should succeed.").as_str(),
			"https://maps.example.org/geo"
		);
	}

	#[test]
	fn base_validation_rejects_non_http_urls() {
		assert!(validate_base("backend", &url("https://api.example.com")).is_ok());
		assert!(validate_base("backend", &url("ftp://api.example.com")).is_err());
		assert!(validate_base("backend", &url("mailto:ops@example.com")).is_err());
	}

	#[test]
	fn response_bodies_decode_by_shape() {
		assert_eq!(decode_data(b""), Value::Null);
		assert_eq!(decode_data(b"{\"ok\":true}"), serde_json::json!({ "ok": true }));
		assert_eq!(decode_data(b"<html>"), Value::String("<html>".into()));
	}

	#[test]
	fn bearer_reads_authorization_header() {
		let mut request = OutboundRequest::new(Method::GET, url("https://api.example.com"));

		assert_eq!(request.bearer(), None);

		request.headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));

		assert_eq!(request.bearer(), Some("abc"));
	}
}
