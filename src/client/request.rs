//! Outbound request assembly and the replay-once handle.

// crates.io
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	config::ProxyConfig,
	error::ConfigError,
	http::{self as transport, OutboundRequest, ParamsEncoding},
	session::{Session, TokenSecret},
};

const ACCEPT_ANY: &str = "application/json, text/plain, */*";

/// Per-call overrides layered on top of [`ProxyConfig`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Destination unrelated to the primary backend; the bearer token is still attached.
	pub base_url: Option<Url>,
	/// Extra headers; a name set here replaces the configured default.
	pub headers: HeaderMap,
	/// Query-string encoding for `GET`/`HEAD` bodies.
	pub params_encoding: Option<ParamsEncoding>,
}
impl RequestOptions {
	/// Sends the request to `base_url` instead of the configured backend.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Adds one header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Overrides the query-string encoding.
	pub fn with_params_encoding(mut self, encoding: ParamsEncoding) -> Self {
		self.params_encoding = Some(encoding);

		self
	}
}

/// An original request kept aside until its 401 is resolved.
///
/// Holds the request without credentials plus the token it was first sent with. Replaying
/// consumes the handle, so a request can be reissued at most once.
#[derive(Debug)]
pub struct PendingReplay {
	base: OutboundRequest,
	used_token: Option<TokenSecret>,
}
impl PendingReplay {
	/// Authorizes `base` with `session` for its first send and keeps a copy for a later replay.
	pub(crate) fn first_attempt(
		base: OutboundRequest,
		session: &Session,
		routing_header: Option<&HeaderName>,
	) -> Result<(Self, OutboundRequest), ConfigError> {
		let outbound = authorize(base.clone(), session, routing_header)?;

		Ok((Self { base, used_token: session.access_token().cloned() }, outbound))
	}

	/// Access token the original attempt carried.
	pub fn used_token(&self) -> Option<&TokenSecret> {
		self.used_token.as_ref()
	}

	/// Reissues the request with the credentials in `session`.
	pub(crate) fn replay(
		self,
		session: &Session,
		routing_header: Option<&HeaderName>,
	) -> Result<OutboundRequest, ConfigError> {
		authorize(self.base, session, routing_header)
	}
}

/// Resolves the destination, merges headers, and encodes the body of one call.
pub(crate) fn build(
	config: &ProxyConfig,
	method: Method,
	path: &str,
	body: Option<Value>,
	options: RequestOptions,
) -> Result<OutboundRequest> {
	let base = match &options.base_url {
		Some(url) => {
			transport::validate_base("request base", url)?;

			url
		},
		None => config.backend_url(),
	};
	let mut request = OutboundRequest::new(method, transport::join_url(base, path)?);

	request.headers = config.default_headers().clone();

	for name in options.headers.keys() {
		request.headers.remove(name);
	}
	for (name, value) in &options.headers {
		request.headers.append(name.clone(), value.clone());
	}

	request.headers.entry(ACCEPT).or_insert(HeaderValue::from_static(ACCEPT_ANY));

	let Some(body) = body else {
		return Ok(request);
	};

	if request.method == Method::GET || request.method == Method::HEAD {
		let encoding = options.params_encoding.unwrap_or(config.params_encoding());

		if let Some(query) = encoding.encode(&body) {
			let merged = match request.url.query() {
				Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
				_ => query,
			};

			request.url.set_query(Some(&merged));
		}
	} else {
		request.body = Some(serde_json::to_vec(&body).map_err(|source| Error::Encode { source })?);
		request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	}

	Ok(request)
}

fn authorize(
	mut request: OutboundRequest,
	session: &Session,
	routing_header: Option<&HeaderName>,
) -> Result<OutboundRequest, ConfigError> {
	if let Some(token) = session.access_token() {
		let mut value = HeaderValue::from_str(&token.bearer())?;

		value.set_sensitive(true);
		request.headers.insert(AUTHORIZATION, value);
	}
	if let (Some(header), Some(tag)) = (routing_header, session.routing_tag()) {
		request.headers.insert(header.clone(), HeaderValue::from_str(tag)?);
	}

	Ok(request)
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{http::ArrayFormat, session::TokenPair};

	fn config() -> ProxyConfig {
		ProxyConfig::builder(
			Url::parse("https://api.example.com/v1").expect("Backend URL should parse."),
			"member",
		)
		.default_header("x-client", "web")
		.routing_header("x-region")
		.build()
		.expect("Configuration should build.")
	}

	#[test]
	fn get_bodies_become_query_strings() {
		let request = build(
			&config(),
			Method::GET,
			"/members?active=true",
			Some(json!({ "ids": [1, 2] })),
			RequestOptions::default().with_params_encoding(ParamsEncoding::new(ArrayFormat::Comma)),
		)
		.expect("Request should build.");

		assert_eq!(request.url.as_str(), "https://api.example.com/v1/members?active=true&ids=1%2C2");
		assert!(request.body.is_none());
		assert!(request.headers.get(CONTENT_TYPE).is_none());
	}

	#[test]
	fn other_methods_send_json_and_options_override_defaults() {
		let request = build(
			&config(),
			Method::POST,
			"members",
			Some(json!({ "name": "Ada" })),
			RequestOptions::default()
				.with_base_url(Url::parse("https://geo.example.org").expect("URL should parse."))
				.with_header(HeaderName::from_static("x-client"), HeaderValue::from_static("batch")),
		)
		.expect("Request should build.");

		assert_eq!(request.url.as_str(), "https://geo.example.org/members");
		assert_eq!(request.body.as_deref(), Some(br#"{"name":"Ada"}"#.as_slice()));
		assert_eq!(request.headers.get(CONTENT_TYPE), Some(&HeaderValue::from_static("application/json")));
		assert_eq!(request.headers.get_all("x-client").iter().count(), 1);
		assert_eq!(request.headers.get("x-client"), Some(&HeaderValue::from_static("batch")));
	}

	#[test]
	fn replay_carries_new_token_and_routing_tag() {
		let config = config();
		let base = build(&config, Method::DELETE, "members/7", None, RequestOptions::default())
			.expect("Request should build.");
		let session = Session::new(TokenPair::new("access-1", "refresh-1")).with_routing_tag("eu");
		let (pending, first) = PendingReplay::first_attempt(base, &session, config.routing_header())
			.expect("First attempt should authorize.");

		assert_eq!(first.bearer(), Some("access-1"));
		assert_eq!(first.headers.get("x-region"), Some(&HeaderValue::from_static("eu")));
		assert_eq!(pending.used_token().map(TokenSecret::expose), Some("access-1"));

		let replay = pending
			.replay(&session.with_tokens(TokenPair::new("access-2", "refresh-2")), config.routing_header())
			.expect("Replay should authorize.");

		assert_eq!(replay.bearer(), Some("access-2"));
		assert_eq!(replay.headers.get("x-region"), Some(&HeaderValue::from_static("eu")));
	}

	#[test]
	fn empty_session_sends_no_bearer() {
		let base = build(&config(), Method::GET, "public", None, RequestOptions::default())
			.expect("Request should build.");
		let (pending, first) = PendingReplay::first_attempt(base, &Session::default(), None)
			.expect("First attempt should build.");

		assert!(first.bearer().is_none());
		assert!(pending.used_token().is_none());
	}
}
