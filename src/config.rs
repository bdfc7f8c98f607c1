//! Proxy configuration: backend location, token-exchange domain, and request defaults.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{self as transport, ParamsEncoding},
};

/// Validated settings shared by every request a [`ProxyClient`](crate::client::ProxyClient) makes.
#[derive(Clone, Debug)]
pub struct ProxyConfig {
	backend_url: Url,
	refresh_domain: String,
	refresh_endpoint: Url,
	default_headers: HeaderMap,
	params_encoding: ParamsEncoding,
	routing_header: Option<HeaderName>,
	rotation_grace: Duration,
}
impl ProxyConfig {
	/// Environment variable holding the backend base URL.
	pub const ENV_BACKEND_URL: &'static str = "PROXY_BACKEND_URL";
	/// Environment variable holding the token-exchange domain segment.
	pub const ENV_REFRESH_DOMAIN: &'static str = "PROXY_REFRESH_DOMAIN";
	/// Environment variable naming the header that carries the routing tag.
	pub const ENV_ROUTING_HEADER: &'static str = "PROXY_ROUTING_HEADER";
	/// Environment variable overriding the rotation grace window, in whole seconds.
	pub const ENV_ROTATION_GRACE_SECS: &'static str = "PROXY_ROTATION_GRACE_SECS";

	/// Starts a builder for the backend at `backend_url` whose token endpoint lives under
	/// `/api/<refresh_domain>/refresh-token`.
	pub fn builder(backend_url: Url, refresh_domain: impl Into<String>) -> ProxyConfigBuilder {
		ProxyConfigBuilder::new(backend_url, refresh_domain)
	}

	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|var| std::env::var(var).ok())
	}

	pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let required = |var: &'static str| {
			lookup(var).filter(|v| !v.trim().is_empty()).ok_or(ConfigError::MissingEnv { var })
		};
		let backend_url = required(Self::ENV_BACKEND_URL)?;
		let backend_url = Url::parse(backend_url.trim()).map_err(|e| ConfigError::InvalidEnv {
			var: Self::ENV_BACKEND_URL,
			reason: e.to_string(),
		})?;
		let mut builder = Self::builder(backend_url, required(Self::ENV_REFRESH_DOMAIN)?.trim());

		if let Some(header) = lookup(Self::ENV_ROUTING_HEADER).filter(|v| !v.trim().is_empty()) {
			builder = builder.routing_header(header.trim());
		}
		if let Some(secs) = lookup(Self::ENV_ROTATION_GRACE_SECS) {
			let secs = secs.trim().parse::<u32>().map_err(|e| ConfigError::InvalidEnv {
				var: Self::ENV_ROTATION_GRACE_SECS,
				reason: e.to_string(),
			})?;

			builder = builder.rotation_grace(Duration::seconds(secs.into()));
		}

		builder.build()
	}

	/// Base URL of the primary backend.
	pub fn backend_url(&self) -> &Url {
		&self.backend_url
	}

	/// Domain segment of the token-exchange path.
	pub fn refresh_domain(&self) -> &str {
		&self.refresh_domain
	}

	/// Absolute token-exchange endpoint.
	pub fn refresh_endpoint(&self) -> &Url {
		&self.refresh_endpoint
	}

	/// Headers attached to every outbound request.
	pub fn default_headers(&self) -> &HeaderMap {
		&self.default_headers
	}

	/// Query-string encoding used when a request does not override it.
	pub fn params_encoding(&self) -> ParamsEncoding {
		self.params_encoding
	}

	/// Header carrying the session's routing tag, if configured.
	pub fn routing_header(&self) -> Option<&HeaderName> {
		self.routing_header.as_ref()
	}

	/// Rotation grace window handed to the refresh coordinator.
	pub fn rotation_grace(&self) -> Duration {
		self.rotation_grace
	}
}

/// Builder for [`ProxyConfig`] values.
#[derive(Debug)]
pub struct ProxyConfigBuilder {
	/// Base URL of the primary backend.
	pub backend_url: Url,
	/// Domain segment of the token-exchange path.
	pub refresh_domain: String,
	/// Raw default headers, validated on build.
	pub default_headers: Vec<(String, String)>,
	/// Query-string encoding default.
	pub params_encoding: ParamsEncoding,
	/// Raw routing header name, validated on build.
	pub routing_header: Option<String>,
	/// Rotation grace window.
	pub rotation_grace: Duration,
}
impl ProxyConfigBuilder {
	/// Creates a new builder with default request settings.
	pub fn new(backend_url: Url, refresh_domain: impl Into<String>) -> Self {
		Self {
			backend_url,
			refresh_domain: refresh_domain.into(),
			default_headers: Vec::new(),
			params_encoding: ParamsEncoding::default(),
			routing_header: None,
			rotation_grace: crate::coordinator::RefreshCoordinator::DEFAULT_ROTATION_GRACE,
		}
	}

	/// Adds a header sent with every request.
	pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.default_headers.push((name.into(), value.into()));

		self
	}

	/// Overrides the default query-string encoding.
	pub fn params_encoding(mut self, encoding: ParamsEncoding) -> Self {
		self.params_encoding = encoding;

		self
	}

	/// Forwards the session's routing tag in `header`.
	pub fn routing_header(mut self, header: impl Into<String>) -> Self {
		self.routing_header = Some(header.into());

		self
	}

	/// Overrides the rotation grace window; zero disables it.
	pub fn rotation_grace(mut self, grace: Duration) -> Self {
		self.rotation_grace = grace;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ProxyConfig, ConfigError> {
		transport::validate_base("backend", &self.backend_url)?;

		let domain = self.refresh_domain;

		if domain.is_empty() || domain.contains(['/', '?', '#']) || domain.contains(char::is_whitespace)
		{
			return Err(ConfigError::InvalidRefreshDomain { domain });
		}

		let refresh_endpoint =
			transport::join_url(&self.backend_url, &format!("api/{domain}/refresh-token"))?;
		let mut default_headers = HeaderMap::new();

		for (name, value) in self.default_headers {
			default_headers.append(HeaderName::from_str(&name)?, HeaderValue::from_str(&value)?);
		}

		let routing_header = self.routing_header.as_deref().map(HeaderName::from_str).transpose()?;

		Ok(ProxyConfig {
			backend_url: self.backend_url,
			refresh_domain: domain,
			refresh_endpoint,
			default_headers,
			params_encoding: self.params_encoding,
			routing_header,
			rotation_grace: if self.rotation_grace.is_negative() {
				Duration::ZERO
			} else {
				self.rotation_grace
			},
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn backend() -> Url {
		Url::parse("https://api.example.com/").expect("Backend URL should parse.")
	}

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let pairs = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |var| pairs.get(var).cloned()
	}

	#[test]
	fn builder_derives_refresh_endpoint_and_validates_headers() {
		let config = ProxyConfig::builder(backend(), "member")
			.default_header("x-client", "web")
			.routing_header("x-region")
			.build()
			.expect("Configuration should build.");

		assert_eq!(config.refresh_endpoint().as_str(), "https://api.example.com/api/member/refresh-token");
		assert_eq!(config.default_headers().get("x-client"), Some(&HeaderValue::from_static("web")));
		assert_eq!(config.routing_header().map(HeaderName::as_str), Some("x-region"));
		assert_eq!(config.rotation_grace(), Duration::seconds(10));

		let err = ProxyConfig::builder(backend(), "member")
			.default_header("bad header", "web")
			.build()
			.expect_err("Header names with spaces should be rejected.");

		assert!(matches!(err, ConfigError::InvalidHeaderName(_)));
	}

	#[test]
	fn builder_rejects_bad_domains_and_urls() {
		for domain in ["", "a/b", "with space"] {
			let err = ProxyConfig::builder(backend(), domain)
				.build()
				.expect_err("Invalid domains should be rejected.");

			assert!(matches!(err, ConfigError::InvalidRefreshDomain { .. }));
		}

		let err = ProxyConfig::builder(
			Url::parse("ftp://files.example.com").expect("URL should parse."),
			"member",
		)
		.build()
		.expect_err("Non-HTTP backends should be rejected.");

		assert!(matches!(err, ConfigError::UnsupportedUrl { what: "backend", .. }));
	}

	#[test]
	fn env_lookup_requires_backend_and_domain() {
		let err = ProxyConfig::from_lookup(lookup(&[("PROXY_REFRESH_DOMAIN", "member")]))
			.expect_err("Missing backend should be rejected.");

		assert!(matches!(err, ConfigError::MissingEnv { var: "PROXY_BACKEND_URL" }));

		let config = ProxyConfig::from_lookup(lookup(&[
			("PROXY_BACKEND_URL", "http://127.0.0.1:8080/v1"),
			("PROXY_REFRESH_DOMAIN", "member"),
			("PROXY_ROUTING_HEADER", "x-region"),
			("PROXY_ROTATION_GRACE_SECS", "0"),
		]))
		.expect("Environment configuration should load.");

		assert_eq!(config.refresh_endpoint().as_str(), "http://127.0.0.1:8080/v1/api/member/refresh-token");
		assert_eq!(config.rotation_grace(), Duration::ZERO);
		assert!(config.routing_header().is_some());

		let err = ProxyConfig::from_lookup(lookup(&[
			("PROXY_BACKEND_URL", "http://127.0.0.1:8080"),
			("PROXY_REFRESH_DOMAIN", "member"),
			("PROXY_ROTATION_GRACE_SECS", "soon"),
		]))
		.expect_err("Non-numeric grace should be rejected.");

		assert!(matches!(err, ConfigError::InvalidEnv { var: "PROXY_ROTATION_GRACE_SECS", .. }));
	}
}
