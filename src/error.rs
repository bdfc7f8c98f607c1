//! Proxy-level error types shared across the client, stores, and transports.

// self
use crate::{_prelude::*, store::StoreError};

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical proxy error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No response was received; never triggers a refresh.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Backend answered with an error status, including a final 401.
	#[error(transparent)]
	Http(#[from] HttpError),
	/// Session storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Request body could not be serialized.
	#[error("Request body could not be encoded as JSON.")]
	Encode {
		/// Underlying serializer failure.
		#[source]
		source: serde_json::Error,
	},
}
impl Error {
	/// HTTP status carried by the error, if the backend produced one.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Http(err) => Some(err.status),
			_ => None,
		}
	}

	/// Returns `true` when the error is an unauthorized (401) backend response.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(StatusCode::UNAUTHORIZED)
	}
}

/// Error status returned by the backend, preserved verbatim for route adapters.
#[derive(Clone, Debug, ThisError)]
#[error("Backend responded with status {status}.")]
pub struct HttpError {
	/// Status code returned by the backend.
	pub status: StatusCode,
	/// Response headers returned by the backend.
	pub headers: HeaderMap,
	/// Decoded response body.
	pub data: Value,
}

/// Configuration and validation failures raised by the proxy.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A URL could not be parsed or joined.
	#[error("The {what} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed validation.
		what: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URLs must use HTTP(S) and be able to carry a path.
	#[error("The {what} URL must be an absolute http(s) URL: {url}.")]
	UnsupportedUrl {
		/// Which URL failed validation.
		what: &'static str,
		/// URL that failed validation.
		url: String,
	},
	/// Token-exchange domain segment is empty or contains path separators.
	#[error("Refresh domain `{domain}` must be a single non-empty path segment.")]
	InvalidRefreshDomain {
		/// Supplied domain segment.
		domain: String,
	},
	/// Header name is not valid HTTP.
	#[error(transparent)]
	InvalidHeaderName(#[from] http::header::InvalidHeaderName),
	/// Header value is not valid HTTP.
	#[error(transparent)]
	InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),
	/// Cookie name contains characters that cannot appear in a cookie.
	#[error("Cookie name `{name}` is invalid.")]
	InvalidCookieName {
		/// Supplied cookie name.
		name: String,
	},
	/// Cookie secret is too short for key derivation.
	#[error("Cookie secret must be at least {min} bytes, got {actual}.")]
	CookieSecretTooShort {
		/// Minimum accepted length.
		min: usize,
		/// Supplied length.
		actual: usize,
	},
	/// Required environment variable is unset.
	#[error("Environment variable {var} is required.")]
	MissingEnv {
		/// Variable name.
		var: &'static str,
	},
	/// Environment variable is set but cannot be used.
	#[error("Environment variable {var} is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		var: &'static str,
		/// Human-readable reason.
		reason: String,
	},
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

/// Transport-level failures (no response received).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Token-exchange failures; logged and counted, never shown to the original caller.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Session carries no refresh token, so no exchange is possible.
	#[error("Session has no refresh token.")]
	MissingRefreshToken,
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the refresh with status {status}.")]
	Rejected {
		/// Status returned by the token endpoint.
		status: StatusCode,
	},
	/// Token endpoint could not be reached.
	#[error("Token endpoint could not be reached.")]
	Transport(#[source] TransportError),
	/// Token endpoint returned a body that is not a token pair.
	#[error("Token endpoint returned a malformed body.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Refreshed session could not be persisted.
	#[error("Refreshed session could not be persisted.")]
	Storage(#[source] StoreError),
}
