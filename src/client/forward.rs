//! `{status, data}` pairs handed to thin route handlers.

// crates.io
use serde_json::json;
// self
use crate::{_prelude::*, http::ProxyResponse};

/// Status and body a route handler should answer with, for successes and failures alike.
#[derive(Clone, Debug, PartialEq)]
pub struct Forwarded {
	/// Status to respond with.
	pub status: StatusCode,
	/// JSON body to respond with.
	pub data: Value,
}
impl Forwarded {
	/// Flattens either branch of a proxy result.
	///
	/// Backend errors keep their status and body. A backend that could not be reached maps to
	/// `502 Bad Gateway`; every other local failure maps to `500`.
	pub fn from_result(result: Result<ProxyResponse>) -> Self {
		match result {
			Ok(response) => response.into(),
			Err(err) => err.into(),
		}
	}
}
impl From<ProxyResponse> for Forwarded {
	fn from(response: ProxyResponse) -> Self {
		Self { status: response.status, data: response.data }
	}
}
impl From<Error> for Forwarded {
	fn from(err: Error) -> Self {
		match err {
			Error::Http(err) => Self { status: err.status, data: err.data },
			Error::Transport(err) =>
				Self { status: StatusCode::BAD_GATEWAY, data: json!({ "message": err.to_string() }) },
			err => Self {
				status: StatusCode::INTERNAL_SERVER_ERROR,
				data: json!({ "message": err.to_string() }),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{ConfigError, HttpError, TransportError};

	#[test]
	fn errors_map_to_route_statuses() {
		let forbidden = Forwarded::from_result(Err(Error::from(HttpError {
			status: StatusCode::FORBIDDEN,
			headers: HeaderMap::new(),
			data: json!({ "code": "NO_ACCESS" }),
		})));

		assert_eq!(forbidden, Forwarded {
			status: StatusCode::FORBIDDEN,
			data: json!({ "code": "NO_ACCESS" })
		});

		let unreachable =
			Forwarded::from(Error::from(TransportError::Io(std::io::Error::other("refused"))));

		assert_eq!(unreachable.status, StatusCode::BAD_GATEWAY);
		assert!(unreachable.data["message"].is_string());

		let local = Forwarded::from(Error::from(ConfigError::InvalidRefreshDomain {
			domain: "a/b".into(),
		}));

		assert_eq!(local.status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn responses_forward_status_and_data() {
		let forwarded = Forwarded::from_result(Ok(ProxyResponse {
			status: StatusCode::CREATED,
			headers: HeaderMap::new(),
			data: json!({ "id": 7 }),
		}));

		assert_eq!(forwarded.status, StatusCode::CREATED);
		assert_eq!(forwarded.data, json!({ "id": 7 }));
	}
}
