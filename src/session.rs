//! Member session records, token secrets, request-scoped cookie contexts, and session identities.

pub mod context;
pub mod key;
pub mod secret;

pub use context::*;
pub use key::*;
pub use secret::*;

// self
use crate::_prelude::*;

/// Access + refresh token pair, always issued and stored together.
///
/// Doubles as the token-exchange request and response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
	/// Short-lived bearer token attached to backend calls.
	pub access_token: TokenSecret,
	/// Long-lived token used to mint the next pair.
	pub refresh_token: TokenSecret,
}
impl TokenPair {
	/// Creates a pair from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
		}
	}
}

/// Credential record carried by the encrypted session cookie.
///
/// Tokens can only be replaced through a [`TokenPair`], so a session never pairs a fresh access
/// token with a stale refresh token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	access_token: Option<TokenSecret>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	refresh_token: Option<TokenSecret>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	routing_tag: Option<String>,
}
impl Session {
	/// Creates an authenticated session holding `tokens`.
	pub fn new(tokens: TokenPair) -> Self {
		Self::default().with_tokens(tokens)
	}

	/// Replaces both tokens at once.
	pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
		self.access_token = Some(tokens.access_token);
		self.refresh_token = Some(tokens.refresh_token);

		self
	}

	/// Sets the routing tag forwarded alongside backend calls.
	pub fn with_routing_tag(mut self, tag: impl Into<String>) -> Self {
		self.routing_tag = Some(tag.into());

		self
	}

	/// Current access token, if any.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// Current refresh token, if any.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Routing tag recorded at login, if any.
	pub fn routing_tag(&self) -> Option<&str> {
		self.routing_tag.as_deref()
	}

	/// Returns `true` when the session holds no credentials at all.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none() && self.routing_tag.is_none()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn session_serializes_camel_case_and_skips_missing_fields() {
		let session = Session::new(TokenPair::new("access-1", "refresh-1")).with_routing_tag("kr");
		let json = serde_json::to_value(&session).expect("Session should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"accessToken": "access-1",
				"refreshToken": "refresh-1",
				"routingTag": "kr",
			})
		);
		assert_eq!(
			serde_json::to_string(&Session::default()).expect("Empty session should serialize."),
			"{}"
		);
	}

	#[test]
	fn with_tokens_replaces_both_tokens_and_keeps_routing_tag() {
		let session = Session::new(TokenPair::new("access-1", "refresh-1"))
			.with_routing_tag("eu")
			.with_tokens(TokenPair::new("access-2", "refresh-2"));

		assert_eq!(session.access_token().map(TokenSecret::expose), Some("access-2"));
		assert_eq!(session.refresh_token().map(TokenSecret::expose), Some("refresh-2"));
		assert_eq!(session.routing_tag(), Some("eu"));
	}

	#[test]
	fn partial_cookie_payload_deserializes() {
		let session: Session = serde_json::from_str("{\"accessToken\":\"only-access\"}")
			.expect("Partial session payloads should deserialize.");

		assert_eq!(session.access_token().map(TokenSecret::expose), Some("only-access"));
		assert!(session.refresh_token().is_none());
		assert!(!session.is_empty());
		assert!(Session::default().is_empty());
	}
}
