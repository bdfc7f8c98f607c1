//! Session identities used to key refresh flights.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, session::Session};

/// Identity of a member session as seen by the refresh coordinator.
///
/// Sessions holding a refresh token are identified by a base64 (no padding) SHA-256 digest of
/// that token, so every request carrying the same cookie lands on the same key while the raw
/// secret never appears in logs or maps. Sessions without a refresh token receive a random key
/// and therefore never share a flight with anyone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(Arc<str>);
impl SessionKey {
	/// Derives the key for `session`.
	pub fn for_session(session: &Session) -> Self {
		match session.refresh_token() {
			Some(refresh) => Self::fingerprint(refresh.expose()),
			None => Self::anonymous(),
		}
	}

	/// Fresh key that collides with nothing.
	pub fn anonymous() -> Self {
		let nonce = rand::random::<[u8; 16]>();

		Self(format!("anon:{}", URL_SAFE_NO_PAD.encode(nonce)).into())
	}

	/// Returns the key as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	fn fingerprint(refresh_token: &str) -> Self {
		let digest = Sha256::digest(refresh_token.as_bytes());

		Self(format!("rt:{}", URL_SAFE_NO_PAD.encode(digest)).into())
	}
}
impl Debug for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "SessionKey({})", self.0)
	}
}
impl Display for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::session::TokenPair;

	#[test]
	fn same_refresh_token_yields_same_key() {
		let a = Session::new(TokenPair::new("access-a", "refresh-shared"));
		let b = Session::new(TokenPair::new("access-b", "refresh-shared")).with_routing_tag("kr");

		assert_eq!(SessionKey::for_session(&a), SessionKey::for_session(&b));
		assert!(!SessionKey::for_session(&a).as_str().contains("refresh-shared"));
	}

	#[test]
	fn sessions_without_refresh_token_never_collide() {
		let empty = Session::default();

		assert_ne!(SessionKey::for_session(&empty), SessionKey::for_session(&empty));
		assert_ne!(
			SessionKey::for_session(&Session::new(TokenPair::new("a", "one"))),
			SessionKey::for_session(&Session::new(TokenPair::new("a", "two"))),
		);
	}
}
