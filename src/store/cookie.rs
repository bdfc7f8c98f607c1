//! Encrypted cookie-backed [`SessionStore`].

// crates.io
use cookie::{Cookie, Key, SameSite};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	session::{Session, SessionContext},
	store::{SessionStore, StoreError, StoreFuture},
};

/// Cookie attributes and encryption key for session cookies.
#[derive(Clone)]
pub struct CookieSettings {
	/// Cookie name.
	pub name: String,
	/// Cookie path.
	pub path: String,
	/// Emits the `Secure` attribute; disable only for local development.
	pub secure: bool,
	/// `SameSite` attribute.
	pub same_site: SameSite,
	/// Optional `Max-Age`; session cookies when unset.
	pub max_age: Option<Duration>,
	key: Key,
}
impl CookieSettings {
	/// Cookie name used unless overridden.
	pub const DEFAULT_NAME: &'static str = "member_session";
	/// Minimum secret length accepted for key derivation.
	pub const MIN_SECRET_LEN: usize = 32;

	/// Derives the encryption key from `secret` (at least [`Self::MIN_SECRET_LEN`] bytes).
	pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
		let secret = secret.as_ref();

		if secret.len() < Self::MIN_SECRET_LEN {
			return Err(ConfigError::CookieSecretTooShort {
				min: Self::MIN_SECRET_LEN,
				actual: secret.len(),
			});
		}

		Ok(Self::with_key(Key::derive_from(secret)))
	}

	/// Settings with a random key; cookies do not survive a restart.
	pub fn ephemeral() -> Self {
		Self::with_key(Key::generate())
	}

	/// Reads `SESSION_COOKIE_SECRET` (required), `SESSION_COOKIE_NAME`, and `DEV_MODE`.
	///
	/// `DEV_MODE=1` or `DEV_MODE=true` drops the `Secure` attribute.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|var| std::env::var(var).ok())
	}

	pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let secret = lookup("SESSION_COOKIE_SECRET")
			.ok_or(ConfigError::MissingEnv { var: "SESSION_COOKIE_SECRET" })?;
		let dev_mode = matches!(lookup("DEV_MODE").as_deref(), Some("1") | Some("true"));
		let mut settings = Self::new(secret)?.with_secure(!dev_mode);

		if let Some(name) = lookup("SESSION_COOKIE_NAME") {
			settings = settings.with_name(name)?;
		}

		Ok(settings)
	}

	/// Overrides the cookie name.
	pub fn with_name(mut self, name: impl Into<String>) -> Result<Self, ConfigError> {
		let name = name.into();

		if !valid_cookie_name(&name) {
			return Err(ConfigError::InvalidCookieName { name });
		}

		self.name = name;

		Ok(self)
	}

	/// Overrides the cookie path.
	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();

		self
	}

	/// Toggles the `Secure` attribute.
	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;

		self
	}

	/// Overrides the `SameSite` attribute.
	pub fn with_same_site(mut self, same_site: SameSite) -> Self {
		self.same_site = same_site;

		self
	}

	/// Sets a `Max-Age`; negative values are clamped to zero.
	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = Some(if max_age.is_negative() { Duration::ZERO } else { max_age });

		self
	}

	pub(crate) fn cookie(&self, value: String) -> Cookie<'static> {
		let mut builder = Cookie::build((self.name.clone(), value))
			.path(self.path.clone())
			.http_only(true)
			.secure(self.secure)
			.same_site(self.same_site);

		if let Some(max_age) = self.max_age {
			builder = builder.max_age(max_age);
		}

		builder.build()
	}

	/// Same attributes as [`cookie`](Self::cookie) so `__Host-` and `__Secure-` names stay valid.
	pub(crate) fn removal(&self) -> Cookie<'static> {
		Cookie::build((self.name.clone(), String::new()))
			.path(self.path.clone())
			.http_only(true)
			.secure(self.secure)
			.same_site(self.same_site)
			.build()
	}

	fn with_key(key: Key) -> Self {
		Self {
			name: Self::DEFAULT_NAME.into(),
			path: "/".into(),
			secure: true,
			same_site: SameSite::Lax,
			max_age: None,
			key,
		}
	}
}
impl Debug for CookieSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CookieSettings")
			.field("name", &self.name)
			.field("path", &self.path)
			.field("secure", &self.secure)
			.field("same_site", &self.same_site)
			.field("max_age", &self.max_age)
			.field("key", &"<redacted>")
			.finish()
	}
}

/// Keeps the whole session in one AEAD-encrypted cookie.
///
/// Tampered, undecryptable, or unparsable cookies load as an empty session.
#[derive(Clone, Debug)]
pub struct CookieSessionStore {
	settings: CookieSettings,
}
impl CookieSessionStore {
	/// Creates a store using the provided cookie settings.
	pub fn new(settings: CookieSettings) -> Self {
		Self { settings }
	}

	/// Cookie settings in use.
	pub fn settings(&self) -> &CookieSettings {
		&self.settings
	}

	fn load_now(&self, ctx: &SessionContext) -> Session {
		let name = self.settings.name.as_str();
		let raw = ctx.jar(|jar| jar.private(&self.settings.key).get(name));

		raw.and_then(|cookie| serde_json::from_str(cookie.value()).ok()).unwrap_or_default()
	}

	fn save_now(&self, ctx: &SessionContext, session: &Session) -> Result<(), StoreError> {
		let payload = serde_json::to_string(session).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize session cookie: {e}"),
		})?;
		let cookie = self.settings.cookie(payload);

		ctx.jar(|jar| jar.private_mut(&self.settings.key).add(cookie));

		Ok(())
	}
}
impl SessionStore for CookieSessionStore {
	fn load<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, Session> {
		Box::pin(async move { Ok(self.load_now(ctx)) })
	}

	fn save<'a>(&'a self, ctx: &'a SessionContext, session: Session) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.save_now(ctx, &session) })
	}

	fn destroy<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let removal = self.settings.removal();

			ctx.jar(|jar| jar.remove(removal));

			Ok(())
		})
	}
}

fn valid_cookie_name(name: &str) -> bool {
	!name.is_empty()
		&& name.bytes().all(|b| {
			b.is_ascii_graphic()
				&& !matches!(
					b,
					b'(' | b')'
						| b'<' | b'>' | b'@'
						| b',' | b';' | b':'
						| b'\\' | b'"' | b'/'
						| b'[' | b']' | b'?'
						| b'=' | b'{' | b'}'
				)
		})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::session::TokenPair;

	const SECRET: &str = "unit-test-cookie-secret-with-enough-bytes";

	fn store() -> CookieSessionStore {
		CookieSessionStore::new(CookieSettings::new(SECRET).expect("Secret should be accepted."))
	}

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |var| map.get(var).cloned()
	}

	#[test]
	fn short_secrets_are_rejected() {
		let err = CookieSettings::new("short").expect_err("Short secrets must be rejected.");

		assert!(matches!(err, ConfigError::CookieSecretTooShort { min: 32, actual: 5 }));
	}

	#[test]
	fn cookie_names_are_validated() {
		let settings = CookieSettings::ephemeral();

		assert!(settings.clone().with_name("has space").is_err());
		assert!(settings.clone().with_name("semi;colon").is_err());
		assert!(settings.clone().with_name("").is_err());
		assert_eq!(
			settings.with_name("__Host-member").expect("Prefixed names are valid.").name,
			"__Host-member"
		);
	}

	#[test]
	fn env_lookup_respects_dev_mode_and_name() {
		let settings = CookieSettings::from_lookup(lookup(&[
			("SESSION_COOKIE_SECRET", SECRET),
			("SESSION_COOKIE_NAME", "member_dev"),
			("DEV_MODE", "true"),
		]))
		.expect("Complete environment should produce settings.");

		assert_eq!(settings.name, "member_dev");
		assert!(!settings.secure);

		let settings = CookieSettings::from_lookup(lookup(&[("SESSION_COOKIE_SECRET", SECRET)]))
			.expect("Secret alone should be enough.");

		assert_eq!(settings.name, CookieSettings::DEFAULT_NAME);
		assert!(settings.secure);
		assert!(matches!(
			CookieSettings::from_lookup(lookup(&[])),
			Err(ConfigError::MissingEnv { var: "SESSION_COOKIE_SECRET" })
		));
	}

	#[tokio::test]
	async fn save_then_load_on_same_context_observes_write() {
		let store = store();
		let ctx = SessionContext::new();

		assert_eq!(store.load(&ctx).await.expect("Load should succeed."), Session::default());

		let session = Session::new(TokenPair::new("access-1", "refresh-1")).with_routing_tag("kr");

		store.save(&ctx, session.clone()).await.expect("Save should succeed.");

		assert_eq!(store.load(&ctx).await.expect("Load should succeed."), session);

		let headers = ctx.set_cookie_headers();

		assert_eq!(headers.len(), 1);

		let header = headers[0].to_str().expect("Set-Cookie should be ASCII.");

		assert!(header.starts_with("member_session="));
		assert!(header.contains("HttpOnly"));
		assert!(header.contains("Secure"));
		assert!(!header.contains("access-1"), "Cookie value must be encrypted.");
	}

	#[tokio::test]
	async fn foreign_key_or_tampered_cookie_loads_empty() {
		let ctx = SessionContext::new();

		store()
			.save(&ctx, Session::new(TokenPair::new("access-1", "refresh-1")))
			.await
			.expect("Save should succeed.");

		let header = ctx.cookie_header().expect("Saved cookie should be live.");
		let other = CookieSessionStore::new(CookieSettings::ephemeral());
		let reloaded = SessionContext::from_cookie_header(&header);

		assert!(other.load(&reloaded).await.expect("Load should succeed.").is_empty());

		let tampered = SessionContext::from_cookie_header("member_session=bm90LWVuY3J5cHRlZA==");

		assert!(store().load(&tampered).await.expect("Load should succeed.").is_empty());
	}

	#[tokio::test]
	async fn destroy_emits_removal_cookie_for_incoming_session() {
		let store = store();
		let seed = SessionContext::new();

		store
			.save(&seed, Session::new(TokenPair::new("access-1", "refresh-1")))
			.await
			.expect("Save should succeed.");

		let ctx = SessionContext::from_cookie_header(
			&seed.cookie_header().expect("Saved cookie should be live."),
		);

		assert!(!store.load(&ctx).await.expect("Load should succeed.").is_empty());

		store.destroy(&ctx).await.expect("Destroy should succeed.");

		assert!(store.load(&ctx).await.expect("Load should succeed.").is_empty());

		let headers = ctx.set_cookie_headers();

		assert_eq!(headers.len(), 1);
		assert!(headers[0].to_str().expect("Set-Cookie should be ASCII.").contains("Max-Age=0"));
	}

	#[tokio::test]
	async fn removal_keeps_the_attributes_of_a_prefixed_cookie() {
		let settings = CookieSettings::new(SECRET)
			.expect("Secret should be accepted.")
			.with_name("__Host-member")
			.expect("Prefixed names are valid.");
		let store = CookieSessionStore::new(settings);
		let seed = SessionContext::new();

		store
			.save(&seed, Session::new(TokenPair::new("access-1", "refresh-1")))
			.await
			.expect("Save should succeed.");

		let ctx = SessionContext::from_cookie_header(
			&seed.cookie_header().expect("Saved cookie should be live."),
		);

		store.destroy(&ctx).await.expect("Destroy should succeed.");

		let headers = ctx.set_cookie_headers();

		assert_eq!(headers.len(), 1);

		let removal = headers[0].to_str().expect("Set-Cookie should be ASCII.");

		assert!(removal.starts_with("__Host-member="));
		assert!(removal.contains("Max-Age=0"));
		assert!(removal.contains("Secure"));
		assert!(removal.contains("Path=/"));
		assert!(removal.contains("SameSite=Lax"));
		assert!(removal.contains("HttpOnly"));
	}
}
