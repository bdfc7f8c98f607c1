//! Server-side in-memory [`SessionStore`] for local development and tests.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use cookie::{Cookie, SameSite};
// self
use crate::{
	_prelude::*,
	session::{Session, SessionContext},
	store::{SessionStore, StoreError, StoreFuture},
};

type SessionMap = Arc<RwLock<HashMap<String, Session>>>;

/// Keeps sessions in-process; the cookie only carries a random session id.
///
/// Meant for local development and tests. Records live until destroyed and the map is unbounded;
/// there is no expiry or eviction, and nothing is shared across processes.
#[derive(Clone, Debug)]
pub struct MemorySessionStore {
	cookie_name: String,
	secure: bool,
	sessions: SessionMap,
}
impl MemorySessionStore {
	/// Cookie name used by [`Default`].
	pub const DEFAULT_COOKIE_NAME: &'static str = "member_sid";

	/// Creates an empty store whose id cookie uses `cookie_name`.
	pub fn new(cookie_name: impl Into<String>) -> Self {
		Self { cookie_name: cookie_name.into(), secure: false, sessions: Default::default() }
	}

	/// Toggles the `Secure` attribute on the id cookie.
	pub fn with_secure(mut self, secure: bool) -> Self {
		self.secure = secure;

		self
	}

	/// Number of live sessions.
	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	/// Returns `true` when no session is stored.
	pub fn is_empty(&self) -> bool {
		self.sessions.read().is_empty()
	}

	fn session_id(&self, ctx: &SessionContext) -> Option<String> {
		ctx.jar(|jar| jar.get(&self.cookie_name).map(|cookie| cookie.value().to_owned()))
	}

	fn id_cookie(&self, id: String) -> Cookie<'static> {
		Cookie::build((self.cookie_name.clone(), id))
			.path("/")
			.http_only(true)
			.secure(self.secure)
			.same_site(SameSite::Lax)
			.build()
	}

	fn save_now(&self, ctx: &SessionContext, session: Session) -> Result<(), StoreError> {
		let current = self.session_id(ctx);
		let mut sessions = self.sessions.write();

		// A destroyed id is never written back; the context gets a fresh one instead.
		match current {
			Some(id) if sessions.contains_key(&id) => {
				sessions.insert(id, session);
			},
			_ => {
				let id = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());

				sessions.insert(id.clone(), session);
				drop(sessions);
				ctx.jar(|jar| jar.add(self.id_cookie(id)));
			},
		}

		Ok(())
	}

	fn destroy_now(&self, ctx: &SessionContext) {
		if let Some(id) = self.session_id(ctx) {
			self.sessions.write().remove(&id);

			let removal = self.id_cookie(String::new());

			ctx.jar(|jar| jar.remove(removal));
		}
	}
}
impl Default for MemorySessionStore {
	fn default() -> Self {
		Self::new(Self::DEFAULT_COOKIE_NAME)
	}
}
impl SessionStore for MemorySessionStore {
	fn load<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, Session> {
		Box::pin(async move {
			let session = self
				.session_id(ctx)
				.and_then(|id| self.sessions.read().get(&id).cloned())
				.unwrap_or_default();

			Ok(session)
		})
	}

	fn save<'a>(&'a self, ctx: &'a SessionContext, session: Session) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.save_now(ctx, session) })
	}

	fn destroy<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.destroy_now(ctx);

			Ok(())
		})
	}
}
