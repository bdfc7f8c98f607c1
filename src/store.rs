//! Session storage contract and built-in cookie-backed implementations.

pub mod cookie;
pub mod memory;

pub use cookie::{CookieSessionStore, CookieSettings};
pub use memory::MemorySessionStore;

// self
use crate::{
	_prelude::*,
	session::{Session, SessionContext},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for member sessions.
///
/// Every operation is scoped to the [`SessionContext`] of the incoming request. Implementations
/// must make a completed [`save`](Self::save) visible to the next [`load`](Self::load) on the same
/// context, and must write the whole session at once.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Returns the current session; an absent or unreadable record yields an empty session.
	fn load<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, Session>;

	/// Persists the full session, replacing whatever was stored before.
	fn save<'a>(&'a self, ctx: &'a SessionContext, session: Session) -> StoreFuture<'a, ()>;

	/// Clears the session so later requests proceed unauthenticated.
	fn destroy<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
