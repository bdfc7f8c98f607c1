//! Per-request session scope: the incoming cookie jar and the outgoing `Set-Cookie` delta.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use cookie::{Cookie, CookieJar};
use http::header::COOKIE;
// self
use crate::_prelude::*;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`SessionContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);
impl Display for ContextId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ctx-{}", self.0)
	}
}

/// Session scope of one incoming request.
///
/// Stores read the session from the jar and write replacement or removal cookies back into it;
/// a write is visible to every later read on the same context. Share it behind an `Arc` when
/// several backend calls run concurrently for the same incoming request, then emit
/// [`set_cookie_headers`](Self::set_cookie_headers) on the outgoing response.
pub struct SessionContext {
	id: ContextId,
	jar: Mutex<CookieJar>,
}
impl SessionContext {
	/// Empty context, as for a request that carried no cookies.
	pub fn new() -> Self {
		Self::with_jar(CookieJar::new())
	}

	/// Context seeded from a raw `Cookie` request header; malformed pairs are skipped.
	pub fn from_cookie_header(header: &str) -> Self {
		let mut jar = CookieJar::new();

		for cookie in Cookie::split_parse(header.to_owned()).filter_map(|parsed| parsed.ok()) {
			jar.add_original(cookie);
		}

		Self::with_jar(jar)
	}

	/// Context seeded from every `Cookie` header in `headers`.
	pub fn from_headers(headers: &HeaderMap) -> Self {
		let mut jar = CookieJar::new();

		for value in headers.get_all(COOKIE).iter().filter_map(|value| value.to_str().ok()) {
			for cookie in Cookie::split_parse(value.to_owned()).filter_map(|parsed| parsed.ok()) {
				jar.add_original(cookie);
			}
		}

		Self::with_jar(jar)
	}

	/// Identifier used to tell contexts apart inside refresh flights.
	pub fn id(&self) -> ContextId {
		self.id
	}

	/// `Set-Cookie` values for every cookie written or removed during this request.
	pub fn set_cookie_headers(&self) -> Vec<HeaderValue> {
		self.jar
			.lock()
			.delta()
			.filter_map(|cookie| HeaderValue::from_str(&cookie.to_string()).ok())
			.collect()
	}

	/// `Cookie` header reflecting the current jar contents, if any cookie is live.
	pub fn cookie_header(&self) -> Option<String> {
		let jar = self.jar.lock();
		let pairs = jar
			.iter()
			.map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
			.collect::<Vec<_>>();

		if pairs.is_empty() { None } else { Some(pairs.join("; ")) }
	}

	pub(crate) fn jar<R>(&self, f: impl FnOnce(&mut CookieJar) -> R) -> R {
		f(&mut self.jar.lock())
	}

	fn with_jar(jar: CookieJar) -> Self {
		Self { id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)), jar: Mutex::new(jar) }
	}
}
impl Default for SessionContext {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for SessionContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionContext").field("id", &self.id).finish_non_exhaustive()
	}
}
