//! Server-side authenticated proxy client for backend calls made on behalf of a signed-in member.
//!
//! Sessions live in encrypted cookies. A 401 triggers one shared token refresh per session, after
//! which the failed request is replayed exactly once.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod obs;
pub mod policy;
pub mod session;
pub mod store;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		client::ReqwestProxyClient,
		config::ProxyConfig,
		session::{Session, SessionContext},
		store::{CookieSessionStore, CookieSettings, SessionStore, StoreFuture},
	};

	/// Cookie secret shared by integration tests; long enough for key derivation.
	pub const TEST_COOKIE_SECRET: &str = "member-proxy-integration-test-cookie-secret";
	/// Refresh domain used by test configurations.
	pub const TEST_REFRESH_DOMAIN: &str = "member";

	/// Builds a proxy configuration pointing at the provided backend URL.
	pub fn test_config(backend: &str) -> ProxyConfig {
		ProxyConfig::builder(
			Url::parse(backend).expect("Test backend URL should parse."),
			TEST_REFRESH_DOMAIN,
		)
		.build()
		.expect("Test proxy configuration should build.")
	}

	/// Cookie settings with the shared test secret and `Secure` disabled.
	pub fn test_cookie_settings() -> CookieSettings {
		CookieSettings::new(TEST_COOKIE_SECRET)
			.expect("Test cookie secret should be accepted.")
			.with_secure(false)
	}

	/// Constructs a reqwest-backed client whose sessions live in a counting cookie store.
	pub fn build_reqwest_test_client(
		backend: &str,
	) -> (ReqwestProxyClient, Arc<RecordingStore<CookieSessionStore>>) {
		let store = Arc::new(RecordingStore::new(CookieSessionStore::new(test_cookie_settings())));
		let client = ReqwestProxyClient::new(test_config(backend), store.clone());

		(client, store)
	}

	/// Saves `session` into a fresh context and returns a context rebuilt from its cookie, the
	/// way the next incoming request would see it.
	pub async fn seeded_context(store: &dyn SessionStore, session: Session) -> SessionContext {
		let seed = SessionContext::new();

		store.save(&seed, session).await.expect("Seeding the session should succeed.");

		let header = seed.cookie_header().expect("Seeded context should carry a cookie.");

		SessionContext::from_cookie_header(&header)
	}

	/// Store wrapper that counts writes and teardowns.
	#[derive(Debug)]
	pub struct RecordingStore<S> {
		inner: S,
		saves: AtomicUsize,
		destroys: AtomicUsize,
	}
	impl<S> RecordingStore<S> {
		/// Wraps the provided store.
		pub fn new(inner: S) -> Self {
			Self { inner, saves: AtomicUsize::new(0), destroys: AtomicUsize::new(0) }
		}

		/// Number of `save` calls observed.
		pub fn saves(&self) -> usize {
			self.saves.load(Ordering::SeqCst)
		}

		/// Number of `destroy` calls observed.
		pub fn destroys(&self) -> usize {
			self.destroys.load(Ordering::SeqCst)
		}
	}
	impl<S> SessionStore for RecordingStore<S>
	where
		S: SessionStore,
	{
		fn load<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, Session> {
			self.inner.load(ctx)
		}

		fn save<'a>(&'a self, ctx: &'a SessionContext, session: Session) -> StoreFuture<'a, ()> {
			self.saves.fetch_add(1, Ordering::SeqCst);

			self.inner.save(ctx, session)
		}

		fn destroy<'a>(&'a self, ctx: &'a SessionContext) -> StoreFuture<'a, ()> {
			self.destroys.fetch_add(1, Ordering::SeqCst);

			self.inner.destroy(ctx)
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
