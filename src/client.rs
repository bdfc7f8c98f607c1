//! Authenticated proxy client that route handlers call for every backend request.
//!
//! [`ProxyClient::request`] attaches the session's bearer token, sends the call once, and asks
//! the [`RetryPolicy`] what to do with the response. An unauthorized original attempt is handed
//! to the [`RefreshCoordinator`]; once the shared flight resolves the request is replayed exactly
//! once with the new token, or the original 401 is returned after the session was torn down.

pub mod forward;
pub mod request;

mod refresh;

pub use forward::*;
pub use request::*;

// self
use crate::{
	_prelude::*,
	config::ProxyConfig,
	coordinator::{FlightOutcome, RefreshCoordinator},
	error::HttpError,
	http::{OutboundRequest, ProxyResponse, ProxyTransport},
	obs::{self, FlowKind},
	policy::{Attempt, DefaultRetryPolicy, RetryPolicy, Verdict},
	session::{Session, SessionContext, SessionKey, TokenPair},
	store::SessionStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestProxyClient = ProxyClient<ReqwestTransport>;

/// Proxy client shared by every route handler of the server.
///
/// The client owns the transport, session store, refresh coordinator, and retry policy. Clone
/// it freely; clones share one coordinator, so single-flight holds across all of them.
pub struct ProxyClient<T>
where
	T: ?Sized + ProxyTransport,
{
	/// Transport used for backend calls and token exchanges.
	pub transport: Arc<T>,
	/// Session store holding member credentials.
	pub store: Arc<dyn SessionStore>,
	/// Refresh coordinator deduplicating token exchanges.
	pub coordinator: Arc<RefreshCoordinator>,
	/// Policy classifying backend responses.
	pub policy: Arc<dyn RetryPolicy>,
	/// Validated proxy settings.
	pub config: ProxyConfig,
}
impl<T> ProxyClient<T>
where
	T: ?Sized + ProxyTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ProxyConfig,
		store: Arc<dyn SessionStore>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let coordinator = Arc::new(RefreshCoordinator::with_rotation_grace(config.rotation_grace()));

		Self {
			transport: transport.into(),
			store,
			coordinator,
			policy: Arc::new(DefaultRetryPolicy),
			config,
		}
	}

	/// Shares `coordinator` instead of the client's own.
	pub fn with_coordinator(mut self, coordinator: Arc<RefreshCoordinator>) -> Self {
		self.coordinator = coordinator;

		self
	}

	/// Replaces the retry policy.
	pub fn with_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
		self.policy = policy;

		self
	}

	/// Sends one backend call on behalf of the member in `ctx`.
	///
	/// `GET`/`HEAD` bodies are encoded into the query string; other methods send them as JSON.
	/// Error statuses come back as [`Error::Http`] with status, headers, and body preserved, and
	/// a call that got no response at all comes back as [`Error::Transport`].
	pub async fn request(
		&self,
		ctx: &SessionContext,
		method: Method,
		path: &str,
		body: Option<Value>,
		options: RequestOptions,
	) -> Result<ProxyResponse> {
		let base = request::build(&self.config, method, path, body, options)?;
		let session = self.store.load(ctx).await?;
		let (pending, outbound) =
			PendingReplay::first_attempt(base, &session, self.config.routing_header())?;

		match self.send(FlowKind::Request, outbound, Attempt::Original).await {
			Judged::Done(result) => result,
			Judged::Unauthorized(unauthorized) => self.recover(ctx, pending, unauthorized).await,
		}
	}

	/// `GET` with optional query parameters.
	pub async fn get(
		&self,
		ctx: &SessionContext,
		path: &str,
		params: Option<Value>,
	) -> Result<ProxyResponse> {
		self.request(ctx, Method::GET, path, params, RequestOptions::default()).await
	}

	/// `POST` with a JSON body.
	pub async fn post<B>(&self, ctx: &SessionContext, path: &str, body: &B) -> Result<ProxyResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		self.send_json(ctx, Method::POST, path, body).await
	}

	/// `PUT` with a JSON body.
	pub async fn put<B>(&self, ctx: &SessionContext, path: &str, body: &B) -> Result<ProxyResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		self.send_json(ctx, Method::PUT, path, body).await
	}

	/// `PATCH` with a JSON body.
	pub async fn patch<B>(&self, ctx: &SessionContext, path: &str, body: &B) -> Result<ProxyResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		self.send_json(ctx, Method::PATCH, path, body).await
	}

	/// `DELETE` without a body.
	pub async fn delete(&self, ctx: &SessionContext, path: &str) -> Result<ProxyResponse> {
		self.request(ctx, Method::DELETE, path, None, RequestOptions::default()).await
	}

	/// Starts a session for `tokens`, replacing whatever `ctx` held.
	pub async fn login(
		&self,
		ctx: &SessionContext,
		tokens: TokenPair,
		routing_tag: Option<String>,
	) -> Result<()> {
		let session = match routing_tag {
			Some(tag) => Session::new(tokens).with_routing_tag(tag),
			None => Session::new(tokens),
		};

		self.store.save(ctx, session).await?;

		Ok(())
	}

	/// Ends the session in `ctx`.
	pub async fn logout(&self, ctx: &SessionContext) -> Result<()> {
		self.store.destroy(ctx).await?;

		Ok(())
	}

	/// Current session of `ctx`.
	pub async fn session(&self, ctx: &SessionContext) -> Result<Session> {
		Ok(self.store.load(ctx).await?)
	}

	async fn send_json<B>(
		&self,
		ctx: &SessionContext,
		method: Method,
		path: &str,
		body: &B,
	) -> Result<ProxyResponse>
	where
		B: ?Sized + Serialize + Sync,
	{
		let body = serde_json::to_value(body).map_err(|source| Error::Encode { source })?;

		self.request(ctx, method, path, Some(body), RequestOptions::default()).await
	}

	async fn send(&self, kind: FlowKind, outbound: OutboundRequest, attempt: Attempt) -> Judged {
		let raw = match obs::observe(kind, "send", self.transport.send(outbound)).await {
			Ok(raw) => raw,
			Err(err) => return Judged::Done(Err(err.into())),
		};
		let verdict = match self.policy.classify(raw.status, attempt) {
			Verdict::RefreshAndReplay if attempt == Attempt::Replay => Verdict::Reject,
			verdict => verdict,
		};

		match verdict {
			Verdict::Deliver => Judged::Done(Ok(raw.into())),
			Verdict::Reject => Judged::Done(Err(HttpError::from(raw).into())),
			Verdict::RefreshAndReplay => Judged::Unauthorized(raw.into()),
		}
	}

	async fn recover(
		&self,
		ctx: &SessionContext,
		pending: PendingReplay,
		unauthorized: HttpError,
	) -> Result<ProxyResponse> {
		// Nothing to refresh for a request that carried no credentials.
		if pending.used_token().is_none() {
			return Err(unauthorized.into());
		}

		let current = self.store.load(ctx).await?;

		// Another call on this context already rotated or dropped the session.
		if current.access_token() != pending.used_token() {
			return match current.access_token() {
				Some(_) => self.replay(pending, &current).await,
				None => Err(unauthorized.into()),
			};
		}

		let key = SessionKey::for_session(&current);
		let resolution = self
			.coordinator
			.resolve(
				&key,
				ctx.id(),
				|| self.exchange_flight(current.clone()),
				|outcome| self.apply_outcome(ctx, current.clone(), outcome),
			)
			.await;

		match resolution.outcome {
			FlightOutcome::Refreshed(tokens) => self.replay(pending, &current.with_tokens(tokens)).await,
			FlightOutcome::Failed(_) => Err(unauthorized.into()),
		}
	}

	async fn replay(&self, pending: PendingReplay, session: &Session) -> Result<ProxyResponse> {
		let outbound = pending.replay(session, self.config.routing_header())?;

		match self.send(FlowKind::Replay, outbound, Attempt::Replay).await {
			Judged::Done(result) => result,
			Judged::Unauthorized(unauthorized) => Err(unauthorized.into()),
		}
	}
}
#[cfg(feature = "reqwest")]
impl ProxyClient<ReqwestTransport> {
	/// Creates a client that provisions its own reqwest-backed transport.
	pub fn new(config: ProxyConfig, store: Arc<dyn SessionStore>) -> Self {
		Self::with_transport(config, store, ReqwestTransport::default())
	}
}
impl<T> Clone for ProxyClient<T>
where
	T: ?Sized + ProxyTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			coordinator: self.coordinator.clone(),
			policy: self.policy.clone(),
			config: self.config.clone(),
		}
	}
}
impl<T> Debug for ProxyClient<T>
where
	T: ?Sized + ProxyTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProxyClient")
			.field("config", &self.config)
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

enum Judged {
	Done(Result<ProxyResponse>),
	Unauthorized(HttpError),
}
