//! Token exchange shared by a refresh flight and the per-context write of its outcome.

// crates.io
use futures::future::{BoxFuture, FutureExt};
use http::header::{ACCEPT, CONTENT_TYPE};
use serde_json::json;
// self
use crate::{
	_prelude::*,
	client::ProxyClient,
	coordinator::FlightOutcome,
	error::RefreshError,
	http::{OutboundRequest, ProxyTransport},
	obs::{self, FlowKind},
	session::{Session, SessionContext, TokenPair},
};

impl<T> ProxyClient<T>
where
	T: ?Sized + ProxyTransport,
{
	/// Token exchange for `session`, detached from the caller.
	///
	/// The future owns clones of the transport and settings, so it keeps running for the other
	/// waiters of the flight when the caller that started it is dropped.
	pub(crate) fn exchange_flight(&self, session: Session) -> BoxFuture<'static, FlightOutcome> {
		let transport = self.transport.clone();
		let endpoint = self.config.refresh_endpoint().clone();
		let headers = self.config.default_headers().clone();

		async move {
			let exchange = exchange(&*transport, endpoint, headers, &session);

			match obs::observe(FlowKind::Refresh, "exchange", exchange).await {
				Ok(tokens) => FlightOutcome::Refreshed(tokens),
				Err(err) => FlightOutcome::failed(err),
			}
		}
		.boxed()
	}

	/// Writes a flight outcome into `ctx` and returns it as seen by that context.
	///
	/// A new pair is saved over `session`; a failed flight, or a failed save, destroys the session.
	pub(crate) async fn apply_outcome(
		&self,
		ctx: &SessionContext,
		session: Session,
		outcome: FlightOutcome,
	) -> FlightOutcome {
		match outcome {
			FlightOutcome::Refreshed(tokens) =>
				match self.store.save(ctx, session.with_tokens(tokens.clone())).await {
					Ok(()) => FlightOutcome::Refreshed(tokens),
					Err(err) => {
						self.discard(ctx).await;

						FlightOutcome::failed(RefreshError::Storage(err))
					},
				},
			failed => {
				self.discard(ctx).await;

				failed
			},
		}
	}

	/// Clears the session in `ctx`; a failing store is logged and otherwise ignored.
	pub(crate) async fn discard(&self, ctx: &SessionContext) {
		if let Err(_err) = self.store.destroy(ctx).await {
			#[cfg(feature = "tracing")]
			tracing::warn!(context = %ctx.id(), error = %_err, "session teardown failed");
		}
	}
}

async fn exchange<T>(
	transport: &T,
	endpoint: Url,
	headers: HeaderMap,
	session: &Session,
) -> Result<TokenPair, RefreshError>
where
	T: ?Sized + ProxyTransport,
{
	let refresh_token = session.refresh_token().ok_or(RefreshError::MissingRefreshToken)?;
	let payload = json!({
		"accessToken": session.access_token().map(|token| token.expose()),
		"refreshToken": refresh_token.expose(),
	});
	let mut request = OutboundRequest::new(Method::POST, endpoint);

	request.headers = headers;
	request.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	request.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
	request.body = Some(payload.to_string().into_bytes());

	let response = transport.send(request).await.map_err(RefreshError::Transport)?;

	if !response.status.is_success() {
		return Err(RefreshError::Rejected { status: response.status });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| RefreshError::MalformedResponse { source })
}
