//! Single-flight token refresh keyed by session identity.
//!
//! The first caller that needs a refresh for a [`SessionKey`] starts the flight; everyone arriving
//! while it is in progress joins it. The token exchange itself is a `'static` shared future stored
//! in the flight, so whichever waiters are still alive keep driving the same exchange even when
//! the caller that started it goes away. The refresh token is therefore spent at most once per
//! flight. Joining or starting a flight is one check-and-set under a synchronous lock, and nobody
//! holds that lock across `.await`. Works on any executor.
//!
//! Every waiter applies the shared outcome to its own session context exactly once per context,
//! before it is released.
//!
//! After a successful flight the key is kept for a short rotation grace window: a late 401 that
//! still carries the spent refresh token adopts the settled pair instead of exchanging again.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
// crates.io
use async_lock::OnceCell;
use futures::future::{BoxFuture, FutureExt, Shared};
// self
use crate::{
	_prelude::*,
	error::RefreshError,
	session::{ContextId, SessionKey, TokenPair},
};

type SharedExchange = Shared<BoxFuture<'static, FlightOutcome>>;

/// Shared result of one refresh flight.
#[derive(Clone, Debug)]
pub enum FlightOutcome {
	/// Exchange succeeded.
	Refreshed(TokenPair),
	/// Exchange failed, or its result could not be applied to the caller's session.
	Failed(Arc<RefreshError>),
}
impl FlightOutcome {
	/// Wraps a refresh failure.
	pub fn failed(err: RefreshError) -> Self {
		Self::Failed(Arc::new(err))
	}

	/// New token pair, when the flight succeeded.
	pub fn tokens(&self) -> Option<&TokenPair> {
		match self {
			Self::Refreshed(tokens) => Some(tokens),
			Self::Failed(_) => None,
		}
	}
}

/// How a caller took part in a flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
	/// Started the token exchange.
	Leader,
	/// Joined an exchange another caller started.
	Follower,
	/// Adopted a pair settled within the rotation grace window.
	Settled,
}

/// What [`RefreshCoordinator::resolve`] hands back to each waiter.
#[derive(Clone, Debug)]
pub struct Resolution {
	/// Outcome as applied to the waiter's own context.
	pub outcome: FlightOutcome,
	/// Part played by this caller.
	pub role: Role,
}

struct RefreshFlight {
	id: u64,
	exchange: SharedExchange,
	applied: Mutex<HashMap<ContextId, Arc<OnceCell<FlightOutcome>>>>,
	waiters: AtomicUsize,
}
impl RefreshFlight {
	fn applied_cell(&self, ctx: ContextId) -> Arc<OnceCell<FlightOutcome>> {
		self.applied.lock().entry(ctx).or_insert_with(|| Arc::new(OnceCell::new())).clone()
	}
}
impl Debug for RefreshFlight {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshFlight")
			.field("id", &self.id)
			.field("settled", &self.exchange.peek().is_some())
			.field("waiters", &self.waiters.load(Ordering::SeqCst))
			.finish()
	}
}

#[derive(Debug)]
enum Slot {
	InFlight(Arc<RefreshFlight>),
	Settled { tokens: TokenPair, at: OffsetDateTime },
}

enum Join {
	Settled(TokenPair),
	Flight(Arc<RefreshFlight>, Role),
}

#[derive(Debug)]
struct FlightTable {
	slots: Mutex<HashMap<SessionKey, Slot>>,
	rotation_grace: Duration,
	metrics: RefreshMetrics,
	next_id: AtomicU64,
}
impl FlightTable {
	fn launch<Fut>(self: Arc<Self>, key: SessionKey, exchange: Fut) -> RefreshFlight
	where
		Fut: 'static + Send + Future<Output = FlightOutcome>,
	{
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let run = async move {
			#[cfg(feature = "tracing")]
			tracing::debug!(session = %key, flight = id, "refresh flight started");

			self.metrics.record_attempt();

			let outcome = exchange.await;

			match &outcome {
				FlightOutcome::Refreshed(_) => self.metrics.record_success(),
				FlightOutcome::Failed(_err) => {
					#[cfg(feature = "tracing")]
					tracing::warn!(session = %key, error = %_err, "refresh flight failed");

					self.metrics.record_failure();
				},
			}

			self.settle(&key, id, &outcome);

			outcome
		};

		RefreshFlight {
			id,
			exchange: run.boxed().shared(),
			applied: Default::default(),
			waiters: AtomicUsize::new(0),
		}
	}

	fn settle(&self, key: &SessionKey, id: u64, outcome: &FlightOutcome) {
		let now = OffsetDateTime::now_utc();
		let mut slots = self.slots.lock();

		if matches!(slots.get(key), Some(Slot::InFlight(current)) if current.id == id) {
			match outcome {
				FlightOutcome::Refreshed(tokens) if self.rotation_grace > Duration::ZERO => {
					slots.insert(key.clone(), Slot::Settled { tokens: tokens.clone(), at: now });
				},
				_ => {
					slots.remove(key);
				},
			}
		}

		slots.retain(|_, slot| match slot {
			Slot::InFlight(_) => true,
			Slot::Settled { at, .. } => now - *at < self.rotation_grace,
		});
	}

	fn within_grace(&self, at: OffsetDateTime) -> bool {
		OffsetDateTime::now_utc() - at < self.rotation_grace
	}
}

// Counted under the slot lock so the last waiter leaving an unfinished flight removes it.
struct WaiterGuard<'a> {
	table: &'a FlightTable,
	key: &'a SessionKey,
	flight: Arc<RefreshFlight>,
}
impl Drop for WaiterGuard<'_> {
	fn drop(&mut self) {
		let mut slots = self.table.slots.lock();
		let last = self.flight.waiters.fetch_sub(1, Ordering::SeqCst) == 1;

		if last
			&& matches!(slots.get(self.key), Some(Slot::InFlight(current)) if current.id == self.flight.id)
		{
			#[cfg(feature = "tracing")]
			tracing::debug!(session = %self.key, flight = self.flight.id, "refresh flight abandoned");

			slots.remove(self.key);
		}
	}
}

/// Deduplicates concurrent refreshes so each session identity has at most one in flight.
#[derive(Debug)]
pub struct RefreshCoordinator {
	table: Arc<FlightTable>,
}
impl RefreshCoordinator {
	/// Rotation grace applied by [`Default`].
	pub const DEFAULT_ROTATION_GRACE: Duration = Duration::seconds(10);

	/// Creates a coordinator with the provided rotation grace; zero or negative disables it.
	pub fn with_rotation_grace(rotation_grace: Duration) -> Self {
		Self {
			table: Arc::new(FlightTable {
				slots: Default::default(),
				rotation_grace: if rotation_grace.is_negative() {
					Duration::ZERO
				} else {
					rotation_grace
				},
				metrics: Default::default(),
				next_id: AtomicU64::new(1),
			}),
		}
	}

	/// Rotation grace window currently in effect.
	pub fn rotation_grace(&self) -> Duration {
		self.table.rotation_grace
	}

	/// Flight counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.table.metrics
	}

	/// Number of callers waiting on the in-flight refresh for `key`, leader included.
	pub fn pending(&self, key: &SessionKey) -> usize {
		match self.table.slots.lock().get(key) {
			Some(Slot::InFlight(flight)) => flight.waiters.load(Ordering::SeqCst),
			_ => 0,
		}
	}

	/// Returns `true` while a refresh for `key` is unresolved.
	pub fn is_in_flight(&self, key: &SessionKey) -> bool {
		matches!(self.table.slots.lock().get(key), Some(Slot::InFlight(_)))
	}

	/// Joins or starts the refresh flight for `key` on behalf of context `ctx`.
	///
	/// `exchange` is called only when no flight is running; its future is shared by every waiter
	/// and keeps running as long as one of them is alive. Once the exchange settles, `apply` writes
	/// the outcome into `ctx` and returns the outcome as seen by that context. It runs once per
	/// context and flight; other waiters on the same context await that single write.
	pub async fn resolve<F, Fut, A, AFut>(
		&self,
		key: &SessionKey,
		ctx: ContextId,
		exchange: F,
		apply: A,
	) -> Resolution
	where
		F: FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = FlightOutcome>,
		A: FnOnce(FlightOutcome) -> AFut,
		AFut: Future<Output = FlightOutcome>,
	{
		let join = {
			let mut slots = self.table.slots.lock();

			match slots.get(key) {
				Some(Slot::Settled { tokens, at }) if self.table.within_grace(*at) =>
					Join::Settled(tokens.clone()),
				Some(Slot::InFlight(flight)) => {
					flight.waiters.fetch_add(1, Ordering::SeqCst);

					Join::Flight(flight.clone(), Role::Follower)
				},
				_ => {
					let flight = Arc::new(self.table.clone().launch(key.clone(), exchange()));

					flight.waiters.fetch_add(1, Ordering::SeqCst);
					slots.insert(key.clone(), Slot::InFlight(flight.clone()));

					Join::Flight(flight, Role::Leader)
				},
			}
		};
		let (flight, role) = match join {
			Join::Settled(tokens) => {
				self.table.metrics.record_settled_reuse();

				let outcome = apply(FlightOutcome::Refreshed(tokens)).await;

				return Resolution { outcome, role: Role::Settled };
			},
			Join::Flight(flight, role) => (flight, role),
		};
		let _waiter = WaiterGuard { table: &self.table, key, flight: flight.clone() };

		if role == Role::Follower {
			self.table.metrics.record_follower();
		}

		let outcome = flight.exchange.clone().await;
		let outcome = flight.applied_cell(ctx).get_or_init(|| apply(outcome)).await.clone();

		Resolution { outcome, role }
	}
}
impl Default for RefreshCoordinator {
	fn default() -> Self {
		Self::with_rotation_grace(Self::DEFAULT_ROTATION_GRACE)
	}
}
