//! Retry policy hooks that decide what happens to a backend response.
//!
//! A policy only sees responses. Transport failures never reach it because a request that got no
//! answer is surfaced as-is and never refreshed.

// self
use crate::_prelude::*;

/// Which send of a request produced the response being classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attempt {
	/// First send with the token loaded from the session.
	Original,
	/// The single replay after a refresh.
	Replay,
}
impl Attempt {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Attempt::Original => "original",
			Attempt::Replay => "replay",
		}
	}
}
impl Display for Attempt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome of classifying one response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
	/// Hand the response back to the caller.
	Deliver,
	/// Fail with the response status, headers, and body preserved.
	Reject,
	/// Refresh the session's tokens and replay the request once.
	RefreshAndReplay,
}

/// Strategy hook deciding whether a response is delivered, rejected, or repaired.
///
/// Implementors are required to be `Send + Sync`. The client never replays a request twice, so a
/// policy returning [`Verdict::RefreshAndReplay`] for [`Attempt::Replay`] is treated as
/// [`Verdict::Reject`].
pub trait RetryPolicy: Send + Sync {
	/// Classifies `status` observed on `attempt`.
	fn classify(&self, status: StatusCode, attempt: Attempt) -> Verdict;
}

/// Default policy: only an original 401 triggers a refresh.
///
/// Success and redirect statuses are delivered; 403, 5xx, and every other error status are
/// rejected without touching the session.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;
impl Display for DefaultRetryPolicy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-retry-policy")
	}
}
impl RetryPolicy for DefaultRetryPolicy {
	fn classify(&self, status: StatusCode, attempt: Attempt) -> Verdict {
		match (status, attempt) {
			(StatusCode::UNAUTHORIZED, Attempt::Original) => Verdict::RefreshAndReplay,
			(status, _) if status.is_success() || status.is_redirection() => Verdict::Deliver,
			_ => Verdict::Reject,
		}
	}
}
