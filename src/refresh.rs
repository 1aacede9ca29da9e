//! Single-flight refresh coordination.
//!
//! The coordinator is a two-state machine (`Idle`, `Refreshing`). The first caller that needs a
//! refresh receives a [`RefreshLease`] and performs the refresh; callers arriving while the lease
//! is outstanding receive a [`RefreshWaiter`] queued in FIFO order. Settling the lease returns the
//! machine to `Idle` and hands the same [`RefreshOutcome`] to every waiter, so no queued caller
//! is ever left pending. Dropping an unsettled lease settles it as [`RefreshOutcome::Abandoned`].

mod metrics;

pub use metrics::{RefreshMetrics, RefreshStats};

// std
use std::task::{Context, Poll};
// crates.io
use futures::channel::oneshot;
// self
use crate::_prelude::*;

/// Result broadcast to queued callers when a refresh settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// New credentials are stored; replay the original request.
	Refreshed,
	/// Refresh failed and the session was cleared.
	Expired,
	/// The refreshing caller went away before finishing.
	Abandoned,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Refreshed => "refreshed",
			RefreshOutcome::Expired => "expired",
			RefreshOutcome::Abandoned => "abandoned",
		}
	}
}

#[derive(Debug, Default)]
enum RefreshState {
	#[default]
	Idle,
	Refreshing(VecDeque<oneshot::Sender<RefreshOutcome>>),
}

/// Owner of the refreshing flag and the pending-request queue.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	state: Mutex<RefreshState>,
	/// Refresh attempt/success/failure counters.
	pub metrics: RefreshMetrics,
}
impl RefreshCoordinator {
	/// Either takes the lease (state `Idle`) or enqueues behind the current refresh.
	pub fn begin(&self) -> RefreshTicket<'_> {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing(queue) = &mut *state {
			let (tx, rx) = oneshot::channel();

			queue.push_back(tx);

			return RefreshTicket::Follower(RefreshWaiter(rx));
		}

		*state = RefreshState::Refreshing(VecDeque::new());

		self.metrics.record_attempt();

		RefreshTicket::Leader(RefreshLease { coordinator: self, settled: false })
	}

	/// `true` while a lease is outstanding.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.state.lock(), RefreshState::Refreshing(_))
	}

	/// Number of callers queued behind the current refresh.
	pub fn queued(&self) -> usize {
		match &*self.state.lock() {
			RefreshState::Idle => 0,
			RefreshState::Refreshing(queue) => queue.len(),
		}
	}

	fn settle(&self, outcome: RefreshOutcome) -> usize {
		let previous = std::mem::take(&mut *self.state.lock());
		let RefreshState::Refreshing(queue) = previous else {
			return 0;
		};
		let notified = queue.len();

		match outcome {
			RefreshOutcome::Refreshed => self.metrics.record_success(),
			RefreshOutcome::Expired | RefreshOutcome::Abandoned => self.metrics.record_failure(),
		}

		for waiter in queue {
			// A closed receiver means that caller stopped waiting.
			let _ = waiter.send(outcome);
		}

		crate::obs::record_refresh_settled(outcome, notified);

		notified
	}
}

/// Role handed out by [`RefreshCoordinator::begin`].
#[derive(Debug)]
pub enum RefreshTicket<'a> {
	/// Caller must perform the refresh and settle the lease.
	Leader(RefreshLease<'a>),
	/// Caller waits for the leader's outcome.
	Follower(RefreshWaiter),
}

/// Exclusive right to perform the in-flight refresh.
#[derive(Debug)]
pub struct RefreshLease<'a> {
	coordinator: &'a RefreshCoordinator,
	settled: bool,
}
impl RefreshLease<'_> {
	/// Returns to `Idle` and notifies every waiter in FIFO order; returns how many were queued.
	pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
		self.settled = true;

		self.coordinator.settle(outcome)
	}
}
impl Drop for RefreshLease<'_> {
	fn drop(&mut self) {
		if !self.settled {
			self.coordinator.settle(RefreshOutcome::Abandoned);
		}
	}
}

/// Future resolving to the outcome of the refresh a caller queued behind.
#[derive(Debug)]
pub struct RefreshWaiter(oneshot::Receiver<RefreshOutcome>);
impl Future for RefreshWaiter {
	type Output = RefreshOutcome;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.0).poll(cx).map(|received| received.unwrap_or(RefreshOutcome::Abandoned))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::task::{self, ArcWake};
	// self
	use super::*;

	struct WakeRecorder {
		id: usize,
		order: Arc<Mutex<Vec<usize>>>,
	}
	impl ArcWake for WakeRecorder {
		fn wake_by_ref(arc_self: &Arc<Self>) {
			arc_self.order.lock().push(arc_self.id);
		}
	}

	fn expect_leader(ticket: RefreshTicket<'_>) -> RefreshLease<'_> {
		match ticket {
			RefreshTicket::Leader(lease) => lease,
			RefreshTicket::Follower(_) => panic!("Idle coordinator should hand out the lease."),
		}
	}

	fn expect_follower(ticket: RefreshTicket<'_>) -> RefreshWaiter {
		match ticket {
			RefreshTicket::Follower(waiter) => waiter,
			RefreshTicket::Leader(_) => panic!("Busy coordinator should queue the caller."),
		}
	}

	#[tokio::test]
	async fn followers_receive_the_leaders_outcome() {
		let coordinator = RefreshCoordinator::default();
		let lease = expect_leader(coordinator.begin());
		let first = expect_follower(coordinator.begin());
		let second = expect_follower(coordinator.begin());

		assert!(coordinator.is_refreshing());
		assert_eq!(coordinator.queued(), 2);
		assert_eq!(lease.settle(RefreshOutcome::Refreshed), 2);
		assert!(!coordinator.is_refreshing());
		assert_eq!(first.await, RefreshOutcome::Refreshed);
		assert_eq!(second.await, RefreshOutcome::Refreshed);
		assert_eq!(
			coordinator.metrics.snapshot(),
			RefreshStats { attempts: 1, successes: 1, failures: 0, replays: 0 }
		);
	}

	#[tokio::test]
	async fn failure_reaches_every_queued_caller() {
		let coordinator = RefreshCoordinator::default();
		let lease = expect_leader(coordinator.begin());
		let waiters = (0..3).map(|_| expect_follower(coordinator.begin())).collect::<Vec<_>>();

		lease.settle(RefreshOutcome::Expired);

		for waiter in waiters {
			assert_eq!(waiter.await, RefreshOutcome::Expired);
		}

		assert_eq!(coordinator.metrics.failures(), 1);
	}

	#[tokio::test]
	async fn dropped_lease_releases_waiters_and_the_flag() {
		let coordinator = RefreshCoordinator::default();
		let lease = expect_leader(coordinator.begin());
		let waiter = expect_follower(coordinator.begin());

		drop(lease);

		assert_eq!(waiter.await, RefreshOutcome::Abandoned);
		assert!(!coordinator.is_refreshing());

		let _next = expect_leader(coordinator.begin());
	}

	#[tokio::test]
	async fn waiters_are_woken_in_queue_order() {
		let coordinator = RefreshCoordinator::default();
		let lease = expect_leader(coordinator.begin());
		let mut waiters = (0..4).map(|_| expect_follower(coordinator.begin())).collect::<Vec<_>>();
		let order = Arc::new(Mutex::new(Vec::new()));

		// Register in reverse so wake order cannot come from registration order.
		for (id, waiter) in waiters.iter_mut().enumerate().rev() {
			let waker = task::waker(Arc::new(WakeRecorder { id, order: order.clone() }));

			assert!(Pin::new(waiter).poll(&mut Context::from_waker(&waker)).is_pending());
		}

		assert_eq!(lease.settle(RefreshOutcome::Expired), 4);
		assert_eq!(*order.lock(), vec![0, 1, 2, 3]);

		for waiter in waiters {
			assert_eq!(waiter.await, RefreshOutcome::Expired);
		}
	}
}
