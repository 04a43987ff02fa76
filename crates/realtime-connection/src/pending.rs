use tokio::sync::oneshot;

use crate::error::Error;

/// A single-shot, multi-waiter result slot: the caller that starts an
/// operation and any later caller that joins an already in-flight one
/// (`connect()` while already `CONNECTING`, a second concurrent `ping()`)
/// all get the same cloned settled value. A plain `tokio::sync::oneshot`
/// only supports one receiver, so this wraps a small list of waiters.
pub struct PendingSlot<T> {
	waiters: Vec<oneshot::Sender<Result<T, Error>>>,
}

impl<T> Default for PendingSlot<T> {
	fn default() -> Self {
		Self { waiters: Vec::new() }
	}
}

impl<T: Clone> PendingSlot<T> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Arms a fresh operation, discarding any stale waiters from a prior
	/// cycle. Settlement always clears the slot before the next operation
	/// populates it, so by the time `arm` runs again there should be none
	/// left anyway; clearing here defensively keeps a missed `clear` from
	/// leaking a stale waiter into the new cycle.
	pub fn arm(&mut self) -> oneshot::Receiver<Result<T, Error>> {
		self.waiters.clear();
		let (tx, rx) = oneshot::channel();
		self.waiters.push(tx);
		rx
	}

	/// Joins an already-armed slot, returning a receiver that settles
	/// alongside the original caller's. Returns `None` if nothing is armed.
	pub fn join(&mut self) -> Option<oneshot::Receiver<Result<T, Error>>> {
		if self.waiters.is_empty() {
			return None;
		}
		let (tx, rx) = oneshot::channel();
		self.waiters.push(tx);
		Some(rx)
	}

	#[must_use]
	pub fn is_armed(&self) -> bool {
		!self.waiters.is_empty()
	}

	/// Settles every waiter on the slot with `value`, clearing it
	/// afterwards. A settle on an unarmed slot (no pending caller, or
	/// already settled) is logged and ignored rather than treated as an
	/// error — a settle with nothing waiting is a normal race, not a bug.
	pub fn settle(&mut self, value: Result<T, Error>) {
		if self.waiters.is_empty() {
			tracing::debug!("settle on an unarmed pending slot; ignoring");
			return;
		}
		for waiter in self.waiters.drain(..) {
			let _ = waiter.send(value.clone());
		}
	}

	/// Clears the slot without settling, e.g. on timeout where the receiver
	/// already produced its own timeout error and this settle would be
	/// redundant.
	pub fn clear(&mut self) {
		self.waiters.clear();
	}
}
