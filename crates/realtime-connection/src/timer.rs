use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// A one-shot cancellable delay. `cancel()` after the callback has already
/// fired is a no-op. Dropping a `Timer` also cancels it.
#[derive(Debug)]
pub struct Timer {
	token: CancellationToken,
}

impl Timer {
	/// Arms a timer that invokes `callback` after `delay` unless cancelled
	/// first. `callback` runs inside the spawned task, i.e. on whatever
	/// executor the manager itself runs on.
	pub fn new<F>(delay: Duration, callback: F) -> Self
	where
		F: FnOnce() + Send + 'static,
	{
		let token = CancellationToken::new();
		let guard = token.clone();
		tokio::spawn(async move {
			tokio::select! {
				() = tokio::time::sleep(delay) => callback(),
				() = guard.cancelled() => {}
			}
		});
		Self { token }
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

impl Drop for Timer {
	fn drop(&mut self) {
		self.token.cancel();
	}
}
