use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Opaque handle returned from `on`/`once`, usable with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Entry<V> {
	id: HandlerId,
	once: bool,
	handler: Box<dyn FnMut(&V) + Send>,
}

/// Named-event subscription with `on`/`once`/`off`/`emit`.
/// Handlers for a single event fire in subscription order; `once` handlers
/// are removed before invocation; a handler that panics is caught and
/// logged so it can't break other subscribers.
pub struct EventEmitter<K, V> {
	next_id: AtomicU64,
	handlers: Mutex<HashMap<K, Vec<Entry<V>>>>,
}

impl<K, V> Default for EventEmitter<K, V>
where
	K: Eq + Hash + Clone,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<K, V> EventEmitter<K, V>
where
	K: Eq + Hash + Clone,
{
	#[must_use]
	pub fn new() -> Self {
		Self {
			next_id: AtomicU64::new(1),
			handlers: Mutex::new(HashMap::new()),
		}
	}

	fn register<F>(&self, key: K, once: bool, handler: F) -> HandlerId
	where
		F: FnMut(&V) + Send + 'static,
	{
		let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		let mut guard = self.handlers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
		guard.entry(key).or_default().push(Entry {
			id,
			once,
			handler: Box::new(handler),
		});
		id
	}

	/// Subscribe for every occurrence of `key`.
	pub fn on<F>(&self, key: K, handler: F) -> HandlerId
	where
		F: FnMut(&V) + Send + 'static,
	{
		self.register(key, false, handler)
	}

	/// Subscribe for exactly one occurrence of `key`.
	pub fn once<F>(&self, key: K, handler: F) -> HandlerId
	where
		F: FnMut(&V) + Send + 'static,
	{
		self.register(key, true, handler)
	}

	/// Remove a previously registered handler, if it's still present.
	pub fn off(&self, key: &K, id: HandlerId) {
		let mut guard = self.handlers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
		if let Some(entries) = guard.get_mut(key) {
			entries.retain(|entry| entry.id != id);
		}
	}

	/// Invoke every handler registered for `key`, in subscription order.
	/// `once` handlers are removed from the registry before being invoked,
	/// so a handler that re-subscribes itself during `emit` can't observe
	/// its own stale entry.
	pub fn emit(&self, key: &K, value: &V) {
		let due: Vec<Entry<V>> = {
			let mut guard = self.handlers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			match guard.get_mut(key) {
				Some(entries) => {
					let due = std::mem::take(entries);
					due
				}
				None => Vec::new(),
			}
		};

		let mut keep = Vec::with_capacity(due.len());
		for mut entry in due {
			invoke(&mut entry.handler, value);
			if !entry.once {
				keep.push(entry);
			}
		}

		if !keep.is_empty() {
			let mut guard = self.handlers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
			guard.entry(K::clone(key)).or_default().extend(keep);
		}
	}
}

fn invoke<V>(handler: &mut Box<dyn FnMut(&V) + Send>, value: &V) {
	if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(value))) {
		tracing::error!(?panic, "event handler panicked; swallowing so other subscribers still run");
	}
}
