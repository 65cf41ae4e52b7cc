//! Callback lists with isolated failures.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

type Observer<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Ordered list of observers notified with a shared argument.
///
/// Each observer runs in isolation: a panicking observer is logged and the
/// remaining observers are still notified. Failures are never retried.
/// The list is snapshotted before notifying, so observers may register
/// further observers.
pub struct ObserverList<A: ?Sized> {
	name: &'static str,
	observers: RwLock<Vec<Observer<A>>>,
}

impl<A: ?Sized> ObserverList<A> {
	/// Creates an empty list; `name` labels log records.
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			observers: RwLock::new(Vec::new()),
		}
	}

	pub fn register(&self, observer: impl Fn(&A) + Send + Sync + 'static) {
		self.observers.write().push(Arc::new(observer));
	}

	/// Notifies every observer in registration order.
	///
	/// Returns the number of observers that panicked.
	pub fn notify(&self, arg: &A) -> usize {
		let snapshot = self.observers.read().clone();
		let mut failed = 0;
		for observer in snapshot {
			if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer(arg))) {
				failed += 1;
				error!(
					observer = self.name,
					error = %panic_message(&*panic),
					"Observer callback panicked"
				);
			}
		}
		failed
	}

	pub fn len(&self) -> usize {
		self.observers.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.observers.read().is_empty()
	}
}

impl<A: ?Sized> std::fmt::Debug for ObserverList<A> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ObserverList")
			.field("name", &self.name)
			.field("len", &self.len())
			.finish()
	}
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}
