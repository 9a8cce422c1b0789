//! Ordered subscriber lists and the per-type message router.
//!
//! Dispatch always works on a snapshot of the subscriber list, so callbacks
//! may subscribe or unsubscribe (even themselves) without affecting the
//! dispatch in flight. A panicking callback is caught and logged; the
//! remaining callbacks still run.

use std::collections::HashMap;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::error;

use crate::util::lock;

pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

// ---------------------------------------------------------------------------
// Subscription handle
// ---------------------------------------------------------------------------

/// Handle returned by every `subscribe` call.
///
/// `unsubscribe` removes exactly the registration that produced this handle;
/// calling it again is a no-op. Dropping the handle does not unsubscribe.
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = lock(&self.cancel).take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.cancel).is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

struct ListenerList<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

/// An ordered list of callbacks for a single event kind.
pub struct Listeners<T> {
    list: Arc<Mutex<ListenerList<T>>>,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            list: Arc::new(Mutex::new(ListenerList {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback`. The same callback may be registered more than once;
    /// each registration is invoked and removed independently.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(Arc::new(callback))
    }

    pub fn subscribe_arc(&self, callback: Callback<T>) -> Subscription {
        let id = {
            let mut list = lock(&self.list);
            let id = list.next_id;
            list.next_id += 1;
            list.entries.push(Entry { id, callback });
            id
        };

        let weak: Weak<Mutex<ListenerList<T>>> = Arc::downgrade(&self.list);
        Subscription::new(move || {
            if let Some(list) = weak.upgrade() {
                lock(&list).entries.retain(|e| e.id != id);
            }
        })
    }

    /// Invoke every callback registered right now, in registration order.
    /// Returns how many callbacks completed without panicking.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<Entry<T>> = lock(&self.list).entries.clone();
        let mut delivered = 0;
        for entry in snapshot {
            let callback = &entry.callback;
            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(
                        subscriber = entry.id,
                        reason = %panic_message(panic.as_ref()),
                        "Subscriber panicked"
                    );
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        lock(&self.list).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.list).entries.clear();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Maps each key (message type) to its own ordered subscriber list.
pub struct Router<K, T> {
    routes: Mutex<HashMap<K, Listeners<T>>>,
}

impl<K, T> Default for Router<K, T> {
    fn default() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> Router<K, T>
where
    K: Eq + Hash + Copy,
    T: 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, key: K, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listeners(key).subscribe(callback)
    }

    /// Deliver `value` to the subscribers of `key`. Returns the number of
    /// callbacks that completed.
    pub fn dispatch(&self, key: K, value: &T) -> usize {
        let listeners = lock(&self.routes).get(&key).map(Listeners::share);
        match listeners {
            Some(listeners) => listeners.notify(value),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, key: K) -> usize {
        lock(&self.routes).get(&key).map_or(0, Listeners::len)
    }

    /// Drop every subscription on every key.
    pub fn clear(&self) {
        for listeners in lock(&self.routes).values() {
            listeners.clear();
        }
    }

    fn listeners(&self, key: K) -> Listeners<T> {
        lock(&self.routes).entry(key).or_default().share()
    }
}

impl<T> Listeners<T> {
    /// Another handle onto the same list.
    fn share(&self) -> Self {
        Self {
            list: Arc::clone(&self.list),
        }
    }
}
