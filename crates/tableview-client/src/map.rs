//! Materialized Key-Value Map
//!
//! Latest value per key, plus the listeners that observe every merge.
//!
//! ## Concurrency
//!
//! Two locks with different jobs:
//!
//! - **Data**: a `DashMap`, so `get`/`len`/`entries` never wait on writers or
//!   on listener callbacks.
//! - **Coordination**: a re-entrant mutex around the listener list. `merge` and
//!   `snapshot_and_register` both hold it for their whole duration, so a new
//!   listener sees each update exactly once: either inside its initial
//!   snapshot or as a live callback, never both and never neither.
//!
//! Callbacks run on the thread holding the coordination lock, so a listener
//! may register further listeners from inside its callback. A listener
//! registered during a merge receives that merge's value through its snapshot
//! and is only called live from the next merge on.

use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tableview_observability::metrics::LISTENER_ERRORS_TOTAL;
use tracing::error;

/// Callback invoked with `(key, value)` for every update.
pub type Listener<T> = Box<dyn FnMut(&str, &T) + Send>;

type SharedListener<T> = Arc<Mutex<Listener<T>>>;

pub struct MaterializedMap<T> {
    topic: String,
    data: DashMap<String, T>,
    listeners: ReentrantMutex<RefCell<Vec<SharedListener<T>>>>,
}

impl<T> MaterializedMap<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            data: DashMap::new(),
            listeners: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Store `value` under `key` and notify every listener.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run and the value stays stored.
    pub fn merge(&self, key: &str, value: T) {
        let listeners = self.listeners.lock();

        // Listeners added by a callback below already saw `value` in their
        // snapshot.
        let count = listeners.borrow().len();
        if count == 0 {
            self.data.insert(key.to_string(), value);
            return;
        }

        self.data.insert(key.to_string(), value.clone());
        for index in 0..count {
            let listener = Arc::clone(&listeners.borrow()[index]);
            self.invoke(&listener, key, &value);
        }
    }

    /// Replay the current contents to `listener`, then keep it for future
    /// updates.
    pub fn snapshot_and_register<F>(&self, listener: F)
    where
        F: FnMut(&str, &T) + Send + 'static,
    {
        let listeners = self.listeners.lock();
        let listener: SharedListener<T> = Arc::new(Mutex::new(Box::new(listener)));

        for (key, value) in self.entries() {
            self.invoke(&listener, &key, &value);
        }

        listeners.borrow_mut().push(listener);
    }

    fn invoke(&self, listener: &Mutex<Listener<T>>, key: &str, value: &T) {
        let mut listener = listener.lock();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (*listener)(key, value))) {
            LISTENER_ERRORS_TOTAL.with_label_values(&[&self.topic]).inc();
            error!(
                topic = %self.topic,
                key,
                error = panic_message(&*panic),
                "Table view listener raised an exception"
            );
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.data.get(key).map(|v| v.value().clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Point-in-time copy of all entries. Order is unspecified.
    pub fn entries(&self) -> Vec<(String, T)> {
        self.data
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.iter().map(|e| e.key().clone()).collect()
    }

    pub fn values(&self) -> Vec<T> {
        self.data.iter().map(|e| e.value().clone()).collect()
    }

    /// Visit a snapshot of the entries without registering anything.
    pub fn for_each<F>(&self, mut action: F)
    where
        F: FnMut(&str, &T),
    {
        for (key, value) in self.entries() {
            action(&key, &value);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().borrow().len()
    }

    /// Drop all entries and listeners.
    pub fn clear(&self) {
        let listeners = self.listeners.lock();
        listeners.borrow_mut().clear();
        self.data.clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
