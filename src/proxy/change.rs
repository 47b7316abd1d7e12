//! Change notification
//!
//! A [`ChangeToken`] is a one-shot signal that previously resolved data is
//! stale. Discovery providers hold the matching [`ChangeTrigger`] and fire it
//! when their view of a service changes. The resolver folds the tokens of
//! every lookup in a pass into one [`CompositeChangeToken`].

use futures::future::select_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    fired: watch::Sender<bool>,
    callbacks: Mutex<HashMap<u64, Callback>>,
    next_id: AtomicU64,
}

/// Create a connected trigger/token pair
pub fn change_token() -> (ChangeTrigger, ChangeToken) {
    let (fired, _) = watch::channel(false);
    let shared = Arc::new(Shared {
        fired,
        callbacks: Mutex::new(HashMap::new()),
        next_id: AtomicU64::new(0),
    });

    (
        ChangeTrigger {
            shared: Arc::clone(&shared),
        },
        ChangeToken { shared },
    )
}

/// Producer side of a change token
pub struct ChangeTrigger {
    shared: Arc<Shared>,
}

impl ChangeTrigger {
    /// Mark the token as changed and run registered callbacks.
    ///
    /// Only the first call has any effect.
    pub fn fire(&self) {
        let first = self.shared.fired.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        });

        if !first {
            return;
        }

        let callbacks = std::mem::take(
            &mut *self
                .shared
                .callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        for callback in callbacks.into_values() {
            callback();
        }
    }

    /// Another handle to the token this trigger fires
    pub fn token(&self) -> ChangeToken {
        ChangeToken {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer side of a change notification
#[derive(Clone)]
pub struct ChangeToken {
    shared: Arc<Shared>,
}

impl ChangeToken {
    pub fn has_changed(&self) -> bool {
        *self.shared.fired.borrow()
    }

    /// Run `callback` once when the token fires.
    ///
    /// If the token has already fired the callback runs immediately.
    /// Dropping the returned registration unregisters the callback.
    pub fn register_callback<F>(&self, callback: F) -> CallbackRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self
            .shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.has_changed() {
            drop(callbacks);
            callback();
            return CallbackRegistration::inert();
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        callbacks.insert(id, Box::new(callback));

        CallbackRegistration {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of callbacks waiting for this token to fire
    pub fn pending_callbacks(&self) -> usize {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait until the token fires
    pub async fn changed(&self) {
        let mut rx = self.shared.fired.subscribe();
        // The sender lives in `shared`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Keeps a callback registered; dropping it removes the callback.
#[must_use = "dropping the registration unregisters the callback"]
pub struct CallbackRegistration {
    id: u64,
    shared: Weak<Shared>,
}

impl CallbackRegistration {
    fn inert() -> Self {
        Self {
            id: 0,
            shared: Weak::new(),
        }
    }
}

impl Drop for CallbackRegistration {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let removed = shared
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        // Dropped outside the lock: the callback may own other registrations.
        drop(removed);
    }
}

impl fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistration")
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeToken")
            .field("has_changed", &self.has_changed())
            .finish()
    }
}

/// Fires when any of its constituent tokens fires
#[derive(Debug, Clone, Default)]
pub struct CompositeChangeToken {
    tokens: Vec<ChangeToken>,
}

impl CompositeChangeToken {
    pub fn new(tokens: Vec<ChangeToken>) -> Self {
        Self { tokens }
    }

    /// Number of constituent tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn has_changed(&self) -> bool {
        self.tokens.iter().any(ChangeToken::has_changed)
    }

    /// Register `callback` on every constituent; it runs at most once,
    /// on the first constituent to fire.
    ///
    /// Dropping the returned registration removes the callback from every
    /// constituent, releasing whatever it captured.
    pub fn register_callback<F>(&self, callback: F) -> CompositeRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let once = Arc::new(Mutex::new(Some(callback)));

        let registrations = self
            .tokens
            .iter()
            .map(|token| {
                let once = Arc::clone(&once);
                token.register_callback(move || {
                    let callback = once.lock().unwrap_or_else(PoisonError::into_inner).take();
                    if let Some(callback) = callback {
                        callback();
                    }
                })
            })
            .collect();

        CompositeRegistration {
            _registrations: registrations,
        }
    }

    /// Wait until any constituent fires.
    ///
    /// A composite with no constituents never fires.
    pub async fn changed(&self) {
        if self.tokens.is_empty() {
            return std::future::pending().await;
        }

        select_all(self.tokens.iter().map(|token| Box::pin(token.changed()))).await;
    }
}

/// Owns one registration per constituent of a [`CompositeChangeToken`]
#[derive(Debug)]
#[must_use = "dropping the registration unregisters the callback"]
pub struct CompositeRegistration {
    _registrations: Vec<CallbackRegistration>,
}
