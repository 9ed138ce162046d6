//! Settings change events and listener sets
//!
//! One tagged event type travels on every channel:
//! - Module listeners receive `Changed` and `Reset` synchronously, in
//!   registration order, on the writing thread.
//! - Global listeners receive the same events republished by the registry,
//!   plus the registry-wide `Reset { module_id: None }` and `Imported`,
//!   always on the UI context.

use crate::contract::SettingValue;
use arc_swap::ArcSwap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Settings event
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    /// One key changed; `value` is `None` when the key was removed
    Changed {
        module_id: String,
        key: String,
        value: Option<SettingValue>,
    },
    /// Bulk reset of one module, or of the whole registry when `module_id`
    /// is `None`
    Reset { module_id: Option<String> },
    /// Registry-wide import finished
    Imported { version: String },
}

impl ModuleEvent {
    pub fn changed(module_id: &str, key: &str, value: Option<SettingValue>) -> Self {
        ModuleEvent::Changed {
            module_id: module_id.to_string(),
            key: key.to_string(),
            value,
        }
    }

    pub fn reset(module_id: &str) -> Self {
        ModuleEvent::Reset {
            module_id: Some(module_id.to_string()),
        }
    }

    pub fn reset_all() -> Self {
        ModuleEvent::Reset { module_id: None }
    }

    pub fn imported(version: &str) -> Self {
        ModuleEvent::Imported {
            version: version.to_string(),
        }
    }

    /// Notification triple `(module_id, key, value)`; a `None` key marks a
    /// bulk reset
    pub fn notification(&self) -> Option<(Option<&str>, Option<&str>, Option<&SettingValue>)> {
        match self {
            ModuleEvent::Changed {
                module_id,
                key,
                value,
            } => Some((Some(module_id), Some(key), value.as_ref())),
            ModuleEvent::Reset { module_id } => Some((module_id.as_deref(), None, None)),
            ModuleEvent::Imported { .. } => None,
        }
    }

    pub fn module_id(&self) -> Option<&str> {
        match self {
            ModuleEvent::Changed { module_id, .. } => Some(module_id),
            ModuleEvent::Reset { module_id } => module_id.as_deref(),
            ModuleEvent::Imported { .. } => None,
        }
    }
}

/// Receiver of settings events
pub trait SettingsListener: Send + Sync {
    fn on_event(&self, event: &ModuleEvent);
}

impl<F> SettingsListener for F
where
    F: Fn(&ModuleEvent) + Send + Sync,
{
    fn on_event(&self, event: &ModuleEvent) {
        self(event)
    }
}

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Entry = (ListenerId, Arc<dyn SettingsListener>);

/// Copy-on-write listener collection
///
/// Fan-out iterates an immutable snapshot, so a listener added or removed
/// while events are delivered never disturbs delivery to the others.
pub struct ListenerSet {
    entries: ArcSwap<Vec<Entry>>,
    next_id: AtomicU64,
}

impl Default for ListenerSet {
    fn default() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn SettingsListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push((id, listener.clone()));
            next
        });
        id
    }

    /// Returns whether the listener was registered
    pub fn remove(&self, id: ListenerId) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|(entry_id, _)| *entry_id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// A panicking listener is logged and skipped.
    pub fn notify(&self, event: &ModuleEvent) {
        let snapshot = self.entries.load_full();
        for (id, listener) in snapshot.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                tracing::error!(listener = id.0, ?event, "Settings listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let set = ListenerSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let seen = seen.clone();
            set.add(Arc::new(move |_: &ModuleEvent| seen.lock().push(n)));
        }

        set.notify(&ModuleEvent::reset("editor"));
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_remove_during_fanout_keeps_others() {
        let set = Arc::new(ListenerSet::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let victim_slot = Arc::new(Mutex::new(None));
        {
            let set = set.clone();
            let victim_slot = victim_slot.clone();
            let seen = seen.clone();
            set.clone().add(Arc::new(move |_: &ModuleEvent| {
                seen.lock().push("remover");
                if let Some(id) = victim_slot.lock().take() {
                    set.remove(id);
                }
            }));
        }
        let victim = {
            let seen = seen.clone();
            set.add(Arc::new(move |_: &ModuleEvent| seen.lock().push("victim")))
        };
        *victim_slot.lock() = Some(victim);
        {
            let seen = seen.clone();
            set.add(Arc::new(move |_: &ModuleEvent| seen.lock().push("tail")));
        }

        set.notify(&ModuleEvent::reset_all());
        assert_eq!(*seen.lock(), vec!["remover", "victim", "tail"]);

        seen.lock().clear();
        set.notify(&ModuleEvent::reset_all());
        assert_eq!(*seen.lock(), vec!["remover", "tail"]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicU64::new(0));
        set.add(Arc::new(|_: &ModuleEvent| panic!("listener bug")));
        {
            let hits = hits.clone();
            set.add(Arc::new(move |_: &ModuleEvent| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        set.notify(&ModuleEvent::imported("1.0.0"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_notification_has_no_key() {
        let event = ModuleEvent::reset("ui_theme");
        assert_eq!(event.notification(), Some((Some("ui_theme"), None, None)));
        assert_eq!(ModuleEvent::imported("1.2.0").notification(), None);
    }
}
