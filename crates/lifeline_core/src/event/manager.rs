//! Enum-keyed listener registry and synchronous dispatch.

use crate::mapping::EntityKind;
use crate::model::user::{Child, User};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Entity lifecycle transitions that emit notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleEvent {
    /// Entity was handed to `persist`, before any write.
    PrePersist,
    /// Entity row was written and the id assigned.
    PostPersist,
    /// Entity fields, relations included, were materialized from the store.
    PostLoad,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrePersist => "pre_persist",
            Self::PostPersist => "post_persist",
            Self::PostLoad => "post_load",
        }
    }
}

/// Borrowed view of the entity a notification is about.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    User(&'a User),
    Child(&'a Child),
}

impl EntityRef<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Child(_) => EntityKind::Child,
        }
    }

    /// Raw store id, `None` for unflushed entities.
    pub fn raw_id(&self) -> Option<i64> {
        match self {
            Self::User(user) => user.id.map(|id| id.0),
            Self::Child(child) => child.id.map(|id| id.0),
        }
    }
}

/// Payload passed to every listener.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEventArgs<'a> {
    pub event: LifecycleEvent,
    pub entity: EntityRef<'a>,
}

/// Failure reported by a listener; aborts the running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl Display for ListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "lifecycle listener failed: {}", self.0)
    }
}

impl Error for ListenerError {}

/// Callback invoked for the events it was registered for.
///
/// Listeners receive every entity kind and filter themselves.
pub trait LifecycleListener {
    fn handle(&self, args: &LifecycleEventArgs<'_>) -> Result<(), ListenerError>;
}

/// Registry of listeners keyed by event kind.
#[derive(Default)]
pub struct EventManager {
    listeners: BTreeMap<LifecycleEvent, Vec<Arc<dyn LifecycleListener>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for each of `events`.
    ///
    /// Re-registering the same listener handle for an event keeps its
    /// original position.
    pub fn add_event_listener(
        &mut self,
        events: &[LifecycleEvent],
        listener: Arc<dyn LifecycleListener>,
    ) {
        for event in events {
            let registered = self.listeners.entry(*event).or_default();
            if registered
                .iter()
                .any(|current| Arc::ptr_eq(current, &listener))
            {
                continue;
            }
            registered.push(Arc::clone(&listener));
            debug!(
                "event=listener_register module=event status=ok kind={} listeners={}",
                event.as_str(),
                registered.len()
            );
        }
    }

    /// Unregisters `listener` from each of `events`. Unknown handles are ignored.
    pub fn remove_event_listener(
        &mut self,
        events: &[LifecycleEvent],
        listener: &Arc<dyn LifecycleListener>,
    ) {
        for event in events {
            if let Some(registered) = self.listeners.get_mut(event) {
                registered.retain(|current| !Arc::ptr_eq(current, listener));
                if registered.is_empty() {
                    self.listeners.remove(event);
                }
            }
        }
    }

    pub fn has_listeners(&self, event: LifecycleEvent) -> bool {
        self.listener_count(event) > 0
    }

    pub fn listener_count(&self, event: LifecycleEvent) -> usize {
        self.listeners.get(&event).map_or(0, Vec::len)
    }

    /// Invokes every listener registered for `event`, in registration order.
    ///
    /// # Errors
    /// - Returns the first listener error; later listeners are not called.
    pub fn dispatch(&self, event: LifecycleEvent, entity: EntityRef<'_>) -> Result<(), ListenerError> {
        let Some(registered) = self.listeners.get(&event) else {
            return Ok(());
        };

        let args = LifecycleEventArgs { event, entity };
        for (position, listener) in registered.iter().enumerate() {
            if let Err(err) = listener.handle(&args) {
                warn!(
                    "event=listener_dispatch module=event status=error kind={} entity={} position={} error={}",
                    event.as_str(),
                    entity.kind(),
                    position,
                    err
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EntityRef, EventManager, LifecycleEvent, LifecycleEventArgs, LifecycleListener,
        ListenerError,
    };
    use crate::model::user::{Child, User};
    use std::sync::{Arc, Mutex};

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl LifecycleListener for Recorder {
        fn handle(&self, args: &LifecycleEventArgs<'_>) -> Result<(), ListenerError> {
            self.log.lock().unwrap().push(format!(
                "{}:{}:{}",
                self.label,
                args.event.as_str(),
                args.entity.kind()
            ));
            if self.fail {
                return Err(ListenerError::new(self.label));
            }
            Ok(())
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn LifecycleListener> {
        Arc::new(Recorder {
            label,
            log: Arc::clone(log),
            fail,
        })
    }

    #[test]
    fn dispatch_runs_listeners_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = EventManager::new();
        manager.add_event_listener(&[LifecycleEvent::PostLoad], recorder("a", &log, false));
        manager.add_event_listener(&[LifecycleEvent::PostLoad], recorder("b", &log, false));

        let child = Child::new();
        manager
            .dispatch(LifecycleEvent::PostLoad, EntityRef::Child(&child))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:post_load:child".to_string(), "b:post_load:child".to_string()]
        );
    }

    #[test]
    fn dispatch_only_reaches_listeners_of_that_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = EventManager::new();
        manager.add_event_listener(&[LifecycleEvent::PrePersist], recorder("a", &log, false));

        let user = User::new("Gblanco");
        manager
            .dispatch(LifecycleEvent::PostLoad, EntityRef::User(&user))
            .unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert!(!manager.has_listeners(LifecycleEvent::PostLoad));
    }

    #[test]
    fn same_handle_registers_once_per_event() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder("a", &log, false);
        let mut manager = EventManager::new();
        manager.add_event_listener(&[LifecycleEvent::PostLoad], Arc::clone(&listener));
        manager.add_event_listener(
            &[LifecycleEvent::PostLoad, LifecycleEvent::PostPersist],
            Arc::clone(&listener),
        );

        assert_eq!(manager.listener_count(LifecycleEvent::PostLoad), 1);
        assert_eq!(manager.listener_count(LifecycleEvent::PostPersist), 1);

        manager.remove_event_listener(&[LifecycleEvent::PostLoad], &listener);
        assert!(!manager.has_listeners(LifecycleEvent::PostLoad));
        assert!(manager.has_listeners(LifecycleEvent::PostPersist));
    }

    #[test]
    fn failing_listener_aborts_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = EventManager::new();
        manager.add_event_listener(&[LifecycleEvent::PostLoad], recorder("boom", &log, true));
        manager.add_event_listener(&[LifecycleEvent::PostLoad], recorder("late", &log, false));

        let child = Child::new();
        let err = manager
            .dispatch(LifecycleEvent::PostLoad, EntityRef::Child(&child))
            .unwrap_err();

        assert_eq!(err, ListenerError::new("boom"));
        assert_eq!(*log.lock().unwrap(), vec!["boom:post_load:child".to_string()]);
    }
}
