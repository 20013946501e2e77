//! Owned reactive cells
//!
//! A [`Watchable`] holds one value owned by the logical thread. Observers
//! either register a [`Watcher`] (called on the logical thread) or take a
//! `tokio::sync::watch` receiver for use anywhere else.
//!
//! Release is explicit: the owner calls [`Watchable::close`], which closes
//! every watcher before the cell goes away. Dropping a cell never runs
//! observer callbacks.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::thread::WatchableThread;

/// Observer of a [`Watchable`]
///
/// All callbacks run on the logical thread.
pub trait Watcher<T>: Send + Sync {
    /// Called once on registration with the current value
    fn item_open(&self, id: &str, value: &T);

    /// Called after every update
    fn item_update(&self, id: &str, value: &T, previous: &T);

    /// Called on removal or when the cell is closed
    fn item_close(&self, id: &str, value: &T);
}

/// Registration handle returned by [`Watchable::add_watcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

struct CellState<T> {
    value: T,
    watchers: Vec<(WatcherId, Arc<dyn Watcher<T>>)>,
    next_watcher: u64,
    sender: Option<watch::Sender<T>>,
}

/// A value owned by the logical thread with change notification
pub struct Watchable<T> {
    id: String,
    thread: WatchableThread,
    state: Mutex<CellState<T>>,
}

impl<T> Watchable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(thread: WatchableThread, id: impl Into<String>, initial: T) -> Self {
        let (sender, _) = watch::channel(initial.clone());
        Self {
            id: id.into(),
            thread,
            state: Mutex::new(CellState {
                value: initial,
                watchers: Vec::new(),
                next_watcher: 0,
                sender: Some(sender),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn thread(&self) -> &WatchableThread {
        &self.thread
    }

    /// Current value
    pub fn value(&self) -> T {
        self.state.lock().value.clone()
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().sender.is_none()
    }

    /// Register a watcher; it is opened immediately with the current value
    pub fn add_watcher(&self, watcher: Arc<dyn Watcher<T>>) -> WatcherId {
        self.thread.assert();

        let (id, value) = {
            let mut state = self.state.lock();
            let id = WatcherId(state.next_watcher);
            state.next_watcher += 1;
            state.watchers.push((id, watcher.clone()));
            (id, state.value.clone())
        };

        watcher.item_open(&self.id, &value);
        id
    }

    /// Unregister a watcher, closing it with the current value
    pub fn remove_watcher(&self, id: WatcherId) {
        self.thread.assert();

        let removed = {
            let mut state = self.state.lock();
            let position = state.watchers.iter().position(|(w, _)| *w == id);
            position.map(|p| (state.watchers.remove(p).1, state.value.clone()))
        };

        if let Some((watcher, value)) = removed {
            watcher.item_close(&self.id, &value);
        }
    }

    /// Replace the value and notify watchers in registration order
    ///
    /// Ignored once the cell is closed.
    pub fn update(&self, value: T) {
        self.thread.assert();

        let (previous, watchers) = {
            let mut state = self.state.lock();
            let Some(sender) = state.sender.as_ref() else {
                return;
            };
            sender.send_replace(value.clone());
            let previous = std::mem::replace(&mut state.value, value.clone());
            let watchers: Vec<_> = state.watchers.iter().map(|(_, w)| w.clone()).collect();
            (previous, watchers)
        };

        for watcher in watchers {
            watcher.item_update(&self.id, &value, &previous);
        }
    }

    /// Receiver for consumers off the logical thread
    ///
    /// A receiver taken after close observes the final value and a closed
    /// channel.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        let state = self.state.lock();
        match state.sender.as_ref() {
            Some(sender) => sender.subscribe(),
            None => watch::channel(state.value.clone()).1,
        }
    }

    /// Close every watcher and the watch channel
    pub fn close(&self) {
        self.thread.assert();

        let (value, watchers) = {
            let mut state = self.state.lock();
            if state.sender.take().is_none() {
                return;
            }
            (state.value.clone(), std::mem::take(&mut state.watchers))
        };

        for (_, watcher) in watchers {
            watcher.item_close(&self.id, &value);
        }
        tracing::trace!(watchable = %self.id, "watchable closed");
    }
}

impl<T> std::fmt::Debug for Watchable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchable").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Watcher<u32> for Recorder {
        fn item_open(&self, _id: &str, value: &u32) {
            self.events.lock().push(format!("open {value}"));
        }

        fn item_update(&self, _id: &str, value: &u32, previous: &u32) {
            self.events.lock().push(format!("update {previous}->{value}"));
        }

        fn item_close(&self, _id: &str, value: &u32) {
            self.events.lock().push(format!("close {value}"));
        }
    }

    #[test]
    fn test_watcher_lifecycle() {
        let thread = WatchableThread::new("test-watcher").unwrap();
        let recorder = Arc::new(Recorder::default());

        let t = thread.clone();
        let r = recorder.clone();
        thread
            .execute(move || {
                let cell = Watchable::new(t, "cell", 1u32);
                cell.add_watcher(r);
                cell.update(2);
                cell.update(3);
                cell.close();
                cell.update(4);
                assert_eq!(cell.value(), 3);
            })
            .unwrap();

        assert_eq!(
            *recorder.events.lock(),
            vec!["open 1", "update 1->2", "update 2->3", "close 3"]
        );
    }

    #[test]
    fn test_remove_watcher_closes_it() {
        let thread = WatchableThread::new("test-remove").unwrap();
        let recorder = Arc::new(Recorder::default());

        let t = thread.clone();
        let r = recorder.clone();
        thread
            .execute(move || {
                let cell = Watchable::new(t, "cell", 5u32);
                let id = cell.add_watcher(r);
                cell.remove_watcher(id);
                cell.update(6);
            })
            .unwrap();

        assert_eq!(*recorder.events.lock(), vec!["open 5", "close 5"]);
    }

    #[test]
    fn test_subscribe_sees_updates_and_close() {
        let thread = WatchableThread::new("test-subscribe").unwrap();
        let cell = Arc::new(Watchable::new(thread.clone(), "cell", 10u32));
        let mut receiver = cell.subscribe();

        let c = cell.clone();
        thread.execute(move || c.update(11)).unwrap();
        assert!(receiver.has_changed().unwrap());
        assert_eq!(*receiver.borrow_and_update(), 11);

        let c = cell.clone();
        thread.execute(move || c.close()).unwrap();
        assert!(receiver.has_changed().is_err());
        assert!(cell.is_closed());
    }

    #[test]
    #[should_panic(expected = "must be called on the watchable thread")]
    fn test_update_off_thread_panics() {
        let thread = WatchableThread::new("test-off-thread").unwrap();
        let cell = Watchable::new(thread, "cell", 0u32);
        cell.update(1);
    }
}
