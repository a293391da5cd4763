use std::sync::{Arc, Mutex, RwLock};

use crossbeam_channel::{Receiver, Sender, TrySendError};

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 8;

/// Latest-value holder owned by one component and read by many.
///
/// `publish` swaps the held `Arc<T>` under a write lock, so readers see
/// either the previous value or the new one, never a mix. Subscribers get
/// each published value over a bounded channel; a subscriber whose channel
/// is full misses that value and the publisher does not wait.
pub struct Observable<T> {
    latest: RwLock<Option<Arc<T>>>,
    subscribers: Mutex<Vec<Sender<Arc<T>>>>,
    capacity: usize,
}

impl<T> Observable<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            latest: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        {
            let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
            *latest = Some(Arc::clone(&value));
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| match tx.try_send(Arc::clone(&value)) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        drop(subscribers);
        value
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Receives every value published after this call.
    pub fn subscribe(&self) -> Receiver<Arc<T>> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    pub fn clear(&self) {
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_is_none_until_published() {
        let obs: Observable<u32> = Observable::new();
        assert!(obs.latest().is_none());
        obs.publish(7);
        assert_eq!(*obs.latest().unwrap(), 7);
    }

    #[test]
    fn test_publish_replaces_previous_value() {
        let obs = Observable::new();
        let first = obs.publish(vec![1, 2, 3]);
        obs.publish(vec![4]);
        assert_eq!(*first, vec![1, 2, 3]);
        assert_eq!(*obs.latest().unwrap(), vec![4]);
    }

    #[test]
    fn test_publish_shares_one_allocation() {
        let obs = Observable::new();
        let rx = obs.subscribe();
        let published = obs.publish(String::from("frame"));
        assert!(Arc::ptr_eq(&published, &obs.latest().unwrap()));
        assert!(Arc::ptr_eq(&published, &rx.try_recv().unwrap()));
    }

    #[test]
    fn test_subscribers_receive_values_in_order() {
        let obs = Observable::new();
        let rx = obs.subscribe();
        obs.publish("a");
        obs.publish("b");
        assert_eq!(*rx.try_recv().unwrap(), "a");
        assert_eq!(*rx.try_recv().unwrap(), "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_subscriber_misses_values_without_blocking() {
        let obs = Observable::with_capacity(2);
        let rx = obs.subscribe();
        for i in 0..5 {
            obs.publish(i);
        }
        let received: Vec<i32> = rx.try_iter().map(|v| *v).collect();
        assert_eq!(received, vec![0, 1]);
        assert_eq!(*obs.latest().unwrap(), 4);
    }

    #[test]
    fn test_dropped_subscribers_are_removed() {
        let obs = Observable::new();
        let rx = obs.subscribe();
        let _kept = obs.subscribe();
        drop(rx);
        obs.publish(1);
        assert_eq!(obs.subscriber_count(), 1);
    }

    #[test]
    fn test_clear_forgets_latest() {
        let obs = Observable::new();
        obs.publish(1);
        obs.clear();
        assert!(obs.latest().is_none());
    }

    #[test]
    fn test_concurrent_readers_see_whole_values() {
        let obs = Arc::new(Observable::new());
        let writer = {
            let obs = Arc::clone(&obs);
            std::thread::spawn(move || {
                for i in 0..200u32 {
                    obs.publish(vec![i; 16]);
                }
            })
        };
        for _ in 0..200 {
            if let Some(v) = obs.latest() {
                assert!(v.iter().all(|x| *x == v[0]));
            }
        }
        writer.join().unwrap();
    }
}
