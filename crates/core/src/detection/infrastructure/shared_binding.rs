use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::detection::domain::detection::Detection;
use crate::detection::domain::model_binding::{BindingConfig, BindingError, ModelBinding};
use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq)]
pub enum BindingState {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

/// Thread-safe handle around a [`ModelBinding`] that tracks its lifecycle.
///
/// Loading may happen on a background thread while other threads poll
/// [`SharedBinding::state`]; `detect` refuses to run until the binding is
/// `Ready` instead of blocking on the load.
#[derive(Clone)]
pub struct SharedBinding {
    slot: Arc<BindingSlot>,
}

struct BindingSlot {
    state: Mutex<BindingState>,
    changed: Condvar,
    binding: Mutex<Box<dyn ModelBinding>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SharedBinding {
    pub fn new(binding: Box<dyn ModelBinding>) -> Self {
        let initial = if binding.is_ready() {
            BindingState::Ready
        } else {
            BindingState::Uninitialized
        };
        Self {
            slot: Arc::new(BindingSlot {
                state: Mutex::new(initial),
                changed: Condvar::new(),
                binding: Mutex::new(binding),
            }),
        }
    }

    pub fn state(&self) -> BindingState {
        lock(&self.slot.state).clone()
    }

    pub fn is_ready(&self) -> bool {
        *lock(&self.slot.state) == BindingState::Ready
    }

    /// Initializes the binding on the calling thread.
    ///
    /// A second load while one is in progress is rejected; reloading a
    /// `Ready` or `Failed` binding is allowed.
    pub fn load(&self, config: &BindingConfig) -> Result<(), BindingError> {
        {
            let mut state = lock(&self.slot.state);
            if *state == BindingState::Loading {
                return Err(BindingError::Initialization(
                    "model is already loading".into(),
                ));
            }
            *state = BindingState::Loading;
        }
        self.slot.changed.notify_all();

        let result = lock(&self.slot.binding).initialize(config);

        {
            let mut state = lock(&self.slot.state);
            *state = match &result {
                Ok(()) => BindingState::Ready,
                Err(e) => BindingState::Failed(e.to_string()),
            };
        }
        self.slot.changed.notify_all();

        match &result {
            Ok(()) => log::info!("Face detector ready"),
            Err(e) => log::error!("Face detector failed to load: {e}"),
        }
        result
    }

    /// Starts [`SharedBinding::load`] on a background thread.
    pub fn load_in_background(&self, config: BindingConfig) -> thread::JoinHandle<()> {
        let handle = self.clone();
        thread::spawn(move || {
            let _ = handle.load(&config);
        })
    }

    /// Blocks until loading settles (`Ready` or `Failed`) or `timeout` elapses,
    /// returning the state observed last.
    pub fn wait_until_settled(&self, timeout: Duration) -> BindingState {
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.slot.state);
        loop {
            match *state {
                BindingState::Ready | BindingState::Failed(_) => return state.clone(),
                _ => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return state.clone();
            }
            let (next, _) = self
                .slot
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = next;
        }
    }

    pub fn detect(&self, frame: &Frame, timestamp: Duration) -> Result<Vec<Detection>, BindingError> {
        if !self.is_ready() {
            return Err(BindingError::NotInitialized);
        }
        lock(&self.slot.binding).detect(frame, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::BoundingBox;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeBinding {
        ready: bool,
        fail: bool,
        gate: Option<Arc<AtomicBool>>,
    }

    impl FakeBinding {
        fn new() -> Self {
            Self {
                ready: false,
                fail: false,
                gate: None,
            }
        }
    }

    impl ModelBinding for FakeBinding {
        fn initialize(&mut self, _config: &BindingConfig) -> Result<(), BindingError> {
            if let Some(gate) = &self.gate {
                while !gate.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            if self.fail {
                return Err(BindingError::Initialization("no model".into()));
            }
            self.ready = true;
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn detect(
            &mut self,
            _frame: &Frame,
            _timestamp: Duration,
        ) -> Result<Vec<Detection>, BindingError> {
            Ok(vec![Detection::new(
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                0.9,
            )])
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 12], 2, 2, 3, Duration::ZERO)
    }

    #[test]
    fn test_starts_uninitialized_and_refuses_detect() {
        let binding = SharedBinding::new(Box::new(FakeBinding::new()));
        assert_eq!(binding.state(), BindingState::Uninitialized);
        assert_eq!(
            binding.detect(&frame(), Duration::ZERO),
            Err(BindingError::NotInitialized)
        );
    }

    #[test]
    fn test_already_initialized_binding_starts_ready() {
        let inner = FakeBinding {
            ready: true,
            ..FakeBinding::new()
        };
        let binding = SharedBinding::new(Box::new(inner));
        assert!(binding.is_ready());
    }

    #[test]
    fn test_load_transitions_to_ready() {
        let binding = SharedBinding::new(Box::new(FakeBinding::new()));
        binding.load(&BindingConfig::default()).unwrap();
        assert_eq!(binding.state(), BindingState::Ready);
        assert_eq!(binding.detect(&frame(), Duration::ZERO).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_load_is_recorded() {
        let inner = FakeBinding {
            fail: true,
            ..FakeBinding::new()
        };
        let binding = SharedBinding::new(Box::new(inner));
        assert!(binding.load(&BindingConfig::default()).is_err());
        assert!(matches!(binding.state(), BindingState::Failed(msg) if msg.contains("no model")));
        assert!(!binding.is_ready());
    }

    #[test]
    fn test_background_load_reports_loading_then_ready() {
        let gate = Arc::new(AtomicBool::new(false));
        let inner = FakeBinding {
            gate: Some(gate.clone()),
            ..FakeBinding::new()
        };
        let binding = SharedBinding::new(Box::new(inner));
        let handle = binding.load_in_background(BindingConfig::default());

        let deadline = Instant::now() + Duration::from_secs(5);
        while binding.state() != BindingState::Loading && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(binding.state(), BindingState::Loading);
        assert_eq!(
            binding.detect(&frame(), Duration::ZERO),
            Err(BindingError::NotInitialized)
        );

        gate.store(true, Ordering::SeqCst);
        assert_eq!(
            binding.wait_until_settled(Duration::from_secs(5)),
            BindingState::Ready
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_while_uninitialized() {
        let binding = SharedBinding::new(Box::new(FakeBinding::new()));
        assert_eq!(
            binding.wait_until_settled(Duration::from_millis(10)),
            BindingState::Uninitialized
        );
    }
}
