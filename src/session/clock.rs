use std::time::{Duration, Instant};

/// Time source for read windows and retry pauses
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) use self::manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Inner {
        now: Instant,
        sleeps: Vec<Duration>,
    }

    /// Virtual clock: sleeping advances it instantly and is recorded
    #[derive(Clone)]
    pub(crate) struct ManualClock {
        inner: Arc<Mutex<Inner>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            ManualClock {
                inner: Arc::new(Mutex::new(Inner {
                    now: Instant::now(),
                    sleeps: Vec::new(),
                })),
            }
        }

        pub fn advance(&self, duration: Duration) {
            self.inner.lock().unwrap().now += duration;
        }

        pub fn sleeps(&self) -> Vec<Duration> {
            self.inner.lock().unwrap().sleeps.clone()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.inner.lock().unwrap().now
        }

        fn sleep(&self, duration: Duration) {
            let mut inner = self.inner.lock().unwrap();
            inner.now += duration;
            inner.sleeps.push(duration);
        }
    }
}
