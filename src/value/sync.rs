//! Wait groups and mutexes exposed to programs.
//!
//! Programs call `lock` and `unlock` as separate operations, so the mutex is
//! a flag guarded by a condition variable rather than a held guard.

use std::sync::{Condvar, Mutex, PoisonError};

use crate::error::{Error, Result};

#[derive(Default)]
pub struct WaitGroup {
    count: Mutex<i64>,
    zero: Condvar,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, delta: i64) -> Result<()> {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *count + delta < 0 {
            return Err(Error::native("negative wait group counter"));
        }
        *count += delta;
        if *count == 0 {
            self.zero.notify_all();
        }
        Ok(())
    }

    pub fn done(&self) -> Result<()> {
        self.add(-1)
    }

    /// Block until the counter drops to zero.
    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .zero
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn count(&self) -> i64 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
pub struct MutexValue {
    locked: Mutex<bool>,
    released: Condvar,
}

impl MutexValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        while *locked {
            locked = self
                .released
                .wait(locked)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *locked = true;
    }

    pub fn unlock(&self) -> Result<()> {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        if !*locked {
            return Err(Error::native("unlock of unlocked mutex"));
        }
        *locked = false;
        self.released.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_group_joins_threads() {
        let wg = Arc::new(WaitGroup::new());
        let total = Arc::new(Mutex::new(0));
        for i in 0..4 {
            wg.add(1).unwrap();
            let (wg, total) = (Arc::clone(&wg), Arc::clone(&total));
            thread::spawn(move || {
                *total.lock().unwrap() += i;
                wg.done().unwrap();
            });
        }
        wg.wait();
        assert_eq!(*total.lock().unwrap(), 6);
        assert_eq!(wg.count(), 0);
    }

    #[test]
    fn test_negative_counter_fails() {
        assert!(WaitGroup::new().done().is_err());
    }

    #[test]
    fn test_mutex_excludes() {
        let mu = Arc::new(MutexValue::new());
        let counter = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (mu, counter) = (Arc::clone(&mu), Arc::clone(&counter));
                thread::spawn(move || {
                    for _ in 0..100 {
                        mu.lock();
                        *counter.lock().unwrap() += 1;
                        mu.unlock().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*counter.lock().unwrap(), 400);
        assert!(mu.unlock().is_err());
    }
}
