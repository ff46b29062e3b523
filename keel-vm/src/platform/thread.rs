//! Named engine threads.

use std::thread;

/// Handle to a spawned engine thread.
#[derive(Debug)]
pub struct JoinHandle<T> {
    inner: thread::JoinHandle<T>,
}

impl<T> JoinHandle<T> {
    /// Wait for the thread to finish and take its result.
    ///
    /// Panics if the thread itself panicked; guest failures travel as
    /// values, never as panics, so a panic here is an engine bug.
    pub fn join(self) -> T {
        self.inner.join().expect("engine thread panicked")
    }
}

/// Spawn a named thread with a generous stack for guest call depth.
pub fn spawn<T: Send + 'static>(
    name: &str,
    body: impl FnOnce() -> T + Send + 'static,
) -> JoinHandle<T> {
    let inner = thread::Builder::new()
        .name(name.to_string())
        .stack_size(8 * 1024 * 1024)
        .spawn(body)
        .expect("failed to spawn engine thread");
    JoinHandle { inner }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_join_round_trips_the_result() {
        let handle = spawn("keel-test", || 7u32);
        assert_eq!(handle.join(), 7);
    }
}
