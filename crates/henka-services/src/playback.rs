//! Completion handles for scheduled playback

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};

/// Settles when the scheduled audio has finished or the engine cancels it.
///
/// The engine keeps the matching [`PlaybackGuard`]; dropping the guard settles
/// every clone of the handle at once.
#[derive(Debug, Clone)]
pub struct Playback {
    cancelled: Receiver<()>,
    deadline: Instant,
}

/// Engine-side half of a pending [`Playback`]
#[derive(Debug)]
pub struct PlaybackGuard {
    _cancel: Sender<()>,
    deadline: Instant,
}

impl PlaybackGuard {
    pub fn is_finished(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl Playback {
    /// Handle that settles after `duration` unless the guard is dropped first.
    ///
    /// A duration past what [`Instant`] can represent settles immediately.
    pub fn pending(duration: Duration) -> (Self, PlaybackGuard) {
        let (tx, rx) = bounded(0);
        let now = Instant::now();
        let deadline = now.checked_add(duration).unwrap_or(now);
        (
            Self {
                cancelled: rx,
                deadline,
            },
            PlaybackGuard {
                _cancel: tx,
                deadline,
            },
        )
    }

    /// Handle for a call that scheduled nothing
    pub fn settled() -> Self {
        let (_, rx) = bounded::<()>(0);
        Self {
            cancelled: rx,
            deadline: Instant::now(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_settled(&self) -> bool {
        Instant::now() >= self.deadline
            || matches!(self.cancelled.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Block until the playback finishes or is cancelled
    pub fn wait(&self) {
        if self.is_settled() {
            return;
        }
        select! {
            recv(self.cancelled) -> _ => {}
            recv(crossbeam_channel::at(self.deadline)) -> _ => {}
        }
    }

    /// Like [`Playback::wait`] with an upper bound. Returns whether it settled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_settled() {
            return true;
        }
        select! {
            recv(self.cancelled) -> _ => true,
            recv(crossbeam_channel::at(self.deadline)) -> _ => true,
            default(timeout) => self.is_settled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_settled_handle() {
        let playback = Playback::settled();
        assert!(playback.is_settled());
        playback.wait();
        assert!(playback.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_deadline_settles() {
        let (playback, _guard) = Playback::pending(Duration::from_millis(20));
        assert!(!playback.is_settled());
        assert!(playback.wait_timeout(Duration::from_secs(2)));
        assert!(playback.is_settled());
    }

    #[test]
    fn test_dropping_guard_cancels() {
        let (playback, guard) = Playback::pending(Duration::from_secs(60));
        let waiter = {
            let playback = playback.clone();
            thread::spawn(move || {
                let started = Instant::now();
                playback.wait();
                started.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(20));
        drop(guard);

        let waited = waiter.join().unwrap();
        assert!(waited < Duration::from_secs(5));
        assert!(playback.is_settled());
    }

    #[test]
    fn test_timeout_without_settling() {
        let (playback, guard) = Playback::pending(Duration::from_secs(60));
        assert!(!playback.wait_timeout(Duration::from_millis(10)));
        assert!(!guard.is_finished());
    }

    #[test]
    fn test_unrepresentable_deadline_settles() {
        let (playback, _guard) = Playback::pending(Duration::MAX);
        assert!(playback.is_settled());
    }
}
