use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use filetracker_model::ChangeType;

/// Prune once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// Collapses repeated notifications for the same `(change type, path)`.
///
/// A key is a duplicate while less than `window` has passed since it was
/// last applied. A zero window disables debouncing. State lives only as long
/// as the watcher that owns it.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_applied: HashMap<(ChangeType, PathBuf), Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_applied: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_duplicate(&self, change: ChangeType, path: &Path, now: Instant) -> bool {
        if self.window.is_zero() {
            return false;
        }
        self.last_applied
            .get(&(change, path.to_path_buf()))
            .is_some_and(|applied| now.saturating_duration_since(*applied) < self.window)
    }

    pub fn mark_applied(&mut self, change: ChangeType, path: &Path, now: Instant) {
        if self.window.is_zero() {
            return;
        }
        if self.last_applied.len() >= PRUNE_THRESHOLD {
            self.prune(now);
        }
        self.last_applied.insert((change, path.to_path_buf()), now);
    }

    /// Forget keys whose window has already elapsed.
    pub fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last_applied
            .retain(|_, applied| now.saturating_duration_since(*applied) < window);
    }

    pub fn len(&self) -> usize {
        self.last_applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_applied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_within_window_is_duplicate() {
        let mut debouncer = Debouncer::new(Duration::from_secs(15));
        let path = Path::new("/d/a.txt");
        let t0 = Instant::now();

        assert!(!debouncer.is_duplicate(ChangeType::Created, path, t0));
        debouncer.mark_applied(ChangeType::Created, path, t0);
        assert!(debouncer.is_duplicate(ChangeType::Created, path, t0 + Duration::from_secs(3)));
        assert!(!debouncer.is_duplicate(ChangeType::Created, path, t0 + Duration::from_secs(15)));
    }

    #[test]
    fn different_change_types_are_independent() {
        let mut debouncer = Debouncer::new(Duration::from_secs(15));
        let path = Path::new("/d/a.txt");
        let t0 = Instant::now();
        debouncer.mark_applied(ChangeType::Created, path, t0);
        assert!(!debouncer.is_duplicate(ChangeType::Modified, path, t0));
        assert!(!debouncer.is_duplicate(ChangeType::Created, Path::new("/d/b.txt"), t0));
    }

    #[test]
    fn zero_window_never_debounces() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        let path = Path::new("/d/a.txt");
        let t0 = Instant::now();
        debouncer.mark_applied(ChangeType::Modified, path, t0);
        assert!(!debouncer.is_duplicate(ChangeType::Modified, path, t0));
        assert!(debouncer.is_empty());
    }

    #[test]
    fn prune_drops_expired_keys() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        let t0 = Instant::now();
        debouncer.mark_applied(ChangeType::Created, Path::new("/d/a.txt"), t0);
        debouncer.mark_applied(
            ChangeType::Created,
            Path::new("/d/b.txt"),
            t0 + Duration::from_millis(900),
        );
        debouncer.prune(t0 + Duration::from_millis(1500));
        assert_eq!(debouncer.len(), 1);
    }
}
