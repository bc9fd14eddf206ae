use std::collections::HashSet;
use std::sync::Mutex;

/// Fingerprints of every URL a worker has claimed within one site
///
/// `insert` is an atomic check-and-mark: exactly one caller wins for a
/// given fingerprint, and only the winner may fetch the URL.
#[derive(Debug, Default)]
pub struct VisitedSet {
    fingerprints: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a fingerprint as visited
    ///
    /// # Returns
    ///
    /// * `true` - The fingerprint was not present; the caller owns the URL
    /// * `false` - Another worker already claimed it
    pub fn insert(&self, fingerprint: &str) -> bool {
        let mut set = self
            .fingerprints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        set.insert(fingerprint.to_string())
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.fingerprints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
