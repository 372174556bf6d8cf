use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::gate::Gate;

/// How clearing a checkpoint affects the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckpointPolicy {
    /// Loading stays active while any checkpoint is outstanding.
    #[default]
    Counted,
    /// Every clear stops loading, even if other checkpoints remain.
    Unconditional,
}

/// Named reasons for the loading indicator to be showing.
///
/// The registry lock is held across the gate transition so the flag always
/// reflects the set as of the last completed call (lock order: registry, then
/// gate).
#[derive(Debug)]
pub struct CheckpointRegistry {
    policy: CheckpointPolicy,
    entries: Mutex<BTreeMap<String, Instant>>,
}

impl CheckpointRegistry {
    pub fn new(policy: CheckpointPolicy) -> Self {
        Self {
            policy,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn policy(&self) -> CheckpointPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Instant>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `label` and starts loading.
    pub fn set(&self, label: &str, gate: &Gate) {
        let mut entries = self.lock();
        let fresh = !entries.contains_key(label);
        entries
            .entry(label.to_owned())
            .or_insert_with(Instant::now);
        gate.start();
        tracing::debug!(
            label,
            fresh,
            outstanding = entries.len(),
            "checkpoint set"
        );
    }

    /// Removes `label` and updates the gate according to the policy.
    ///
    /// Returns whether the label was outstanding.
    pub fn clear(&self, label: &str, gate: &Gate) -> bool {
        let mut entries = self.lock();
        let removed = entries.remove(label);
        match self.policy {
            CheckpointPolicy::Unconditional => gate.stop(),
            CheckpointPolicy::Counted => gate.set_active(!entries.is_empty()),
        }
        match removed {
            Some(since) => tracing::debug!(
                label,
                elapsed_ms = since.elapsed().as_millis() as u64,
                outstanding = entries.len(),
                "checkpoint cleared"
            ),
            None => tracing::debug!(
                label,
                outstanding = entries.len(),
                "cleared checkpoint that was not set"
            ),
        }
        removed.is_some()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.lock().contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Outstanding labels in sorted order.
    pub fn labels(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

impl Default for CheckpointRegistry {
    fn default() -> Self {
        Self::new(CheckpointPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_then_clear_toggles_gate() {
        let gate = Gate::new();
        let registry = CheckpointRegistry::default();
        registry.set("x", &gate);
        assert!(gate.is_active());
        assert!(registry.contains("x"));
        assert!(registry.clear("x", &gate));
        assert!(!gate.is_active());
        assert!(registry.is_empty());
    }

    #[test]
    fn unconditional_clear_stops_with_labels_outstanding() {
        let gate = Gate::new();
        let registry = CheckpointRegistry::new(CheckpointPolicy::Unconditional);
        registry.set("a", &gate);
        registry.set("b", &gate);
        registry.clear("a", &gate);
        assert!(!gate.is_active());
        assert_eq!(registry.labels(), vec!["b".to_string()]);
    }

    #[test]
    fn counted_clear_waits_for_last_label() {
        let gate = Gate::new();
        let registry = CheckpointRegistry::new(CheckpointPolicy::Counted);
        registry.set("a", &gate);
        registry.set("b", &gate);
        registry.clear("a", &gate);
        assert!(gate.is_active());
        registry.clear("b", &gate);
        assert!(!gate.is_active());
    }

    #[test]
    fn repeated_set_is_a_single_entry() {
        let gate = Gate::new();
        let registry = CheckpointRegistry::new(CheckpointPolicy::Counted);
        registry.set("a", &gate);
        registry.set("a", &gate);
        assert_eq!(registry.len(), 1);
        registry.clear("a", &gate);
        assert!(!gate.is_active());
    }

    #[test]
    fn clearing_unknown_label_reports_false() {
        let gate = Gate::new();
        let registry = CheckpointRegistry::new(CheckpointPolicy::Counted);
        registry.set("a", &gate);
        assert!(!registry.clear("zzz", &gate));
        assert!(gate.is_active());

        let unconditional = CheckpointRegistry::new(CheckpointPolicy::Unconditional);
        unconditional.set("a", &gate);
        assert!(!unconditional.clear("zzz", &gate));
        assert!(!gate.is_active());
    }

    #[test]
    fn concurrent_counted_checkpoints_settle_inactive() {
        let gate = Arc::new(Gate::new());
        let registry = Arc::new(CheckpointRegistry::new(CheckpointPolicy::Counted));
        let workers: Vec<_> = (0..6)
            .map(|index| {
                let gate = Arc::clone(&gate);
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let label = format!("task-{index}");
                    for _ in 0..100 {
                        registry.set(&label, &gate);
                        assert!(gate.is_active());
                        registry.clear(&label, &gate);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(registry.is_empty());
        assert!(!gate.is_active());
    }
}
