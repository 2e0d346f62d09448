//! Generic keep/add/remove over one sub-resource collection
//!
//! Results are fresh lists; the input snapshot is never edited in place.
//! Retained items keep their order and appended items go last.

use lb_sync_common::{BackendPool, FrontendIpConfig, Probe, Rule};
use tracing::debug;

/// Updated collection plus whether it differs from the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<T> {
    pub items: Vec<T>,
    pub changed: bool,
}

impl<T> Diff<T> {
    pub fn unchanged(items: Vec<T>) -> Self {
        Self {
            items,
            changed: false,
        }
    }

    /// Fold this collection's flag into a resource-level dirty flag
    pub fn merge_changed(&self, dirty: bool) -> bool {
        dirty || self.changed
    }
}

/// Sub-resources identified by name in logs
pub trait Named {
    const KIND: &'static str;

    fn name(&self) -> &str;
}

impl Named for BackendPool {
    const KIND: &'static str = "backend pool";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for FrontendIpConfig {
    const KIND: &'static str = "frontend config";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Probe {
    const KIND: &'static str = "probe";

    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Rule {
    const KIND: &'static str = "rule";

    fn name(&self) -> &str {
        &self.name
    }
}

/// Drop owned items that `keep` rejects; foreign items pass through
pub fn retain_owned<T, O, K>(existing: &[T], owns: O, keep: K) -> Diff<T>
where
    T: Clone + Named,
    O: Fn(&T) -> bool,
    K: Fn(&T) -> bool,
{
    let mut changed = false;
    let mut items = Vec::with_capacity(existing.len());
    for item in existing {
        if !owns(item) {
            items.push(item.clone());
        } else if keep(item) {
            debug!(kind = T::KIND, name = %item.name(), "keeping");
            items.push(item.clone());
        } else {
            debug!(kind = T::KIND, name = %item.name(), "dropping");
            changed = true;
        }
    }

    Diff { items, changed }
}

/// Append expected items with no `same` counterpart in the collection
pub fn append_missing<T, S>(diff: Diff<T>, expected: &[T], same: S) -> Diff<T>
where
    T: Clone + Named,
    S: Fn(&T, &T) -> bool,
{
    let Diff { mut items, mut changed } = diff;
    for wanted in expected {
        if items.iter().any(|item| same(item, wanted)) {
            debug!(kind = T::KIND, name = %wanted.name(), "already exists");
            continue;
        }
        debug!(kind = T::KIND, name = %wanted.name(), "adding");
        items.push(wanted.clone());
        changed = true;
    }
    Diff { items, changed }
}

/// Retention pass against `expected`, then the addition pass
pub fn reconcile_collection<T, O, S>(existing: &[T], expected: &[T], owns: O, same: S) -> Diff<T>
where
    T: Clone + Named,
    O: Fn(&T) -> bool,
    S: Fn(&T, &T) -> bool,
{
    let retained = retain_owned(existing, owns, |item| {
        expected.iter().any(|wanted| same(item, wanted))
    });
    append_missing(retained, expected, same)
}
