use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use log::warn;

use btcpulse_market_data::Category;

/// Categories with a refresh currently running.
#[derive(Debug, Default)]
pub struct InFlightSet {
    active: Mutex<HashSet<Category>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_active(&self) -> MutexGuard<'_, HashSet<Category>> {
        self.active.lock().unwrap_or_else(|poisoned| {
            warn!("In-flight set lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Marks `category` as running. Returns `None` if it already is.
    pub fn try_acquire(&self, category: Category) -> Option<InFlightGuard<'_>> {
        if self.lock_active().insert(category) {
            Some(InFlightGuard {
                set: self,
                category,
            })
        } else {
            None
        }
    }

    pub fn contains(&self, category: Category) -> bool {
        self.lock_active().contains(&category)
    }

    pub fn len(&self) -> usize {
        self.lock_active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_active().is_empty()
    }
}

/// RAII guard that clears the category when dropped.
pub struct InFlightGuard<'a> {
    set: &'a InFlightSet,
    category: Category,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock_active().remove(&self.category);
    }
}
