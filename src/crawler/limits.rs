use crate::catalog::{CatalogType, ItemType};

/// A count limit that may be unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    Unlimited,
    AtMost(u64),
}

impl Limit {
    /// Converts a configured value where -1 (or any negative) means unlimited
    pub fn from_config(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::AtMost(value as u64)
        }
    }

    /// Converts back to the configured form
    pub fn as_config(&self) -> i64 {
        match self {
            Self::Unlimited => -1,
            Self::AtMost(n) => *n as i64,
        }
    }

    /// Checks if `count` has reached the limit
    pub fn is_reached(&self, count: u64) -> bool {
        match self {
            Self::Unlimited => false,
            Self::AtMost(n) => count >= *n,
        }
    }

    /// Returns how many more are allowed, or None when unlimited
    pub fn remaining(&self, count: u64) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::AtMost(n) => Some(n.saturating_sub(count)),
        }
    }
}

/// Limits for one run
///
/// The default is unlimited everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunLimits {
    pub movies_global: Limit,
    pub series_global: Limit,
    pub movies_per_catalog: Limit,
    pub series_per_catalog: Limit,
    pub items_per_mixed_catalog: Limit,
}

impl RunLimits {
    /// The per-catalog success limit for a catalog of the given type
    pub fn per_catalog(&self, catalog_type: CatalogType) -> Limit {
        match catalog_type {
            CatalogType::Movie => self.movies_per_catalog,
            CatalogType::Series => self.series_per_catalog,
            CatalogType::Mixed => self.items_per_mixed_catalog,
        }
    }
}

/// Tracks run-wide successes against the global limits
///
/// Counts only ever grow, so once a global limit is reached it stays exhausted
/// for every remaining catalog of the run.
#[derive(Debug, Clone)]
pub struct LimitTracker {
    limits: RunLimits,
    movies: u64,
    series: u64,
}

impl LimitTracker {
    pub fn new(limits: RunLimits) -> Self {
        Self {
            limits,
            movies: 0,
            series: 0,
        }
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    fn global_for(&self, item_type: ItemType) -> (Limit, u64) {
        match item_type {
            ItemType::Movie => (self.limits.movies_global, self.movies),
            ItemType::Series => (self.limits.series_global, self.series),
            ItemType::Episode => (Limit::Unlimited, 0),
        }
    }

    /// Whether another item of this type may be dispatched
    pub fn item_allowed(&self, item_type: ItemType) -> bool {
        let (limit, count) = self.global_for(item_type);
        !limit.is_reached(count)
    }

    /// Whether nothing more can be prefetched from a catalog of this type
    ///
    /// A mixed catalog is exhausted only once both global limits are reached.
    pub fn catalog_exhausted(&self, catalog_type: CatalogType) -> bool {
        let movies_done = self.limits.movies_global.is_reached(self.movies);
        let series_done = self.limits.series_global.is_reached(self.series);
        match catalog_type {
            CatalogType::Movie => movies_done,
            CatalogType::Series => series_done,
            CatalogType::Mixed => movies_done && series_done,
        }
    }

    /// Counts one successful item against its global limit
    pub fn record_success(&mut self, item_type: ItemType) {
        match item_type {
            ItemType::Movie => self.movies += 1,
            ItemType::Series => self.series += 1,
            ItemType::Episode => {}
        }
    }
}

/// Per-catalog success counter
#[derive(Debug, Clone, Copy)]
pub struct CatalogQuota {
    limit: Limit,
    successes: u64,
}

impl CatalogQuota {
    pub fn new(limit: Limit) -> Self {
        Self {
            limit,
            successes: 0,
        }
    }

    pub fn is_reached(&self) -> bool {
        self.limit.is_reached(self.successes)
    }

    pub fn record_success(&mut self) {
        self.successes += 1;
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn limit(&self) -> Limit {
        self.limit
    }
}
