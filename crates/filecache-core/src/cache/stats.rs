//! Cache statistics

/// Counters accumulated over the lifetime of a cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub evicted_bytes: u64,
    /// Reads too large to cache, served straight from storage
    pub pass_throughs: u64,
    pub storage_errors: u64,
}

impl CacheStats {
    /// Hit rate as a fraction in [0.0, 1.0]; 0.0 before any read
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_reads();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn total_reads(&self) -> u64 {
        self.hits + self.misses
    }
}
