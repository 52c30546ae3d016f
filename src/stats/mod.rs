//! Statistics facade over the analytic mirror
//!
//! The summary is cached for a fixed time-to-live. There is no invalidation
//! on reload: a rebuilt mirror shows up once the cached value expires.

pub mod cache;
pub mod summary;

use std::sync::Arc;
use std::time::Duration;

pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use summary::{
    BusinessStats, CompanyStats, DuckDbSource, PartnerStats, Statistics, StatisticsSource,
    query_statistics,
};

use crate::config::PipelineConfig;
use crate::error::Result;

/// Cached read path for aggregate statistics
#[derive(Debug)]
pub struct StatsFacade<S> {
    source: S,
    cache: TtlCache<Statistics>,
}

impl<S: StatisticsSource> StatsFacade<S> {
    #[must_use]
    pub fn new(source: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: TtlCache::new(ttl, clock),
        }
    }

    /// Current statistics, computed at most once per time-to-live
    pub fn statistics(&self) -> Result<Arc<Statistics>> {
        self.cache.get_or_try_insert_with(|| self.source.compute())
    }

    /// Whether a fresh value is cached
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }
}

impl StatsFacade<DuckDbSource> {
    /// Facade over the configured mirror using the wall clock
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            DuckDbSource::new(&config.duckdb_path),
            Duration::from_secs(config.stats_ttl_secs),
            Arc::new(SystemClock),
        )
    }
}
