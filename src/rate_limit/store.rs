//! Fixed-window admission counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::RateLimitConfig;

/// Counter state for one partition. The window only moves forward.
#[derive(Debug, Clone, Copy)]
struct Window {
    window_start: Instant,
    count: u32,
}

/// Admission decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Admitted, with the number of admissions left in the current window.
    Admitted { remaining: u32 },
    /// Rejected; the window rolls forward after `retry_after`.
    Rejected { retry_after: Duration },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admitted { .. })
    }
}

/// Concurrent fixed-window counters, one partition per key.
///
/// The map shards keep distinct partitions from contending; the per-entry
/// mutex makes the check-reset-increment sequence atomic for one key.
/// There is no global lock and nothing here blocks beyond those two
/// fine-grained guards.
pub struct PartitionStore {
    partitions: DashMap<String, Arc<Mutex<Window>>>,
    limit: u32,
    window: Duration,
    max_partitions: usize,
    sweep_batch_size: usize,
}

impl PartitionStore {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            partitions: DashMap::new(),
            limit: config.limit,
            window: config.window(),
            max_partitions: config.max_partitions,
            sweep_batch_size: config.sweep_batch_size.max(1),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of partitions currently tracked.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Admit or reject one request against `key`'s window at time `now`.
    ///
    /// The partition is created on first sight with an empty window
    /// starting at `now`. An elapsed window rolls forward to `now` rather
    /// than to a fixed grid, so a burst never straddles two half-windows.
    pub fn try_acquire(&self, key: &str, now: Instant) -> Verdict {
        let entry = match self.partitions.get(key) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                self.evict_if_full();
                Arc::clone(
                    self.partitions
                        .entry(key.to_string())
                        .or_insert_with(|| {
                            Arc::new(Mutex::new(Window {
                                window_start: now,
                                count: 0,
                            }))
                        })
                        .value(),
                )
            }
        };

        let mut window = entry.lock();

        if now.duration_since(window.window_start) >= self.window {
            window.window_start = now;
            window.count = 0;
        }

        if window.count < self.limit {
            window.count += 1;
            Verdict::Admitted {
                remaining: self.limit - window.count,
            }
        } else {
            let elapsed = now.duration_since(window.window_start);
            Verdict::Rejected {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }

    /// Make room before inserting a new partition into a full table.
    ///
    /// Expired windows go first: dropping one is indistinguishable from
    /// its lazy reset. If the table is still full, the oldest windows are
    /// dropped in a batch, and only then can an active partition lose its
    /// count early.
    fn evict_if_full(&self) {
        if self.partitions.len() < self.max_partitions {
            return;
        }

        let now = Instant::now();
        let window = self.window;
        self.partitions
            .retain(|_, entry| now.duration_since(entry.lock().window_start) < window);

        let current_len = self.partitions.len();
        if current_len < self.max_partitions {
            return;
        }

        let target = self.max_partitions.saturating_sub(self.sweep_batch_size);
        let to_evict = current_len.saturating_sub(target);

        let mut entries: Vec<(String, Instant)> = self
            .partitions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().lock().window_start))
            .collect();
        entries.sort_by_key(|(_, window_start)| *window_start);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.partitions.remove(&key);
        }
    }
}
