use lru::LruCache;
use std::num::NonZeroUsize;

use crate::core::fetch::RowWindow;
use crate::core::query_builder::WindowRequest;

/// LRU cache of fetched windows keyed by the exact request.
///
/// Lookups hand out clones, so a window the renderer holds can never be
/// evicted out from under it.
#[derive(Debug)]
pub struct WindowCache {
    windows: LruCache<WindowRequest, RowWindow>,
    hits: u64,
    misses: u64,
}

impl WindowCache {
    /// Create a cache holding at most `capacity` windows (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            windows: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Get a copy of a cached window, marking it most recently used
    pub fn get(&mut self, request: &WindowRequest) -> Option<RowWindow> {
        match self.windows.get(request) {
            Some(window) => {
                self.hits += 1;
                Some(window.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, request: WindowRequest, window: RowWindow) {
        self.windows.put(request, window);
    }

    pub fn contains(&self, request: &WindowRequest) -> bool {
        self.windows.contains(request)
    }

    /// Drop every window of `table`; other tables keep theirs.
    pub fn invalidate_table(&mut self, table: &str) -> usize {
        let stale: Vec<WindowRequest> = self
            .windows
            .iter()
            .filter(|(request, _)| request.table == table)
            .map(|(request, _)| request.clone())
            .collect();
        for request in &stale {
            self.windows.pop(request);
        }
        stale.len()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.windows.clear();
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.windows.len(),
            capacity: self.windows.cap().get(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(table: &str, offset: u64) -> (WindowRequest, RowWindow) {
        let request = WindowRequest::new(table, offset, 10);
        let window = RowWindow {
            table: table.to_string(),
            columns: vec!["id".to_string()],
            rows: Vec::new(),
            offset,
            generation: 0,
            has_more: false,
        };
        (request, window)
    }

    #[test]
    fn test_cache_basic() {
        let mut cache = WindowCache::new(4);
        let (request, win) = window("users", 0);

        assert!(cache.get(&request).is_none());
        cache.put(request.clone(), win.clone());
        assert_eq!(cache.get(&request), Some(win));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 4);
    }

    #[test]
    fn test_cache_lru_eviction() {
        for capacity in [2usize, 3] {
            let mut cache = WindowCache::new(capacity);
            let windows: Vec<_> = (0..=capacity as u64).map(|i| window("t", i * 10)).collect();
            for (request, win) in windows.iter().cloned() {
                cache.put(request, win);
            }

            // the oldest window was evicted, the rest remain
            assert!(!cache.contains(&windows[0].0));
            for (request, _) in &windows[1..] {
                assert!(cache.contains(request));
            }
            assert_eq!(cache.len(), capacity);
        }
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = WindowCache::new(2);
        let (a, wa) = window("t", 0);
        let (b, wb) = window("t", 10);
        let (c, wc) = window("t", 20);

        cache.put(a.clone(), wa);
        cache.put(b.clone(), wb);
        assert!(cache.get(&a).is_some());
        cache.put(c.clone(), wc);

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
    }

    #[test]
    fn test_invalidate_table_only_touches_that_table() {
        let mut cache = WindowCache::new(8);
        for (request, win) in [window("users", 0), window("users", 10), window("posts", 0)] {
            cache.put(request, win);
        }

        assert_eq!(cache.invalidate_table("users"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&WindowRequest::new("posts", 0, 10)));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = WindowCache::new(0);
        assert_eq!(cache.stats().capacity, 1);
    }
}
