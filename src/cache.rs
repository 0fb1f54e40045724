//! Parse cache
//!
//! Memoizes parsed syntax trees by file identity so repeated rule
//! executions never re-parse unchanged content. Entries carry a content
//! hash; changed content reads as a miss and replaces the entry.

use crate::parser::{ParseError, SourceParser, SyntaxTree};
use once_cell::sync::OnceCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct CacheSlot {
    content_hash: u64,
    cell: Arc<OnceCell<Arc<SyntaxTree>>>,
}

/// Thread-safe cache of parsed trees keyed by file path.
///
/// Unbounded; a one-shot batch run parses each file at most once. Access
/// is synchronized per key, so concurrent first-time requests for the
/// same path collapse into a single parse. Internal lock failures are
/// treated as misses, never surfaced.
#[derive(Default)]
pub struct ParseCache {
    entries: Mutex<HashMap<PathBuf, CacheSlot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ParseCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached tree. Never parses; a miss returns `None`.
    pub fn get(&self, path: &Path) -> Option<Arc<SyntaxTree>> {
        let guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match guard.get(path).and_then(|slot| slot.cell.get()) {
            Some(tree) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(tree))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a parsed tree for a path
    pub fn put(&self, tree: Arc<SyntaxTree>, path: &Path) {
        let content_hash = hash_source(tree.source());
        let cell = Arc::new(OnceCell::new());
        let _ = cell.set(tree);

        if let Ok(mut guard) = self.entries.lock() {
            guard.insert(path.to_path_buf(), CacheSlot { content_hash, cell });
        }
    }

    /// Drop the entry for a path. Subsequent lookups miss until re-cached.
    pub fn invalidate(&self, path: &Path) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.remove(path);
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }

    /// Hit/miss counters
    pub fn statistics(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Return the cached tree for `path` if its content still matches,
    /// otherwise parse exactly once and cache the result.
    ///
    /// Concurrent callers for the same uncached path share one parse: the
    /// slot is reserved under the map lock, the parse itself runs outside
    /// it inside the slot's once-cell.
    pub fn get_or_parse(
        &self,
        path: &Path,
        source: &str,
        parser: &dyn SourceParser,
    ) -> Result<Arc<SyntaxTree>, ParseError> {
        let content_hash = hash_source(source);

        let cell = {
            let mut guard = match self.entries.lock() {
                Ok(guard) => guard,
                // Degraded cache is a miss, not a failure.
                Err(_) => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return parser.parse(source).map(Arc::new);
                }
            };

            match guard.get(path) {
                Some(slot) if slot.content_hash == content_hash => {
                    if slot.cell.get().is_some() {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.misses.fetch_add(1, Ordering::Relaxed);
                    }
                    Arc::clone(&slot.cell)
                }
                _ => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    let cell = Arc::new(OnceCell::new());
                    guard.insert(
                        path.to_path_buf(),
                        CacheSlot {
                            content_hash,
                            cell: Arc::clone(&cell),
                        },
                    );
                    cell
                }
            }
        };

        cell.get_or_try_init(|| parser.parse(source).map(Arc::new))
            .cloned()
    }
}

/// Hash source content for staleness detection
fn hash_source(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}
