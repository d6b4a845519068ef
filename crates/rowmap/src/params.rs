//! Placeholder rewriting: `:name` parameters to driver-specific styles.
//!
//! Rewriting is a pure function of the SQL text and target style; results
//! are memoized in a bounded global LRU cache. Correctness never depends
//! on the cache being present.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{
    Arc, Mutex, OnceLock,
    atomic::{AtomicUsize, Ordering},
};

const CACHE_CAPACITY: usize = 256;

///
/// ParamStyle
///
/// Placeholder style expected by a driver.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParamStyle {
    /// `:name` — passed through untouched.
    Named,
    /// `?` — one slot per occurrence, bound in occurrence order.
    Question,
    /// `$1`, `$2`, … — one number per distinct name, first-seen order.
    Numbered,
}

///
/// Rewritten
///
/// Rewriting output: the converted SQL plus the placeholder binding
/// order. For `Named` the SQL is unchanged and `order` is empty; for
/// `Question` the order repeats a name per occurrence; for `Numbered` it
/// lists distinct names by their assigned number.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rewritten {
    pub sql: String,
    pub order: Vec<String>,
}

///
/// CacheStats
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub size: usize,
}

static CACHE: OnceLock<Mutex<LruCache<(ParamStyle, String), Arc<Rewritten>>>> = OnceLock::new();
static HITS: AtomicUsize = AtomicUsize::new(0);
static MISSES: AtomicUsize = AtomicUsize::new(0);

fn cache() -> &'static Mutex<LruCache<(ParamStyle, String), Arc<Rewritten>>> {
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(CACHE_CAPACITY).expect("non-zero cache capacity"),
        ))
    })
}

/// Rewrite `sql` to the target style, memoized.
pub fn rewrite(sql: &str, style: ParamStyle) -> Arc<Rewritten> {
    if style == ParamStyle::Named {
        // Fast path: no conversion, no cache churn.
        return Arc::new(Rewritten {
            sql: sql.to_string(),
            order: Vec::new(),
        });
    }

    let key = (style, sql.to_string());
    if let Some(hit) = cache().lock().expect("rewrite cache lock poisoned").get(&key) {
        HITS.fetch_add(1, Ordering::Relaxed);
        return Arc::clone(hit);
    }

    MISSES.fetch_add(1, Ordering::Relaxed);
    let rewritten = Arc::new(rewrite_uncached(sql, style));
    cache()
        .lock()
        .expect("rewrite cache lock poisoned")
        .put(key, Arc::clone(&rewritten));
    rewritten
}

#[must_use]
pub fn cache_stats() -> CacheStats {
    CacheStats {
        hits: HITS.load(Ordering::Relaxed),
        misses: MISSES.load(Ordering::Relaxed),
        size: cache().lock().expect("rewrite cache lock poisoned").len(),
    }
}

/// Rewrite without touching the global cache.
///
/// A `:name` placeholder is a colon not preceded by `:` (PostgreSQL
/// `::typecast`) or a word character (mid-word colons), followed by an
/// identifier. Single-quoted string literals (with `''` escapes) are
/// passed through verbatim.
#[must_use]
pub fn rewrite_uncached(sql: &str, style: ParamStyle) -> Rewritten {
    if style == ParamStyle::Named {
        return Rewritten {
            sql: sql.to_string(),
            order: Vec::new(),
        };
    }

    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut order: Vec<String> = Vec::new();
    let mut numbered: Vec<String> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        // String literal: copy verbatim through the closing quote,
        // treating '' as an escaped quote.
        if bytes[i] == b'\'' {
            let start = i;
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'\'' {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            out.push_str(&sql[start..i]);
            continue;
        }

        if bytes[i] == b':' {
            let prev_blocks = i > 0 && (bytes[i - 1] == b':' || is_word_byte(bytes[i - 1]));
            let starts_ident = i + 1 < bytes.len()
                && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_');

            if !prev_blocks && starts_ident {
                let mut end = i + 1;
                while end < bytes.len() && is_word_byte(bytes[end]) {
                    end += 1;
                }
                let name = &sql[i + 1..end];
                match style {
                    ParamStyle::Named => unreachable!("handled by fast path"),
                    ParamStyle::Question => {
                        out.push('?');
                        order.push(name.to_string());
                    }
                    ParamStyle::Numbered => {
                        let number = numbered
                            .iter()
                            .position(|seen| seen == name)
                            .unwrap_or_else(|| {
                                numbered.push(name.to_string());
                                numbered.len() - 1
                            });
                        out.push('$');
                        out.push_str(&(number + 1).to_string());
                    }
                }
                i = end;
                continue;
            }
        }

        // Advance one full character (the SQL may contain multi-byte text).
        let ch_len = sql[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&sql[i..i + ch_len]);
        i += ch_len;
    }

    if style == ParamStyle::Numbered {
        order = numbered;
    }

    Rewritten { sql: out, order }
}

const fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

///
/// TESTS
///
