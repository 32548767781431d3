pub mod fifo;
pub mod lfu;
pub mod lru;

use crate::cache::Line;

/// Victim selection for one set of a [`Cache`](crate::cache::Cache).
///
/// Implementations only choose; the cache owns the lines and does the overwrite.
pub trait Replace {
    const NAME: &'static str;

    /// Way to overwrite in `set`. `set` is never empty.
    fn victim(&self, set: &[Line]) -> usize;
}

/// First invalid way of the set, if any.
pub fn vacant(set: &[Line]) -> Option<usize> {
    set.iter().position(|line| !line.valid)
}

/// Way holding the smallest `key`, lowest way winning ties.
pub fn min_way<K: Ord>(set: &[Line], key: impl Fn(&Line) -> K) -> usize {
    set.iter()
        .enumerate()
        .min_by_key(|(_way, line)| key(line))
        .map_or(0, |(way, _line)| way)
}
