use crate::cache::Line;

use super::{min_way, vacant, Replace};

/// Evicts the line with the fewest hits since it was filled.
///
/// Frequency restarts at 1 on every fill, so a freshly filled line is the
/// likeliest victim of the next miss in its set.
#[derive(Debug, Default)]
pub struct Lfu;

impl Replace for Lfu {
    const NAME: &'static str = "lfu";

    fn victim(&self, set: &[Line]) -> usize {
        vacant(set).unwrap_or_else(|| min_way(set, |line| line.frequency))
    }
}
