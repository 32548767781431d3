use crate::cache::Line;

use super::{min_way, vacant, Replace};

#[derive(Debug, Default)]
pub struct Lru;

impl Replace for Lru {
    const NAME: &'static str = "lru";

    fn victim(&self, set: &[Line]) -> usize {
        vacant(set).unwrap_or_else(|| min_way(set, |line| line.last_used))
    }
}
