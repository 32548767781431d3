use crate::cache::Line;

use super::{min_way, vacant, Replace};

/// Evicts the line that was filled earliest, ignoring later hits.
#[derive(Debug, Default)]
pub struct Fifo;

impl Replace for Fifo {
    const NAME: &'static str = "fifo";

    fn victim(&self, set: &[Line]) -> usize {
        vacant(set).unwrap_or_else(|| min_way(set, |line| line.arrival))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(arrival: u64, last_used: u64) -> Line {
        Line {
            valid: true,
            tag: arrival,
            arrival,
            last_used,
            frequency: 1,
        }
    }

    #[test]
    fn prefers_vacant_way() {
        let set = [line(1, 9), Line::default(), line(2, 2)];
        assert_eq!(Fifo.victim(&set), 1);
    }

    #[test]
    fn ignores_recency() {
        let set = [line(4, 4), line(2, 10), line(3, 3)];
        assert_eq!(Fifo.victim(&set), 1);
    }
}
