use std::iter;

use log::trace;
use serde::Serialize;

use crate::{
    error::{Result, SimError},
    replace::Replace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub offset: u64,
    pub set: usize,
    pub tag: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub policy: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub miss_rate: f64,
    pub hit_latency: u64,
}

#[derive(Debug)]
pub struct Cache<R: Replace> {
    name: String,
    lines: Vec<Line>,
    block_size: u64,
    n_ways: usize,
    n_sets: usize,
    hit_latency: u64,
    clock: u64,
    repl: R,
    hits: u64,
    misses: u64,
}

impl<R: Replace> Cache<R> {
    /// Builds an empty cache of `capacity` bytes split into `block_size` blocks
    /// and `n_ways`-way sets.
    ///
    /// Sizes need not be powers of two, but they must divide exactly and leave
    /// at least one set.
    pub fn new(
        name: String,
        capacity: u64,
        block_size: u64,
        n_ways: usize,
        hit_latency: u64,
        repl: R,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(SimError::config(format!("{name}: block size must be non-zero")));
        }
        if n_ways == 0 {
            return Err(SimError::config(format!("{name}: associativity must be non-zero")));
        }
        if capacity % block_size != 0 {
            return Err(SimError::config(format!(
                "{name}: capacity {capacity} is not a multiple of the {block_size} byte block"
            )));
        }
        let n_blocks = capacity / block_size;
        if n_blocks % n_ways as u64 != 0 {
            return Err(SimError::config(format!(
                "{name}: {n_blocks} blocks do not split evenly into {n_ways}-way sets"
            )));
        }
        let n_sets = usize::try_from(n_blocks / n_ways as u64)
            .map_err(|_| SimError::config(format!("{name}: too many sets")))?;
        if n_sets == 0 {
            return Err(SimError::config(format!(
                "{name}: capacity {capacity} holds no complete set"
            )));
        }

        Ok(Cache {
            name,
            lines: iter::repeat_with(Line::default)
                .take(n_sets * n_ways)
                .collect(),
            block_size,
            n_ways,
            n_sets,
            hit_latency,
            clock: 0,
            repl,
            hits: 0,
            misses: 0,
        })
    }

    pub fn n_sets(&self) -> usize {
        self.n_sets
    }

    pub fn n_ways(&self) -> usize {
        self.n_ways
    }

    /// The lines of one set, in way order.
    ///
    /// # Panics
    ///
    /// Panics if `set` is not below [`n_sets`](Self::n_sets).
    pub fn set(&self, set: usize) -> &[Line] {
        &self.lines[set * self.n_ways..(set + 1) * self.n_ways]
    }
}

/// Object-safe face of a cache level, so levels with different policies can
/// sit in one hierarchy.
pub trait IsCache {
    /// Looks `addr` up, filling it on a miss. Returns whether it hit.
    fn access(&mut self, addr: u64) -> bool;
    /// Whether `addr` is resident, without touching any state.
    fn contains(&self, addr: u64) -> bool;
    fn split_addr(&self, addr: u64) -> Addr;
    fn name(&self) -> &str;
    fn hits(&self) -> u64;
    fn misses(&self) -> u64;
    fn hit_latency(&self) -> u64;
    fn clear_stats(&mut self);
    fn make_stats(&self) -> CacheStats;
}

impl<R: Replace> IsCache for Cache<R> {
    fn access(&mut self, addr: u64) -> bool {
        self.clock += 1;
        let clock = self.clock;
        let addr = self.split_addr(addr);

        let base = addr.set * self.n_ways;
        let hit = self.lines[base..base + self.n_ways]
            .iter_mut()
            .enumerate()
            .find(|(_way, line)| line.valid && line.tag == addr.tag);

        if let Some((way, line)) = hit {
            line.read(clock);
            self.hits += 1;
            trace!("{}: hit set {} way {}", self.name, addr.set, way);
            return true;
        }

        let way = self.repl.victim(self.set(addr.set));
        let victim = &mut self.lines[base + way];
        if victim.valid {
            trace!(
                "{}: set {} evicts tag {:#x} from way {}",
                self.name,
                addr.set,
                victim.tag,
                way
            );
        }
        victim.fill(addr.tag, clock);
        self.misses += 1;
        false
    }

    fn contains(&self, addr: u64) -> bool {
        let addr = self.split_addr(addr);
        self.set(addr.set)
            .iter()
            .any(|line| line.valid && line.tag == addr.tag)
    }

    fn split_addr(&self, addr: u64) -> Addr {
        let block = addr / self.block_size;
        let n_sets = self.n_sets as u64;
        Addr {
            offset: addr % self.block_size,
            // The remainder is below n_sets, which came from a usize.
            set: (block % n_sets) as usize,
            tag: block / n_sets,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn hits(&self) -> u64 {
        self.hits
    }

    fn misses(&self) -> u64 {
        self.misses
    }

    fn hit_latency(&self) -> u64 {
        self.hit_latency
    }

    fn clear_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    fn make_stats(&self) -> CacheStats {
        let total_access = self.hits + self.misses;
        let miss_rate = if total_access == 0 {
            0.0
        } else {
            self.misses as f64 / total_access as f64
        };

        CacheStats {
            name: self.name.clone(),
            policy: R::NAME,
            hits: self.hits,
            misses: self.misses,
            miss_rate,
            hit_latency: self.hit_latency,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub valid: bool,
    pub tag: u64,
    pub arrival: u64,
    pub last_used: u64,
    pub frequency: u64,
}

impl Line {
    fn fill(&mut self, tag: u64, clock: u64) {
        *self = Line {
            valid: true,
            tag,
            arrival: clock,
            last_used: clock,
            frequency: 1,
        };
    }

    fn read(&mut self, clock: u64) {
        self.last_used = clock;
        self.frequency += 1;
    }
}
