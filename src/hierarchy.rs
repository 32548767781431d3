//! Multi-level cache lookup with inclusive refill.
//!
//! Levels are probed nearest first. Whatever level finally supplies the block,
//! every level in front of it is refilled by calling its plain `access` again,
//! so refill traffic shows up in the per-level hit/miss counters. Because the
//! probe that missed has already installed the block, those refill calls land
//! as hits.

use log::debug;
use serde::Serialize;

use crate::cache::IsCache;

/// Where one access was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Hit in the level at this index, 0 being the nearest.
    Hit(usize),
    /// Missed every level and went to backing memory.
    Memory,
}

pub struct CacheHierarchy {
    levels: Vec<Box<dyn IsCache>>,
    memory_latency: u64,
    total_cycles: u64,
    resolved: Vec<u64>,
    memory_accesses: u64,
}

impl CacheHierarchy {
    pub fn new(levels: Vec<Box<dyn IsCache>>, memory_latency: u64) -> Self {
        let resolved = vec![0; levels.len()];
        CacheHierarchy {
            levels,
            memory_latency,
            total_cycles: 0,
            resolved,
            memory_accesses: 0,
        }
    }

    /// Resolves `addr`, returning where it was found and the latency paid.
    pub fn access(&mut self, addr: u64) -> (Resolution, u64) {
        let mut latency = 0;
        let mut found = None;
        for (level, cache) in self.levels.iter_mut().enumerate() {
            latency += cache.hit_latency();
            if cache.access(addr) {
                found = Some(level);
                break;
            }
        }

        let resolution = match found {
            Some(level) => {
                for cache in &mut self.levels[..level] {
                    cache.access(addr);
                }
                self.resolved[level] += 1;
                if level > 0 {
                    debug!("{addr:#x}: hit in {}, refilled {level} levels", self.levels[level].name());
                }
                Resolution::Hit(level)
            }
            None => {
                latency += self.memory_latency;
                for cache in self.levels.iter_mut().rev() {
                    cache.access(addr);
                }
                self.memory_accesses += 1;
                debug!("{addr:#x}: missed all {} levels", self.levels.len());
                Resolution::Memory
            }
        };

        self.total_cycles += latency;
        (resolution, latency)
    }

    pub fn levels(&self) -> &[Box<dyn IsCache>] {
        &self.levels
    }

    pub fn memory_latency(&self) -> u64 {
        self.memory_latency
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Accesses satisfied by each level, excluding refill calls.
    pub fn resolved(&self) -> &[u64] {
        &self.resolved
    }

    pub fn memory_accesses(&self) -> u64 {
        self.memory_accesses
    }

    pub fn clear_stats(&mut self) {
        self.levels.iter_mut().for_each(|c| c.clear_stats());
        self.resolved.iter_mut().for_each(|n| *n = 0);
        self.memory_accesses = 0;
        self.total_cycles = 0;
    }
}
