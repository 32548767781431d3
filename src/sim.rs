use log::{info, warn};
use serde::Serialize;

use crate::{
    cache::CacheStats,
    config::Config,
    error::{Result, SimError},
    hierarchy::{CacheHierarchy, Resolution},
    trace::Record,
    vm::{VirtualMemory, VmStats},
};

/// What happened to one trace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub physical: u64,
    pub resolution: Resolution,
    pub latency: u64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub records: u64,
    pub rejected: u64,
    pub total_cycles: u64,
    pub memory_accesses: u64,
    pub caches: Vec<LevelReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm: Option<VmStats>,
}

#[derive(Debug, Serialize)]
pub struct LevelReport {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Accesses this level satisfied, not counting refills.
    pub resolved: u64,
}

pub struct Simulator {
    hierarchy: CacheHierarchy,
    vm: Option<VirtualMemory>,
    records: u64,
    rejected: u64,
}

impl Simulator {
    pub fn new(hierarchy: CacheHierarchy, vm: Option<VirtualMemory>) -> Self {
        Simulator {
            hierarchy,
            vm,
            records: 0,
            rejected: 0,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Simulator::new(config.to_hierarchy()?, config.to_vm()?))
    }

    /// Resolves one record: translate if virtual, then look up the hierarchy.
    pub fn step(&mut self, record: Record) -> Result<Outcome> {
        let physical = match record {
            Record::Physical(addr) => addr,
            Record::Virtual { pid, addr } => {
                let vm = self.vm.as_mut().ok_or_else(|| {
                    SimError::config("virtual access in trace but no vm configured")
                })?;
                vm.translate(pid, addr)?
            }
        };
        let (resolution, latency) = self.hierarchy.access(physical);
        self.records += 1;
        Ok(Outcome {
            physical,
            resolution,
            latency,
        })
    }

    /// Runs a block of records. Records naming a missing process or an
    /// out-of-range page are logged and counted, not fatal.
    pub fn operate(&mut self, records: &[Record]) -> Result<()> {
        for &record in records {
            match self.step(record) {
                Ok(_) => {}
                Err(err) if err.is_rejected_record() => {
                    warn!("skipping {record:?}: {err}");
                    self.rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Resets every counter while keeping cache and page contents.
    pub fn clear_stats(&mut self) {
        self.hierarchy.clear_stats();
        if let Some(vm) = &mut self.vm {
            vm.clear_stats();
        }
        self.records = 0;
        self.rejected = 0;
        info!("statistics cleared");
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn hierarchy(&self) -> &CacheHierarchy {
        &self.hierarchy
    }

    pub fn vm(&self) -> Option<&VirtualMemory> {
        self.vm.as_ref()
    }

    pub fn report(&self) -> Report {
        let caches = self
            .hierarchy
            .levels()
            .iter()
            .zip(self.hierarchy.resolved())
            .map(|(cache, &resolved)| LevelReport {
                stats: cache.make_stats(),
                resolved,
            })
            .collect();

        Report {
            records: self.records,
            rejected: self.rejected,
            total_cycles: self.hierarchy.total_cycles(),
            memory_accesses: self.hierarchy.memory_accesses(),
            caches,
            vm: self.vm.as_ref().map(VirtualMemory::stats),
        }
    }
}
