use serde::Deserialize;

use crate::{
    cache::{Cache, IsCache},
    error::{Result, SimError},
    hierarchy::CacheHierarchy,
    replace::{fifo::Fifo, lfu::Lfu, lru::Lru},
    vm::{self, PageReplace, VirtualMemory},
};

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    /// Capacity in bytes.
    pub size: u64,
    pub ways: usize,
    pub latency: u64,
    pub repl: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmConfig {
    pub processes: usize,
    pub pages_per_process: usize,
    pub frames: usize,
    pub page_size: usize,
    pub repl: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub block_size: u64,
    pub memory_latency: u64,
    pub caches: Vec<CacheConfig>,
    #[serde(default)]
    pub vm: Option<VmConfig>,
}

impl Default for Config {
    /// 32 KiB / 256 KiB / 2 MiB, all LRU, in front of 100-cycle memory.
    fn default() -> Self {
        let level = |name: &str, size: u64, ways: usize, latency: u64| CacheConfig {
            name: name.to_string(),
            size,
            ways,
            latency,
            repl: "lru".to_string(),
        };
        Config {
            block_size: 64,
            memory_latency: 100,
            caches: vec![
                level("L1", 32 * 1024, 4, 1),
                level("L2", 256 * 1024, 8, 5),
                level("L3", 2 * 1024 * 1024, 16, 20),
            ],
            vm: None,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_caches(&self) -> Result<Vec<Box<dyn IsCache>>> {
        let block_size = self.block_size;
        self.caches
            .iter()
            .map(|cc| {
                let name = cc.name.clone();
                Ok(match cc.repl.to_ascii_lowercase().as_str() {
                    "fifo" => Box::new(Cache::new(name, cc.size, block_size, cc.ways, cc.latency, Fifo)?)
                        as Box<dyn IsCache>,
                    "lru" => Box::new(Cache::new(name, cc.size, block_size, cc.ways, cc.latency, Lru)?)
                        as Box<dyn IsCache>,
                    "lfu" => Box::new(Cache::new(name, cc.size, block_size, cc.ways, cc.latency, Lfu)?)
                        as Box<dyn IsCache>,
                    _ => {
                        return Err(SimError::config(format!(
                            "{}: unrecognized replacement policy {:?}",
                            cc.name, cc.repl
                        )))
                    }
                })
            })
            .collect()
    }

    pub fn to_hierarchy(&self) -> Result<CacheHierarchy> {
        Ok(CacheHierarchy::new(self.to_caches()?, self.memory_latency))
    }

    /// Builds the virtual memory, if configured, with its processes already created.
    pub fn to_vm(&self) -> Result<Option<VirtualMemory>> {
        let Some(vc) = &self.vm else {
            return Ok(None);
        };
        let repl: Box<dyn PageReplace> = match vc.repl.to_ascii_lowercase().as_str() {
            "fifo" => Box::new(vm::replace::Fifo),
            "lru" => Box::new(vm::replace::Lru),
            "clock" => Box::new(vm::replace::Clock::new()),
            _ => {
                return Err(SimError::config(format!(
                    "unrecognized page replacement policy {:?}",
                    vc.repl
                )))
            }
        };
        let mut vm = VirtualMemory::new(vc.pages_per_process, vc.frames, vc.page_size, repl)?;
        vm.create_processes(vc.processes)?;
        Ok(Some(vm))
    }
}
