//! Demand-paged virtual memory.
//!
//! Each process gets a flat page table and a backing store of the same
//! length. Physical memory is a fixed pool of frames shared by all processes.
//! A page is brought in on its first touch, and when no frame is free the
//! configured [`PageReplace`] policy picks a resident page to write back.
//!
//! Occupied frames and valid page table entries are kept in one-to-one
//! correspondence: frame `f` records `(pid, vpn)` exactly when that process's
//! entry for `vpn` points at `f`.

pub mod replace;

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::error::{Result, SimError};

pub use replace::PageReplace;

pub type Pid = i32;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    /// Frame holding the page; `None` while the page is not resident.
    pub frame: Option<usize>,
    pub arrival: u64,
    pub last_used: u64,
    pub ref_bit: bool,
}

impl PageTableEntry {
    pub fn valid(&self) -> bool {
        self.frame.is_some()
    }
}

/// The page occupying a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resident {
    pub pid: Pid,
    pub vpn: usize,
}

#[derive(Debug)]
struct Process {
    table: Vec<PageTableEntry>,
    backing: Vec<Box<[u8]>>,
}

/// Page tables and backing stores of every process, keyed by pid.
#[derive(Debug, Default)]
pub struct PageTables {
    processes: BTreeMap<Pid, Process>,
}

impl PageTables {
    pub(crate) fn insert(&mut self, pid: Pid, n_pages: usize, page_size: usize) -> Result<()> {
        if self.processes.contains_key(&pid) {
            return Err(SimError::config(format!("process {pid} already exists")));
        }
        if n_pages == 0 {
            return Err(SimError::config(format!("process {pid} needs at least one page")));
        }
        let process = Process {
            table: vec![PageTableEntry::default(); n_pages],
            backing: (0..n_pages)
                .map(|_| vec![0; page_size].into_boxed_slice())
                .collect(),
        };
        self.processes.insert(pid, process);
        Ok(())
    }

    pub fn table(&self, pid: Pid) -> Option<&[PageTableEntry]> {
        self.processes.get(&pid).map(|p| p.table.as_slice())
    }

    pub fn entry(&self, resident: Resident) -> Option<&PageTableEntry> {
        self.processes.get(&resident.pid)?.table.get(resident.vpn)
    }

    pub fn entry_mut(&mut self, resident: Resident) -> Option<&mut PageTableEntry> {
        self.processes
            .get_mut(&resident.pid)?
            .table
            .get_mut(resident.vpn)
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.processes.keys().copied()
    }

    fn backing_mut(&mut self, resident: Resident) -> Option<&mut [u8]> {
        self.processes
            .get_mut(&resident.pid)?
            .backing
            .get_mut(resident.vpn)
            .map(|page| &mut page[..])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VmStats {
    pub policy: &'static str,
    pub page_size: usize,
    pub frames: usize,
    pub resident: usize,
    pub page_hits: u64,
    pub page_faults: u64,
    pub fault_rate: f64,
}

pub struct VirtualMemory {
    pages_per_process: usize,
    page_size: usize,
    tables: PageTables,
    frames: Vec<Option<Resident>>,
    physical: Vec<Box<[u8]>>,
    clock: u64,
    repl: Box<dyn PageReplace>,
    page_hits: u64,
    page_faults: u64,
}

impl VirtualMemory {
    pub fn new(
        pages_per_process: usize,
        n_frames: usize,
        page_size: usize,
        repl: Box<dyn PageReplace>,
    ) -> Result<Self> {
        if pages_per_process == 0 {
            return Err(SimError::config("pages per process must be non-zero"));
        }
        if n_frames == 0 {
            return Err(SimError::config("frame count must be non-zero"));
        }
        if page_size == 0 {
            return Err(SimError::config("page size must be non-zero"));
        }

        Ok(VirtualMemory {
            pages_per_process,
            page_size,
            tables: PageTables::default(),
            frames: vec![None; n_frames],
            physical: (0..n_frames)
                .map(|_| vec![0; page_size].into_boxed_slice())
                .collect(),
            clock: 0,
            repl,
            page_hits: 0,
            page_faults: 0,
        })
    }

    /// Installs an all-invalid page table of `n_pages` entries for `pid`.
    ///
    /// A pid can only be created once.
    pub fn create_process(&mut self, pid: Pid, n_pages: usize) -> Result<()> {
        self.tables.insert(pid, n_pages, self.page_size)?;
        debug!("created process {pid} with {n_pages} pages");
        Ok(())
    }

    /// Creates pids `0..count`, each with the configured pages per process.
    pub fn create_processes(&mut self, count: usize) -> Result<()> {
        for pid in 0..count {
            let pid = Pid::try_from(pid)
                .map_err(|_| SimError::config(format!("{count} processes is too many")))?;
            self.create_process(pid, self.pages_per_process)?;
        }
        Ok(())
    }

    /// Maps `va` in `pid`'s address space to a physical address, faulting the
    /// page in if it is not resident.
    pub fn translate(&mut self, pid: Pid, va: u64) -> Result<u64> {
        let (vpn, offset) = self.split(pid, va)?;
        self.clock += 1;
        let clock = self.clock;
        let resident = Resident { pid, vpn };

        let frame = match self.tables.entry_mut(resident) {
            Some(pte) if pte.valid() => {
                pte.last_used = clock;
                pte.ref_bit = true;
                self.page_hits += 1;
                pte.frame
            }
            _ => None,
        };
        let frame = match frame {
            Some(frame) => frame,
            None => self.fault(resident)?,
        };

        Ok(self.physical_addr(frame, offset))
    }

    /// Reads one byte of `pid`'s memory through translation.
    pub fn read(&mut self, pid: Pid, va: u64) -> Result<u8> {
        let pa = self.translate(pid, va)?;
        let (frame, offset) = self.split_physical(pa);
        Ok(self.physical[frame][offset])
    }

    /// Writes one byte of `pid`'s memory through translation. Returns the
    /// physical address written.
    pub fn write(&mut self, pid: Pid, va: u64, value: u8) -> Result<u64> {
        let pa = self.translate(pid, va)?;
        let (frame, offset) = self.split_physical(pa);
        self.physical[frame][offset] = value;
        Ok(pa)
    }

    pub fn page_hits(&self) -> u64 {
        self.page_hits
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Frame table, indexed by frame number.
    pub fn frame_table(&self) -> &[Option<Resident>] {
        &self.frames
    }

    pub fn page_table(&self, pid: Pid) -> Option<&[PageTableEntry]> {
        self.tables.table(pid)
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.tables.pids()
    }

    pub fn clear_stats(&mut self) {
        self.page_hits = 0;
        self.page_faults = 0;
    }

    pub fn stats(&self) -> VmStats {
        let total = self.page_hits + self.page_faults;
        let fault_rate = if total == 0 {
            0.0
        } else {
            self.page_faults as f64 / total as f64
        };
        VmStats {
            policy: self.repl.name(),
            page_size: self.page_size,
            frames: self.frames.len(),
            resident: self.frames.iter().filter(|f| f.is_some()).count(),
            page_hits: self.page_hits,
            page_faults: self.page_faults,
            fault_rate,
        }
    }

    /// Splits `va` into page number and offset, checking it against `pid`'s table.
    fn split(&self, pid: Pid, va: u64) -> Result<(usize, usize)> {
        let table = self
            .tables
            .table(pid)
            .ok_or(SimError::UnknownProcess(pid))?;
        let page_size = self.page_size as u64;
        let vpn = usize::try_from(va / page_size)
            .ok()
            .filter(|&vpn| vpn < table.len())
            .ok_or(SimError::InvalidAddress {
                pid,
                addr: va,
                pages: table.len(),
            })?;
        // Below page_size, which is a usize.
        Ok((vpn, (va % page_size) as usize))
    }

    fn split_physical(&self, pa: u64) -> (usize, usize) {
        let page_size = self.page_size as u64;
        ((pa / page_size) as usize, (pa % page_size) as usize)
    }

    fn physical_addr(&self, frame: usize, offset: usize) -> u64 {
        frame as u64 * self.page_size as u64 + offset as u64
    }

    fn fault(&mut self, resident: Resident) -> Result<usize> {
        let frame = match self.frames.iter().position(Option::is_none) {
            Some(frame) => frame,
            None => {
                let frame = self
                    .repl
                    .victim(&self.frames, &mut self.tables)
                    .ok_or(SimError::NoVictim(self.frames.len()))?;
                self.evict(frame)?;
                frame
            }
        };
        self.page_faults += 1;

        self.page_in(resident, frame)?;
        let clock = self.clock;
        let pte = self
            .tables
            .entry_mut(resident)
            .ok_or(SimError::UnknownProcess(resident.pid))?;
        *pte = PageTableEntry {
            frame: Some(frame),
            arrival: clock,
            last_used: clock,
            ref_bit: true,
        };
        self.frames[frame] = Some(resident);
        debug!(
            "page fault: pid {} vpn {} -> frame {frame}",
            resident.pid, resident.vpn
        );
        Ok(frame)
    }

    /// Writes the page in `frame` back to its backing store and unmaps it.
    fn evict(&mut self, frame: usize) -> Result<()> {
        let victim = self.frames[frame]
            .take()
            .ok_or(SimError::NoVictim(self.frames.len()))?;
        let backing = self
            .tables
            .backing_mut(victim)
            .ok_or(SimError::UnknownProcess(victim.pid))?;
        backing.copy_from_slice(&self.physical[frame]);
        if let Some(pte) = self.tables.entry_mut(victim) {
            pte.frame = None;
            pte.ref_bit = false;
        }
        debug!(
            "evicted pid {} vpn {} from frame {frame}",
            victim.pid, victim.vpn
        );
        Ok(())
    }

    fn page_in(&mut self, resident: Resident, frame: usize) -> Result<()> {
        let backing = self
            .tables
            .backing_mut(resident)
            .ok_or(SimError::UnknownProcess(resident.pid))?;
        self.physical[frame].copy_from_slice(backing);
        Ok(())
    }
}
