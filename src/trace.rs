//! Access traces.
//!
//! A trace is read on a background thread and handed to the simulator in
//! blocks over a bounded channel, so parsing overlaps with simulation while
//! the caches and page tables themselves stay on the caller's thread.
//!
//! Text format, one record per line:
//!
//! ```text
//! # physical access
//! 0x1f40
//! # virtual access: pid, virtual address
//! 2 8192
//! ```
//!
//! Files ending in `.xz` are decompressed on the fly.

use std::{
    fs,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use log::{debug, warn};
use xz2::read::XzDecoder;

use crate::{
    error::{Result, SimError},
    vm::{Pid, VirtualMemory},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Physical(u64),
    Virtual { pid: Pid, addr: u64 },
}

impl Record {
    /// Parses one trace line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> std::result::Result<Option<Record>, String> {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let record = match (fields.next(), fields.next(), fields.next()) {
            (None, _, _) => return Ok(None),
            (Some(addr), None, _) => Record::Physical(parse_num(addr)?),
            (Some(pid), Some(addr), None) => Record::Virtual {
                pid: pid.parse().map_err(|_| format!("invalid pid {pid:?}"))?,
                addr: parse_num(addr)?,
            },
            (Some(_), Some(_), Some(extra)) => return Err(format!("unexpected field {extra:?}")),
        };
        Ok(Some(record))
    }
}

fn parse_num(field: &str) -> std::result::Result<u64, String> {
    let parsed = match field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => field.parse(),
    };
    parsed.map_err(|_| format!("invalid address {field:?}"))
}

/// How a synthetic trace spreads its accesses.
#[derive(Debug, Clone, Default)]
pub struct Synthetic {
    pub count: u64,
    /// Addresses are drawn uniformly from `0..span`.
    pub span: u64,
    pub seed: u64,
    /// Processes to spread virtual accesses over; empty gives physical accesses.
    pub pids: Vec<Pid>,
}

impl Synthetic {
    /// Aims the trace at every process of `vm`, narrowing the span to the
    /// smallest process's address space so each record translates.
    pub fn over(mut self, vm: &VirtualMemory) -> Self {
        self.pids = vm.pids().collect();
        let smallest = self
            .pids
            .iter()
            .filter_map(|&pid| vm.page_table(pid))
            .map(|table| table.len() as u64 * vm.page_size() as u64)
            .min();
        if let Some(process_span) = smallest {
            self.span = self.span.min(process_span);
        }
        self
    }
}

pub struct Trace {
    pub rec: Receiver<Result<Vec<Record>>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    pub fn read(path: PathBuf, records_per_block: usize, blocks_per_queue: usize) -> Result<Trace> {
        let stream = open(&path)?;
        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue);
        let records_per_block = records_per_block.max(1);

        let t = thread::spawn(move || {
            debug!("reading trace {}", path.display());
            Trace::run_thread(stream, records_per_block, sender)
        });

        Ok(Trace {
            rec: receiver,
            _thread: t,
        })
    }

    pub fn synthetic(config: Synthetic, records_per_block: usize, blocks_per_queue: usize) -> Trace {
        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue);
        let records_per_block = records_per_block.max(1);

        let t = thread::spawn(move || {
            let mut rng = fastrand::Rng::with_seed(config.seed);
            let span = config.span.max(1);
            let mut remaining = config.count;
            while remaining > 0 {
                let n = remaining.min(records_per_block as u64);
                let block = (0..n)
                    .map(|_| {
                        let addr = rng.u64(0..span);
                        match config.pids.as_slice() {
                            [] => Record::Physical(addr),
                            pids => Record::Virtual {
                                pid: pids[rng.usize(0..pids.len())],
                                addr,
                            },
                        }
                    })
                    .collect();
                if sender.send(Ok(block)).is_err() {
                    return;
                }
                remaining -= n;
            }
        });

        Trace {
            rec: receiver,
            _thread: t,
        }
    }

    fn run_thread(stream: Box<dyn Read + Send>, records_per_block: usize, queue: Sender<Result<Vec<Record>>>) {
        let reader = BufReader::new(stream);
        let mut block = Vec::with_capacity(records_per_block);

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let parsed = line.map_err(SimError::from).and_then(|line| {
                Record::parse(&line).map_err(|reason| SimError::Trace {
                    line: line_no,
                    reason,
                })
            });
            match parsed {
                Ok(Some(record)) => block.push(record),
                Ok(None) => continue,
                Err(err) => {
                    warn!("stopping trace: {err}");
                    let _ = queue.send(Err(err));
                    return;
                }
            }

            if block.len() == records_per_block {
                let full = std::mem::replace(&mut block, Vec::with_capacity(records_per_block));
                if queue.send(Ok(full)).is_err() {
                    return;
                }
            }
        }

        if !block.is_empty() {
            let _ = queue.send(Ok(block));
        }
    }
}

impl Iterator for Trace {
    type Item = Result<Vec<Record>>;

    /// Next block of records; `None` once the reader thread has finished.
    fn next(&mut self) -> Option<Self::Item> {
        self.rec.recv().ok()
    }
}

fn open(path: &Path) -> io::Result<Box<dyn Read + Send>> {
    let file = fs::File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "xz") {
        Ok(Box::new(XzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}
