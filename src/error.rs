use std::io;

use thiserror::Error;

use crate::vm::Pid;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    /// Construction parameters that can never describe a working cache or VM.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("unknown process {0}")]
    UnknownProcess(Pid),

    #[error("virtual address {addr:#x} is outside the {pages} pages of process {pid}")]
    InvalidAddress { pid: Pid, addr: u64, pages: usize },

    /// Every frame was occupied yet the replacement policy found nothing to evict.
    /// Only reachable if the frame table and the page tables disagree.
    #[error("no evictable frame among {0} frames")]
    NoVictim(usize),

    #[error("trace line {line}: {reason}")]
    Trace { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Args(#[from] pico_args::Error),
}

impl SimError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        SimError::Configuration(reason.into())
    }

    /// Errors caused by a single bad record rather than by the simulator setup.
    pub fn is_rejected_record(&self) -> bool {
        matches!(
            self,
            SimError::UnknownProcess(_) | SimError::InvalidAddress { .. }
        )
    }
}
