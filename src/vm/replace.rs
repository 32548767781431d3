//! Page replacement policies.
//!
//! A policy is consulted only when every frame is occupied. It picks the frame
//! to evict; paging the victim out is left to [`VirtualMemory`](super::VirtualMemory).

use super::{PageTableEntry, PageTables, Resident};

pub trait PageReplace {
    fn name(&self) -> &'static str;

    /// Frame to evict, or `None` if no occupied frame maps to a live entry.
    fn victim(&mut self, frames: &[Option<Resident>], tables: &mut PageTables) -> Option<usize>;
}

/// Occupied frame whose entry has the smallest `key`, lowest frame winning ties.
fn min_frame(
    frames: &[Option<Resident>],
    tables: &PageTables,
    key: impl Fn(&PageTableEntry) -> u64,
) -> Option<usize> {
    frames
        .iter()
        .enumerate()
        .filter_map(|(frame, resident)| {
            let pte = tables.entry((*resident)?)?;
            Some((frame, key(pte)))
        })
        .min_by_key(|&(_frame, k)| k)
        .map(|(frame, _k)| frame)
}

#[derive(Debug, Default)]
pub struct Fifo;

impl PageReplace for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn victim(&mut self, frames: &[Option<Resident>], tables: &mut PageTables) -> Option<usize> {
        min_frame(frames, tables, |pte| pte.arrival)
    }
}

#[derive(Debug, Default)]
pub struct Lru;

impl PageReplace for Lru {
    fn name(&self) -> &'static str {
        "lru"
    }

    fn victim(&mut self, frames: &[Option<Resident>], tables: &mut PageTables) -> Option<usize> {
        min_frame(frames, tables, |pte| pte.last_used)
    }
}

/// Second-chance replacement.
///
/// The hand sweeps the frames in a circle. A referenced page has its bit
/// cleared and is passed over; the first unreferenced page is the victim. One
/// full sweep clears every bit, so the search ends within two sweeps.
#[derive(Debug, Default)]
pub struct Clock {
    hand: usize,
    last_sweep: usize,
}

impl Clock {
    pub fn new() -> Self {
        Clock::default()
    }

    pub fn hand(&self) -> usize {
        self.hand
    }

    /// Frames examined by the most recent successful victim search.
    pub fn last_sweep(&self) -> usize {
        self.last_sweep
    }
}

impl PageReplace for Clock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn victim(&mut self, frames: &[Option<Resident>], tables: &mut PageTables) -> Option<usize> {
        let n_frames = frames.len();
        if n_frames == 0 {
            return None;
        }
        self.hand %= n_frames;

        for step in 1..=2 * n_frames {
            let frame = self.hand;
            self.hand = (self.hand + 1) % n_frames;

            let Some(resident) = frames[frame] else {
                continue;
            };
            let Some(pte) = tables.entry_mut(resident) else {
                continue;
            };
            if pte.ref_bit {
                pte.ref_bit = false;
            } else {
                self.last_sweep = step;
                return Some(frame);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four frames, each holding page `i` of process 0, with the given ref bits.
    fn full(ref_bits: [bool; 4]) -> (Vec<Option<Resident>>, PageTables) {
        let mut tables = PageTables::default();
        tables.insert(0, 4, 16).unwrap();
        let frames = (0..4)
            .map(|vpn| {
                let resident = Resident { pid: 0, vpn };
                let pte = tables.entry_mut(resident).unwrap();
                pte.frame = Some(vpn);
                pte.arrival = 10 - vpn as u64;
                pte.last_used = 20 + vpn as u64;
                pte.ref_bit = ref_bits[vpn];
                Some(resident)
            })
            .collect();
        (frames, tables)
    }

    #[test]
    fn fifo_and_lru_read_different_stamps() {
        let (frames, mut tables) = full([true; 4]);
        assert_eq!(Fifo.victim(&frames, &mut tables), Some(3));
        assert_eq!(Lru.victim(&frames, &mut tables), Some(0));
    }

    #[test]
    fn clock_skips_referenced_frames() {
        let (frames, mut tables) = full([true, false, true, false]);
        let mut clock = Clock::new();
        assert_eq!(clock.victim(&frames, &mut tables), Some(1));
        assert_eq!(clock.hand(), 2);
        assert!(!tables.entry(Resident { pid: 0, vpn: 0 }).unwrap().ref_bit);
        // Frame 2 gets its second chance cleared, frame 3 goes.
        assert_eq!(clock.victim(&frames, &mut tables), Some(3));
        assert_eq!(clock.last_sweep(), 2);
    }

    #[test]
    fn clock_all_referenced_takes_two_sweeps() {
        let (frames, mut tables) = full([true; 4]);
        let mut clock = Clock::new();
        assert_eq!(clock.victim(&frames, &mut tables), Some(0));
        assert_eq!(clock.last_sweep(), 5);
        assert!(clock.last_sweep() <= 2 * frames.len());
        assert_eq!(clock.hand(), 1);
    }

    #[test]
    fn clock_skips_free_frames() {
        let (mut frames, mut tables) = full([true, true, false, true]);
        frames[0] = None;
        let mut clock = Clock::new();
        assert_eq!(clock.victim(&frames, &mut tables), Some(2));
        assert!(!tables.entry(Resident { pid: 0, vpn: 1 }).unwrap().ref_bit);
    }

    #[test]
    fn clock_gives_up_without_residents() {
        let mut tables = PageTables::default();
        let frames = vec![None; 3];
        assert_eq!(Clock::new().victim(&frames, &mut tables), None);
        assert_eq!(Clock::new().victim(&[], &mut tables), None);
    }
}
