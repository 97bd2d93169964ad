//! Two-slot rotating journal.
//!
//! Exactly one slot receives writes at any instant; the other is either idle
//! (freshly reinitialized) or being drained by the uplink task. One lock
//! guards slot selection and slot file I/O, and is never held across network
//! I/O: the rotation flip is the atomicity point that orders every write
//! into either the frozen slot or the newly-active one.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use probenode_foundation::StoreError;

use crate::capture::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> SlotId {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }

    fn index(self) -> usize {
        match self {
            SlotId::A => 0,
            SlotId::B => 1,
        }
    }
}

struct SlotState {
    active: SlotId,
    /// Set after `reinit`; cleared by the first write, which prefixes the
    /// slot with its cycle-start line.
    fresh: [bool; 2],
}

pub struct LogStore {
    paths: [PathBuf; 2],
    cycle_secs: i64,
    state: Mutex<SlotState>,
}

impl LogStore {
    /// Truncate both slot files and start with slot A active. Failure to
    /// create either file is fatal: the journal is the only record of
    /// captured data.
    pub fn open(
        slot_a: impl Into<PathBuf>,
        slot_b: impl Into<PathBuf>,
        cycle_secs: u64,
    ) -> Result<Self, StoreError> {
        let paths = [slot_a.into(), slot_b.into()];
        for path in &paths {
            truncate(path)?;
            tracing::info!(path = %path.display(), "Slot file initialized");
        }
        Ok(Self {
            paths,
            cycle_secs: cycle_secs as i64,
            state: Mutex::new(SlotState {
                active: SlotId::A,
                fresh: [true, true],
            }),
        })
    }

    /// The cycle boundary `now` falls in.
    pub fn cycle_start(&self, now: i64) -> i64 {
        now - now.rem_euclid(self.cycle_secs)
    }

    #[cfg(test)]
    pub fn active_slot(&self) -> SlotId {
        self.state.lock().active
    }

    /// Append one record to the active slot. The slot lock is held for the
    /// whole append, so the write lands entirely in whichever slot is active
    /// on entry.
    pub fn write(&self, record: &Record, now: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let idx = state.active.index();
        let path = &self.paths[idx];

        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| StoreError::Append {
                path: path.display().to_string(),
                source,
            })?;

        if state.fresh[idx] {
            writeln!(file, "{}", self.cycle_start(now)).map_err(|source| StoreError::Append {
                path: path.display().to_string(),
                source,
            })?;
            state.fresh[idx] = false;
        }

        writeln!(file, "{}", record.wire_line()).map_err(|source| StoreError::Append {
            path: path.display().to_string(),
            source,
        })
    }

    /// Atomically flip the active slot and return the frozen one. Nothing but
    /// the flip happens under the lock; draining the frozen slot is safe
    /// without it because no writer can reach that slot anymore.
    pub fn rotate(&self) -> SlotId {
        let mut state = self.state.lock();
        let frozen = state.active;
        state.active = frozen.other();
        tracing::debug!(?frozen, active = ?state.active, "Rotated slots");
        frozen
    }

    /// Read a frozen slot: first line is the cycle start, the rest are record
    /// lines. An empty slot (no captures this cycle) reports the boundary of
    /// `now` and no records. Must only be called on a non-active slot.
    pub fn drain(&self, slot: SlotId, now: i64) -> Result<(i64, Vec<String>), StoreError> {
        debug_assert_ne!(slot, self.state.lock().active);
        let path = &self.paths[slot.index()];
        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut lines = contents.lines();
        let cycle_start = lines
            .next()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .unwrap_or_else(|| self.cycle_start(now));
        let records = lines.map(str::to_owned).collect();
        Ok((cycle_start, records))
    }

    /// Truncate a drained slot back to empty. Must only be called on a
    /// non-active slot; the no-broker reset of the active slot goes through
    /// `reset_active` instead.
    pub fn reinit(&self, slot: SlotId) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        debug_assert_ne!(slot, state.active);
        truncate(&self.paths[slot.index()])?;
        state.fresh[slot.index()] = true;
        Ok(())
    }

    /// Truncate the active slot under the slot lock. Used by the capture task
    /// to bound storage growth when the broker has been unreachable for a
    /// full cycle; the records lost here would never have been uplinked.
    pub fn reset_active(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let idx = state.active.index();
        truncate(&self.paths[idx])?;
        state.fresh[idx] = true;
        Ok(())
    }
}

fn truncate(path: &Path) -> Result<(), StoreError> {
    File::create(path)
        .map(|_| ())
        .map_err(|source| StoreError::Init {
            path: path.display().to_string(),
            source,
        })
}
