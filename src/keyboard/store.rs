//! Double buffered report storage
//!
//! One slot is active, it is what the transmit path and Get_Report hand to the host. The other
//! is staging, the only slot the scancode codec may write to. [`ReportStore::swap`] exchanges the
//! roles and is the only point at which data moves from the assembling side to the sending side.

use core::sync::atomic::{AtomicU8, Ordering};

use super::report::KeyboardReport;

pub struct ReportStore {
    slots: [KeyboardReport; 2],
    //index of the active slot, a single word so a reader never sees a torn selector
    active: AtomicU8,
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [KeyboardReport::new(), KeyboardReport::new()],
            active: AtomicU8::new(0),
        }
    }

    fn active_index(&self) -> usize {
        usize::from(self.active.load(Ordering::Acquire) & 1)
    }

    /// The report visible to the host, must not be modified
    #[must_use]
    pub fn active(&self) -> &KeyboardReport {
        &self.slots[self.active_index()]
    }

    /// The report being assembled for the next delivery
    pub fn staging_mut(&mut self) -> &mut KeyboardReport {
        let staging = self.active_index() ^ 1;
        &mut self.slots[staging]
    }

    #[must_use]
    pub fn staging(&self) -> &KeyboardReport {
        &self.slots[self.active_index() ^ 1]
    }

    /// Exchange the active and staging roles, call once per successful delivery
    ///
    /// Only the selector changes, so a shared reference is enough.
    pub fn swap(&self) {
        let staging = self.active.load(Ordering::Acquire) ^ 1;
        self.active.store(staging & 1, Ordering::Release);
    }

    /// Zero the active report so nothing stale is reported after reattaching
    pub fn reset_active(&mut self) {
        let active = self.active_index();
        self.slots[active].clear();
    }

    /// Zero both slots and select the first as active
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.active.store(0, Ordering::Release);
    }

    /// True if the staging report differs from the active one
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.active() != self.staging()
    }
}
