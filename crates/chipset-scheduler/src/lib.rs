//! Fixed-slot, cycle-keyed event scheduler.
//!
//! Events are stored in one of ~21 named slots instead of a general-purpose
//! priority queue, because the chipset only ever has a few dozen event
//! categories in flight and the dispatch loop runs every single color
//! clock. Slots are grouped into three tiers: primary (checked every
//! dispatch), secondary, and tertiary. Each tier's minimum trigger cycle is
//! cached in the tier above it (`Slot::Sec` mirrors the minimum of the
//! secondary tier, `Slot::Ter` mirrors the minimum of the tertiary tier), so
//! the hot path only ever compares the primary tier's nine fields.

use emu_core::{Observable, Value};

/// A scheduled event identifier. `0` means "no event" (the slot is idle).
pub type EventId = u32;
pub const NO_EVENT: EventId = 0;

/// Absolute DMA-cycle trigger used as "never".
pub const NEVER: i64 = i64::MAX;

/// Named scheduler slots, declared in strict dispatch-priority order: when
/// several slots share a trigger cycle, the slot declared first is serviced
/// first. `Reg` is declared before any bus-allocating slot because register
/// writes must take effect before the cycle's bus allocation is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Slot {
    Reg,
    CiaA,
    CiaB,
    Bpl,
    Das,
    Cop,
    Blt,
    Ras,
    Vbl,
    /// Aggregates the minimum trigger of the secondary tier.
    Sec,
    Ins,
    Irq,
    Dc0,
    Dc1,
    Dc2,
    Dc3,
    /// Aggregates the minimum trigger of the tertiary tier.
    Ter,
    Hd0,
    Hd1,
    Hd2,
    Hd3,
}

const PRIMARY_REAL: &[Slot] = &[
    Slot::Reg,
    Slot::CiaA,
    Slot::CiaB,
    Slot::Bpl,
    Slot::Das,
    Slot::Cop,
    Slot::Blt,
    Slot::Ras,
    Slot::Vbl,
];
const SECONDARY_REAL: &[Slot] = &[Slot::Ins, Slot::Irq, Slot::Dc0, Slot::Dc1, Slot::Dc2, Slot::Dc3];
const TERTIARY_REAL: &[Slot] = &[Slot::Hd0, Slot::Hd1, Slot::Hd2, Slot::Hd3];

const SLOT_COUNT: usize = 21;

impl Slot {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    id: EventId,
    trigger: i64,
    data: u64,
}

impl Entry {
    const EMPTY: Entry = Entry {
        id: NO_EVENT,
        trigger: NEVER,
        data: 0,
    };
}

/// The fixed-slot scheduler.
pub struct Scheduler {
    slots: [Entry; SLOT_COUNT],
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler {
            slots: [Entry::EMPTY; SLOT_COUNT],
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, slot: Slot) -> Entry {
        self.slots[slot.index()]
    }

    fn set_entry(&mut self, slot: Slot, entry: Entry) {
        self.slots[slot.index()] = entry;
        self.propagate(slot);
    }

    /// After a tertiary or secondary slot changes, refresh the aggregator
    /// above it so the primary tier's cached minimum stays correct.
    fn propagate(&mut self, slot: Slot) {
        if TERTIARY_REAL.contains(&slot) {
            let min = TERTIARY_REAL
                .iter()
                .map(|&s| self.slots[s.index()].trigger)
                .min()
                .unwrap_or(NEVER);
            self.slots[Slot::Ter.index()].trigger = min;
        }
        if slot == Slot::Ter || SECONDARY_REAL.contains(&slot) {
            let min = SECONDARY_REAL
                .iter()
                .map(|&s| self.slots[s.index()].trigger)
                .chain(std::iter::once(self.slots[Slot::Ter.index()].trigger))
                .min()
                .unwrap_or(NEVER);
            self.slots[Slot::Sec.index()].trigger = min;
        }
    }

    pub fn schedule_abs(&mut self, slot: Slot, cycle: i64, id: EventId) {
        self.schedule_abs_data(slot, cycle, id, 0);
    }

    pub fn schedule_abs_data(&mut self, slot: Slot, cycle: i64, id: EventId, data: u64) {
        self.set_entry(
            slot,
            Entry {
                id,
                trigger: cycle,
                data,
            },
        );
    }

    pub fn schedule_rel(&mut self, slot: Slot, delta: i64, id: EventId, now: i64) {
        self.schedule_abs(slot, now + delta, id);
    }

    /// Reschedules a slot to a new absolute cycle, keeping its id and data.
    pub fn reschedule_abs(&mut self, slot: Slot, cycle: i64) {
        let mut entry = self.entry(slot);
        entry.trigger = cycle;
        self.set_entry(slot, entry);
    }

    pub fn reschedule_rel(&mut self, slot: Slot, delta: i64, now: i64) {
        self.reschedule_abs(slot, now + delta);
    }

    /// Cancels a slot: its id is cleared and its trigger set to `NEVER`.
    /// Cancellation is lazy — a slot already drained out of the primary
    /// cache this dispatch is simply not revisited until the next call to
    /// `next_due_slot`/`execute_until`.
    pub fn cancel(&mut self, slot: Slot) {
        self.set_entry(slot, Entry::EMPTY);
    }

    pub fn is_pending(&self, slot: Slot) -> bool {
        self.entry(slot).id != NO_EVENT
    }

    #[must_use]
    pub fn trigger_of(&self, slot: Slot) -> i64 {
        self.entry(slot).trigger
    }

    #[must_use]
    pub fn data_of(&self, slot: Slot) -> u64 {
        self.entry(slot).data
    }

    /// The next cycle at which any slot is due.
    #[must_use]
    pub fn next_trigger(&self) -> i64 {
        PRIMARY_REAL
            .iter()
            .map(|&s| self.slots[s.index()].trigger)
            .chain(std::iter::once(self.slots[Slot::Sec.index()].trigger))
            .min()
            .unwrap_or(NEVER)
    }

    /// Finds the single due slot with lowest priority index at or before
    /// `cycle`, drilling through the Sec/Ter aggregators into the tier they
    /// summarize. Returns `None` if nothing is due.
    fn next_due_slot(&self, cycle: i64) -> Option<Slot> {
        for &s in PRIMARY_REAL {
            if self.slots[s.index()].trigger <= cycle {
                return Some(s);
            }
        }
        if self.slots[Slot::Sec.index()].trigger > cycle {
            return None;
        }
        for &s in SECONDARY_REAL {
            if self.slots[s.index()].trigger <= cycle {
                return Some(s);
            }
        }
        if self.slots[Slot::Ter.index()].trigger > cycle {
            return None;
        }
        for &s in TERTIARY_REAL {
            if self.slots[s.index()].trigger <= cycle {
                return Some(s);
            }
        }
        None
    }

    /// Services every slot due at or before `cycle`, in slot-priority
    /// order. `service` is invoked once per due event with the scheduler
    /// borrowed mutably so it may reschedule itself or other slots; it must
    /// not assume the slot it was called for is still pending afterwards.
    pub fn execute_until<F>(&mut self, cycle: i64, mut service: F)
    where
        F: FnMut(&mut Scheduler, Slot, EventId, u64),
    {
        while let Some(slot) = self.next_due_slot(cycle) {
            let entry = self.entry(slot);
            // Default to "consumed" so a service routine that does not
            // reschedule doesn't spin forever on the same due slot.
            self.set_entry(slot, Entry::EMPTY);
            service(self, slot, entry.id, entry.data);
        }
    }
}

impl Observable for Scheduler {
    fn query(&self, path: &str) -> Option<Value> {
        if path == "nextTrigger" {
            return Some(Value::U64(u64::try_from(self.next_trigger()).ok()?));
        }
        None
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["nextTrigger"]
    }
}

#[cfg(test)]
mod tests {
    use super::{NEVER, Scheduler, Slot};

    #[test]
    fn next_trigger_tracks_minimum_across_tiers() {
        let mut s = Scheduler::new();
        assert_eq!(s.next_trigger(), NEVER);

        s.schedule_abs(Slot::Bpl, 100, 1);
        assert_eq!(s.next_trigger(), 100);

        s.schedule_abs(Slot::Hd2, 50, 2);
        assert_eq!(s.next_trigger(), 50, "tertiary minimum must propagate through Ter into Sec");

        s.cancel(Slot::Hd2);
        assert_eq!(s.next_trigger(), 100);
    }

    #[test]
    fn equal_trigger_services_reg_before_bus_slots() {
        let mut s = Scheduler::new();
        s.schedule_abs(Slot::Bpl, 10, 1);
        s.schedule_abs(Slot::Reg, 10, 2);

        let mut order = Vec::new();
        s.execute_until(10, |_, slot, _, _| order.push(slot));

        assert_eq!(order, vec![Slot::Reg, Slot::Bpl]);
    }

    #[test]
    fn cancel_is_lazy_and_does_not_panic_on_redispatch() {
        let mut s = Scheduler::new();
        s.schedule_abs(Slot::Cop, 5, 7);
        s.cancel(Slot::Cop);
        let mut hits = 0;
        s.execute_until(100, |_, _, _, _| hits += 1);
        assert_eq!(hits, 0);
    }

    #[test]
    fn service_routine_can_reschedule_itself() {
        let mut s = Scheduler::new();
        s.schedule_abs(Slot::Vbl, 10, 1);
        let mut fires = 0;
        s.execute_until(100, |sched, slot, id, _| {
            fires += 1;
            if fires < 3 {
                sched.schedule_abs(slot, 10 + fires * 10, id);
            }
        });
        assert_eq!(fires, 3);
    }
}
