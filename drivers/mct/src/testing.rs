//! Register-file and clock doubles used by the unit tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    vec::Vec,
};

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::{
    io::Monotonic,
    regs::{
        ack_status, local_base, RegisterSpace, G_CNT_L, G_CNT_U, G_CNT_WSTAT, G_INT_CSTAT,
        G_WSTAT, L_INT_CSTAT, L_WSTAT, MAX_LOCAL_TIMERS,
    },
};

/// Clock that advances by a fixed step every time it is read.
pub struct FakeClock {
    now: AtomicU64,
    step: u64,
    reads: AtomicU64,
}

impl FakeClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step,
            reads: AtomicU64::new(0),
        }
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl Monotonic for FakeClock {
    fn now_ns(&self) -> u64 {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.now.fetch_add(self.step, Ordering::Relaxed)
    }
}

#[derive(Default)]
struct State {
    regs: HashMap<usize, u32>,
    writes: Vec<(usize, u32)>,
    /// Offsets whose write is never acknowledged.
    stalled: HashSet<usize>,
    /// Offsets whose acknowledgment shows up after N status polls.
    delayed: HashMap<usize, u32>,
    /// Pending delayed acknowledgments keyed by status offset.
    pending: HashMap<usize, (u32, u32)>,
    counter: u64,
    counter_step: u64,
    counter_reads: u32,
    /// Scripted values returned by counter reads before the model is used.
    scripted: VecDeque<u32>,
}

/// Simulated MCT register file.
///
/// Acknowledged writes raise their status bit (unless stalled), status and
/// interrupt-status registers are write-1-to-clear, and the global counter
/// advances by `counter_step` on every read of its lower half.
#[derive(Default)]
pub struct FakeRegs {
    state: Mutex<State>,
}

fn is_w1c(offset: usize) -> bool {
    if matches!(offset, G_WSTAT | G_CNT_WSTAT | G_INT_CSTAT) {
        return true;
    }
    (0..MAX_LOCAL_TIMERS).any(|cpu| {
        offset == local_base(cpu) + L_WSTAT || offset == local_base(cpu) + L_INT_CSTAT
    })
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw value of a register (bypasses the counter model).
    pub fn reg(&self, offset: usize) -> u32 {
        self.state.lock().regs.get(&offset).copied().unwrap_or(0)
    }

    /// Force a register value, e.g. to raise an interrupt status bit.
    pub fn set_reg(&self, offset: usize, value: u32) {
        self.state.lock().regs.insert(offset, value);
    }

    /// All values written to `offset`, oldest first.
    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|&(_, v)| v)
            .collect()
    }

    /// Every write in program order.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn stall_ack(&self, offset: usize) {
        self.state.lock().stalled.insert(offset);
    }

    pub fn delay_ack(&self, offset: usize, polls: u32) {
        self.state.lock().delayed.insert(offset, polls);
    }

    pub fn set_counter(&self, value: u64) {
        self.state.lock().counter = value;
    }

    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }

    pub fn set_counter_step(&self, step: u64) {
        self.state.lock().counter_step = step;
    }

    /// Queue raw values returned by the next counter-half reads.
    pub fn script_counter(&self, values: &[u32]) {
        self.state.lock().scripted.extend(values.iter().copied());
    }

    pub fn counter_reads(&self) -> u32 {
        self.state.lock().counter_reads
    }
}

impl RegisterSpace for FakeRegs {
    fn read(&self, offset: usize) -> u32 {
        let mut st = self.state.lock();
        if offset == G_CNT_L || offset == G_CNT_U {
            st.counter_reads += 1;
            if let Some(v) = st.scripted.pop_front() {
                return v;
            }
            if offset == G_CNT_L {
                let lo = st.counter as u32;
                st.counter = st.counter.wrapping_add(st.counter_step);
                return lo;
            }
            return (st.counter >> 32) as u32;
        }

        if let Some((mask, polls)) = st.pending.get(&offset).copied() {
            if polls == 0 {
                st.pending.remove(&offset);
                *st.regs.entry(offset).or_insert(0) |= mask;
            } else {
                st.pending.insert(offset, (mask, polls - 1));
            }
        }
        st.regs.get(&offset).copied().unwrap_or(0)
    }

    fn write(&self, offset: usize, value: u32) {
        let mut st = self.state.lock();
        st.writes.push((offset, value));

        if is_w1c(offset) {
            *st.regs.entry(offset).or_insert(0) &= !value;
            return;
        }

        st.regs.insert(offset, value);
        match offset {
            G_CNT_L => st.counter = (st.counter & !0xffff_ffff) | value as u64,
            G_CNT_U => st.counter = (st.counter & 0xffff_ffff) | ((value as u64) << 32),
            _ => {}
        }

        if let Some(status) = ack_status(offset) {
            if st.stalled.contains(&offset) {
                return;
            }
            if let Some(polls) = st.delayed.get(&offset).copied() {
                st.pending.insert(status.offset, (status.mask, polls));
            } else {
                *st.regs.entry(status.offset).or_insert(0) |= status.mask;
            }
        }
    }
}
