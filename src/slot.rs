//! I/O slot table (C2)
//!
//! Address-stable table of in-flight I/O state. The table is sized to the
//! queue depth and never reallocates once built, so a slot's index can be
//! encoded directly into the engine completion token (`io_uring`'s user_data,
//! or a synthetic token for the sync/mock engines) and recovered in O(1) on
//! completion, without a hash lookup.

use std::fmt;

/// Lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not currently associated with an outstanding operation.
    Idle,
    /// Submitted to the engine, awaiting completion.
    InFlight,
    /// Completion reaped, not yet recycled back to `Idle`.
    Completed,
}

/// One entry in the slot table.
#[derive(Debug, Clone, Copy)]
pub struct IoSlot {
    pub index: usize,
    pub buffer_ptr: *mut u8,
    pub offset: u64,
    pub size: u32,
    pub is_write: bool,
    pub submit_ticks: u64,
    pub state: SlotState,
}

// SAFETY: slots are only ever touched by the single completion thread that
// owns the table; `buffer_ptr` aliases into the buffer pool the same thread owns.
unsafe impl Send for IoSlot {}

impl IoSlot {
    fn empty(index: usize) -> Self {
        Self {
            index,
            buffer_ptr: std::ptr::null_mut(),
            offset: 0,
            size: 0,
            is_write: false,
            submit_ticks: 0,
            state: SlotState::Idle,
        }
    }

    /// The completion token this slot submits under. The low bits directly
    /// encode the table index so `find_by_token` is a shift, not a search.
    #[inline]
    pub fn token(&self) -> u64 {
        self.index as u64
    }
}

impl fmt::Display for IoSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slot[{}] {:?} off={} size={} write={}",
            self.index, self.state, self.offset, self.size, self.is_write
        )
    }
}

/// Fixed-capacity table of `IoSlot`s, one per outstanding operation the
/// engine may hold at once (i.e. sized to queue depth).
pub struct SlotTable {
    slots: Vec<IoSlot>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(IoSlot::empty).collect();
        Self { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Populate an idle slot with a new operation and mark it in-flight.
    pub fn configure(
        &mut self,
        index: usize,
        buffer_ptr: *mut u8,
        offset: u64,
        size: u32,
        is_write: bool,
        submit_ticks: u64,
    ) {
        let slot = &mut self.slots[index];
        debug_assert!(
            matches!(slot.state, SlotState::Idle),
            "configuring a non-idle slot {index}"
        );
        slot.buffer_ptr = buffer_ptr;
        slot.offset = offset;
        slot.size = size;
        slot.is_write = is_write;
        slot.submit_ticks = submit_ticks;
        slot.state = SlotState::InFlight;
    }

    /// Index-encoded O(1) lookup: the token *is* the index.
    #[inline]
    pub fn find_by_token(&self, token: u64) -> Option<&IoSlot> {
        self.slots.get(token as usize)
    }

    #[inline]
    pub fn get(&self, index: usize) -> &IoSlot {
        &self.slots[index]
    }

    /// Mark a slot completed. Returns the slot's submit timestamp so the
    /// caller can compute latency before recycling.
    pub fn mark_completed(&mut self, index: usize) -> u64 {
        let slot = &mut self.slots[index];
        debug_assert!(matches!(slot.state, SlotState::InFlight));
        slot.state = SlotState::Completed;
        slot.submit_ticks
    }

    /// Return a completed (or in-flight, for abandon-on-drain) slot to idle.
    pub fn recycle(&mut self, index: usize) {
        self.slots[index].state = SlotState::Idle;
    }

    pub fn is_idle(&self, index: usize) -> bool {
        matches!(self.slots[index].state, SlotState::Idle)
    }

    /// Indices of every slot not currently idle, for drain bookkeeping.
    pub fn outstanding(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .filter(|s| !matches!(s.state, SlotState::Idle))
            .map(|s| s.index)
    }
}
