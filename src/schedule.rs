//! Division scheduling.
//!
//! Between two frame boundaries the engine owes the accumulator one
//! multiply-accumulate per valid impulse response division (except division 0,
//! which is folded in at the boundary itself). Instead of doing all of them at
//! once, the work is spread linearly over the host calls of the frame period.
//! Every function here takes the current counters by value and returns the
//! next ones, so the policy can be exercised without an engine.

/// Division counters for the current frame period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrCounters {
    /// Divisions multiplied so far this period.
    pub written: usize,
    /// Divisions currently valid. Ramps from 1 to the division count after reset.
    pub read: usize,
    /// Scheduling sub-step within the period.
    pub count: usize,
}

impl IrCounters {
    pub fn reset() -> Self {
        Self {
            written: 0,
            read: 1,
            count: 0,
        }
    }

    /// Divisions still owed before the next boundary.
    pub fn outstanding(&self) -> usize {
        self.read.saturating_sub(1).saturating_sub(self.written)
    }

    /// Divisions to multiply at this sub-step.
    ///
    /// `ratio` is the number of sub-steps expected per period minus one. Up to
    /// it the cumulative target grows linearly with `count`; from it on, or on
    /// the sub-step that reaches the boundary, everything outstanding is due.
    pub fn due(&self, ratio: isize, final_step: bool) -> usize {
        let outstanding = self.outstanding();
        if final_step || self.count as isize >= ratio {
            return outstanding;
        }
        let target = self.count * (self.read - 1) / ratio as usize;
        target.saturating_sub(self.written).min(outstanding)
    }
}

impl Default for IrCounters {
    fn default() -> Self {
        Self::reset()
    }
}

/// Pointers into the process ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessCounters {
    /// Slot receiving the next boundary frame.
    pub current: usize,
    /// Next slot to pair with an impulse response division. May equal the
    /// ring capacity, in which case the next pass starts at slot 0.
    pub previous: usize,
}

/// One run of consecutive multiply-accumulates: ring slot `ring_start + j`
/// against IR division `ir_start + j` for `j < len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisionBatch {
    pub ring_start: usize,
    pub ir_start: usize,
    pub len: usize,
}

/// Work for one sub-step. A ring wrap splits it into at most two batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepPlan {
    batches: [Option<DivisionBatch>; 2],
}

impl StepPlan {
    pub fn batches(&self) -> impl Iterator<Item = DivisionBatch> + '_ {
        self.batches.iter().flatten().copied()
    }

    pub fn divisions(&self) -> usize {
        self.batches().map(|batch| batch.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches[0].is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleState {
    pub ir: IrCounters,
    pub process: ProcessCounters,
}

impl ScheduleState {
    pub fn reset() -> Self {
        Self {
            ir: IrCounters::reset(),
            process: ProcessCounters::default(),
        }
    }

    /// Sub-steps a period is expected to take for host blocks of `block_size`,
    /// minus one. Negative when a block spans more than one period.
    pub fn ratio(half_length: usize, block_size: usize) -> isize {
        (half_length / block_size) as isize - 1
    }

    /// Runs one scheduling sub-step and returns the next state with the
    /// divisions to multiply.
    pub fn advance(mut self, ratio: isize, ring_len: usize, final_step: bool) -> (Self, StepPlan) {
        let mut plan = StepPlan::default();
        self.ir.count += 1;

        for pass in 0..plan.batches.len() {
            if self.ir.outstanding() == 0 {
                break;
            }

            let mut due = self.ir.due(ratio, final_step);
            let start = if self.process.previous >= ring_len {
                0
            } else {
                self.process.previous
            };

            let wrapped = start + due > ring_len;
            if wrapped {
                due = ring_len - start;
            }
            self.process.previous = start + due;

            if due > 0 {
                plan.batches[pass] = Some(DivisionBatch {
                    ring_start: start,
                    ir_start: self.ir.written + 1,
                    len: due,
                });
                self.ir.written += due;
            }

            if !wrapped {
                break;
            }
            debug_assert!(pass == 0, "division run wrapped the ring twice");
        }

        debug_assert!(self.ir.written < self.ir.read);
        (self, plan)
    }

    /// Frame boundary, first half: one more division becomes valid.
    pub fn open_boundary(mut self, num_ir_divisions: usize) -> Self {
        debug_assert_eq!(self.ir.outstanding(), 0, "boundary with divisions owed");
        self.ir.read = (self.ir.read + 1).min(num_ir_divisions);
        self
    }

    /// Frame boundary, second half: the frame just written at `current`
    /// becomes the newest history entry and the period counters restart.
    pub fn close_boundary(mut self, ring_len: usize) -> Self {
        self.process.previous = self.process.current;
        self.process.current = (self.process.current + ring_len - 1) % ring_len;
        self.ir.written = 0;
        self.ir.count = 0;
        self
    }
}
