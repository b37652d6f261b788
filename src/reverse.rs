//! Reverse accumulation over a [`BufferPlan`].

use crate::diffop::LocalExpansion;
use crate::forward::ValueTape;
use crate::graph::Graph;
use crate::plan::{BufferPlan, Dest};

/// Working storage of one sweep, sized by the plan.
///
/// Tracks which slots hold a live value so the observed peak can be compared
/// with the plan's prediction.
#[derive(Clone, Debug, Default)]
pub struct AccumulatorBuffer {
    values: Vec<f64>,
    occupied: Vec<bool>,
    live: usize,
    peak: usize,
}

impl AccumulatorBuffer {
    pub fn new() -> Self {
        AccumulatorBuffer::default()
    }

    pub fn with_slots(slots: usize) -> Self {
        let mut buf = AccumulatorBuffer::new();
        buf.reset(slots);
        buf
    }

    /// Clear and resize to exactly `slots` slots.
    pub fn reset(&mut self, slots: usize) {
        self.values.clear();
        self.values.resize(slots, 0.0);
        self.occupied.clear();
        self.occupied.resize(slots, false);
        self.live = 0;
        self.peak = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slots currently holding a value.
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Largest number of simultaneously live slots since the last reset.
    #[inline]
    pub fn peak(&self) -> usize {
        self.peak
    }

    #[inline]
    fn add(&mut self, slot: u32, v: f64) {
        let s = slot as usize;
        assert!(
            s < self.values.len(),
            "accumulator slot {s} outside the planned buffer of {} slots",
            self.values.len()
        );
        if !self.occupied[s] {
            self.occupied[s] = true;
            self.live += 1;
            self.peak = self.peak.max(self.live);
        }
        self.values[s] += v;
    }

    #[inline]
    fn take(&mut self, slot: u32) -> f64 {
        let s = slot as usize;
        assert!(
            s < self.values.len() && self.occupied[s],
            "accumulator slot {s} read while empty"
        );
        self.occupied[s] = false;
        self.live -= 1;
        std::mem::take(&mut self.values[s])
    }
}

/// Run the planned sweep: seed the root with `seed` and push Taylor
/// coefficients down to the targets. Returns one coefficient per distinct
/// target of `plan`, in the plan's target order.
///
/// # Panics
///
/// Panics if `tape` or `plan` belong to another graph, or if the plan's slot
/// accounting is violated.
pub fn accumulate(
    graph: &Graph,
    plan: &BufferPlan,
    tape: &ValueTape,
    seed: f64,
    buffer: &mut AccumulatorBuffer,
) -> Vec<f64> {
    assert_eq!(tape.len(), graph.len(), "value tape does not match graph");
    assert_eq!(plan.graph_len(), graph.len(), "plan does not match graph");

    buffer.reset(plan.slot_count());
    let mut out = vec![0.0; plan.targets().len()];
    match plan.root_dest() {
        Some(Dest::Slot(s)) => buffer.add(s, seed),
        Some(Dest::Target(t)) => out[t as usize] += seed,
        None => {}
    }

    for entry in plan.schedule() {
        if !entry.has_terms() {
            for step in &entry.steps {
                buffer.take(step.source);
            }
            continue;
        }
        let local = LocalExpansion::new(
            graph,
            entry.node,
            tape,
            plan.expansion_pattern(),
            entry.max_power,
            entry.max_exponent,
        );
        for step in &entry.steps {
            let v = buffer.take(step.source);
            for c in &step.contributions {
                let w = v * local.coefficient(step.power, c.ea, c.eb);
                match c.dest {
                    Dest::Slot(s) => buffer.add(s, w),
                    Dest::Target(t) => out[t as usize] += w,
                }
            }
        }
    }
    debug_assert_eq!(buffer.live(), 0);
    out
}
