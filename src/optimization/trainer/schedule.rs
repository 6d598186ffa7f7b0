//! One-cycle learning-rate schedule evaluated per optimizer step.
//!
//! [`OneCycle`] turns an [`LrSchedule`] plus a peak rate and a step budget into
//! a pure function `step → (learning rate, phase)`. Steps are minibatch
//! updates, counted from zero across the whole run.
use crate::optimization::trainer::traits::{LrSchedule, TrainingPhase};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneCycle {
    max_lr: f64,
    initial_lr: f64,
    min_lr: f64,
    total_steps: usize,
    warmup_steps: usize,
}

impl OneCycle {
    /// Build the schedule for `total_steps` optimizer steps peaking at `max_lr`.
    ///
    /// `total_steps` is floored at 1 so that degenerate runs still have a
    /// well-defined annealing segment.
    pub fn new(max_lr: f64, total_steps: usize, schedule: &LrSchedule) -> Self {
        let total_steps = total_steps.max(1);
        let initial_lr = max_lr / schedule.div_factor;
        let min_lr = initial_lr / schedule.final_div_factor;
        let warmup_steps = ((schedule.pct_start * total_steps as f64).round() as usize)
            .min(total_steps.saturating_sub(1));
        Self { max_lr, initial_lr, min_lr, total_steps, warmup_steps }
    }

    /// Learning rate for optimizer step `step`.
    pub fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup_steps {
            let frac = step as f64 / self.warmup_steps as f64;
            return self.initial_lr + (self.max_lr - self.initial_lr) * frac;
        }
        let anneal_steps = (self.total_steps - self.warmup_steps).max(1);
        let frac = ((step - self.warmup_steps) as f64 / anneal_steps as f64).min(1.0);
        self.min_lr + (self.max_lr - self.min_lr) * 0.5 * (1.0 + (PI * frac).cos())
    }

    /// Phase of the run at optimizer step `step`.
    pub fn phase_at(&self, step: usize) -> TrainingPhase {
        if step < self.warmup_steps { TrainingPhase::WarmingUp } else { TrainingPhase::Annealing }
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Endpoints of warm-up and annealing.
    // - Phase boundary.
    // - Property: the rate never leaves [min_lr, max_lr].
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The schedule starts at max/div, peaks at max after warm-up, and decays
    // to max/(div · final_div).
    //
    // Given
    // -----
    // - max_lr = 1, 100 steps, pct_start 0.3, div 10, final_div 10.
    //
    // Expect
    // ------
    // - lr(0) = 0.1, lr(30) = 1.0, lr(100) = 0.01, phase flips at step 30.
    fn endpoints_and_phase_boundary() {
        let sched = OneCycle::new(1.0, 100, &LrSchedule::default());

        assert_relative_eq!(sched.lr_at(0), 0.1, epsilon = 1e-12);
        assert_relative_eq!(sched.lr_at(30), 1.0, epsilon = 1e-12);
        assert_relative_eq!(sched.lr_at(100), 0.01, epsilon = 1e-12);
        assert_eq!(sched.phase_at(29), TrainingPhase::WarmingUp);
        assert_eq!(sched.phase_at(30), TrainingPhase::Annealing);
    }

    #[test]
    // Purpose
    // -------
    // With no warm-up the run starts annealing from the peak immediately.
    fn zero_warmup_starts_at_peak() {
        let schedule = LrSchedule::new(0.0, 10.0, 10.0).unwrap();
        let sched = OneCycle::new(0.5, 10, &schedule);

        assert_relative_eq!(sched.lr_at(0), 0.5, epsilon = 1e-12);
        assert_eq!(sched.phase_at(0), TrainingPhase::Annealing);
    }

    proptest! {
        #[test]
        fn lr_stays_within_bounds(total in 1usize..500, step in 0usize..600, pct in 0.0f64..0.95) {
            let schedule = LrSchedule::new(pct, 10.0, 100.0).unwrap();
            let sched = OneCycle::new(0.2, total, &schedule);
            let lr = sched.lr_at(step);
            prop_assert!(lr >= 0.2 / 1000.0 - 1e-12);
            prop_assert!(lr <= 0.2 + 1e-12);
        }
    }
}
