//! Shared worker pool.
//!
//! Units request workers out of the unemployed pool and hand them back when
//! paused below their limit or removed. The pool grows in recruitment waves
//! towards the housing limit; the wave size depends on a satisfaction level
//! that drifts with unemployment and homelessness.

use crate::config::WorkforceConfig;
use crate::event::Event;
use crate::fixed::{Fixed64, ratio};

#[derive(Debug, Clone)]
pub struct WorkforceAllocator {
    config: WorkforceConfig,
    worker_limit: u32,
    worker_count: u32,
    unemployed: u32,
    satisfaction: Fixed64,
    /// Last drift rate applied to satisfaction, per second.
    modifier: Fixed64,
    recruitment_timer: Fixed64,
    satisfaction_delay: Fixed64,
    outbox: Vec<Event>,
}

impl WorkforceAllocator {
    /// Inverted satisfaction bounds are swapped rather than rejected.
    pub fn new(mut config: WorkforceConfig) -> Self {
        if config.min_satisfaction > config.max_satisfaction {
            tracing::warn!(
                min = %config.min_satisfaction,
                max = %config.max_satisfaction,
                "satisfaction bounds inverted, swapping"
            );
            std::mem::swap(&mut config.min_satisfaction, &mut config.max_satisfaction);
        }
        let base = config.base_limit;
        let satisfaction = config
            .initial_satisfaction
            .clamp(config.min_satisfaction, config.max_satisfaction);
        let satisfaction_delay = config.satisfaction_start_delay;
        Self {
            config,
            worker_limit: base,
            worker_count: base,
            unemployed: base,
            satisfaction,
            modifier: Fixed64::ZERO,
            recruitment_timer: Fixed64::ZERO,
            satisfaction_delay,
            outbox: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Hand out up to `amount` unemployed workers. Returns how many were
    /// granted; a shortfall is not an error.
    pub fn request_workers(&mut self, amount: u32) -> u32 {
        let granted = self.unemployed.min(amount);
        if granted > 0 {
            self.unemployed -= granted;
            self.outbox.push(Event::UnemployedChanged {
                unemployed: self.unemployed,
            });
        }
        granted
    }

    /// Return workers to the unemployed pool. The pool never exceeds the
    /// worker count.
    pub fn release_workers(&mut self, amount: u32) {
        if amount == 0 {
            return;
        }
        let unemployed = self
            .unemployed
            .saturating_add(amount)
            .min(self.worker_count);
        if unemployed != self.unemployed {
            self.unemployed = unemployed;
            self.outbox.push(Event::UnemployedChanged { unemployed });
        }
    }

    /// Housing built (+) or demolished (-). The limit never goes below zero;
    /// workers above it become homeless rather than leaving.
    pub fn adjust_worker_limit(&mut self, delta: i32) {
        let limit = (i64::from(self.worker_limit) + i64::from(delta)).clamp(0, i64::from(u32::MAX));
        self.worker_limit = limit as u32;
        self.outbox.push(Event::WorkerLimitChanged {
            limit: self.worker_limit,
        });
    }

    // -----------------------------------------------------------------------
    // Per-step updates
    // -----------------------------------------------------------------------

    /// Advance the recruitment timer. Below the limit a wave arrives every
    /// replenishment interval; recruits join the unemployed pool.
    pub fn update_recruitment(&mut self, dt: Fixed64) {
        if self.worker_count >= self.worker_limit {
            self.recruitment_timer = Fixed64::ZERO;
            return;
        }
        self.recruitment_timer += dt;
        if self.recruitment_timer < self.config.replenishment_interval {
            return;
        }
        self.recruitment_timer = Fixed64::ZERO;

        let room = self.worker_limit - self.worker_count;
        let recruits = self.recruitment_yield().min(room);
        if recruits == 0 {
            return;
        }
        self.worker_count += recruits;
        self.unemployed += recruits;
        tracing::trace!(recruits, count = self.worker_count, "recruitment wave");
        self.outbox.push(Event::WorkerCountChanged {
            count: self.worker_count,
        });
        self.outbox.push(Event::UnemployedChanged {
            unemployed: self.unemployed,
        });
    }

    /// Drift satisfaction by the unemployment and homelessness effects.
    pub fn update_satisfaction(&mut self, dt: Fixed64) {
        if self.satisfaction_delay > Fixed64::ZERO {
            self.satisfaction_delay -= dt;
            return;
        }

        let modifier = self.unemployment_effect() + self.homelessness_effect();
        let level = (self.satisfaction + modifier * dt)
            .clamp(self.config.min_satisfaction, self.config.max_satisfaction);
        let changed = level != self.satisfaction || modifier != self.modifier;
        self.satisfaction = level;
        self.modifier = modifier;
        if changed {
            self.outbox.push(Event::SatisfactionChanged { level, modifier });
        }
    }

    // -----------------------------------------------------------------------
    // Rates
    // -----------------------------------------------------------------------

    /// Recruits per wave at the current satisfaction.
    pub fn recruitment_yield(&self) -> u32 {
        let s = self.satisfaction;
        let c = &self.config;
        if s >= Fixed64::from_num(5) {
            c.yield_highest
        } else if s >= Fixed64::from_num(4) {
            c.yield_high
        } else if s >= Fixed64::from_num(3) {
            c.yield_medium
        } else if s >= Fixed64::from_num(2) {
            c.yield_low
        } else {
            c.yield_lowest
        }
    }

    /// Unemployed share of the workforce, 0 with no workers.
    pub fn unemployment_rate(&self) -> Fixed64 {
        ratio(self.unemployed, self.worker_count)
    }

    pub fn homeless(&self) -> u32 {
        self.worker_count.saturating_sub(self.worker_limit)
    }

    pub fn unemployment_effect(&self) -> Fixed64 {
        let rate = self.unemployment_rate();
        let c = &self.config;
        if rate == Fixed64::ZERO {
            c.no_unemployment_effect
        } else if rate <= Fixed64::from_num(0.1) {
            c.low_unemployment_effect
        } else if rate <= Fixed64::from_num(0.3) {
            c.medium_unemployment_effect
        } else {
            c.high_unemployment_effect
        }
    }

    pub fn homelessness_effect(&self) -> Fixed64 {
        let percent = ratio(self.homeless(), self.worker_count) * Fixed64::from_num(100);
        -(percent * self.config.homelessness_factor)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn worker_limit(&self) -> u32 {
        self.worker_limit
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    pub fn unemployed(&self) -> u32 {
        self.unemployed
    }

    pub fn employed(&self) -> u32 {
        self.worker_count - self.unemployed
    }

    pub fn satisfaction(&self) -> Fixed64 {
        self.satisfaction
    }

    pub fn satisfaction_modifier(&self) -> Fixed64 {
        self.modifier
    }

    pub fn config(&self) -> &WorkforceConfig {
        &self.config
    }

    /// Take the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn pool(base: u32) -> WorkforceAllocator {
        WorkforceAllocator::new(WorkforceConfig {
            base_limit: base,
            ..WorkforceConfig::default()
        })
    }

    #[test]
    fn initial_state_is_all_unemployed() {
        let wf = pool(10);
        assert_eq!(wf.worker_limit(), 10);
        assert_eq!(wf.worker_count(), 10);
        assert_eq!(wf.unemployed(), 10);
        assert_eq!(wf.satisfaction(), fixed(3.0));
    }

    #[test]
    fn request_grants_partial() {
        let mut wf = pool(5);
        assert_eq!(wf.request_workers(3), 3);
        assert_eq!(wf.request_workers(3), 2);
        assert_eq!(wf.request_workers(1), 0);
        assert_eq!(wf.unemployed(), 0);
        assert_eq!(wf.employed(), 5);
    }

    #[test]
    fn release_is_bounded_by_worker_count() {
        let mut wf = pool(5);
        wf.request_workers(2);
        wf.release_workers(10);
        assert_eq!(wf.unemployed(), 5);
    }

    #[test]
    fn adjust_limit_never_negative() {
        let mut wf = pool(5);
        wf.adjust_worker_limit(-20);
        assert_eq!(wf.worker_limit(), 0);
        assert_eq!(wf.homeless(), 5);
        wf.adjust_worker_limit(8);
        assert_eq!(wf.worker_limit(), 8);
    }

    #[test]
    fn recruitment_waits_for_interval() {
        let mut wf = pool(0);
        wf.adjust_worker_limit(10);
        wf.update_recruitment(fixed(2.0));
        assert_eq!(wf.worker_count(), 0);
        wf.update_recruitment(fixed(0.5));
        // satisfaction 3 -> medium tier
        assert_eq!(wf.worker_count(), 2);
        assert_eq!(wf.unemployed(), 2);
    }

    #[test]
    fn recruitment_clamped_to_limit() {
        let mut wf = pool(9);
        wf.adjust_worker_limit(1);
        wf.update_recruitment(fixed(2.5));
        assert_eq!(wf.worker_count(), 10);
        wf.update_recruitment(fixed(10.0));
        assert_eq!(wf.worker_count(), 10);
    }

    #[test]
    fn recruitment_tiers_follow_satisfaction() {
        let mut wf = pool(0);
        for (level, expected) in [(5.0, 5), (4.5, 3), (3.0, 2), (2.0, 1), (1.0, 1)] {
            wf.satisfaction = fixed(level);
            assert_eq!(wf.recruitment_yield(), expected, "level {level}");
        }
    }

    #[test]
    fn unemployment_tiers() {
        let mut wf = pool(100);
        let cfg = wf.config().clone();
        assert_eq!(wf.unemployment_effect(), cfg.high_unemployment_effect);
        wf.request_workers(75); // 25% unemployed
        assert_eq!(wf.unemployment_effect(), cfg.medium_unemployment_effect);
        wf.request_workers(20); // 5%
        assert_eq!(wf.unemployment_effect(), cfg.low_unemployment_effect);
        wf.request_workers(5); // 0%
        assert_eq!(wf.unemployment_effect(), cfg.no_unemployment_effect);
    }

    #[test]
    fn zero_workers_treated_as_zero_rates() {
        let wf = pool(0);
        assert_eq!(wf.unemployment_rate(), Fixed64::ZERO);
        assert_eq!(wf.homelessness_effect(), Fixed64::ZERO);
    }

    #[test]
    fn homelessness_effect_scales_with_percent() {
        let mut wf = pool(10);
        wf.adjust_worker_limit(-5); // 5 of 10 homeless = 50%
        assert_eq!(wf.homelessness_effect(), -(fixed(50.0) * fixed(0.01)));
    }

    #[test]
    fn satisfaction_waits_for_start_delay() {
        let mut wf = pool(10);
        wf.update_satisfaction(fixed(0.5));
        assert_eq!(wf.satisfaction(), fixed(3.0));
        wf.update_satisfaction(fixed(0.5));
        assert_eq!(wf.satisfaction(), fixed(3.0));
        // all unemployed -> high unemployment drift
        wf.update_satisfaction(fixed(1.0));
        assert!(wf.satisfaction() < fixed(3.0));
    }

    #[test]
    fn satisfaction_clamped_to_bounds() {
        let mut wf = pool(10);
        wf.update_satisfaction(fixed(1.0));
        for _ in 0..1000 {
            wf.update_satisfaction(fixed(1.0));
        }
        assert_eq!(wf.satisfaction(), fixed(1.0));

        wf.request_workers(10);
        for _ in 0..1000 {
            wf.update_satisfaction(fixed(1.0));
        }
        assert_eq!(wf.satisfaction(), fixed(5.0));
    }

    #[test]
    fn events_recorded_in_outbox() {
        let mut wf = pool(4);
        wf.request_workers(1);
        wf.adjust_worker_limit(2);
        assert_eq!(
            wf.drain_events(),
            vec![
                Event::UnemployedChanged { unemployed: 3 },
                Event::WorkerLimitChanged { limit: 6 },
            ]
        );
        assert!(wf.drain_events().is_empty());
    }

    #[test]
    fn inverted_bounds_are_swapped() {
        let mut wf = WorkforceAllocator::new(WorkforceConfig {
            base_limit: 4,
            min_satisfaction: fixed(0.9),
            max_satisfaction: fixed(0.1),
            initial_satisfaction: fixed(3.0),
            satisfaction_start_delay: Fixed64::ZERO,
            ..WorkforceConfig::default()
        });
        assert_eq!(wf.satisfaction(), fixed(0.9));

        // everyone idle drags satisfaction down to the lower bound
        for _ in 0..100 {
            wf.update_satisfaction(fixed(1.0));
        }
        assert_eq!(wf.satisfaction(), fixed(0.1));
    }
}
