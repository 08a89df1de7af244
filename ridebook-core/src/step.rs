//! The booking flow's finite step set and the rules for moving between steps.
//!
//! Everything here is pure. The state store asks [`evaluate`] before touching
//! `step`, and the cache gate and reconciler ask [`is_durable`] before
//! persisting anything.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const FIRST_STEP: u8 = 1;
pub const PAYMENT_STEP: u8 = 5;
pub const FINAL_STEP: u8 = 6;

/// Canonical name of each step in the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    SelectingDepartureStation,
    SelectedDepartureStation,
    SelectingArrivalStation,
    SelectedArrivalStation,
    Payment,
    Finalizing,
}

impl StepName {
    /// Name for a step number. Anything outside `1..=6` falls back to the
    /// first step.
    pub fn for_step(step: u8) -> Self {
        match step {
            1 => StepName::SelectingDepartureStation,
            2 => StepName::SelectedDepartureStation,
            3 => StepName::SelectingArrivalStation,
            4 => StepName::SelectedArrivalStation,
            5 => StepName::Payment,
            6 => StepName::Finalizing,
            _ => StepName::SelectingDepartureStation,
        }
    }

    pub fn step(self) -> u8 {
        match self {
            StepName::SelectingDepartureStation => 1,
            StepName::SelectedDepartureStation => 2,
            StepName::SelectingArrivalStation => 3,
            StepName::SelectedArrivalStation => 4,
            StepName::Payment => 5,
            StepName::Finalizing => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepName::SelectingDepartureStation => "selecting_departure_station",
            StepName::SelectedDepartureStation => "selected_departure_station",
            StepName::SelectingArrivalStation => "selecting_arrival_station",
            StepName::SelectedArrivalStation => "selected_arrival_station",
            StepName::Payment => "payment",
            StepName::Finalizing => "finalizing",
        }
    }
}

impl Default for StepName {
    fn default() -> Self {
        StepName::SelectingDepartureStation
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a step change is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// Ordinary forward/backward navigation driven by the user.
    Navigation,
    /// Restoring an in-progress payment session from the remote store.
    Rehydration,
}

/// Verdict of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Reset,
    Unchanged,
    Advance,
    Rehydrate,
    Reject,
}

impl StepDecision {
    pub fn is_admitted(self) -> bool {
        !matches!(self, StepDecision::Reject)
    }
}

pub fn is_valid_step(step: u8) -> bool {
    (FIRST_STEP..=FINAL_STEP).contains(&step)
}

/// Payment and finalizing are the only steps allowed to outlive a session.
pub fn is_durable(step: u8) -> bool {
    (PAYMENT_STEP..=FINAL_STEP).contains(&step)
}

/// Decide whether moving from `current` to `requested` is allowed.
pub fn evaluate(current: u8, requested: u8, kind: TransitionKind) -> StepDecision {
    if requested == FIRST_STEP {
        return StepDecision::Reset;
    }
    if !is_valid_step(requested) {
        return StepDecision::Reject;
    }
    if requested == current {
        return StepDecision::Unchanged;
    }
    if current.checked_add(1) == Some(requested) {
        return StepDecision::Advance;
    }
    if requested == PAYMENT_STEP && kind == TransitionKind::Rehydration {
        return StepDecision::Rehydrate;
    }
    StepDecision::Reject
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names_round_trip() {
        for step in FIRST_STEP..=FINAL_STEP {
            assert_eq!(StepName::for_step(step).step(), step);
        }
        assert_eq!(StepName::for_step(5).as_str(), "payment");
    }

    #[test]
    fn test_out_of_range_step_falls_back_to_first() {
        assert_eq!(StepName::for_step(0), StepName::SelectingDepartureStation);
        assert_eq!(StepName::for_step(7), StepName::SelectingDepartureStation);
        assert_eq!(StepName::for_step(255).to_string(), "selecting_departure_station");
    }

    #[test]
    fn test_navigation_admits_only_reset_stay_or_next() {
        for current in FIRST_STEP..=FINAL_STEP {
            for requested in 0..=8u8 {
                let admitted = evaluate(current, requested, TransitionKind::Navigation).is_admitted();
                let expected = requested == 1 || requested == current || requested == current + 1;
                let expected = expected && (requested == 1 || is_valid_step(requested));
                assert_eq!(admitted, expected, "{} -> {}", current, requested);
            }
        }
    }

    #[test]
    fn test_rehydration_may_jump_to_payment() {
        assert_eq!(evaluate(1, 5, TransitionKind::Navigation), StepDecision::Reject);
        assert_eq!(evaluate(1, 5, TransitionKind::Rehydration), StepDecision::Rehydrate);
        assert_eq!(evaluate(2, 6, TransitionKind::Rehydration), StepDecision::Reject);
    }

    #[test]
    fn test_durable_steps() {
        assert!(!is_durable(4));
        assert!(is_durable(5));
        assert!(is_durable(6));
        assert!(!is_durable(7));
    }
}
