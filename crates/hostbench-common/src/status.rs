//! Benchmark lifecycle states
//!
//! `Idle -> Prepared -> Running* -> CleanedUp`, linear, with no way back to
//! `Prepared` once cleaned up.

/// Lifecycle state of a benchmark controller
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LifecycleState {
    /// Nothing has touched the hosts yet
    #[default]
    Idle,
    /// Prepare completed; servers started and handles recorded
    Prepared,
    /// At least one run has been issued
    Running,
    /// Cleanup has been attempted; terminal
    #[strum(to_string = "cleanedup", serialize = "cleaned_up")]
    CleanedUp,
}

impl LifecycleState {
    /// Whether `prepare` may be called from this state
    pub fn can_prepare(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether `run` may be called from this state
    pub fn can_run(self) -> bool {
        matches!(self, Self::Prepared | Self::Running)
    }

    /// Check if the state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::CleanedUp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(LifecycleState::Idle.can_prepare());
        assert!(!LifecycleState::Idle.can_run());
        assert!(LifecycleState::Prepared.can_run());
        assert!(LifecycleState::Running.can_run());
        assert!(!LifecycleState::Running.can_prepare());
        assert!(!LifecycleState::CleanedUp.can_prepare());
        assert!(!LifecycleState::CleanedUp.can_run());
        assert!(LifecycleState::CleanedUp.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(LifecycleState::Prepared.to_string(), "prepared");
        assert_eq!("cleaned_up".parse::<LifecycleState>().unwrap(), LifecycleState::CleanedUp);
    }
}
