//! Timebase lifecycle state

/// Lifecycle state of a timebase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimebaseState {
    /// Created but timer not yet programmed
    #[default]
    Uninitialized,
    /// Overflow interrupt enabled, counters advancing
    Running,
    /// Overflow interrupt disabled, counters frozen
    Stopped,
}

/// Lifecycle operations that can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    Init,
    Stop,
    Restart,
    Set,
}

/// A lifecycle operation was requested from a state that does not allow it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LifecycleError {
    /// State the timebase was in
    pub state: TimebaseState,
    /// Operation that was refused
    pub transition: Transition,
}

impl TimebaseState {
    /// State reached by applying `transition`, if allowed
    pub fn apply(self, transition: Transition) -> Result<TimebaseState, LifecycleError> {
        let next = match (self, transition) {
            (TimebaseState::Uninitialized, Transition::Init) => TimebaseState::Running,
            (TimebaseState::Running, Transition::Stop) => TimebaseState::Stopped,
            (TimebaseState::Stopped, Transition::Restart) => TimebaseState::Running,
            (TimebaseState::Running | TimebaseState::Stopped, Transition::Set) => self,
            (state, transition) => return Err(LifecycleError { state, transition }),
        };
        Ok(next)
    }

    /// Check if the overflow interrupt should be live
    pub fn is_running(&self) -> bool {
        matches!(self, TimebaseState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_lifecycle() {
        let state = TimebaseState::default();
        let state = state.apply(Transition::Init).unwrap();
        assert_eq!(state, TimebaseState::Running);
        let state = state.apply(Transition::Stop).unwrap();
        assert_eq!(state, TimebaseState::Stopped);
        let state = state.apply(Transition::Restart).unwrap();
        assert!(state.is_running());
    }

    #[test]
    fn test_set_keeps_state() {
        assert_eq!(
            TimebaseState::Stopped.apply(Transition::Set),
            Ok(TimebaseState::Stopped)
        );
        assert_eq!(
            TimebaseState::Running.apply(Transition::Set),
            Ok(TimebaseState::Running)
        );
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(
            TimebaseState::Running.apply(Transition::Init),
            Err(LifecycleError {
                state: TimebaseState::Running,
                transition: Transition::Init,
            })
        );
        assert!(TimebaseState::Uninitialized.apply(Transition::Stop).is_err());
        assert!(TimebaseState::Uninitialized.apply(Transition::Set).is_err());
        assert!(TimebaseState::Running.apply(Transition::Restart).is_err());
        assert!(TimebaseState::Stopped.apply(Transition::Stop).is_err());
    }
}
