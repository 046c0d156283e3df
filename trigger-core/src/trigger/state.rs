use std::fmt;

/// Lifecycle of a [Trigger](crate::trigger::Trigger).
///
/// ```text
/// Created -> Pending -> Running <-> Sleep
///    |                     |          |
///    |                     +-> Paused <+
///    |                     |     |    |
///    +-------------------> Stopped <--+ -> Destroyed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerState {
    Created,
    Pending,
    Running,
    /// running, but no event has been seen for longer than the sleep duration.
    Sleep,
    Paused,
    Stopped,
    Destroyed,
}

impl TriggerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerState::Created => "created",
            TriggerState::Pending => "pending",
            TriggerState::Running => "running",
            TriggerState::Sleep => "sleep",
            TriggerState::Paused => "paused",
            TriggerState::Stopped => "stopped",
            TriggerState::Destroyed => "destroyed",
        }
    }

    /// Whether the workers of the trigger are consuming events.
    pub fn is_active(&self) -> bool {
        matches!(self, TriggerState::Running | TriggerState::Sleep)
    }

    /// Every lifecycle change has to be allowed by this table. A trigger which was never started
    /// can be stopped right away.
    pub fn can_transition_to(&self, next: TriggerState) -> bool {
        use TriggerState::{Created, Destroyed, Paused, Pending, Running, Sleep, Stopped};

        matches!(
            (self, next),
            (Created, Pending | Running | Stopped)
                | (Pending, Running | Stopped)
                | (Running, Sleep | Paused | Stopped)
                | (Sleep, Running | Paused | Stopped)
                | (Paused, Stopped)
                | (Stopped, Destroyed)
        )
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::TriggerState;
    use super::TriggerState::{Created, Destroyed, Paused, Pending, Running, Sleep, Stopped};

    const ALL: [TriggerState; 7] = [Created, Pending, Running, Sleep, Paused, Stopped, Destroyed];

    #[test]
    fn test_lifecycle_transitions() {
        assert!(Created.can_transition_to(Running));
        assert!(Created.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Sleep));
        assert!(Sleep.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Sleep.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Destroyed));

        assert!(!Created.can_transition_to(Sleep));
        assert!(!Paused.can_transition_to(Running));
        assert!(!Running.can_transition_to(Created));
    }

    #[test]
    fn test_terminal_states() {
        for next in ALL {
            assert!(!Destroyed.can_transition_to(next));
            assert_eq!(Stopped.can_transition_to(next), next == Destroyed);
        }
    }

    #[test]
    fn test_display() {
        let names: Vec<_> = ALL.iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "created",
                "pending",
                "running",
                "sleep",
                "paused",
                "stopped",
                "destroyed"
            ]
        );
        assert!(Sleep.is_active());
        assert!(!Stopped.is_active());
    }
}
