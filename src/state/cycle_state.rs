use std::fmt;

/// Phases of one source's crawl cycle
///
/// `Idle -> RangeComputed -> Fetching -> WatermarkAdvancing -> Idle`. A fatal
/// error may drop back to `Idle` from any phase without passing through
/// `WatermarkAdvancing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    Idle,
    RangeComputed,
    Fetching,
    WatermarkAdvancing,
}

impl CycleState {
    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: CycleState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::RangeComputed)
                | (Self::RangeComputed, Self::Fetching)
                | (Self::Fetching, Self::WatermarkAdvancing)
                | (Self::WatermarkAdvancing, Self::Idle)
                | (Self::RangeComputed, Self::Idle)
                | (Self::Fetching, Self::Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RangeComputed => "range_computed",
            Self::Fetching => "fetching",
            Self::WatermarkAdvancing => "watermark_advancing",
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(CycleState::Idle.can_transition_to(CycleState::RangeComputed));
        assert!(CycleState::RangeComputed.can_transition_to(CycleState::Fetching));
        assert!(CycleState::Fetching.can_transition_to(CycleState::WatermarkAdvancing));
        assert!(CycleState::WatermarkAdvancing.can_transition_to(CycleState::Idle));
    }

    #[test]
    fn test_abort_transitions() {
        assert!(CycleState::RangeComputed.can_transition_to(CycleState::Idle));
        assert!(CycleState::Fetching.can_transition_to(CycleState::Idle));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!CycleState::Idle.can_transition_to(CycleState::Fetching));
        assert!(!CycleState::Idle.can_transition_to(CycleState::WatermarkAdvancing));
        assert!(!CycleState::RangeComputed.can_transition_to(CycleState::WatermarkAdvancing));
        assert!(!CycleState::WatermarkAdvancing.can_transition_to(CycleState::Fetching));
    }
}
