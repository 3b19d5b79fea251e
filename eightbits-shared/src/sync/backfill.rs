use tracing::{debug, info};

use crate::models::{HistoryRequest, SequenceId};

/// Where a shard's history backfill stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackfillState {
    /// No request outstanding; the next top-of-scroll may ask for more.
    #[default]
    Idle,
    /// A request was published and no page or failure came back yet.
    InFlight { generation: u64 },
    /// The outstanding request failed. Only an explicit retry re-arms it.
    Stalled { generation: u64 },
    /// The oldest post of the shard is already shown.
    Exhausted,
}

impl BackfillState {
    /// Generation of the request still awaiting an answer.
    #[must_use]
    pub const fn in_flight(self) -> Option<u64> {
        match self {
            Self::InFlight { generation } => Some(generation),
            _ => None,
        }
    }
}

/// Admits at most one history request per shard at a time.
#[derive(Debug, Default)]
pub struct BackfillGate {
    state: BackfillState,
    generation: u64,
}

impl BackfillGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> BackfillState {
        self.state
    }

    /// Generation of the most recent request, `0` before the first.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self.state, BackfillState::InFlight { .. })
    }

    /// Whether a reply for `generation` answers the outstanding request.
    /// Replies to requests abandoned by a failure or a reset do not.
    #[must_use]
    pub fn accepts(&self, generation: u64) -> bool {
        self.state.in_flight() == Some(generation)
    }

    /// Opens a request for the page ending at `end`, or returns `None` if a
    /// request is outstanding or there is nothing older to fetch.
    pub fn try_begin(&mut self, end: u64, count: u32) -> Option<HistoryRequest> {
        match self.state {
            BackfillState::Idle | BackfillState::Stalled { .. } => {
                self.generation += 1;
                self.state = BackfillState::InFlight {
                    generation: self.generation,
                };
                debug!(generation = self.generation, end, count, "history request opened");
                Some(HistoryRequest::ending_at(end, count).with_generation(self.generation))
            }
            BackfillState::InFlight { .. } | BackfillState::Exhausted => None,
        }
    }

    /// Closes the outstanding request after its page was merged.
    ///
    /// A page that added nothing, or a marker already at the first sequence,
    /// means there is no older history left.
    pub fn complete(&mut self, inserted: usize, lowest: Option<SequenceId>) {
        if !self.is_in_flight() {
            return;
        }
        if inserted == 0 || lowest == Some(SequenceId::FIRST) {
            info!(generation = self.generation, "history exhausted");
            self.state = BackfillState::Exhausted;
        } else {
            self.state = BackfillState::Idle;
        }
    }

    /// Marks the outstanding request as failed.
    pub fn fail(&mut self) {
        if let BackfillState::InFlight { generation } = self.state {
            debug!(generation, "history request stalled");
            self.state = BackfillState::Stalled { generation };
        }
    }

    /// Forgets any outstanding request.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = BackfillState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(value: u64) -> Option<SequenceId> {
        SequenceId::new(value)
    }

    #[test]
    fn only_one_request_at_a_time() {
        let mut gate = BackfillGate::new();

        let first = gate.try_begin(0, 100);
        assert_eq!(first, Some(HistoryRequest::ending_at(0, 100).with_generation(1)));
        assert_eq!(gate.state(), BackfillState::InFlight { generation: 1 });

        assert_eq!(gate.try_begin(0, 100), None);
        assert_eq!(gate.try_begin(40, 100), None);
    }

    #[test]
    fn completion_rearms_the_gate() {
        let mut gate = BackfillGate::new();
        gate.try_begin(0, 100);
        gate.complete(100, seq(400));
        assert_eq!(gate.state(), BackfillState::Idle);

        let next = gate.try_begin(400, 100);
        assert_eq!(next, Some(HistoryRequest::ending_at(400, 100).with_generation(2)));
        assert_eq!(gate.generation(), 2);
    }

    #[test]
    fn empty_page_exhausts() {
        let mut gate = BackfillGate::new();
        gate.try_begin(12, 100);
        gate.complete(0, seq(12));
        assert_eq!(gate.state(), BackfillState::Exhausted);
        assert_eq!(gate.try_begin(12, 100), None);
    }

    #[test]
    fn reaching_first_sequence_exhausts() {
        let mut gate = BackfillGate::new();
        gate.try_begin(0, 100);
        gate.complete(37, seq(1));
        assert_eq!(gate.state(), BackfillState::Exhausted);
    }

    #[test]
    fn failure_stalls_until_retry() {
        let mut gate = BackfillGate::new();
        gate.try_begin(80, 20);
        gate.fail();
        assert_eq!(gate.state(), BackfillState::Stalled { generation: 1 });

        let retry = gate.try_begin(80, 20);
        assert_eq!(retry, Some(HistoryRequest::ending_at(80, 20).with_generation(2)));
        assert_eq!(gate.state(), BackfillState::InFlight { generation: 2 });
    }

    #[test]
    fn stray_signals_are_ignored() {
        let mut gate = BackfillGate::new();
        gate.complete(0, None);
        gate.fail();
        assert_eq!(gate.state(), BackfillState::Idle);
    }

    #[test]
    fn only_the_outstanding_generation_is_accepted() {
        let mut gate = BackfillGate::new();
        assert!(!gate.accepts(0));

        gate.try_begin(0, 100);
        assert!(gate.accepts(1));
        assert!(!gate.accepts(0));

        gate.reset();
        gate.try_begin(0, 100);
        assert!(!gate.accepts(1));
        assert!(gate.accepts(3));

        gate.fail();
        assert!(!gate.accepts(3));
    }

    #[test]
    fn reset_reopens_exhausted_gate() {
        let mut gate = BackfillGate::new();
        gate.try_begin(0, 100);
        gate.complete(0, None);
        gate.reset();
        assert_eq!(gate.state(), BackfillState::Idle);
        assert!(gate.try_begin(0, 100).is_some());
        assert_eq!(gate.generation(), 3);
    }
}
