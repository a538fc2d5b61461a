//! Request lifecycle for the primary analysis and the dependent secondary
//! (handwriting) request.
//!
//! Each kind moves `Idle -> InFlight -> {Succeeded, Failed}`; a new
//! invocation moves a terminal state back to `InFlight`. At most one
//! invocation per kind is in flight. The secondary request is only admitted
//! once the primary's last terminal outcome is `Succeeded`.
//!
//! Admission is a plain check-and-set on the owning thread, done before any
//! worker is spawned, so rapid repeated triggers collapse into one request.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Primary,
    Secondary,
}

impl RequestKind {
    pub fn label(self) -> &'static str {
        match self {
            RequestKind::Primary => "analysis",
            RequestKind::Secondary => "handwriting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Succeeded | RequestState::Failed)
    }
}

/// Handle for one admitted invocation. Completion events must present the
/// ticket they were started with; tickets of superseded invocations are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: RequestKind,
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Started(Ticket),
    /// An invocation of this kind is already running; nothing was started.
    AlreadyInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Run an analysis successfully before generating handwriting.")]
    PrimaryNotSucceeded,
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    state: RequestState,
    current: Option<u64>,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    primary: Slot,
    secondary: Slot,
    /// Last terminal state reached by the primary request
    primary_outcome: Option<RequestState>,
    next_id: u64,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: RequestKind) -> &Slot {
        match kind {
            RequestKind::Primary => &self.primary,
            RequestKind::Secondary => &self.secondary,
        }
    }

    fn slot_mut(&mut self, kind: RequestKind) -> &mut Slot {
        match kind {
            RequestKind::Primary => &mut self.primary,
            RequestKind::Secondary => &mut self.secondary,
        }
    }

    pub fn state(&self, kind: RequestKind) -> RequestState {
        self.slot(kind).state
    }

    pub fn is_in_flight(&self, kind: RequestKind) -> bool {
        self.state(kind) == RequestState::InFlight
    }

    /// Whether a secondary request would currently be started.
    pub fn can_begin_secondary(&self) -> bool {
        !self.is_in_flight(RequestKind::Secondary) && self.primary_outcome == Some(RequestState::Succeeded)
    }

    pub fn begin(&mut self, kind: RequestKind) -> Result<Admission, LifecycleError> {
        if self.is_in_flight(kind) {
            tracing::debug!(kind = kind.label(), "request already in flight, ignoring trigger");
            return Ok(Admission::AlreadyInFlight);
        }
        if kind == RequestKind::Secondary && self.primary_outcome != Some(RequestState::Succeeded) {
            return Err(LifecycleError::PrimaryNotSucceeded);
        }

        self.next_id += 1;
        let id = self.next_id;
        let slot = self.slot_mut(kind);
        slot.state = RequestState::InFlight;
        slot.current = Some(id);
        tracing::info!(kind = kind.label(), id, "request started");
        Ok(Admission::Started(Ticket { kind, id }))
    }

    /// Whether `ticket` belongs to the invocation currently in flight.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        let slot = self.slot(ticket.kind);
        slot.state == RequestState::InFlight && slot.current == Some(ticket.id)
    }

    pub fn succeed(&mut self, ticket: Ticket) -> bool {
        self.complete(ticket, RequestState::Succeeded)
    }

    pub fn fail(&mut self, ticket: Ticket) -> bool {
        self.complete(ticket, RequestState::Failed)
    }

    fn complete(&mut self, ticket: Ticket, outcome: RequestState) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(kind = ticket.kind.label(), id = ticket.id, "stale completion ignored");
            return false;
        }
        self.slot_mut(ticket.kind).state = outcome;
        if ticket.kind == RequestKind::Primary {
            self.primary_outcome = Some(outcome);
        }
        tracing::info!(kind = ticket.kind.label(), id = ticket.id, ?outcome, "request finished");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(admission: Admission) -> Ticket {
        match admission {
            Admission::Started(t) => t,
            Admission::AlreadyInFlight => panic!("expected a started invocation"),
        }
    }

    #[test]
    fn primary_runs_to_success() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.state(RequestKind::Primary), RequestState::Idle);
        let t = started(lc.begin(RequestKind::Primary).unwrap());
        assert!(lc.is_in_flight(RequestKind::Primary));
        assert!(lc.succeed(t));
        assert_eq!(lc.state(RequestKind::Primary), RequestState::Succeeded);
    }

    #[test]
    fn secondary_requires_primary_success() {
        let mut lc = Lifecycle::new();
        assert_eq!(lc.begin(RequestKind::Secondary), Err(LifecycleError::PrimaryNotSucceeded));

        let t = started(lc.begin(RequestKind::Primary).unwrap());
        lc.fail(t);
        assert_eq!(lc.begin(RequestKind::Secondary), Err(LifecycleError::PrimaryNotSucceeded));
        assert_eq!(lc.state(RequestKind::Secondary), RequestState::Idle);
    }

    #[test]
    fn duplicate_secondary_trigger_is_a_noop() {
        let mut lc = Lifecycle::new();
        let p = started(lc.begin(RequestKind::Primary).unwrap());
        lc.succeed(p);

        let first = lc.begin(RequestKind::Secondary).unwrap();
        let second = lc.begin(RequestKind::Secondary).unwrap();
        assert!(matches!(first, Admission::Started(_)));
        assert_eq!(second, Admission::AlreadyInFlight);
        assert!(!lc.can_begin_secondary());

        lc.succeed(started(first));
        assert!(lc.can_begin_secondary());
        assert!(matches!(lc.begin(RequestKind::Secondary).unwrap(), Admission::Started(_)));
    }

    #[test]
    fn duplicate_primary_trigger_is_a_noop() {
        let mut lc = Lifecycle::new();
        started(lc.begin(RequestKind::Primary).unwrap());
        assert_eq!(lc.begin(RequestKind::Primary).unwrap(), Admission::AlreadyInFlight);
    }

    #[test]
    fn stale_ticket_cannot_complete_new_invocation() {
        let mut lc = Lifecycle::new();
        let old = started(lc.begin(RequestKind::Primary).unwrap());
        lc.fail(old);
        let new = started(lc.begin(RequestKind::Primary).unwrap());

        assert!(!lc.succeed(old));
        assert!(lc.is_in_flight(RequestKind::Primary));
        assert!(lc.succeed(new));
    }

    #[test]
    fn rerun_primary_keeps_last_success_until_it_finishes() {
        let mut lc = Lifecycle::new();
        let first = started(lc.begin(RequestKind::Primary).unwrap());
        lc.succeed(first);
        let rerun = started(lc.begin(RequestKind::Primary).unwrap());
        assert!(lc.can_begin_secondary());

        lc.fail(rerun);
        assert!(!lc.can_begin_secondary());
    }

    #[test]
    fn secondary_failure_allows_retry() {
        let mut lc = Lifecycle::new();
        let p = started(lc.begin(RequestKind::Primary).unwrap());
        lc.succeed(p);
        let s = started(lc.begin(RequestKind::Secondary).unwrap());
        lc.fail(s);
        assert_eq!(lc.state(RequestKind::Secondary), RequestState::Failed);
        assert!(matches!(lc.begin(RequestKind::Secondary).unwrap(), Admission::Started(_)));
    }
}
