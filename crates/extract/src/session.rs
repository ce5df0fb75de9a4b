//! Submission state machine for the single-page UI.
//!
//! Only one analysis may be outstanding. Every submission gets a sequence
//! number, and a resolution whose number no longer matches the pending one is
//! dropped, so a late response can never overwrite newer state.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::Analysis;
use crate::error::AnalyzeError;

#[derive(Debug, Clone)]
pub enum SubmissionState {
    Idle,
    Pending {
        seq: u64,
        text: String,
    },
    Success {
        seq: u64,
        text: String,
        analysis: Analysis,
    },
    Failed {
        seq: u64,
        text: String,
        kind: &'static str,
        message: String,
    },
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Pending { .. } => "pending",
            SubmissionState::Success { .. } => "success",
            SubmissionState::Failed { .. } => "failed",
        }
    }

    /// Text of the submission this state belongs to, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            SubmissionState::Idle => None,
            SubmissionState::Pending { text, .. }
            | SubmissionState::Success { text, .. }
            | SubmissionState::Failed { text, .. } => Some(text.as_str()),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("đang có một yêu cầu phân tích khác (#{seq}), vui lòng chờ")]
    Busy { seq: u64 },
}

/// Handle for one accepted submission.
#[derive(Debug, Clone)]
pub struct Ticket {
    seq: u64,
    cancel: CancellationToken,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Fires when the submission is cancelled or the session shuts down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

pub struct Session {
    state: SubmissionState,
    next_seq: u64,
    shutdown: CancellationToken,
    inflight: Option<CancellationToken>,
}

impl Session {
    /// `shutdown` is the parent of every ticket's token; cancelling it
    /// aborts whatever is in flight.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            state: SubmissionState::Idle,
            next_seq: 1,
            shutdown,
            inflight: None,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SubmissionState::Pending { .. })
    }

    /// Idle/Success/Failed → Pending. Rejected while another submission is pending.
    pub fn submit(&mut self, text: &str) -> Result<Ticket, SessionError> {
        if let SubmissionState::Pending { seq, .. } = self.state {
            return Err(SessionError::Busy { seq });
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let cancel = self.shutdown.child_token();
        self.inflight = Some(cancel.clone());
        self.state = SubmissionState::Pending {
            seq,
            text: text.to_string(),
        };

        tracing::debug!(target: "extract::session", seq, "submission accepted");
        Ok(Ticket { seq, cancel })
    }

    /// Pending → Success or Failed, if `ticket` is still the pending one.
    pub fn resolve(
        &mut self,
        ticket: &Ticket,
        outcome: Result<Analysis, AnalyzeError>,
    ) -> Resolution {
        let text = match &self.state {
            SubmissionState::Pending { seq, text } if *seq == ticket.seq => text.clone(),
            _ => {
                tracing::debug!(
                    target: "extract::session",
                    seq = ticket.seq,
                    state = self.state.name(),
                    "discarding stale resolution"
                );
                return Resolution::Stale;
            }
        };

        self.inflight = None;
        self.state = match outcome {
            Ok(analysis) => SubmissionState::Success {
                seq: ticket.seq,
                text,
                analysis,
            },
            Err(e) => SubmissionState::Failed {
                seq: ticket.seq,
                text,
                kind: e.kind(),
                message: e.to_string(),
            },
        };

        Resolution::Applied
    }

    /// Pending → Idle. The pending ticket's token is cancelled and its eventual
    /// resolution will be discarded. Returns false when nothing was pending.
    pub fn cancel(&mut self) -> bool {
        if !self.is_pending() {
            return false;
        }
        if let Some(token) = self.inflight.take() {
            token.cancel();
        }
        self.state = SubmissionState::Idle;
        true
    }

    /// Like [`cancel`](Self::cancel), but only if `ticket` is the pending one.
    pub fn cancel_ticket(&mut self, ticket: &Ticket) -> bool {
        match self.state {
            SubmissionState::Pending { seq, .. } if seq == ticket.seq => self.cancel(),
            _ => false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ApiResponse, DisplayView};
    use serde_json::json;

    fn analysis() -> Analysis {
        Analysis {
            response: ApiResponse::from_payload(json!({"data": null})),
            view: DisplayView::None,
        }
    }

    #[test]
    fn test_idle_to_success() {
        let mut session = Session::default();
        assert_eq!(session.state().name(), "idle");

        let ticket = session.submit("giao việc").unwrap();
        assert!(session.is_pending());
        assert_eq!(session.state().text(), Some("giao việc"));

        assert_eq!(session.resolve(&ticket, Ok(analysis())), Resolution::Applied);
        assert_eq!(session.state().name(), "success");
    }

    #[test]
    fn test_failure_keeps_message() {
        let mut session = Session::default();
        let ticket = session.submit("x").unwrap();
        let err = AnalyzeError::HttpStatus {
            status: 429,
            message: "rate limited".to_string(),
        };

        session.resolve(&ticket, Err(err));
        match session.state() {
            SubmissionState::Failed { kind, message, .. } => {
                assert_eq!(*kind, "status");
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected failed, got {}", other.name()),
        }
    }

    #[test]
    fn test_submit_while_pending_is_rejected() {
        let mut session = Session::default();
        let first = session.submit("a").unwrap();

        assert_eq!(session.submit("b").unwrap_err(), SessionError::Busy { seq: first.seq() });
        assert_eq!(session.state().text(), Some("a"));
    }

    #[test]
    fn test_resubmit_after_completion() {
        let mut session = Session::default();
        let first = session.submit("a").unwrap();
        session.resolve(&first, Ok(analysis()));

        let second = session.submit("b").unwrap();
        assert!(second.seq() > first.seq());
        assert!(session.is_pending());
    }

    #[test]
    fn test_stale_resolution_is_discarded() {
        let mut session = Session::default();
        let old = session.submit("old").unwrap();
        assert!(session.cancel());
        assert!(old.cancellation().is_cancelled());

        let new = session.submit("new").unwrap();
        assert_eq!(session.resolve(&old, Ok(analysis())), Resolution::Stale);
        assert!(session.is_pending());

        assert_eq!(session.resolve(&new, Err(AnalyzeError::Cancelled)), Resolution::Applied);
        assert_eq!(session.state().name(), "failed");
        assert_eq!(session.state().text(), Some("new"));
    }

    #[test]
    fn test_shutdown_cancels_inflight() {
        let shutdown = CancellationToken::new();
        let mut session = Session::new(shutdown.clone());
        let ticket = session.submit("x").unwrap();

        shutdown.cancel();
        assert!(ticket.cancellation().is_cancelled());
    }

    #[test]
    fn test_cancel_when_idle_is_noop() {
        let mut session = Session::default();
        assert!(!session.cancel());
        assert_eq!(session.state().name(), "idle");
    }

    #[test]
    fn test_cancel_ticket_ignores_other_tickets() {
        let mut session = Session::default();
        let old = session.submit("old").unwrap();
        session.resolve(&old, Err(AnalyzeError::Cancelled));
        let current = session.submit("current").unwrap();

        assert!(!session.cancel_ticket(&old));
        assert!(session.is_pending());

        assert!(session.cancel_ticket(&current));
        assert_eq!(session.state().name(), "idle");
        assert!(current.cancellation().is_cancelled());
    }
}
