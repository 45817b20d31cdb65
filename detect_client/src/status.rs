//! Lifecycle of the detection workflow.
//!
//! ```text
//! Idle ──load──▶ FileLoaded ──begin──▶ Analyzing ──complete──▶ Complete
//!                    ▲                     │                      │
//!                    │                     └──────fail──────▶ Failed
//!                    └────────────load────────────────────────────┘
//! ```
//!
//! Every state carries exactly the data that is valid in it, so there is no way to hold a
//! detection result outside of `Complete` or an image while `Idle`. `reset` returns to `Idle`
//! from anywhere.
use std::fmt;

use common::protocol::DetectionResult;
use thiserror::Error;

use crate::source::ImageSource;

/// Status as shown to the user.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SystemStatus {
    Idle,
    FileLoaded,
    Analyzing,
    Complete,
    Error,
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemStatus::Idle => "idle",
            SystemStatus::FileLoaded => "file loaded",
            SystemStatus::Analyzing => "analyzing",
            SystemStatus::Complete => "complete",
            SystemStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Identifies one submission. Responses are only accepted for the ticket they were issued for.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RequestTicket(pub(crate) u64);

impl fmt::Display for RequestTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum TransitionError {
    #[error("cannot {event} while {from}")]
    Invalid {
        from: SystemStatus,
        event: &'static str,
    },

    #[error("response for request {got} does not match the live request")]
    Stale { got: RequestTicket },
}

#[derive(Clone, Debug, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    FileLoaded {
        source: ImageSource,
    },
    Analyzing {
        source: ImageSource,
        ticket: RequestTicket,
    },
    Complete {
        source: ImageSource,
        result: DetectionResult,
    },
    Failed {
        source: ImageSource,
    },
}

impl WorkflowState {
    pub fn status(&self) -> SystemStatus {
        match self {
            WorkflowState::Idle => SystemStatus::Idle,
            WorkflowState::FileLoaded { .. } => SystemStatus::FileLoaded,
            WorkflowState::Analyzing { .. } => SystemStatus::Analyzing,
            WorkflowState::Complete { .. } => SystemStatus::Complete,
            WorkflowState::Failed { .. } => SystemStatus::Error,
        }
    }

    pub fn source(&self) -> Option<&ImageSource> {
        match self {
            WorkflowState::Idle => None,
            WorkflowState::FileLoaded { source }
            | WorkflowState::Analyzing { source, .. }
            | WorkflowState::Complete { source, .. }
            | WorkflowState::Failed { source } => Some(source),
        }
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            WorkflowState::Complete { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Ticket of the outstanding request, if any.
    pub fn ticket(&self) -> Option<RequestTicket> {
        match self {
            WorkflowState::Analyzing { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    /// Replace the image. Any previous result is dropped.
    pub fn load(&mut self, source: ImageSource) -> Result<(), TransitionError> {
        if let WorkflowState::Analyzing { .. } = self {
            return Err(self.invalid("load an image"));
        }
        *self = WorkflowState::FileLoaded { source };
        Ok(())
    }

    /// Start analyzing the loaded image. Returns the image to submit.
    pub fn begin(&mut self, ticket: RequestTicket) -> Result<ImageSource, TransitionError> {
        match std::mem::take(self) {
            WorkflowState::FileLoaded { source }
            | WorkflowState::Complete { source, .. }
            | WorkflowState::Failed { source } => {
                *self = WorkflowState::Analyzing {
                    source: source.clone(),
                    ticket,
                };
                Ok(source)
            }
            other => {
                *self = other;
                Err(self.invalid("submit"))
            }
        }
    }

    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        result: DetectionResult,
    ) -> Result<(), TransitionError> {
        let source = self.take_analyzing(ticket)?;
        *self = WorkflowState::Complete { source, result };
        Ok(())
    }

    pub fn fail(&mut self, ticket: RequestTicket) -> Result<(), TransitionError> {
        let source = self.take_analyzing(ticket)?;
        *self = WorkflowState::Failed { source };
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = WorkflowState::Idle;
    }

    fn take_analyzing(&mut self, ticket: RequestTicket) -> Result<ImageSource, TransitionError> {
        match std::mem::take(self) {
            WorkflowState::Analyzing {
                source,
                ticket: live_ticket,
            } if live_ticket == ticket => Ok(source),
            other => {
                *self = other;
                Err(TransitionError::Stale { got: ticket })
            }
        }
    }

    fn invalid(&self, event: &'static str) -> TransitionError {
        TransitionError::Invalid {
            from: self.status(),
            event,
        }
    }
}

#[cfg(test)]
mod test {

    use common::protocol::{BBox, Detection};

    use super::*;

    fn source() -> ImageSource {
        ImageSource::from_data_uri("data:image/jpeg;base64,/9j/4AAQ").expect("valid data uri")
    }

    fn result() -> DetectionResult {
        DetectionResult {
            detections: vec![Detection::new(
                "toolkit",
                0.9,
                BBox::new(1.0, 2.0, 3.0, 4.0),
            )],
            processing_time: Some("0.010s".into()),
        }
    }

    #[test]
    fn test_successful_lifecycle() -> Result<(), TransitionError> {
        let mut state = WorkflowState::default();
        assert_eq!(state.status(), SystemStatus::Idle);
        assert!(state.source().is_none());

        state.load(source())?;
        assert_eq!(state.status(), SystemStatus::FileLoaded);

        let ticket = RequestTicket(1);
        let submitted = state.begin(ticket)?;
        assert_eq!(Some(&submitted), state.source());
        assert_eq!(state.status(), SystemStatus::Analyzing);
        assert_eq!(state.ticket(), Some(ticket));
        assert!(state.result().is_none());

        state.complete(ticket, result())?;
        assert_eq!(state.status(), SystemStatus::Complete);
        assert_eq!(state.result(), Some(&result()));

        Ok(())
    }

    #[test]
    fn test_failure_keeps_no_result() -> Result<(), TransitionError> {
        let mut state = WorkflowState::default();
        state.load(source())?;
        state.begin(RequestTicket(1))?;
        state.complete(RequestTicket(1), result())?;

        // Resubmitting drops the previous result right away
        state.begin(RequestTicket(2))?;
        assert!(state.result().is_none());

        state.fail(RequestTicket(2))?;
        assert_eq!(state.status(), SystemStatus::Error);
        assert!(state.result().is_none());
        assert!(state.source().is_some());

        Ok(())
    }

    #[test]
    fn test_rejected_transitions_leave_state_untouched() -> Result<(), TransitionError> {
        let mut state = WorkflowState::default();
        assert_eq!(
            state.begin(RequestTicket(1)),
            Err(TransitionError::Invalid {
                from: SystemStatus::Idle,
                event: "submit"
            })
        );
        assert_eq!(state.status(), SystemStatus::Idle);

        state.load(source())?;
        state.begin(RequestTicket(1))?;
        assert!(state.begin(RequestTicket(2)).is_err());
        assert!(state.load(source()).is_err());
        assert_eq!(state.ticket(), Some(RequestTicket(1)));

        Ok(())
    }

    #[test]
    fn test_stale_ticket_is_refused() -> Result<(), TransitionError> {
        let mut state = WorkflowState::default();
        state.load(source())?;
        state.begin(RequestTicket(1))?;
        state.reset();
        state.load(source())?;
        state.begin(RequestTicket(2))?;

        assert_eq!(
            state.complete(RequestTicket(1), result()),
            Err(TransitionError::Stale {
                got: RequestTicket(1)
            })
        );
        assert_eq!(state.status(), SystemStatus::Analyzing);
        assert_eq!(state.ticket(), Some(RequestTicket(2)));

        Ok(())
    }

    #[test]
    fn test_reset_from_every_state() -> Result<(), TransitionError> {
        let mut states = vec![WorkflowState::Idle];

        let mut state = WorkflowState::default();
        state.load(source())?;
        states.push(state.clone());
        state.begin(RequestTicket(1))?;
        states.push(state.clone());
        let mut failed = state.clone();
        failed.fail(RequestTicket(1))?;
        states.push(failed);
        state.complete(RequestTicket(1), result())?;
        states.push(state);

        for mut state in states {
            state.reset();
            assert_eq!(state.status(), SystemStatus::Idle);
            assert!(state.source().is_none());
            assert!(state.result().is_none());
        }

        Ok(())
    }
}
