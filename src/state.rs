//! Converter lifecycle as an explicit state machine.
//!
//! ```text
//!            Start              Loaded               Finished
//!   Idle ───────────▶ Loading ─────────▶ Converting ──────────▶ Results
//!     ▲                  │                   │  │                 │
//!     │                  │ Failed            │  │ Failed          │
//!     │                  ▼                   │  ▼                 │
//!     └──── Reset ───── Error ◀──────────────┘                    │
//!     └──── Reset ────────────────────────────────────────────────┘
//! ```
//!
//! `Start` is accepted from every state: a new run always supersedes the
//! current one. `Cancel` abandons an in-flight run without starting another.
//! `Progress` updates the percentage while converting.

use serde::Serialize;
use std::fmt;

/// Where the converter is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConverterPhase {
    Idle,
    Loading,
    Converting { percent: f32 },
    Results { pages: usize },
    Error { message: String },
}

/// Inputs that drive [`ConverterPhase::transition`].
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    Start,
    Loaded,
    Progress(f32),
    Finished { pages: usize },
    Failed(String),
    Cancel,
    Reset,
}

/// Raised when an event is not valid in the current phase.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("event {event:?} is not valid while {from}")]
pub struct InvalidTransition {
    pub from: ConverterPhase,
    pub event: PhaseEvent,
}

impl ConverterPhase {
    /// Apply one event, returning the next phase.
    pub fn transition(&self, event: PhaseEvent) -> Result<ConverterPhase, InvalidTransition> {
        use ConverterPhase as P;
        use PhaseEvent as E;

        let next = match (self, &event) {
            (_, E::Start) => P::Loading,
            (P::Loading, E::Loaded) => P::Converting { percent: 10.0 },
            (P::Converting { percent }, E::Progress(p)) => P::Converting {
                percent: percent.max(*p),
            },
            (P::Converting { .. }, E::Finished { pages }) => P::Results { pages: *pages },
            (P::Loading | P::Converting { .. }, E::Failed(msg)) => P::Error {
                message: msg.clone(),
            },
            (P::Loading | P::Converting { .. }, E::Cancel) => P::Idle,
            (P::Results { .. } | P::Error { .. } | P::Idle, E::Reset) => P::Idle,
            _ => {
                return Err(InvalidTransition {
                    from: self.clone(),
                    event,
                })
            }
        };
        Ok(next)
    }

    /// A run is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, ConverterPhase::Loading | ConverterPhase::Converting { .. })
    }
}

impl fmt::Display for ConverterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterPhase::Idle => f.write_str("idle"),
            ConverterPhase::Loading => f.write_str("loading"),
            ConverterPhase::Converting { percent } => write!(f, "converting ({percent:.0}%)"),
            ConverterPhase::Results { pages } => write!(f, "showing {pages} results"),
            ConverterPhase::Error { .. } => f.write_str("in error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn happy_path() {
        let p = ConverterPhase::Idle;
        let p = p.transition(PhaseEvent::Start).unwrap();
        assert_eq!(p, ConverterPhase::Loading);
        let p = p.transition(PhaseEvent::Loaded).unwrap();
        assert_eq!(p, ConverterPhase::Converting { percent: 10.0 });
        let p = p.transition(PhaseEvent::Progress(50.0)).unwrap();
        let p = p.transition(PhaseEvent::Finished { pages: 3 }).unwrap();
        assert_eq!(p, ConverterPhase::Results { pages: 3 });
        assert_eq!(p.transition(PhaseEvent::Reset).unwrap(), ConverterPhase::Idle);
    }

    #[test]
    fn progress_is_monotonic() {
        let p = ConverterPhase::Converting { percent: 60.0 };
        let p = p.transition(PhaseEvent::Progress(40.0)).unwrap();
        assert_eq!(p, ConverterPhase::Converting { percent: 60.0 });
    }

    #[test]
    fn failure_from_loading_and_converting() {
        for from in [ConverterPhase::Loading, ConverterPhase::Converting { percent: 20.0 }] {
            let next = from.transition(PhaseEvent::Failed("boom".into())).unwrap();
            assert_eq!(
                next,
                ConverterPhase::Error {
                    message: "boom".into()
                }
            );
        }
    }

    #[test]
    fn start_supersedes_any_phase() {
        let phases = [
            ConverterPhase::Idle,
            ConverterPhase::Loading,
            ConverterPhase::Converting { percent: 40.0 },
            ConverterPhase::Results { pages: 2 },
            ConverterPhase::Error {
                message: "x".into(),
            },
        ];
        for p in phases {
            assert_eq!(p.transition(PhaseEvent::Start).unwrap(), ConverterPhase::Loading);
        }
    }

    #[test]
    fn cancel_only_while_busy() {
        assert_eq!(
            ConverterPhase::Loading.transition(PhaseEvent::Cancel).unwrap(),
            ConverterPhase::Idle
        );
        assert!(ConverterPhase::Results { pages: 1 }
            .transition(PhaseEvent::Cancel)
            .is_err());
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(ConverterPhase::Idle.transition(PhaseEvent::Loaded).is_err());
        assert!(ConverterPhase::Idle
            .transition(PhaseEvent::Finished { pages: 1 })
            .is_err());
        assert!(ConverterPhase::Loading.transition(PhaseEvent::Reset).is_err());
        let err = ConverterPhase::Results { pages: 1 }
            .transition(PhaseEvent::Failed("late".into()))
            .unwrap_err();
        assert!(err.to_string().contains("showing 1 results"));
    }
}
