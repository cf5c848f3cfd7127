use super::errors::StoreError;
use super::models::{Scan, ScanStatus, TaskRef};
use crate::output::schema::{ExecutionMeta, ScanEnvelope};
use chrono::{DateTime, Utc};

/// A single lifecycle step. Each variant carries every field it writes so the
/// store can persist it as one unit.
#[derive(Debug, Clone)]
pub enum Transition {
    Start {
        task_ref: TaskRef,
        started_at: DateTime<Utc>,
    },
    Complete {
        results: ScanEnvelope,
        raw_meta: ExecutionMeta,
        degraded: bool,
        completed_at: DateTime<Utc>,
    },
    Fail {
        message: String,
        completed_at: DateTime<Utc>,
    },
    Cancel {
        completed_at: DateTime<Utc>,
    },
}

impl Transition {
    pub fn target(&self) -> ScanStatus {
        match self {
            Transition::Start { .. } => ScanStatus::Running,
            Transition::Complete { .. } => ScanStatus::Completed,
            Transition::Fail { .. } => ScanStatus::Failed,
            Transition::Cancel { .. } => ScanStatus::Cancelled,
        }
    }
}

/// Outcome of applying a transition to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// The record already sits in the requested terminal state.
    Unchanged,
}

pub fn can_transition(from: ScanStatus, to: ScanStatus) -> bool {
    use ScanStatus::*;
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Cancelled)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Cancelled)
    )
}

impl Scan {
    /// Applies `transition` in place, enforcing the lifecycle table. Terminal
    /// records never change; repeating the terminal state they already hold
    /// is accepted and leaves them untouched.
    pub fn apply(&mut self, transition: Transition) -> Result<Applied, StoreError> {
        let to = transition.target();

        if self.status.is_terminal() && self.status == to {
            return Ok(Applied::Unchanged);
        }

        if !can_transition(self.status, to) {
            return Err(StoreError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }

        match transition {
            Transition::Start {
                task_ref,
                started_at,
            } => {
                self.task_ref = Some(task_ref);
                self.started_at = Some(started_at);
            }
            Transition::Complete {
                results,
                raw_meta,
                degraded,
                completed_at,
            } => {
                self.results = Some(results);
                self.raw_meta = Some(raw_meta);
                self.parse_degraded = degraded;
                self.error_message = None;
                self.completed_at = Some(completed_at);
            }
            Transition::Fail {
                message,
                completed_at,
            } => {
                self.error_message = Some(message);
                self.completed_at = Some(completed_at);
            }
            Transition::Cancel { completed_at } => {
                self.completed_at = Some(completed_at);
            }
        }

        self.status = to;
        Ok(Applied::Changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ScanId, ScanType};
    use rstest::rstest;
    use ScanStatus::*;

    fn pending() -> Scan {
        Scan::new(ScanId(1), ScanType::Service, "nmap", "scanme.nmap.org")
    }

    fn start() -> Transition {
        Transition::Start {
            task_ref: TaskRef("task-1".to_string()),
            started_at: Utc::now(),
        }
    }

    fn fail(message: &str) -> Transition {
        Transition::Fail {
            message: message.to_string(),
            completed_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(Pending, Running, true)]
    #[case(Pending, Cancelled, true)]
    #[case(Pending, Completed, false)]
    #[case(Pending, Failed, false)]
    #[case(Running, Completed, true)]
    #[case(Running, Failed, true)]
    #[case(Running, Cancelled, true)]
    #[case(Running, Pending, false)]
    #[case(Completed, Running, false)]
    #[case(Failed, Completed, false)]
    #[case(Cancelled, Running, false)]
    #[case(Completed, Cancelled, false)]
    fn test_transition_table(#[case] from: ScanStatus, #[case] to: ScanStatus, #[case] ok: bool) {
        assert_eq!(can_transition(from, to), ok);
    }

    #[test]
    fn test_start_records_task_and_timestamp() {
        let mut scan = pending();
        assert_eq!(scan.apply(start()).unwrap(), Applied::Changed);
        assert_eq!(scan.status, Running);
        assert_eq!(scan.task_ref, Some(TaskRef("task-1".to_string())));
        assert!(scan.started_at.is_some());
    }

    #[test]
    fn test_no_transition_out_of_terminal_state() {
        let mut scan = pending();
        scan.apply(start()).unwrap();
        scan.apply(fail("boom")).unwrap();

        assert!(scan.apply(start()).is_err());
        assert!(scan
            .apply(Transition::Cancel {
                completed_at: Utc::now()
            })
            .is_err());
        assert_eq!(scan.status, Failed);
    }

    #[test]
    fn test_repeated_terminal_transition_is_noop() {
        let mut scan = pending();
        scan.apply(start()).unwrap();
        scan.apply(fail("first")).unwrap();
        let snapshot = scan.clone();

        assert_eq!(scan.apply(fail("second")).unwrap(), Applied::Unchanged);
        assert_eq!(scan, snapshot);
        assert_eq!(scan.error_message.as_deref(), Some("first"));
    }

    #[test]
    fn test_pending_cannot_fail_directly() {
        let mut scan = pending();
        assert!(matches!(
            scan.apply(fail("nope")),
            Err(StoreError::InvalidTransition { from: Pending, to: Failed, .. })
        ));
    }
}
