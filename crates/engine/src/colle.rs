//! The colle event as seen by the accounting core.
//!
//! Scheduling owns the full colle (rooms, students, grading); the ledger
//! only needs the quantities, the mode, and the chart entities involved.

use serde::{Deserialize, Serialize};

use kholle_core::{ColleId, Hours, Minutes, PeriodId, RateTier};

use crate::chart::{ClassRef, ExaminerRef, SubjectRef};

/// How the colle is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColleMode {
    /// Per-student oral questioning.
    Questioning,
    /// Group coaching session (travaux dirigés): no per-student
    /// decomposition.
    Coaching,
}

/// A single oral-examination event, as reported by the scheduling layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColleEvent {
    pub id: ColleId,
    pub period: PeriodId,
    pub examiner: ExaminerRef,
    pub class: ClassRef,
    pub subject: SubjectRef,
    pub mode: ColleMode,
    /// Total elapsed duration of the event.
    pub duration: Minutes,
    /// Per-student questioning durations, when recorded. Empty until the
    /// colle is graded.
    pub student_interrogations: Vec<Minutes>,
}

impl ColleEvent {
    /// The posting pair for this colle.
    ///
    /// Questioning mode sums the recorded per-student durations, falling
    /// back to the event's own total when none are recorded yet, a
    /// conservative, domain-sanctioned approximation. Coaching mode uses
    /// the full duration for both quantities.
    pub fn hours(&self) -> Hours {
        let interrogation = match self.mode {
            ColleMode::Coaching => self.duration,
            ColleMode::Questioning => {
                if self.student_interrogations.is_empty() {
                    self.duration
                } else {
                    self.student_interrogations.iter().copied().sum()
                }
            }
        };
        Hours::new(self.duration, interrogation)
    }

    /// Rate tier from the class's enrollment, read now rather than at scheduling
    /// time.
    pub fn tier(&self) -> RateTier {
        RateTier::for_class(self.class.level, self.class.enrollment)
    }
}
