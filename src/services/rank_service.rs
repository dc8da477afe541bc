use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::submission::{ExamSubmission, SubmitTrigger};
use crate::services::scoring_service::percentage;

#[derive(Debug, Clone, Serialize)]
pub struct RankedSubmission {
    pub rank: usize,
    pub submission_id: Uuid,
    pub student_id: Uuid,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
}

/// Orders by score (highest first), then by submission time.
///
/// Equal scores share a rank and the next distinct score skips ahead:
/// 1, 2, 2, 4.
pub fn rank(mut submissions: Vec<ExamSubmission>) -> Vec<RankedSubmission> {
    submissions.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
    });

    let mut ranked: Vec<RankedSubmission> = Vec::with_capacity(submissions.len());
    for (idx, s) in submissions.into_iter().enumerate() {
        let rank = match ranked.last() {
            Some(prev) if prev.score == s.score => prev.rank,
            _ => idx + 1,
        };
        ranked.push(RankedSubmission {
            rank,
            submission_id: s.id,
            student_id: s.student_id,
            score: s.score,
            total_marks: s.total_marks,
            percentage: percentage(s.score, s.total_marks),
            trigger: s.trigger,
            submitted_at: s.submitted_at,
        });
    }
    ranked
}
