//! In-memory state of one student's exam attempt.
//!
//! The session is a plain state machine; timers and persistence live in
//! [`crate::services::attempt_service`]. All phase changes go through the
//! methods here so that the transition into `Submitting` happens exactly
//! once per session.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam::{Exam, ExamStatus};
use crate::models::question::OPTION_COUNT;
use crate::models::submission::{AnswerMap, ExamSubmission, SubmitTrigger};
use crate::services::randomizer::presentation_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    NotStarted,
    InProgress,
    Submitting,
    Completed,
    ViewingResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Back,
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Moved { index: usize },
    /// Forward on the last question: the caller should offer submission.
    ReadyToSubmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running { remaining_seconds: u32 },
    /// A submission is in flight; the clock keeps running but cannot expire.
    Waiting { remaining_seconds: u32 },
    /// The countdown is at zero and the session moved to `Submitting`.
    Expired,
    /// The session is finished; the timer should stop.
    Idle,
}

/// How the countdown is seeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountdownPolicy {
    /// Cap the countdown at the time left before `end_time`.
    pub clamp_to_window: bool,
}

impl CountdownPolicy {
    pub fn initial_seconds(&self, exam: &Exam, now: DateTime<Utc>) -> u32 {
        let full = i64::from(exam.duration_minutes.max(0)) * 60;
        let seconds = if self.clamp_to_window {
            full.min((exam.end_time - now).num_seconds().max(0))
        } else {
            full
        };
        u32::try_from(seconds).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct AttemptSession {
    exam_id: Uuid,
    student_id: Uuid,
    phase: AttemptPhase,
    order: Vec<i32>,
    current: usize,
    reached_last: bool,
    answers: AnswerMap,
    remaining_seconds: u32,
    trigger: Option<SubmitTrigger>,
}

impl AttemptSession {
    pub fn new(exam_id: Uuid, student_id: Uuid) -> Self {
        Self {
            exam_id,
            student_id,
            phase: AttemptPhase::NotStarted,
            order: Vec::new(),
            current: 0,
            reached_last: false,
            answers: AnswerMap::new(),
            remaining_seconds: 0,
            trigger: None,
        }
    }

    /// Opens an attempt.
    ///
    /// A prior submission short-circuits to `ViewingResult` whatever the
    /// clock says. Otherwise the exam must be published and LIVE.
    pub fn open<R: Rng + ?Sized>(
        exam: &Exam,
        student_id: Uuid,
        prior: Option<&ExamSubmission>,
        now: DateTime<Utc>,
        policy: CountdownPolicy,
        rng: &mut R,
    ) -> Result<Self> {
        let mut session = Self::new(exam.id, student_id);

        if prior.is_some() {
            session.phase = AttemptPhase::ViewingResult;
            return Ok(session);
        }
        if !exam.is_published {
            return Err(Error::Forbidden("This exam has not been published".to_string()));
        }
        match exam.status_at(now) {
            ExamStatus::Upcoming => {
                return Err(Error::Timing("This exam has not started yet".to_string()))
            }
            ExamStatus::Expired => {
                return Err(Error::Timing("This exam has already ended".to_string()))
            }
            ExamStatus::Live => {}
        }
        if exam.questions.is_empty() {
            return Err(Error::BadRequest("This exam has no questions".to_string()));
        }

        session.order = presentation_order(&exam.questions, exam.settings.shuffle_questions, rng);
        session.reached_last = session.order.len() == 1;
        session.remaining_seconds = policy.initial_seconds(exam, now);
        session.phase = AttemptPhase::InProgress;
        Ok(session)
    }

    pub fn exam_id(&self) -> Uuid {
        self.exam_id
    }

    pub fn student_id(&self) -> Uuid {
        self.student_id
    }

    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    pub fn order(&self) -> &[i32] {
        &self.order
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question_id(&self) -> Option<i32> {
        self.order.get(self.current).copied()
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn reached_last(&self) -> bool {
        self.reached_last
    }

    pub fn trigger(&self) -> Option<SubmitTrigger> {
        self.trigger
    }

    fn ensure_in_progress(&self) -> Result<()> {
        match self.phase {
            AttemptPhase::InProgress => Ok(()),
            AttemptPhase::Submitting => {
                Err(Error::Conflict("The attempt is being submitted".to_string()))
            }
            AttemptPhase::Completed | AttemptPhase::ViewingResult => {
                Err(Error::Conflict("The attempt has already been submitted".to_string()))
            }
            AttemptPhase::NotStarted => {
                Err(Error::BadRequest("The attempt has not been started".to_string()))
            }
        }
    }

    /// Records a choice; choosing again overwrites the previous one.
    pub fn select(&mut self, question_id: i32, option_index: u8) -> Result<()> {
        self.ensure_in_progress()?;
        if self.remaining_seconds == 0 {
            return Err(Error::Timing(
                "Time is up; the attempt can only be submitted".to_string(),
            ));
        }
        if !self.order.contains(&question_id) {
            return Err(Error::BadRequest(format!(
                "Question {} is not part of this exam",
                question_id
            )));
        }
        if usize::from(option_index) >= OPTION_COUNT {
            return Err(Error::BadRequest(format!(
                "Option index must be below {}",
                OPTION_COUNT
            )));
        }
        self.answers.insert(question_id, option_index);
        Ok(())
    }

    pub fn navigate(&mut self, direction: Direction) -> Result<Step> {
        self.ensure_in_progress()?;
        let last = self.order.len().saturating_sub(1);
        match direction {
            Direction::Forward if self.current >= last => {
                self.reached_last = true;
                Ok(Step::ReadyToSubmit)
            }
            Direction::Forward => {
                self.current += 1;
                if self.current == last {
                    self.reached_last = true;
                }
                Ok(Step::Moved { index: self.current })
            }
            Direction::Back => {
                self.current = self.current.saturating_sub(1);
                Ok(Step::Moved { index: self.current })
            }
        }
    }

    /// One countdown second.
    ///
    /// A session that failed to submit with no time left expires again on
    /// the next tick.
    pub fn tick(&mut self) -> Tick {
        match self.phase {
            AttemptPhase::InProgress => {}
            AttemptPhase::Submitting => {
                self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
                return Tick::Waiting {
                    remaining_seconds: self.remaining_seconds,
                };
            }
            _ => return Tick::Idle,
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return Tick::Running {
                remaining_seconds: self.remaining_seconds,
            };
        }
        match self.begin_submit(SubmitTrigger::Timeout) {
            Some(_) => Tick::Expired,
            None => Tick::Idle,
        }
    }

    /// Checks that a manual submission is allowed right now and takes the
    /// submit gate.
    pub fn request_manual_submit(&mut self) -> Result<AnswerMap> {
        self.ensure_in_progress()?;
        if !self.reached_last {
            return Err(Error::BadRequest(
                "Go through to the last question before submitting".to_string(),
            ));
        }
        self.begin_submit(SubmitTrigger::Manual)
            .ok_or_else(|| Error::Conflict("The attempt is being submitted".to_string()))
    }

    /// The single `InProgress -> Submitting` transition.
    ///
    /// Returns the answers to submit for the caller that wins; every later
    /// caller gets `None` and must not contact the store.
    pub fn begin_submit(&mut self, trigger: SubmitTrigger) -> Option<AnswerMap> {
        if self.phase != AttemptPhase::InProgress {
            return None;
        }
        self.phase = AttemptPhase::Submitting;
        self.trigger = Some(trigger);
        Some(self.answers.clone())
    }

    pub fn complete(&mut self) {
        if self.phase == AttemptPhase::Submitting {
            self.phase = AttemptPhase::Completed;
        }
    }

    /// The store rejected or could not take the submission; answers are kept
    /// and the student may submit again by hand.
    pub fn submit_failed(&mut self) {
        if self.phase == AttemptPhase::Submitting {
            self.phase = AttemptPhase::InProgress;
            self.trigger = None;
            self.reached_last = true;
        }
    }
}
