use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use crate::dto::exam_dto::QuestionPayload;
use crate::error::{Error, Result};
use crate::models::question::Question;

struct Stage {
    teacher_id: Uuid,
    proposals: Vec<Question>,
}

/// Generated proposals waiting for the teacher's review.
///
/// Each teacher has at most one pending stage; staging again replaces it.
#[derive(Clone, Default)]
pub struct DraftStaging {
    stages: Arc<Mutex<HashMap<Uuid, Stage>>>,
}

impl DraftStaging {
    pub fn new() -> Self {
        Self::default()
    }

    fn stages(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Stage>> {
        self.stages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stage(&self, teacher_id: Uuid, proposals: Vec<Question>) -> Uuid {
        let stage_id = Uuid::new_v4();
        let mut stages = self.stages();
        stages.retain(|_, s| s.teacher_id != teacher_id);
        stages.insert(
            stage_id,
            Stage {
                teacher_id,
                proposals,
            },
        );
        stage_id
    }

    pub fn pending(&self, teacher_id: Uuid, stage_id: Uuid) -> Option<Vec<Question>> {
        self.stages()
            .get(&stage_id)
            .filter(|s| s.teacher_id == teacher_id)
            .map(|s| s.proposals.clone())
    }

    /// Appends the selected proposals to `existing` and consumes the stage.
    ///
    /// Indices refer to the staged order; duplicates count once. The merged
    /// list is renumbered 1..=n. An invalid index leaves the stage untouched.
    pub fn accept(
        &self,
        teacher_id: Uuid,
        stage_id: Uuid,
        selected: &[usize],
        existing: Vec<QuestionPayload>,
    ) -> Result<Vec<Question>> {
        let mut stages = self.stages();
        let stage = stages
            .get(&stage_id)
            .filter(|s| s.teacher_id == teacher_id)
            .ok_or_else(|| Error::NotFound("Draft stage not found".to_string()))?;

        if let Some(bad) = selected.iter().find(|i| **i >= stage.proposals.len()) {
            return Err(Error::BadRequest(format!(
                "Draft index {} is out of range ({} proposals)",
                bad,
                stage.proposals.len()
            )));
        }

        let mut picked: Vec<usize> = Vec::with_capacity(selected.len());
        for idx in selected {
            if !picked.contains(idx) {
                picked.push(*idx);
            }
        }

        let Some(stage) = stages.remove(&stage_id) else {
            return Err(Error::NotFound("Draft stage not found".to_string()));
        };

        let merged = existing
            .into_iter()
            .chain(picked.into_iter().map(|i| QuestionPayload::from(stage.proposals[i].clone())))
            .enumerate()
            .map(|(idx, q)| q.into_question(idx as i32 + 1))
            .collect();
        Ok(merged)
    }
}
