use serde::Serialize;

use crate::models::question::Question;
use crate::models::submission::AnswerMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub score: i32,
    pub total_marks: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Incorrect,
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedQuestion {
    pub question_id: i32,
    pub chosen_option_index: Option<u8>,
    pub correct_option_index: u8,
    pub outcome: Outcome,
    pub marks_awarded: i32,
    pub max_marks: i32,
}

/// Scores `answers` against the canonical question list.
///
/// Lookup is by question id, so the order the student saw the questions in
/// has no effect. Unanswered questions score zero but still count towards
/// `total_marks`; answers to ids that are not in `questions` are ignored.
pub fn score(questions: &[Question], answers: &AnswerMap) -> ScoreSummary {
    grade(questions, answers)
        .iter()
        .fold(ScoreSummary { score: 0, total_marks: 0 }, |acc, g| ScoreSummary {
            score: acc.score.saturating_add(g.marks_awarded),
            total_marks: acc.total_marks.saturating_add(g.max_marks),
        })
}

pub fn percentage(score: i32, total_marks: i32) -> f64 {
    if total_marks <= 0 {
        return 0.0;
    }
    f64::from(score) / f64::from(total_marks) * 100.0
}

/// Per-question breakdown in canonical order.
pub fn grade(questions: &[Question], answers: &AnswerMap) -> Vec<GradedQuestion> {
    questions
        .iter()
        .map(|q| {
            let chosen = answers.get(&q.id).copied();
            let outcome = match chosen {
                None => Outcome::Unanswered,
                Some(idx) if q.is_correct(idx) => Outcome::Correct,
                Some(_) => Outcome::Incorrect,
            };
            GradedQuestion {
                question_id: q.id,
                chosen_option_index: chosen,
                correct_option_index: q.correct_option_index,
                outcome,
                marks_awarded: if outcome == Outcome::Correct { q.marks } else { 0 },
                max_marks: q.marks,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::randomizer::presentation_order;
    use rand::{rngs::StdRng, SeedableRng};

    fn question(id: i32, correct: u8, marks: i32) -> Question {
        Question {
            id,
            text: format!("Question {id}"),
            options: ["A".into(), "B".into(), "C".into(), "D".into()],
            correct_option_index: correct,
            marks,
        }
    }

    #[test]
    fn two_question_exam_scores_only_the_correct_answer() {
        let questions = vec![question(1, 0, 1), question(2, 2, 2)];
        let answers = AnswerMap::from([(1, 0), (2, 1)]);

        let summary = score(&questions, &answers);
        assert_eq!(summary, ScoreSummary { score: 1, total_marks: 3 });
    }

    #[test]
    fn full_marks_and_empty_answers() {
        let questions = vec![question(1, 3, 2), question(2, 1, 5), question(3, 0, 1)];
        let perfect: AnswerMap = questions.iter().map(|q| (q.id, q.correct_option_index)).collect();

        assert_eq!(score(&questions, &perfect), ScoreSummary { score: 8, total_marks: 8 });
        assert_eq!(score(&questions, &AnswerMap::new()), ScoreSummary { score: 0, total_marks: 8 });
    }

    #[test]
    fn unanswered_questions_still_count_towards_total() {
        let questions: Vec<Question> = (1..=5).map(|id| question(id, 1, 2)).collect();
        let answers = AnswerMap::from([(2, 1), (4, 1)]);

        let summary = score(&questions, &answers);
        assert_eq!(summary, ScoreSummary { score: 4, total_marks: 10 });

        let graded = grade(&questions, &answers);
        let unanswered = graded.iter().filter(|g| g.outcome == Outcome::Unanswered).count();
        assert_eq!(unanswered, 3);
    }

    #[test]
    fn answers_for_unknown_questions_are_ignored() {
        let questions = vec![question(1, 0, 1)];
        let answers = AnswerMap::from([(1, 0), (99, 0)]);
        assert_eq!(score(&questions, &answers), ScoreSummary { score: 1, total_marks: 1 });
    }

    #[test]
    fn score_does_not_depend_on_presentation_order() {
        let questions: Vec<Question> = (1..=12).map(|id| question(id, (id % 4) as u8, id)).collect();
        let answers: AnswerMap = questions
            .iter()
            .filter(|q| q.id % 3 != 0)
            .map(|q| (q.id, if q.id % 2 == 0 { q.correct_option_index } else { 3 }))
            .collect();
        let expected = score(&questions, &answers);

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let order = presentation_order(&questions, true, &mut rng);
            let shuffled: Vec<Question> = order
                .iter()
                .filter_map(|id| questions.iter().find(|q| q.id == *id).cloned())
                .collect();
            assert_eq!(score(&shuffled, &answers), expected);
        }
    }

    #[test]
    fn extreme_marks_saturate_instead_of_overflowing() {
        let questions = vec![question(1, 0, i32::MAX), question(2, 0, i32::MAX)];
        let answers = AnswerMap::from([(1, 0), (2, 0)]);
        assert_eq!(
            score(&questions, &answers),
            ScoreSummary { score: i32::MAX, total_marks: i32::MAX }
        );
    }
}
