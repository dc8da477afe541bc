use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::question::Question;

/// Question ids in the order a student will see them.
///
/// Returns a fresh working copy; `questions` itself is never reordered, so the
/// next attempt shuffles independently. Option order inside a question is
/// left alone.
pub fn presentation_order<R: Rng + ?Sized>(
    questions: &[Question],
    shuffle: bool,
    rng: &mut R,
) -> Vec<i32> {
    let mut order: Vec<i32> = questions.iter().map(|q| q.id).collect();
    if shuffle {
        order.shuffle(rng);
    }
    order
}
