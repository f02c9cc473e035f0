// src/services/scoring.rs

use std::collections::HashMap;

use serde::Serialize;

use crate::models::progress::{AnswerRecord, Tally};

/// Result of tallying a user's answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreOutcome {
    pub top_category_id: Option<String>,
    pub tally: Tally,
}

/// Tallies answers into categories and picks the leader.
///
/// Answers are scanned in the order given (ascending question index). Keys
/// with no mapping are skipped. The leader only changes when a category's
/// count becomes strictly greater than the current best, so on a tie the
/// category that reached the shared count first keeps the lead.
pub fn score_answers(
    answers: &[AnswerRecord],
    outcome_map: &HashMap<String, String>,
) -> ScoreOutcome {
    let mut tally = Tally::new();
    let mut leader: Option<(&str, u32)> = None;

    for answer in answers {
        let Some(category) = outcome_map.get(&answer.option_key.to_ascii_uppercase()) else {
            continue;
        };
        let count = {
            let entry = tally.entry(category.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if leader.is_none_or(|(_, best)| count > best) {
            leader = Some((category.as_str(), count));
        }
    }

    ScoreOutcome {
        top_category_id: leader.map(|(id, _)| id.to_string()),
        tally,
    }
}
