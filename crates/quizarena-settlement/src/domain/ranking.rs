//! Ranking evaluation.

use std::collections::BTreeMap;

use quizarena_core::repository::{RankingRow, TournamentEntry};
use serde::{Deserialize, Serialize};

/// Answer key for a finished tournament.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentResults {
    /// Question id to the index of its correct option.
    pub correct_options: BTreeMap<String, u32>,
}

impl TournamentResults {
    /// Whether `option_index` is the correct answer to `question_id`.
    #[must_use]
    pub fn is_correct(&self, question_id: &str, option_index: u32) -> bool {
        self.correct_options.get(question_id) == Some(&option_index)
    }
}

struct Scored<'a> {
    participant_id: &'a str,
    correct_count: u32,
    average_latency_ms: u64,
}

fn score<'a>(entry: &'a TournamentEntry, results: &TournamentResults) -> Scored<'a> {
    let correct = entry
        .answers
        .iter()
        .filter(|a| results.is_correct(&a.question_id, a.option_index))
        .count();

    let average_latency_ms = if entry.answers.is_empty() {
        0
    } else {
        let total: u128 = entry
            .answers
            .iter()
            .map(|a| u128::from(a.latency_ms))
            .sum();
        let count = entry.answers.len() as u128;
        u64::try_from(total / count).unwrap_or(u64::MAX)
    };

    Scored {
        participant_id: &entry.participant_id,
        correct_count: u32::try_from(correct).unwrap_or(u32::MAX),
        average_latency_ms,
    }
}

/// Ranks entries by correct answers (descending), then average latency
/// (ascending), then participant id, and assigns dense 1-based positions.
#[must_use]
pub fn evaluate_ranking(entries: &[TournamentEntry], results: &TournamentResults) -> Vec<RankingRow> {
    let mut scored: Vec<Scored<'_>> = entries.iter().map(|e| score(e, results)).collect();
    scored.sort_by(|a, b| {
        b.correct_count
            .cmp(&a.correct_count)
            .then(a.average_latency_ms.cmp(&b.average_latency_ms))
            .then(a.participant_id.cmp(b.participant_id))
    });

    scored
        .into_iter()
        .zip(1_u32..)
        .map(|(row, position)| RankingRow {
            participant_id: row.participant_id.to_owned(),
            correct_count: row.correct_count,
            average_latency_ms: row.average_latency_ms,
            position,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizarena_core::repository::EntryAnswer;

    fn results(key: &[(&str, u32)]) -> TournamentResults {
        TournamentResults {
            correct_options: key.iter().map(|(q, o)| ((*q).to_owned(), *o)).collect(),
        }
    }

    fn entry(participant_id: &str, answers: &[(&str, u32, u64)]) -> TournamentEntry {
        TournamentEntry {
            participant_id: participant_id.to_owned(),
            answers: answers
                .iter()
                .map(|(q, o, l)| EntryAnswer {
                    question_id: (*q).to_owned(),
                    option_index: *o,
                    latency_ms: *l,
                })
                .collect(),
        }
    }

    #[test]
    fn test_evaluate_ranking_orders_by_correct_then_latency() {
        // Arrange
        let key = results(&[("q1", 0), ("q2", 1), ("q3", 2)]);
        let entries = vec![
            entry("slow", &[("q1", 0, 200), ("q2", 1, 100), ("q3", 0, 150)]),
            entry("best", &[("q1", 0, 100), ("q2", 1, 100), ("q3", 2, 100)]),
            entry("fast", &[("q1", 0, 100), ("q2", 1, 120), ("q3", 1, 140)]),
        ];

        // Act
        let ranking = evaluate_ranking(&entries, &key);

        // Assert
        let order: Vec<(&str, u32, u64, u32)> = ranking
            .iter()
            .map(|r| {
                (
                    r.participant_id.as_str(),
                    r.correct_count,
                    r.average_latency_ms,
                    r.position,
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![("best", 3, 100, 1), ("fast", 2, 120, 2), ("slow", 2, 150, 3)]
        );
    }

    #[test]
    fn test_evaluate_ranking_breaks_full_ties_by_participant_id() {
        let key = results(&[("q1", 0)]);
        let entries = vec![entry("bob", &[("q1", 0, 50)]), entry("alice", &[("q1", 0, 50)])];

        let ranking = evaluate_ranking(&entries, &key);

        assert_eq!(ranking[0].participant_id, "alice");
        assert_eq!(ranking[1].participant_id, "bob");
    }

    #[test]
    fn test_evaluate_ranking_entry_without_answers_has_zero_latency() {
        let key = results(&[("q1", 0)]);
        let entries = vec![entry("idle", &[]), entry("player", &[("q1", 1, 300)])];

        let ranking = evaluate_ranking(&entries, &key);

        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].participant_id, "idle");
        assert_eq!(ranking[0].average_latency_ms, 0);
        assert_eq!(ranking[1].correct_count, 0);
    }

    #[test]
    fn test_evaluate_ranking_ignores_unknown_questions() {
        let key = results(&[("q1", 0)]);
        let entries = vec![entry("p", &[("q1", 0, 10), ("q9", 0, 30)])];

        let ranking = evaluate_ranking(&entries, &key);

        assert_eq!(ranking[0].correct_count, 1);
        assert_eq!(ranking[0].average_latency_ms, 20);
    }

    #[test]
    fn test_evaluate_ranking_positions_are_dense_and_unique() {
        let key = results(&[("q1", 0)]);
        let entries: Vec<TournamentEntry> = (0..5)
            .map(|i| entry(&format!("p{i}"), &[("q1", 0, 100)]))
            .collect();

        let ranking = evaluate_ranking(&entries, &key);

        let positions: Vec<u32> = ranking.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }
}
