use std::cmp::Reverse;
use std::collections::HashMap;

use super::protocol::RankingEntry;
use super::questions::Question;
use super::room::{AnswerRecord, Player};

/// Compute the ranking over a question set.
///
/// A correct answer scores one point and contributes the client-reported
/// answer time; a wrong or missing answer contributes `timeout_penalty_ms`
/// instead, so speed only matters when correct. Ties break by ascending
/// total time, then by player id, which makes the order total and the
/// computation idempotent. Ranks are 1-based and always distinct.
pub fn compute_ranking(
    players: &HashMap<String, Player>,
    answers: &HashMap<usize, HashMap<String, AnswerRecord>>,
    questions: &[Question],
    timeout_penalty_ms: u64,
) -> Vec<RankingEntry> {
    let mut rankings: Vec<RankingEntry> = players
        .values()
        .map(|player| {
            let mut score = 0u32;
            let mut total_answer_time = 0u64;

            for (index, question) in questions.iter().enumerate() {
                let record = answers.get(&index).and_then(|by_player| by_player.get(&player.id));

                match record {
                    Some(record) if record.answer_index == Some(question.correct_answer) => {
                        score += 1;
                        total_answer_time += record.answer_time;
                    }
                    _ => total_answer_time += timeout_penalty_ms,
                }
            }

            RankingEntry {
                player_id: player.id.clone(),
                player_name: player.name.clone(),
                score,
                total_answer_time,
                rank: 0,
            }
        })
        .collect();

    rankings.sort_by(|a, b| {
        (Reverse(a.score), a.total_answer_time, &a.player_id)
            .cmp(&(Reverse(b.score), b.total_answer_time, &b.player_id))
    });

    for (index, entry) in rankings.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    rankings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::protocol::unix_millis;

    fn player(id: &str) -> Player {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        Player::new(id.to_string(), format!("name-{}", id), false, tx)
    }

    fn record(answer_index: Option<usize>, answer_time: u64) -> AnswerRecord {
        AnswerRecord {
            answer_index,
            answer_time,
            timestamp: unix_millis(),
        }
    }

    fn two_questions() -> Vec<Question> {
        vec![
            Question::new("q0", &["a", "b"], 0),
            Question::new("q1", &["a", "b"], 1),
        ]
    }

    #[test]
    fn test_correct_answers_score_and_accumulate_time() {
        let mut players = HashMap::new();
        players.insert("p1".to_string(), player("p1"));

        let mut answers: HashMap<usize, HashMap<String, AnswerRecord>> = HashMap::new();
        answers.entry(0).or_default().insert("p1".to_string(), record(Some(0), 3_000));
        answers.entry(1).or_default().insert("p1".to_string(), record(Some(1), 5_000));

        let rankings = compute_ranking(&players, &answers, &two_questions(), 20_000);
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].score, 2);
        assert_eq!(rankings[0].total_answer_time, 8_000);
        assert_eq!(rankings[0].rank, 1);
    }

    #[test]
    fn test_wrong_answer_takes_full_penalty_not_reported_time() {
        let mut players = HashMap::new();
        players.insert("p1".to_string(), player("p1"));

        // Fast but wrong on q0, unanswered q1
        let mut answers: HashMap<usize, HashMap<String, AnswerRecord>> = HashMap::new();
        answers.entry(0).or_default().insert("p1".to_string(), record(Some(1), 800));

        let rankings = compute_ranking(&players, &answers, &two_questions(), 20_000);
        assert_eq!(rankings[0].score, 0);
        assert_eq!(rankings[0].total_answer_time, 40_000);
    }

    #[test]
    fn test_null_answer_counts_as_missing() {
        let mut players = HashMap::new();
        players.insert("p1".to_string(), player("p1"));

        let mut answers: HashMap<usize, HashMap<String, AnswerRecord>> = HashMap::new();
        answers.entry(0).or_default().insert("p1".to_string(), record(None, 1_000));

        let rankings = compute_ranking(&players, &answers, &two_questions(), 20_000);
        assert_eq!(rankings[0].score, 0);
        assert_eq!(rankings[0].total_answer_time, 40_000);
    }

    #[test]
    fn test_sort_score_desc_then_time_asc() {
        let mut players = HashMap::new();
        for id in ["p1", "p2", "p3"] {
            players.insert(id.to_string(), player(id));
        }

        let mut answers: HashMap<usize, HashMap<String, AnswerRecord>> = HashMap::new();
        // p1: both correct, slow. p2: both correct, fast. p3: one correct.
        answers.entry(0).or_default().insert("p1".to_string(), record(Some(0), 9_000));
        answers.entry(1).or_default().insert("p1".to_string(), record(Some(1), 9_000));
        answers.entry(0).or_default().insert("p2".to_string(), record(Some(0), 2_000));
        answers.entry(1).or_default().insert("p2".to_string(), record(Some(1), 2_000));
        answers.entry(0).or_default().insert("p3".to_string(), record(Some(0), 1_000));

        let rankings = compute_ranking(&players, &answers, &two_questions(), 20_000);
        let order: Vec<&str> = rankings.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["p2", "p1", "p3"]);
        assert_eq!(
            rankings.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_exact_tie_breaks_by_player_id_with_distinct_ranks() {
        let mut players = HashMap::new();
        players.insert("beta".to_string(), player("beta"));
        players.insert("alpha".to_string(), player("alpha"));

        // Identical score and identical total time
        let mut answers: HashMap<usize, HashMap<String, AnswerRecord>> = HashMap::new();
        for id in ["alpha", "beta"] {
            answers.entry(0).or_default().insert(id.to_string(), record(Some(0), 45_000));
            answers.entry(1).or_default().insert(id.to_string(), record(Some(1), 0));
        }

        let rankings = compute_ranking(&players, &answers, &two_questions(), 20_000);
        assert_eq!(rankings[0].player_id, "alpha");
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[1].player_id, "beta");
        assert_eq!(rankings[1].rank, 2);
    }

    #[test]
    fn test_idempotent_over_same_ledger() {
        let mut players = HashMap::new();
        for id in ["p1", "p2", "p3", "p4"] {
            players.insert(id.to_string(), player(id));
        }

        let mut answers: HashMap<usize, HashMap<String, AnswerRecord>> = HashMap::new();
        answers.entry(0).or_default().insert("p1".to_string(), record(Some(0), 3_000));
        answers.entry(0).or_default().insert("p2".to_string(), record(Some(0), 3_000));
        answers.entry(1).or_default().insert("p3".to_string(), record(Some(1), 7_000));

        let first = compute_ranking(&players, &answers, &two_questions(), 20_000);
        let second = compute_ranking(&players, &answers, &two_questions(), 20_000);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_question_range() {
        let mut players = HashMap::new();
        players.insert("p1".to_string(), player("p1"));

        let rankings = compute_ranking(&players, &HashMap::new(), &[], 20_000);
        assert_eq!(rankings[0].score, 0);
        assert_eq!(rankings[0].total_answer_time, 0);
    }
}
