//! Pure scoring helpers: the speed-points formula, the per-choice answer
//! histogram, and scoreboard ordering.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::types::{PlayerId, ScoreEntry, CHOICE_COUNT};

/// Points for a correct answer given how much of the window had elapsed.
///
/// `floor(500 + 500 * remaining / duration)`: a full-speed answer earns
/// 1000, an answer on the buzzer earns 500. Monotonically non-increasing in
/// elapsed time.
pub fn speed_points(duration: Duration, elapsed: Duration) -> u32 {
    if duration.is_zero() {
        return 500;
    }
    let remaining = duration.saturating_sub(elapsed);
    let fraction = remaining.as_secs_f64() / duration.as_secs_f64();
    (500.0 + 500.0 * fraction).floor() as u32
}

/// Count received answers per choice.
pub fn histogram(answers: &HashMap<PlayerId, (usize, Instant)>) -> [u32; CHOICE_COUNT] {
    let mut counts = [0u32; CHOICE_COUNT];
    for (choice, _) in answers.values() {
        if *choice < CHOICE_COUNT {
            counts[*choice] += 1;
        }
    }
    counts
}

/// Players who picked the correct choice, ordered fastest first.
pub fn fastest_correct(
    answers: &HashMap<PlayerId, (usize, Instant)>,
    correct_index: usize,
) -> Vec<(PlayerId, Instant)> {
    let mut correct: Vec<(PlayerId, Instant)> = answers
        .iter()
        .filter(|(_, (choice, _))| *choice == correct_index)
        .map(|(player, (_, at))| (player.clone(), *at))
        .collect();
    correct.sort_by_key(|(_, at)| *at);
    correct
}

/// Add points to a player's running total, appending a new row for players
/// scoring for the first time so insertion order records who reached the
/// board first.
pub fn add_points(scores: &mut Vec<ScoreEntry>, player: &PlayerId, points: u32) {
    match scores.iter_mut().find(|entry| &entry.player == player) {
        Some(entry) => entry.points += points,
        None => scores.push(ScoreEntry {
            player: player.clone(),
            points,
        }),
    }
}

/// The scoreboard sorted descending by points, ties kept in first-reached
/// order (stable sort over the insertion-ordered rows), truncated to `limit`.
pub fn top_scores(scores: &[ScoreEntry], limit: usize) -> Vec<ScoreEntry> {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| b.points.cmp(&a.points));
    sorted.truncate(limit);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn speed_points_bounds() {
        let duration = secs(10);
        assert_eq!(speed_points(duration, secs(0)), 1000);
        assert_eq!(speed_points(duration, secs(10)), 500);
        // Late answers never dip below the floor.
        assert_eq!(speed_points(duration, secs(30)), 500);
    }

    #[test]
    fn speed_points_example_from_scoring_rules() {
        // 2 of 10 seconds elapsed: floor(500 + 500 * 8/10) = 900.
        assert_eq!(speed_points(secs(10), secs(2)), 900);
    }

    #[test]
    fn speed_points_monotonic_in_elapsed() {
        let duration = secs(30);
        let mut last = u32::MAX;
        for ms in (0..=30_000).step_by(250) {
            let points = speed_points(duration, Duration::from_millis(ms));
            assert!(points <= last);
            assert!((500..=1000).contains(&points));
            last = points;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn histogram_and_fastest() {
        let start = Instant::now();
        let mut answers: HashMap<PlayerId, (usize, Instant)> = HashMap::new();
        answers.insert("slow".to_string(), (2, start + secs(8)));
        answers.insert("fast".to_string(), (2, start + secs(1)));
        answers.insert("wrong".to_string(), (0, start + secs(3)));

        assert_eq!(histogram(&answers), [1, 0, 2, 0]);

        let ordered = fastest_correct(&answers, 2);
        let names: Vec<&str> = ordered.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(names, vec!["fast", "slow"]);
    }

    #[test]
    fn add_points_accumulates() {
        let mut scores = Vec::new();
        add_points(&mut scores, &"a".to_string(), 900);
        add_points(&mut scores, &"a".to_string(), 500);
        add_points(&mut scores, &"b".to_string(), 700);
        assert_eq!(scores[0].points, 1400);
        assert_eq!(scores[1].player, "b");
    }

    #[test]
    fn top_scores_sorts_stable_and_truncates() {
        let scores = vec![
            ScoreEntry {
                player: "first".to_string(),
                points: 500,
            },
            ScoreEntry {
                player: "second".to_string(),
                points: 500,
            },
            ScoreEntry {
                player: "leader".to_string(),
                points: 900,
            },
        ];
        let top = top_scores(&scores, 2);
        assert_eq!(top[0].player, "leader");
        // Tie between first and second resolves to whoever scored first.
        assert_eq!(top[1].player, "first");
        assert_eq!(top.len(), 2);
    }
}
