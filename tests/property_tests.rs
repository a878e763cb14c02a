//! Property tests for scoring and rating invariants

use approx::assert_abs_diff_eq;
use bedwars_rating::config::{PerformanceWeights, RatingConfig};
use bedwars_rating::rating::calculator::{PlayerRatingInput, RatingCalculator, TeamRatingInput};
use bedwars_rating::rating::{MultiTeamEloCalculator, PerformanceScorer};
use bedwars_rating::types::{CombatStats, MatchOutcome, PerformanceScore};
use bedwars_rating::utils::round_rating;
use proptest::prelude::*;

fn counter() -> impl Strategy<Value = u32> {
    prop_oneof![4 => 0u32..60, 1 => any::<u32>()]
}

fn combat_stats() -> impl Strategy<Value = CombatStats> {
    (counter(), counter(), counter(), counter())
        .prop_map(|(k, d, b, f)| CombatStats::new(k, d, b, f))
}

fn team(index: usize, size: usize) -> impl Strategy<Value = TeamRatingInput> {
    prop::collection::vec((600.0f64..2400.0, 0.5f64..1.5), size).prop_map(move |players| {
        TeamRatingInput {
            name: format!("team_{}", index),
            players: players
                .into_iter()
                .enumerate()
                .map(|(p, (rating, multiplier))| PlayerRatingInput {
                    player_id: format!("t{}p{}", index, p),
                    rating,
                    performance: PerformanceScore {
                        raw: multiplier,
                        normalized: multiplier,
                    },
                })
                .collect(),
        }
    })
}

fn teams() -> impl Strategy<Value = Vec<TeamRatingInput>> {
    (2usize..=8, 1usize..=5).prop_flat_map(|(count, size)| {
        (0..count).map(|i| team(i, size)).collect::<Vec<_>>()
    })
}

proptest! {
    #[test]
    fn prop_raw_score_within_bounds(
        player in combat_stats(),
        group in prop::collection::vec(combat_stats(), 0..6),
    ) {
        for weights in [PerformanceWeights::standard(), PerformanceWeights::mega()] {
            let raw = PerformanceScorer::raw_score(&weights, &player, &group);
            prop_assert!(raw >= weights.score_min && raw <= weights.score_max);
        }
    }

    #[test]
    fn prop_multiplier_within_bounds(raw in 0.0f64..10.0, average in 0.0f64..10.0) {
        for weights in [PerformanceWeights::standard(), PerformanceWeights::mega()] {
            let multiplier = PerformanceScorer::normalize(&weights, raw, average);
            prop_assert!(
                multiplier >= weights.multiplier_min && multiplier <= weights.multiplier_max
            );
        }
    }

    #[test]
    fn prop_deltas_are_zero_sum(teams in teams(), winner in 0usize..8, tie in any::<bool>()) {
        let calculator = MultiTeamEloCalculator::new(RatingConfig::default()).unwrap();
        let outcome = if tie {
            MatchOutcome::Tie
        } else {
            MatchOutcome::Winner(winner % teams.len())
        };

        let result = calculator.compute_deltas(&teams, outcome, 40.0).unwrap();
        prop_assert_eq!(result.changes.len(), teams.iter().map(|t| t.players.len()).sum::<usize>());
        prop_assert!(result.total_delta().abs() < 1e-6);
        for change in &result.changes {
            prop_assert!(change.delta.is_finite());
        }
    }

    #[test]
    fn prop_equal_ratings_reward_the_winner(
        count in 2usize..=6,
        size in 1usize..=4,
        winner in 0usize..6,
    ) {
        let winner = winner % count;
        let teams: Vec<TeamRatingInput> = (0..count)
            .map(|t| TeamRatingInput {
                name: format!("team_{}", t),
                players: (0..size)
                    .map(|p| PlayerRatingInput {
                        player_id: format!("t{}p{}", t, p),
                        rating: 1200.0,
                        performance: PerformanceScore::default(),
                    })
                    .collect(),
            })
            .collect();

        let calculator = MultiTeamEloCalculator::new(RatingConfig::default()).unwrap();
        let result = calculator
            .compute_deltas(&teams, MatchOutcome::Winner(winner), 40.0)
            .unwrap();

        for (index, team_delta) in result.team_deltas.iter().enumerate() {
            if index == winner {
                prop_assert!(team_delta.delta > 0.0);
            } else {
                prop_assert!(team_delta.delta <= 0.0);
            }
        }
    }

    #[test]
    fn prop_rounding_is_stable(rating in -5000.0f64..5000.0) {
        let once = round_rating(rating);
        prop_assert_eq!(round_rating(once), once);
        prop_assert!((once - rating).abs() <= 0.05 + 1e-9);
    }
}

#[test]
fn test_two_team_reference_values() {
    let calculator = MultiTeamEloCalculator::new(RatingConfig::default()).unwrap();
    let team = |name: &str| TeamRatingInput {
        name: name.to_string(),
        players: (0..2)
            .map(|p| PlayerRatingInput {
                player_id: format!("{}{}", name, p),
                rating: 1200.0,
                performance: PerformanceScore::default(),
            })
            .collect(),
    };

    let result = calculator
        .compute_deltas(&[team("red"), team("yellow")], MatchOutcome::Winner(0), 40.0)
        .unwrap();

    assert_abs_diff_eq!(result.team_deltas[0].delta, 20.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.team_deltas[1].delta, -20.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.total_delta(), 0.0, epsilon = 1e-9);
}
