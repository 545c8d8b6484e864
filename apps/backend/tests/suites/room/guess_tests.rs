use std::sync::Arc;

use sketch_backend::game::{Directory, GameRules};
use sketch_backend::ws::protocol::{Verb, CORRECT, GUESSER, SCORE, WORD};

use crate::support::probe::TestPlayer;
use crate::support::rooms::{fast_rules, join, settle, Cluster, DepartBeforeReset, WAIT};

#[actix_web::test]
async fn wrong_then_right_guess_passes_the_turn_to_the_guesser() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;
    assert_eq!(cluster.word("r1").await.as_deref(), Some("cat"));

    room.guess("B", "dog").await.unwrap();
    let wrong = b
        .inbox
        .wait_for("GUESSED dog", WAIT, |e| {
            e.verb == Verb::Guessed && e.str_field(WORD) == Some("dog")
        })
        .await;
    assert_eq!(wrong.bool_field(CORRECT), Some(false));
    settle().await;
    assert_eq!(cluster.turn_order("r1").await, vec!["A", "B"]);

    room.guess("B", "CAT").await.unwrap();
    let right = a
        .inbox
        .wait_for("GUESSED CAT", WAIT, |e| {
            e.verb == Verb::Guessed && e.str_field(WORD) == Some("CAT")
        })
        .await;
    assert_eq!(right.bool_field(CORRECT), Some(true));

    let to_b = b
        .inbox
        .wait_for("PASSED naming B", WAIT, |e| {
            e.verb == Verb::Passed && e.player_name() == Some("B")
        })
        .await;
    assert_eq!(to_b.str_field(WORD), Some("mouse"));
    assert_eq!(to_b.str_field(GUESSER), Some("B"));
    assert_eq!(to_b.i64_field(SCORE), Some(1));

    let to_a = a
        .inbox
        .wait_for("PASSED naming B", WAIT, |e| {
            e.verb == Verb::Passed && e.player_name() == Some("B")
        })
        .await;
    assert_eq!(to_a.str_field(WORD), None);

    let mut scores = cluster.scores("r1").await;
    scores.sort();
    assert_eq!(scores, vec![("A".to_string(), 0), ("B".to_string(), 1)]);
    assert_eq!(cluster.words.wins("cat"), Some(1));
}

#[actix_web::test]
async fn artist_cannot_guess() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;

    room.guess("A", "cat").await.unwrap();
    settle().await;

    assert!(b.inbox.of(Verb::Guessed).is_empty());
    assert_eq!(cluster.turn_order("r1").await, vec!["A", "B"]);
}

#[actix_web::test]
async fn reaching_the_win_score_announces_a_winner_and_resets_scores() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let rules = GameRules {
        win_score: 1,
        ..fast_rules()
    };
    let process = cluster.process(rules);
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;

    room.guess("B", " cat ").await.unwrap();

    let won = a
        .inbox
        .wait_for("WON", WAIT, |e| e.verb == Verb::Won)
        .await;
    assert_eq!(won.player_name(), Some("B"));

    // the winning pass still carries the final score
    let passed = a
        .inbox
        .wait_for("PASSED with score", WAIT, |e| {
            e.verb == Verb::Passed && e.i64_field(SCORE).is_some()
        })
        .await;
    assert_eq!(passed.i64_field(SCORE), Some(1));

    let mut scores = cluster.scores("r1").await;
    scores.sort();
    assert_eq!(scores, vec![("A".to_string(), 0), ("B".to_string(), 0)]);
}

#[actix_web::test]
async fn secret_word_only_reaches_the_new_artist() {
    let cluster = Cluster::new(&["cat", "mouse", "dog"]);
    let process = cluster.process(fast_rules());
    let players: Vec<_> = ["A", "B", "C", "D"].iter().map(|n| TestPlayer::new(n)).collect();
    let mut room = None;
    for p in &players {
        room = Some(join(&process, "r1", p).await);
    }
    let room = room.unwrap();

    // C guesses, but the seat passes in turn order, so B draws next
    room.guess("C", "cat").await.unwrap();
    for p in &players {
        let passed = p
            .inbox
            .wait_for("PASSED naming B", WAIT, |e| {
                e.verb == Verb::Passed && e.player_name() == Some("B")
            })
            .await;
        if p.name == "B" {
            assert_eq!(passed.str_field(WORD), Some("mouse"));
        } else {
            assert_eq!(passed.str_field(WORD), None);
        }
    }
    assert_eq!(cluster.turn_order("r1").await, vec!["B", "C", "D", "A"]);

    for p in &players {
        for passed in p.inbox.of(Verb::Passed) {
            if passed.str_field(WORD).is_some() {
                assert_eq!(passed.player_name(), Some(p.name.as_str()));
            }
        }
    }
}

#[actix_web::test]
async fn win_reset_does_not_resurrect_a_departed_player() {
    let cluster = Cluster::new(&["cat", "mouse", "dog"]);
    let store = Arc::new(DepartBeforeReset::new(cluster.store.clone(), "r1", "C"));
    let rules = GameRules {
        win_score: 1,
        ..fast_rules()
    };
    let process = Directory::new(store, cluster.words.clone(), rules);
    let (a, b, c) = (TestPlayer::new("A"), TestPlayer::new("B"), TestPlayer::new("C"));
    join(&process, "r1", &a).await;
    join(&process, "r1", &b).await;
    let room = join(&process, "r1", &c).await;

    room.guess("B", "cat").await.unwrap();
    a.inbox
        .wait_for("WON", WAIT, |e| e.verb == Verb::Won)
        .await;

    assert_eq!(
        cluster.scores("r1").await,
        vec![("A".to_string(), 0), ("B".to_string(), 0)]
    );
    assert_eq!(cluster.turn_order("r1").await, vec!["B", "A"]);

    // coming back seats C again, exactly once
    let returning = TestPlayer::new("C");
    join(&process, "r1", &returning).await;
    assert_eq!(cluster.turn_order("r1").await, vec!["B", "A", "C"]);
    assert_eq!(
        cluster.scores("r1").await,
        vec![
            ("A".to_string(), 0),
            ("B".to_string(), 0),
            ("C".to_string(), 0)
        ]
    );
}
