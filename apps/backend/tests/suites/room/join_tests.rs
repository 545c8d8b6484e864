use sketch_backend::ws::protocol::{Verb, END_TIME, WORD};

use crate::support::probe::TestPlayer;
use crate::support::rooms::{fast_rules, join, settle, Cluster, WAIT};

#[actix_web::test]
async fn first_player_becomes_artist_and_alone_sees_the_word() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let a = TestPlayer::new("alice");

    join(&process, "r1", &a).await;

    let passed = a
        .inbox
        .wait_for("PASSED for alice", WAIT, |e| e.verb == Verb::Passed)
        .await;
    assert_eq!(passed.player_name(), Some("alice"));
    assert_eq!(passed.str_field(WORD), Some("cat"));
    assert!(passed.i64_field(END_TIME).is_some());
    assert_eq!(cluster.turn_order("r1").await, vec!["alice"]);
    assert_eq!(cluster.scores("r1").await, vec![("alice".to_string(), 0)]);
}

#[actix_web::test]
async fn later_player_gets_roster_and_round_without_the_word() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let a = TestPlayer::new("alice");
    let b = TestPlayer::new("bob");

    join(&process, "r1", &a).await;
    a.inbox
        .wait_for("initial PASSED", WAIT, |e| e.verb == Verb::Passed)
        .await;
    join(&process, "r1", &b).await;

    a.inbox
        .wait_for("JOINED bob", WAIT, |e| {
            e.verb == Verb::Joined && e.player_name() == Some("bob")
        })
        .await;
    let passed = b
        .inbox
        .wait_for("PASSED for bob", WAIT, |e| e.verb == Verb::Passed)
        .await;
    assert_eq!(passed.player_name(), Some("alice"));
    assert_eq!(passed.str_field(WORD), None);

    let joined: Vec<_> = b
        .inbox
        .of(Verb::Joined)
        .into_iter()
        .map(|e| e.player_name().map(str::to_string))
        .collect();
    assert_eq!(joined, vec![Some("alice".to_string())]);

    settle().await;
    // nobody hears about their own arrival
    assert!(b
        .inbox
        .of(Verb::Joined)
        .iter()
        .all(|e| e.player_name() != Some("bob")));
    assert_eq!(cluster.turn_order("r1").await, vec!["alice", "bob"]);
}

#[actix_web::test]
async fn joining_twice_does_not_duplicate_the_player() {
    let cluster = Cluster::new(&["cat"]);
    let process = cluster.process(fast_rules());
    let a = TestPlayer::new("alice");
    let b = TestPlayer::new("bob");

    join(&process, "r1", &a).await;
    join(&process, "r1", &b).await;
    join(&process, "r1", &b).await;

    assert_eq!(cluster.turn_order("r1").await, vec!["alice", "bob"]);
    assert_eq!(cluster.scores("r1").await.len(), 2);
    assert_eq!(process.get("r1").unwrap().local_count(), 2);
}

#[actix_web::test]
async fn same_identity_on_a_second_connection_is_not_queued_again() {
    let cluster = Cluster::new(&["cat"]);
    let process = cluster.process(fast_rules());
    let a = TestPlayer::new("alice");
    let a_again = TestPlayer::new("alice");

    join(&process, "r1", &a).await;
    join(&process, "r1", &a_again).await;

    assert_eq!(cluster.turn_order("r1").await, vec!["alice"]);
    // the clock was already running, so the second connection is told privately
    let passed = a_again
        .inbox
        .wait_for("private PASSED", WAIT, |e| e.verb == Verb::Passed)
        .await;
    assert_eq!(passed.str_field(WORD), Some("cat"));
}

#[actix_web::test]
async fn sessions_are_cached_per_room() {
    let cluster = Cluster::new(&["cat"]);
    let process = cluster.process(fast_rules());
    let a = TestPlayer::new("alice");
    let b = TestPlayer::new("bob");

    let first = join(&process, "r1", &a).await;
    let second = join(&process, "r2", &b).await;
    let again = process.find_or_create("r1").await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &again));
    assert!(!std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(process.len(), 2);
}
