use serde_json::json;
use sketch_backend::ws::protocol::{Verb, DISCONNECTED, WORD};

use crate::support::probe::TestPlayer;
use crate::support::rooms::{fast_rules, join, settle, Cluster, WAIT};

#[actix_web::test]
async fn departing_artist_hands_over_the_turn_first() {
    let cluster = Cluster::new(&["cat", "mouse", "dog"]);
    let process = cluster.process(fast_rules());
    let (a, b, c) = (TestPlayer::new("A"), TestPlayer::new("B"), TestPlayer::new("C"));
    join(&process, "r1", &a).await;
    join(&process, "r1", &b).await;
    let room = join(&process, "r1", &c).await;

    room.disconnect(a.conn_id).await.unwrap();

    let passed = b
        .inbox
        .wait_for("PASSED naming B", WAIT, |e| {
            e.verb == Verb::Passed && e.player_name() == Some("B")
        })
        .await;
    assert_eq!(passed.str_field(WORD), Some("mouse"));

    let departed = c
        .inbox
        .wait_for("DEPARTED A", WAIT, |e| e.verb == Verb::Departed)
        .await;
    assert_eq!(departed.player_name(), Some("A"));
    assert_eq!(departed.bool_field(DISCONNECTED), Some(true));

    assert_eq!(cluster.turn_order("r1").await, vec!["B", "C"]);
    let names: Vec<String> = cluster.scores("r1").await.into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["B", "C"]);
}

#[actix_web::test]
async fn voluntary_leave_is_not_a_disconnect() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;

    room.leave(b.conn_id).await.unwrap();

    let departed = a
        .inbox
        .wait_for("DEPARTED B", WAIT, |e| e.verb == Verb::Departed)
        .await;
    assert_eq!(departed.player_name(), Some("B"));
    assert_eq!(departed.bool_field(DISCONNECTED), Some(false));
    assert_eq!(cluster.turn_order("r1").await, vec!["A"]);
}

#[actix_web::test]
async fn last_leave_clears_the_room() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let a = TestPlayer::new("A");
    let room = join(&process, "r1", &a).await;

    room.leave(a.conn_id).await.unwrap();

    assert!(room.is_closed());
    assert!(process.get("r1").is_none());
    assert!(cluster.turn_order("r1").await.is_empty());
    assert!(cluster.scores("r1").await.is_empty());
    assert_eq!(cluster.word("r1").await, None);

    // the room starts over on the next join
    let again = TestPlayer::new("A");
    let fresh = join(&process, "r1", &again).await;
    assert!(!std::sync::Arc::ptr_eq(&room, &fresh));
    let passed = again
        .inbox
        .wait_for("fresh PASSED", WAIT, |e| e.verb == Verb::Passed)
        .await;
    assert_eq!(passed.player_name(), Some("A"));
    assert!(passed.str_field(WORD).is_some());
}

#[actix_web::test]
async fn dead_mailbox_is_detached_as_a_disconnect() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;
    settle().await;

    b.kill().await;
    room.draw("A", json!([[0, 0]])).await.unwrap();

    let departed = a
        .inbox
        .wait_for("DEPARTED B", WAIT, |e| e.verb == Verb::Departed)
        .await;
    assert_eq!(departed.player_name(), Some("B"));
    assert_eq!(departed.bool_field(DISCONNECTED), Some(true));
    assert!(!room.has_connection(b.conn_id));
    assert_eq!(cluster.turn_order("r1").await, vec!["A"]);
}
