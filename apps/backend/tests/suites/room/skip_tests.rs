use sketch_backend::ws::protocol::Verb;

use crate::support::probe::TestPlayer;
use crate::support::rooms::{fast_rules, join, settle, Cluster, WAIT};

#[actix_web::test]
async fn strict_majority_of_non_artists_skips_the_artist_once() {
    let cluster = Cluster::new(&["cat", "mouse", "dog"]);
    let process = cluster.process(fast_rules());
    let players: Vec<_> = ["A", "B", "C", "D"].iter().map(|n| TestPlayer::new(n)).collect();
    let mut room = None;
    for p in &players {
        room = Some(join(&process, "r1", p).await);
    }
    let room = room.unwrap();
    let a = &players[0];

    // one of three eligible voters is not a majority
    room.skip_vote("B").await.unwrap();
    a.inbox
        .wait_for("SKIPPED B", WAIT, |e| {
            e.verb == Verb::Skipped && e.player_name() == Some("B")
        })
        .await;
    settle().await;
    assert_eq!(cluster.turn_order("r1").await[0], "A");

    // a repeated vote is counted once
    room.skip_vote("B").await.unwrap();
    settle().await;
    assert_eq!(cluster.turn_order("r1").await[0], "A");
    assert_eq!(cluster.skip_votes("r1").await, 1);

    room.skip_vote("C").await.unwrap();
    a.inbox
        .wait_for("PASSED naming B", WAIT, |e| {
            e.verb == Verb::Passed && e.player_name() == Some("B")
        })
        .await;
    assert_eq!(cluster.turn_order("r1").await, vec!["B", "C", "D", "A"]);
    assert_eq!(cluster.skip_votes("r1").await, 0);

    // votes from the previous round do not carry over
    room.skip_vote("D").await.unwrap();
    settle().await;
    assert_eq!(cluster.turn_order("r1").await[0], "B");
    assert_eq!(a.inbox.of(Verb::Passed).len(), 2);
}

#[actix_web::test]
async fn artist_vote_is_rejected() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;

    room.skip_vote("A").await.unwrap();
    settle().await;

    assert_eq!(cluster.skip_votes("r1").await, 0);
    assert!(b.inbox.of(Verb::Skipped).is_empty());
    assert_eq!(cluster.turn_order("r1").await, vec!["A", "B"]);
}

#[actix_web::test]
async fn single_guesser_skips_alone() {
    let cluster = Cluster::new(&["cat", "mouse"]);
    let process = cluster.process(fast_rules());
    let (a, b) = (TestPlayer::new("A"), TestPlayer::new("B"));
    join(&process, "r1", &a).await;
    let room = join(&process, "r1", &b).await;

    room.skip_vote("B").await.unwrap();

    b.inbox
        .wait_for("PASSED naming B", WAIT, |e| {
            e.verb == Verb::Passed && e.player_name() == Some("B")
        })
        .await;
    assert_eq!(cluster.turn_order("r1").await, vec!["B", "A"]);
}
