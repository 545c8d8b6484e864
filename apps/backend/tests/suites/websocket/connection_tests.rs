// End-to-end player flow over real sockets

use std::time::Duration;

use serde_json::json;
use sketch_backend::game::GameRules;

use crate::support::rooms::fast_rules;
use crate::support::websocket::{game_url, start_test_server, test_state};
use crate::support::websocket_client::WebSocketClient;

const WAIT: Duration = Duration::from_secs(2);

#[actix_web::test]
async fn joining_player_receives_the_round_and_the_word() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat", "mouse"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;

    let mut alice = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    alice.enter("alice", "t1").await?;

    let passed = alice.expect_verb("PASSED", WAIT, |_| true).await;
    assert_eq!(passed["player_name"], "alice");
    assert_eq!(passed["word"], "cat");
    assert!(passed["end_time"].as_i64().is_some());

    alice.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn second_player_sees_the_roster_and_is_announced() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat", "mouse"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;

    let mut alice = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    alice.enter("alice", "t1").await?;
    alice.expect_verb("PASSED", WAIT, |_| true).await;

    let mut bob = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    bob.enter("bob", "t1").await?;

    let joined = alice.expect_verb("JOINED", WAIT, |_| true).await;
    assert_eq!(joined["player_name"], "bob");

    let roster = bob.expect_verb("JOINED", WAIT, |_| true).await;
    assert_eq!(roster["player_name"], "alice");
    let passed = bob.expect_verb("PASSED", WAIT, |_| true).await;
    assert_eq!(passed["player_name"], "alice");
    assert!(passed.get("word").is_none());

    alice.close().await?;
    bob.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn correct_guess_hands_the_pen_to_the_guesser() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat", "mouse"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;

    let mut alice = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    alice.enter("alice", "t1").await?;
    alice.expect_verb("PASSED", WAIT, |_| true).await;
    let mut bob = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    bob.enter("bob", "t1").await?;
    bob.expect_verb("PASSED", WAIT, |_| true).await;

    alice
        .send_json(json!({"verb": "DRAW", "points": [[1, 1], [2, 2]]}))
        .await?;
    let drawn = bob.expect_verb("DRAWN", WAIT, |_| true).await;
    assert_eq!(drawn["points"], json!([[1, 1], [2, 2]]));

    bob.send_json(json!({"verb": "GUESS", "word": "Cat"})).await?;

    let guessed = alice.expect_verb("GUESSED", WAIT, |_| true).await;
    assert_eq!(guessed["player_name"], "bob");
    assert_eq!(guessed["correct"], true);

    let passed = bob
        .expect_verb("PASSED", WAIT, |m| m["player_name"] == "bob")
        .await;
    assert_eq!(passed["word"], "mouse");
    assert_eq!(passed["guesser"], "bob");
    assert_eq!(passed["score"], 1);

    let to_alice = alice
        .expect_verb("PASSED", WAIT, |m| m["player_name"] == "bob")
        .await;
    assert!(to_alice.get("word").is_none());

    alice.close().await?;
    bob.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn closed_socket_is_announced_as_a_disconnect() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat", "mouse"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;

    let mut alice = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    alice.enter("alice", "t1").await?;
    alice.expect_verb("PASSED", WAIT, |_| true).await;
    let mut bob = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    bob.enter("bob", "t1").await?;
    bob.expect_verb("PASSED", WAIT, |_| true).await;

    alice.close().await?;

    // the departing artist hands the turn over before leaving
    let passed = bob
        .expect_verb("PASSED", WAIT, |m| m["player_name"] == "bob")
        .await;
    assert_eq!(passed["word"], "mouse");
    let departed = bob.expect_verb("DEPARTED", WAIT, |_| true).await;
    assert_eq!(departed["player_name"], "alice");
    assert_eq!(departed["disconnected"], true);

    bob.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn leave_then_join_another_table() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat", "mouse"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;

    let mut alice = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    alice.enter("alice", "t1").await?;
    alice.expect_verb("PASSED", WAIT, |_| true).await;

    let mut bob = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    bob.enter("bob", "t1").await?;
    alice.expect_verb("JOINED", WAIT, |_| true).await;

    bob.send_json(json!({"verb": "JOIN", "table": "t2"})).await?;

    let departed = alice.expect_verb("DEPARTED", WAIT, |_| true).await;
    assert_eq!(departed["player_name"], "bob");
    assert_eq!(departed["disconnected"], false);
    let passed = bob
        .expect_verb("PASSED", WAIT, |m| m["player_name"] == "bob")
        .await;
    assert!(passed.get("word").is_some());

    alice.close().await?;
    bob.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn idle_connection_gets_keepalives() -> Result<(), Box<dyn std::error::Error>> {
    let rules = GameRules {
        keepalive_interval: Duration::from_millis(100),
        ..fast_rules()
    };
    let state = test_state(&["cat"], rules);
    let (server, addr, join) = start_test_server(state).await?;

    let mut client = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;
    client.expect_verb("KEEPALIVE", WAIT, |_| true).await;
    client.expect_verb("KEEPALIVE", WAIT, |_| true).await;

    client.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}
