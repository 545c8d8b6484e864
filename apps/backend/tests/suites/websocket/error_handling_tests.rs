// Bad client input is dropped without closing the socket

use std::time::Duration;

use serde_json::json;

use crate::support::rooms::fast_rules;
use crate::support::websocket::{game_url, start_test_server, test_state};
use crate::support::websocket_client::WebSocketClient;

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(300);

#[actix_web::test]
async fn malformed_and_server_only_messages_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;
    let mut client = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;

    client.send_text("not json").await?;
    client.send_json(json!({"no_verb": true})).await?;
    client.send_json(json!({"verb": "SHOUT"})).await?;
    client.send_json(json!({"verb": "CONNECT"})).await?;
    client
        .send_json(json!({"verb": "PASSED", "player_name": "me", "end_time": 0}))
        .await?;
    assert!(client.next_json(QUIET).await.is_none());

    client.enter("alice", "t1").await?;
    let passed = client.expect_verb("PASSED", WAIT, |_| true).await;
    assert_eq!(passed["player_name"], "alice");

    client.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn join_before_connect_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;
    let mut client = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;

    client.send_json(json!({"verb": "JOIN", "table": "t1"})).await?;
    assert!(client.next_json(QUIET).await.is_none());

    client.enter("alice", "t1").await?;
    client.expect_verb("PASSED", WAIT, |_| true).await;

    client.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}

#[actix_web::test]
async fn game_commands_outside_a_room_are_ignored() -> Result<(), Box<dyn std::error::Error>> {
    let state = test_state(&["cat"], fast_rules());
    let (server, addr, join) = start_test_server(state).await?;
    let mut client = WebSocketClient::connect_retry(&game_url(addr), WAIT).await?;

    client
        .send_json(json!({"verb": "CONNECT", "player_name": "alice"}))
        .await?;
    client.send_json(json!({"verb": "GUESS", "word": "cat"})).await?;
    client.send_json(json!({"verb": "PASS"})).await?;
    client.send_json(json!({"verb": "LEAVE"})).await?;
    assert!(client.next_json(QUIET).await.is_none());

    client.send_json(json!({"verb": "JOIN", "table": "t1"})).await?;
    client.expect_verb("PASSED", WAIT, |_| true).await;

    client.close().await?;
    server.stop(true).await;
    let _ = join.await;
    Ok(())
}
