//! Integration tests for the group-membership REST surface: size bounds,
//! creator privilege, creator succession, and post-commit fan-out.

use chrono::Utc;
use futures_util::StreamExt;
use rusqlite::params;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use huddle_server::auth::jwt::issue_access_token;
use huddle_server::db::DbPool;

struct TestServer {
    base_url: String,
    addr: SocketAddr,
    db: DbPool,
    jwt_secret: Vec<u8>,
    _data_dir: tempfile::TempDir,
}

async fn start_test_server() -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = huddle_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = huddle_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = huddle_server::state::AppState::new(db.clone(), jwt_secret.clone());
    let app = huddle_server::routes::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        addr,
        db,
        jwt_secret,
        _data_dir: tmp_dir,
    }
}

fn seed_user(db: &DbPool, id: &str, display_name: &str) {
    let conn = db.lock().unwrap();
    conn.execute(
        "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)",
        params![id, display_name, Utc::now().to_rfc3339()],
    )
    .expect("Failed to seed user");
}

fn seed_chat(db: &DbPool, id: &str, name: &str, group_chat: bool, creator: &str, members: &[&str]) {
    let conn = db.lock().unwrap();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO chats (id, name, group_chat, creator, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, name, group_chat, creator, now],
    )
    .expect("Failed to seed chat");
    for (position, member) in members.iter().enumerate() {
        conn.execute(
            "INSERT INTO chat_members (chat_id, user_id, position) VALUES (?1, ?2, ?3)",
            params![id, member, position as i64],
        )
        .expect("Failed to seed member");
    }
}

fn members_of(db: &DbPool, chat_id: &str) -> Vec<String> {
    let conn = db.lock().unwrap();
    let mut stmt = conn
        .prepare("SELECT user_id FROM chat_members WHERE chat_id = ?1 ORDER BY position ASC")
        .unwrap();
    stmt.query_map([chat_id], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

fn chat_row(db: &DbPool, chat_id: &str) -> (String, String) {
    let conn = db.lock().unwrap();
    conn.query_row(
        "SELECT name, creator FROM chats WHERE id = ?1",
        [chat_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .unwrap()
}

fn seed_standard_users(db: &DbPool) {
    seed_user(db, "a", "Ann");
    seed_user(db, "b", "Bob");
    seed_user(db, "c", "Cat");
    seed_user(db, "d", "Dee");
}

fn token(server: &TestServer, user_id: &str) -> String {
    issue_access_token(&server.jwt_secret, user_id).expect("Failed to issue token")
}

#[tokio::test]
async fn remove_below_minimum_is_rejected_then_succeeds_after_add() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Trio", true, "a", &["a", "b", "c"]);
    let client = reqwest::Client::new();

    // Removing from a 3-member group would drop below the minimum
    let resp = client
        .put(format!("{}/api/v1/chat/removemember", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "chatId": "g1", "userId": "c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(members_of(&server.db, "g1"), vec!["a", "b", "c"]);

    // Grow the group, then the removal goes through
    let resp = client
        .put(format!("{}/api/v1/chat/addmembers", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "chatId": "g1", "members": ["d"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(members_of(&server.db, "g1"), vec!["a", "b", "c", "d"]);

    let resp = client
        .put(format!("{}/api/v1/chat/removemember", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "chatId": "g1", "userId": "c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(members_of(&server.db, "g1"), vec!["a", "b", "d"]);
}

#[tokio::test]
async fn leave_at_minimum_boundary_is_rejected() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Trio", true, "a", &["a", "b", "c"]);
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("{}/api/v1/chat/leave/g1", server.base_url))
        .bearer_auth(token(&server, "a"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(members_of(&server.db, "g1"), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn creator_leave_hands_the_role_to_a_remaining_member() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Quartet", true, "a", &["a", "b", "c", "d"]);
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("{}/api/v1/chat/leave/g1", server.base_url))
        .bearer_auth(token(&server, "a"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let members = members_of(&server.db, "g1");
    assert_eq!(members, vec!["b", "c", "d"]);
    let (_, creator) = chat_row(&server.db, "g1");
    assert!(members.contains(&creator), "Successor must be a remaining member");
}

#[tokio::test]
async fn non_creator_mutations_are_forbidden() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Quartet", true, "a", &["a", "b", "c", "d"]);
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{}/api/v1/chat/removemember", server.base_url))
        .bearer_auth(token(&server, "b"))
        .json(&json!({ "chatId": "g1", "userId": "c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .put(format!("{}/api/v1/chat/g1", server.base_url))
        .bearer_auth(token(&server, "b"))
        .json(&json!({ "name": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert_eq!(chat_row(&server.db, "g1").0, "Quartet");
}

#[tokio::test]
async fn rename_updates_the_group_name() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Quartet", true, "a", &["a", "b", "c", "d"]);
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{}/api/v1/chat/g1", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "name": "Weekend Plans" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(chat_row(&server.db, "g1").0, "Weekend Plans");
}

#[tokio::test]
async fn mutations_require_a_bearer_token() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Quartet", true, "a", &["a", "b", "c", "d"]);
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{}/api/v1/chat/addmembers", server.base_url))
        .json(&json!({ "chatId": "g1", "members": ["d"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn adding_an_unknown_user_is_not_found() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Trio", true, "a", &["a", "b", "c"]);
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{}/api/v1/chat/addmembers", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "chatId": "g1", "members": ["nobody"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(members_of(&server.db, "g1"), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn direct_chats_reject_membership_changes() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "dm1", "a-b", false, "a", &["a", "b"]);
    let client = reqwest::Client::new();

    let resp = client
        .put(format!("{}/api/v1/chat/addmembers", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "chatId": "dm1", "members": ["c"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(members_of(&server.db, "dm1"), vec!["a", "b"]);
}

#[tokio::test]
async fn mutation_notifies_connected_members_over_websocket() {
    let server = start_test_server().await;
    seed_standard_users(&server.db);
    seed_chat(&server.db, "g1", "Quartet", true, "a", &["a", "b", "c", "d"]);
    let client = reqwest::Client::new();

    // b stays in the group, c is about to be removed; both hold connections
    let mut read_b = connect_ws(&server, "b").await;
    let mut read_c = connect_ws(&server, "c").await;

    let resp = client
        .put(format!("{}/api/v1/chat/removemember", server.base_url))
        .bearer_auth(token(&server, "a"))
        .json(&json!({ "chatId": "g1", "userId": "c" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Surviving member: alert first, then refetch
    let frame = next_frame(&mut read_b).await;
    assert_eq!(frame["event"], "alert");
    assert_eq!(frame["payload"]["chatId"], "g1");
    assert_eq!(frame["payload"]["message"], "Cat has been removed from the group");
    let frame = next_frame(&mut read_b).await;
    assert_eq!(frame["event"], "refetch-chats");

    // The removed member only learns their chat list changed
    let frame = next_frame(&mut read_c).await;
    assert_eq!(frame["event"], "refetch-chats");
    assert_eq!(frame["payload"]["chatId"], "g1");
}

type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

async fn connect_ws(server: &TestServer, user_id: &str) -> WsRead {
    let ws_url = format!(
        "ws://{}/ws?token={}",
        server.addr,
        token(server, user_id)
    );
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    let (_write, read) = ws_stream.split();
    read
}

async fn next_frame(read: &mut WsRead) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended unexpectedly")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("Invalid JSON frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text frame, got {:?}", other),
        }
    }
}
