// tests/flows_tests.rs
//
// End-to-end flows against a real database. Run with
// `DATABASE_URL=... cargo test -- --ignored`.

use std::net::SocketAddr;

use civic_backend::{config::Config, create_router, state::AppState, utils::hash::hash_password};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio_tungstenite::tungstenite::Message as WsMessage;

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to Postgres");
        sqlx::migrate!("./migrations").run(&pool).await.expect("Failed to migrate database");

        let state = AppState::new(pool.clone(), Config::for_testing(&database_url, "flows_secret")).expect("state");
        let app = create_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            address: format!("http://127.0.0.1:{port}"),
            pool,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.address)
    }

    /// Registers and logs in a citizen, returning `(id, token)`.
    async fn citizen(&self, name: &str) -> (i64, String) {
        let email = format!("{}_{}@example.com", name.to_lowercase(), &uuid::Uuid::new_v4().to_string()[..8]);
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "first_name": name,
                "last_name": "Flow",
                "email": email,
                "password": "password123",
                "county": "Kisumu",
                "ward": "Kondele"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);

        let login: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": "password123" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        (login["user"]["id"].as_i64().unwrap(), login["token"].as_str().unwrap().to_string())
    }

    /// A ward name no other test run shares, so fan-out counts stay exact.
    fn unique_ward() -> String {
        format!("Ward-{}", &uuid::Uuid::new_v4().to_string()[..8])
    }

    async fn move_to_ward(&self, user_id: i64, ward: &str) {
        sqlx::query("UPDATE users SET ward = $1 WHERE id = $2")
            .bind(ward)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    async fn create_organization(&self, token: &str, registration_number: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/organizations"))
            .bearer_auth(token)
            .json(&json!({
                "name": "Kondele Water Users",
                "registration_number": registration_number,
                "org_type": "cbo"
            }))
            .send()
            .await
            .unwrap()
    }

    async fn send_message(&self, token: &str, recipient_id: i64, content: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/messages"))
            .bearer_auth(token)
            .json(&json!({ "recipient_id": recipient_id, "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    async fn get_json(&self, path: &str, token: &str) -> Value {
        let response = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200, "GET {path}");
        response.json().await.unwrap()
    }

    async fn promote_to_admin(&self, user_id: i64) {
        sqlx::query("UPDATE users SET role = 'admin', is_verified = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn offline_recipient_gets_a_notification_and_reads_the_message() {
    let app = TestApp::spawn().await;
    let (alice_id, alice) = app.citizen("Alice").await;
    let (bob_id, bob) = app.citizen("Bob").await;

    let sent = app
        .client
        .post(app.url("/api/messages"))
        .bearer_auth(&alice)
        .json(&json!({ "recipient_id": bob_id, "content": "Are you coming to the baraza?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(sent.status().as_u16(), 201);
    let message: Value = sent.json().await.unwrap();
    assert_eq!(message["status"], "sent");

    let notifications: Value = app
        .client
        .get(app.url("/api/notifications"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        notifications["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["kind"] == "message"),
        "expected a message notification: {notifications}"
    );

    let unread: Value = app
        .client
        .get(app.url("/api/messages/unread-count"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 1);

    // Opening the conversation marks incoming messages read.
    let conversation = app
        .client
        .get(app.url(&format!("/api/messages/conversations/{alice_id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(conversation.status().as_u16(), 200);

    let unread: Value = app
        .client
        .get(app.url("/api/messages/unread-count"))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["count"], 0);

    // Only the recipient moves the status.
    let id = message["id"].as_i64().unwrap();
    let forbidden = app
        .client
        .put(app.url(&format!("/api/messages/{id}/read")))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn messaging_yourself_is_rejected() {
    let app = TestApp::spawn().await;
    let (me_id, me) = app.citizen("Solo").await;

    let response = app
        .client
        .post(app.url("/api/messages"))
        .bearer_auth(&me)
        .json(&json!({ "recipient_id": me_id, "content": "hello me" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn survey_accepts_one_response_per_user_and_tallies() {
    let app = TestApp::spawn().await;
    let (admin_id, admin) = app.citizen("Admin").await;
    app.promote_to_admin(admin_id).await;
    let (_, citizen) = app.citizen("Resident").await;

    let survey: Value = app
        .client
        .post(app.url("/api/surveys"))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Ward budget priorities",
            "questions": [
                { "id": "priority", "prompt": "Top priority?", "kind": "single",
                  "options": ["Water", "Roads"], "required": true },
                { "id": "notes", "prompt": "Anything else?", "kind": "text" }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().expect("survey id");

    let answer = json!({ "answers": { "priority": ["Water"], "notes": "Fix the borehole" } });
    let first = app
        .client
        .post(app.url(&format!("/api/surveys/{survey_id}/responses")))
        .bearer_auth(&citizen)
        .json(&answer)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let again = app
        .client
        .post(app.url(&format!("/api/surveys/{survey_id}/responses")))
        .bearer_auth(&citizen)
        .json(&answer)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let results: Value = app
        .client
        .get(app.url(&format!("/api/surveys/{survey_id}/results")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results["responses"], 1);
    assert_eq!(results["questions"][0]["counts"]["Water"], 1);
    assert_eq!(results["questions"][0]["counts"]["Roads"], 0);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn admin_routes_reject_citizens() {
    let app = TestApp::spawn().await;
    let (_, citizen) = app.citizen("Curious").await;

    let response = app
        .client
        .get(app.url("/api/admin/verifications"))
        .bearer_auth(&citizen)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

fn registration_documents() -> reqwest::multipart::Form {
    let pdf = reqwest::multipart::Part::bytes(b"%PDF-1.4\n%%EOF\n".to_vec())
        .file_name("certificate.pdf")
        .mime_str("application/pdf")
        .unwrap();
    reqwest::multipart::Form::new().part("documents", pdf)
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn organization_registration_numbers_are_unique() {
    let app = TestApp::spawn().await;
    let (_, owner) = app.citizen("Founder").await;
    let (_, rival) = app.citizen("Rival").await;
    let number = format!("CBO-{}", &uuid::Uuid::new_v4().to_string()[..8]);

    assert_eq!(app.create_organization(&owner, &number).await.status().as_u16(), 201);
    let duplicate = app.create_organization(&rival, &number).await;
    assert_eq!(duplicate.status().as_u16(), 409);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn organization_verification_is_decided_once() {
    let app = TestApp::spawn().await;
    let (_, owner) = app.citizen("Chair").await;
    let (admin_id, admin) = app.citizen("Reviewer").await;
    app.promote_to_admin(admin_id).await;

    let number = format!("CBO-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let org: Value = app.create_organization(&owner, &number).await.json().await.unwrap();
    let org_id = org["id"].as_i64().unwrap();

    let submitted = app
        .client
        .post(app.url(&format!("/api/organizations/{org_id}/verification")))
        .bearer_auth(&owner)
        .multipart(registration_documents())
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status().as_u16(), 201);
    let request: Value = submitted.json().await.unwrap();
    let request_id = request["id"].as_i64().unwrap();

    // Only one request may be pending per organization.
    let again = app
        .client
        .post(app.url(&format!("/api/organizations/{org_id}/verification")))
        .bearer_auth(&owner)
        .multipart(registration_documents())
        .send()
        .await
        .unwrap();
    assert_eq!(again.status().as_u16(), 409);

    let reject_without_notes = app
        .client
        .post(app.url(&format!("/api/admin/verifications/{request_id}/reject")))
        .bearer_auth(&admin)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(reject_without_notes.status().as_u16(), 400);

    let approved = app
        .client
        .post(app.url(&format!("/api/admin/verifications/{request_id}/approve")))
        .bearer_auth(&admin)
        .json(&json!({ "notes": "Certificate checked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(approved.status().as_u16(), 200);

    let (org_status, owner_verified): (String, bool) = sqlx::query_as(
        "SELECT o.status::TEXT, u.is_verified FROM organizations o JOIN users u ON u.id = o.owner_id WHERE o.id = $1",
    )
    .bind(org_id)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(org_status, "approved");
    assert!(owner_verified);

    let second = app
        .client
        .post(app.url(&format!("/api/admin/verifications/{request_id}/reject")))
        .bearer_auth(&admin)
        .json(&json!({ "notes": "Changed my mind" }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);

    let request_status: String =
        sqlx::query_scalar("SELECT status::TEXT FROM verification_requests WHERE id = $1")
            .bind(request_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(request_status, "approved");
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn representatives_cannot_join_someone_elses_organization() {
    let app = TestApp::spawn().await;
    let (_, owner) = app.citizen("Owner").await;
    let (_, stranger) = app.citizen("Stranger").await;

    let number = format!("NGO-{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let org: Value = app.create_organization(&owner, &number).await.json().await.unwrap();

    let response = app
        .client
        .post(app.url("/api/representatives"))
        .bearer_auth(&stranger)
        .json(&json!({
            "position": "Programme lead",
            "level": "organizational",
            "organization_id": org["id"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn conversation_list_tracks_unread_and_hidden_messages() {
    let app = TestApp::spawn().await;
    let (alice_id, alice) = app.citizen("Alice").await;
    let (bob_id, bob) = app.citizen("Bob").await;
    let (carol_id, carol) = app.citizen("Carol").await;

    app.send_message(&bob, alice_id, "first from bob").await;
    let second = app.send_message(&bob, alice_id, "second from bob").await;
    let from_carol = app.send_message(&carol, alice_id, "hello from carol").await;

    let conversations = app.get_json("/api/messages/conversations", &alice).await;
    let list = conversations.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["counterpart_id"], carol_id);
    assert_eq!(list[0]["unread_count"], 1);
    assert_eq!(list[1]["counterpart_id"], bob_id);
    assert_eq!(list[1]["last_message"], "second from bob");
    assert_eq!(list[1]["unread_count"], 2);

    // Hiding Carol's only message drops her conversation.
    let hidden = app
        .client
        .delete(app.url(&format!("/api/messages/{}", from_carol["id"])))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(hidden.status().as_u16(), 204);

    app.client
        .delete(app.url(&format!("/api/messages/{}", second["id"])))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();

    let conversations = app.get_json("/api/messages/conversations", &alice).await;
    let list = conversations.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["counterpart_id"], bob_id);
    assert_eq!(list[0]["last_message"], "first from bob");
    assert_eq!(list[0]["unread_count"], 1);

    // The sender still sees what the recipient hid.
    let bob_view = app.get_json("/api/messages/conversations", &bob).await;
    assert_eq!(bob_view[0]["last_message"], "second from bob");
    assert_eq!(bob_view[0]["unread_count"], 0);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn message_to_a_connected_recipient_is_delivered() {
    let app = TestApp::spawn().await;
    let (_, alice) = app.citizen("Alice").await;
    let (bob_id, bob) = app.citizen("Bob").await;

    let ws_url = format!("{}/ws?token={bob}", app.address.replacen("http", "ws", 1));
    let (mut socket, _) = tokio_tungstenite::connect_async(ws_url).await.unwrap();

    // A pong proves the socket is registered with the hub.
    socket
        .send(WsMessage::Text(json!({ "type": "ping" }).to_string()))
        .await
        .unwrap();
    next_event(&mut socket, "pong").await;

    let message = app.send_message(&alice, bob_id, "Meeting moved to 4pm").await;
    assert_eq!(message["status"], "delivered");

    let pushed = next_event(&mut socket, "message").await;
    assert_eq!(pushed["message"]["id"], message["id"]);
}

/// Reads frames until an event of `kind` arrives.
async fn next_event<S>(socket: &mut S, kind: &str) -> Value
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let wait = tokio::time::Duration::from_secs(5);
    loop {
        let frame = tokio::time::timeout(wait, socket.next())
            .await
            .expect("timed out waiting for a socket event")
            .expect("socket closed")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            let event: Value = serde_json::from_str(&text).unwrap();
            if event["type"] == kind {
                return event;
            }
        }
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn deleted_comments_leave_anonymous_placeholders_in_thread_order() {
    let app = TestApp::spawn().await;
    let (_, author) = app.citizen("Author").await;
    let (_, neighbour) = app.citizen("Neighbour").await;

    let post: Value = app
        .client
        .post(app.url("/api/forum/posts"))
        .bearer_auth(&author)
        .json(&json!({ "title": "Borehole repairs", "content": "Who has news on the borehole?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let comments_url = format!("/api/forum/posts/{}/comments", post["id"]);

    let comment = |token: &str, content: &str, parent: Option<i64>| {
        app.client
            .post(app.url(&comments_url))
            .bearer_auth(token.to_string())
            .json(&json!({ "content": content, "parent_id": parent }))
            .send()
    };
    let root: Value = comment(author.as_str(), "Root", None).await.unwrap().json().await.unwrap();
    let root_id = root["id"].as_i64().unwrap();
    let reply: Value = comment(neighbour.as_str(), "Reply", Some(root_id)).await.unwrap().json().await.unwrap();
    let reply_id = reply["id"].as_i64().unwrap();
    let nested: Value = comment(author.as_str(), "Nested", Some(reply_id)).await.unwrap().json().await.unwrap();
    let lone: Value = comment(neighbour.as_str(), "Lone", Some(root_id)).await.unwrap().json().await.unwrap();

    for (id, token) in [(reply_id, &neighbour), (root_id, &author), (lone["id"].as_i64().unwrap(), &neighbour)] {
        let deleted = app
            .client
            .delete(app.url(&format!("/api/forum/comments/{id}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status().as_u16(), 204);
    }

    let thread = app.get_json(&comments_url, &author).await;
    let thread = thread.as_array().unwrap();
    let ids: Vec<i64> = thread.iter().map(|c| c["id"].as_i64().unwrap()).collect();
    // The deleted leaf has no live descendants and is dropped.
    assert_eq!(ids, vec![root_id, reply_id, nested["id"].as_i64().unwrap()]);

    for placeholder in &thread[..2] {
        assert_eq!(placeholder["is_deleted"], true);
        assert!(placeholder["author_id"].is_null());
        assert!(placeholder["author_name"].is_null());
    }
    assert_eq!(thread[2]["is_deleted"], false);
    assert_eq!(thread[2]["content"], "Nested");

    let reply_to_deleted = comment(neighbour.as_str(), "Late reply", Some(reply_id)).await.unwrap();
    assert_eq!(reply_to_deleted.status().as_u16(), 400);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn phone_codes_enforce_cooldown_attempts_and_expiry() {
    let app = TestApp::spawn().await;
    let (user_id, token) = app.citizen("Caller").await;

    let send = || {
        app.client
            .post(app.url("/api/phone-verification/send"))
            .bearer_auth(&token)
            .json(&json!({ "phone": "0712 345 678" }))
            .send()
    };
    let verify = |code: &'static str| {
        app.client
            .post(app.url("/api/phone-verification/verify"))
            .bearer_auth(&token)
            .json(&json!({ "code": code }))
            .send()
    };
    // Moves the latest code out of the resend window.
    let age_codes = || {
        sqlx::query("UPDATE phone_verifications SET created_at = NOW() - INTERVAL '10 minutes' WHERE user_id = $1")
            .bind(user_id)
            .execute(&app.pool)
    };
    let known_code = || {
        sqlx::query("UPDATE phone_verifications SET code_hash = $1 WHERE user_id = $2 AND consumed_at IS NULL")
            .bind(hash_password("123456").unwrap())
            .bind(user_id)
            .execute(&app.pool)
    };
    let message = |body: Value| body["message"].as_str().unwrap_or_default().to_string();

    assert_eq!(send().await.unwrap().status().as_u16(), 200);
    assert_eq!(send().await.unwrap().status().as_u16(), 429);

    // Attempt limit.
    known_code().await.unwrap();
    for _ in 0..5 {
        assert_eq!(verify("000000").await.unwrap().status().as_u16(), 400);
    }
    let exhausted = verify("123456").await.unwrap();
    assert_eq!(exhausted.status().as_u16(), 400);
    assert!(message(exhausted.json().await.unwrap()).contains("Too many attempts"));

    // Expiry.
    age_codes().await.unwrap();
    assert_eq!(send().await.unwrap().status().as_u16(), 200);
    known_code().await.unwrap();
    sqlx::query("UPDATE phone_verifications SET expires_at = NOW() - INTERVAL '1 second' WHERE user_id = $1")
        .bind(user_id)
        .execute(&app.pool)
        .await
        .unwrap();
    let expired = verify("123456").await.unwrap();
    assert_eq!(expired.status().as_u16(), 400);
    assert!(message(expired.json().await.unwrap()).contains("expired"));

    // A fresh code verifies the phone.
    age_codes().await.unwrap();
    assert_eq!(send().await.unwrap().status().as_u16(), 200);
    known_code().await.unwrap();
    assert_eq!(verify("123456").await.unwrap().status().as_u16(), 200);

    let (phone, verified): (Option<String>, bool) =
        sqlx::query_as("SELECT phone, phone_verified FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(phone.as_deref(), Some("+254712345678"));
    assert!(verified);
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn ward_communication_reaches_only_active_citizens_of_that_ward() {
    let app = TestApp::spawn().await;
    let ward = TestApp::unique_ward();
    let (admin_id, admin) = app.citizen("Officer").await;
    app.promote_to_admin(admin_id).await;
    let (resident_id, _) = app.citizen("Resident").await;
    let (rep_id, _) = app.citizen("Councillor").await;
    let (outsider_id, _) = app.citizen("Outsider").await;
    let (inactive_id, _) = app.citizen("Moved").await;

    for id in [admin_id, resident_id, rep_id, inactive_id] {
        app.move_to_ward(id, &ward).await;
    }
    sqlx::query("UPDATE users SET role = 'representative' WHERE id = $1")
        .bind(rep_id)
        .execute(&app.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(inactive_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/api/communications"))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Water rationing",
            "body": "Supply will be off on Tuesday.",
            "audience": "ward",
            "target_area": ward
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let communication: Value = response.json().await.unwrap();
    assert_eq!(communication["recipients_count"], 1);

    let notified: Vec<i64> = sqlx::query_scalar(
        "SELECT recipient_id FROM notifications WHERE kind = 'communication' AND (data->>'communication_id')::BIGINT = $1",
    )
    .bind(communication["id"].as_i64().unwrap())
    .fetch_all(&app.pool)
    .await
    .unwrap();
    assert_eq!(notified, vec![resident_id]);
    assert!(!notified.contains(&outsider_id));
}

#[tokio::test]
#[ignore = "requires a running Postgres (DATABASE_URL)"]
async fn pages_far_past_the_end_are_empty() {
    let app = TestApp::spawn().await;
    let (_, token) = app.citizen("Scroller").await;

    let page = app
        .get_json(&format!("/api/surveys?page={}&limit=100", i64::MAX), &token)
        .await;
    assert!(page["items"].as_array().unwrap().is_empty());
}
