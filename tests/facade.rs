// Integration tests for the REST façade and query surface using wiremock.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wranglebot_client_rs::query::Filters;
use wranglebot_client_rs::store::{CredentialStore, MemoryStore, TOKEN_KEY};
use wranglebot_client_rs::transport::SocketIoTransport;
use wranglebot_client_rs::{Config, Error, UserUpdate, WrangleBot};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, WrangleBot, Arc<MemoryStore>) {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let client = WrangleBot::with_backends(
        Config::new(server.uri()),
        store.clone(),
        Arc::new(SocketIoTransport),
    )
    .unwrap();
    (server, client, store)
}

fn api(suffix: &str) -> String {
    format!("/api/v1{suffix}")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(api("/login")))
        .and(body_json(json!({"username": "admin", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-123",
            "username": "admin",
            "firstName": "Ada",
            "roles": ["admin"],
            "libraries": ["Showreel"]
        })))
        .mount(server)
        .await;
}

// ── Façade tests ────────────────────────────────────────────────────

#[tokio::test]
async fn get_resolves_with_body_on_200() {
    let (server, client, _) = setup().await;

    Mock::given(method("GET"))
        .and(path(api("/library/Showreel")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Showreel"})))
        .mount(&server)
        .await;

    let library = client.query().library().one("Showreel").fetch().await.unwrap();
    assert_eq!(library, json!({"name": "Showreel"}));
}

#[tokio::test]
async fn ids_are_percent_encoded_in_paths() {
    let (server, client, _) = setup().await;

    Mock::given(method("GET"))
        .and(path(api("/library/A%231/metafiles/clip%2F01")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "clip/01"})))
        .expect(1)
        .mount(&server)
        .await;

    let metafile = client
        .query()
        .library()
        .one("A#1")
        .metafiles()
        .one("clip/01")
        .fetch()
        .await
        .unwrap();
    assert_eq!(metafile, json!({"id": "clip/01"}));
}

#[tokio::test]
async fn non_200_rejects_with_full_response() {
    let (server, client, _) = setup().await;

    Mock::given(method("GET"))
        .and(path(api("/library/missing")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .mount(&server)
        .await;

    let result = client.query().library().one("missing").fetch().await;
    match result {
        Err(Error::Http(response)) => {
            assert_eq!(response.status, 404);
            assert_eq!(response.body, json!({"error": "not found"}));
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn other_success_statuses_are_rejected_too() {
    let (server, client, _) = setup().await;

    Mock::given(method("POST"))
        .and(path(api("/library")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"created": true})))
        .mount(&server)
        .await;

    let result = client.query().library().create(json!({"name": "New"})).await;
    assert!(matches!(result, Err(Error::Http(response)) if response.status == 201));
}

#[tokio::test]
async fn requests_carry_bearer_token() {
    let (server, client, _) = setup().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path(api("/volumes")))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "v1"}])))
        .expect(1)
        .mount(&server)
        .await;

    client.sign_in("admin", "secret").await.unwrap();
    let volumes = client.query().volumes().many(Filters::default()).fetch().await.unwrap();
    assert_eq!(volumes, json!([{"id": "v1"}]));
}

#[tokio::test]
async fn request_log_records_calls() {
    let (server, client, _) = setup().await;

    Mock::given(method("GET"))
        .and(path(api("/utility/luts")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    client.query().utility().luts().await.unwrap();
    let logs = client.logs().await;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "[GET] /utility/luts");
    assert_eq!(logs[1].message, "[API] /utility/luts : 200");
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_persists_token_and_identity() {
    let (server, client, store) = setup().await;
    mount_login(&server).await;

    let token = client.sign_in("admin", "secret").await.unwrap();
    assert_eq!(token, "tok-123");
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("tok-123"));

    let user = client.user().await.unwrap();
    assert_eq!(user.username(), "admin");
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
    assert!(user.has_role("admin"));
    assert!(user.has_library("Showreel"));
}

#[tokio::test]
async fn sign_in_without_username_fails() {
    let (server, client, _) = setup().await;

    Mock::given(method("POST"))
        .and(path(api("/login")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok"})))
        .mount(&server)
        .await;

    let result = client.sign_in("admin", "secret").await;
    assert!(matches!(result, Err(Error::MissingUsername)));
    assert!(client.user().await.is_none());
}

#[tokio::test]
async fn rejected_sign_in_keeps_session_empty() {
    let (server, client, store) = setup().await;

    Mock::given(method("POST"))
        .and(path(api("/login")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.sign_in("admin", "wrong").await;
    assert!(matches!(result, Err(Error::Http(response)) if response.status == 401));
    assert!(client.token().await.is_none());
    assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn sign_out_forgets_everything() {
    let (server, client, store) = setup().await;
    mount_login(&server).await;

    client.sign_in("admin", "secret").await.unwrap();
    assert!(client.sign_out().await.unwrap());
    assert!(client.token().await.is_none());
    assert!(client.user().await.is_none());
    assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn save_user_puts_profile_and_merges_locally() {
    let (server, client, _) = setup().await;
    mount_login(&server).await;

    Mock::given(method("PUT"))
        .and(path(api("/users/admin")))
        .and(body_json(json!({
            "firstName": null,
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "password": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    client.sign_in("admin", "secret").await.unwrap();
    client
        .save_user(UserUpdate {
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            ..UserUpdate::default()
        })
        .await
        .unwrap();

    let user = client.user().await.unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Ada"));
    assert_eq!(user.last_name.as_deref(), Some("Lovelace"));
}

// ── Query surface tests ─────────────────────────────────────────────

#[tokio::test]
async fn folders_without_required_fields_never_reach_the_server() {
    let (server, client, _) = setup().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let folders = client.query().library().one("Showreel").folders();
    let no_path = folders.put(json!({"overwrite": true})).await;
    assert!(matches!(no_path, Err(Error::Validation(_))));
    let no_overwrite = folders.put(json!({"pathToFolder": "/Volumes/A"})).await;
    assert!(matches!(no_overwrite, Err(Error::Validation(_))));
}

#[tokio::test]
async fn folders_with_required_fields_are_sent() {
    let (server, client, _) = setup().await;

    Mock::given(method("PUT"))
        .and(path(api("/library/Showreel/folders")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .query()
        .library()
        .one("Showreel")
        .folders()
        .put(json!({"pathToFolder": "/Volumes/A", "overwrite": false}))
        .await
        .unwrap();
}

#[tokio::test]
async fn task_run_posts_to_task_path() {
    let (server, client, _) = setup().await;

    Mock::given(method("POST"))
        .and(path(api("/library/Showreel/tasks/t-1/run")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"running": true})))
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .query()
        .library()
        .one("Showreel")
        .tasks()
        .one("t-1")
        .run()
        .await
        .unwrap();
    assert_eq!(result, json!({"running": true}));
}

#[tokio::test]
async fn metafile_listing_is_extended() {
    let (server, client, _) = setup().await;

    Mock::given(method("GET"))
        .and(path(api("/library/Showreel/metafiles")))
        .and(query_param("extended", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "m1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let metafiles = client
        .query()
        .library()
        .one("Showreel")
        .metafiles()
        .many(Filters::default())
        .fetch()
        .await
        .unwrap();
    assert_eq!(metafiles, json!([{"id": "m1"}]));
}

#[tokio::test]
async fn finder_is_unversioned_and_unauthenticated() {
    let (server, client, _) = setup().await;
    mount_login(&server).await;
    client.sign_in("admin", "secret").await.unwrap();

    Mock::given(method("POST"))
        .and(path("/finder/open/"))
        .and(body_json(json!({"path": "/Volumes/A/clip.mov"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"opened": true})))
        .expect(1)
        .mount(&server)
        .await;

    client.query().finder().show("/Volumes/A/clip.mov").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let finder = requests
        .iter()
        .find(|request| request.url.path() == "/finder/open/")
        .unwrap();
    assert!(!finder.headers.contains_key("authorization"));
}
