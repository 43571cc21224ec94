//! Mock service tests for the stackmob library.
//!
//! These tests use wiremock to stand in for the REST API and check what the
//! client puts on the wire, without network access or real credentials.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use stackmob::auth::{AccessToken, MacKey, TokenResponse};
use stackmob::error::{AuthError, InvalidInputError};
use stackmob::signer::generate_mac;
use stackmob::{
    Client, Config, Error, FileStore, HttpTransport, Login, MemoryStore, Query, SchemaInfo, SecurityMode,
    SessionManager, SessionState,
};
use wiremock::matchers::{body_json, body_string, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FORM: &str = "application/x-www-form-urlencoded";

fn config(server: &MockServer) -> Config {
    Config::new("test-key")
        .with_security(SecurityMode::Never)
        .with_api_domain(&format!("127.0.0.1:{}", server.address().port()))
        .unwrap()
}

fn client(server: &MockServer) -> Client {
    Client::with_http(config(server), Arc::new(MemoryStore::new())).unwrap()
}

fn token_body(access: &str, refresh: Option<&str>, expires_in: i64, user: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access,
        "mac_key": format!("{access}-mac"),
        "mac_algorithm": "hmac-sha-1",
        "token_type": "mac",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    if let Some(user) = user {
        body["stackmob"] = json!({ "user": { "username": user, "age": 30 } });
    }
    body
}

/// A client whose store already holds credentials.
fn client_with_session(server: &MockServer, expires_in: i64, refresh: Option<&str>) -> Client {
    let store = Arc::new(MemoryStore::new());
    let session = SessionManager::new(store.clone(), true);
    let token: TokenResponse =
        serde_json::from_value(token_body("access-1", refresh, expires_in, Some("alice"))).unwrap();
    session.save_response(&token, SchemaInfo::default()).unwrap();
    session.set_keep_logged_in(true).unwrap();

    Client::new(config(server), store, Arc::new(HttpTransport::new().unwrap()))
}

async fn mount_login(server: &MockServer, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/user/accessToken"))
        .and(header("content-type", FORM))
        .and(body_string("password=secret&token_type=mac&username=alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "access-1",
            Some("refresh-1"),
            expires_in,
            Some("alice"),
        )))
        .expect(1)
        .mount(server)
        .await;
}

/// Split a `MAC id="..",ts="..",nonce="..",mac=".."` header into its values.
fn mac_fields(header: &str) -> (String, i64, String, String) {
    let value = |name: &str| {
        let start = header.find(&format!("{name}=\"")).unwrap() + name.len() + 2;
        let end = start + header[start..].find('"').unwrap();
        header[start..end].to_string()
    };
    (value("id"), value("ts").parse().unwrap(), value("nonce"), value("mac"))
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_login_stores_credentials_with_local_expiry() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;

    let client = client(&server);
    let before = Utc::now();
    let user = client.login(&Login::new("alice", "secret"), true).await.unwrap();
    let after = Utc::now();

    assert_eq!(user["username"], "alice");
    assert_eq!(user["age"], 30);

    let creds = client.session().credentials().unwrap();
    assert_eq!(creds.access_token.as_str(), "access-1");
    assert_eq!(creds.user, "alice");
    assert!(creds.expires_at >= before + Duration::seconds(3600));
    assert!(creds.expires_at <= after + Duration::seconds(3600));

    assert!(client.is_logged_in());
    assert_eq!(client.logged_in_user().as_deref(), Some("alice"));
    assert!(client.is_user_logged_in("alice"));
    assert_eq!(client.session().state(), SessionState::ValidSession);
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/accessToken"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "bad password"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .login(&Login::new("alice", "wrong"), false)
        .await
        .unwrap_err();

    match err {
        Error::Protocol(e) => {
            assert_eq!(e.status, 401);
            assert_eq!(e.error.as_deref(), Some("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(client.is_logged_out());
}

#[tokio::test]
async fn test_login_with_unusable_token_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/accessToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let err = client(&server)
        .login(&Login::new("alice", "secret"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::InvalidTokenResponse { .. })));
}

#[tokio::test]
async fn test_proxy_mode_login_is_a_plain_get() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/login"))
        .and(query_param("username", "alice"))
        .and(query_param("password", "secret"))
        .and(header("x-stackmob-proxy", "stackmob-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "alice" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::proxy()
        .with_security(SecurityMode::Never)
        .with_api_domain(&format!("127.0.0.1:{}", server.address().port()))
        .unwrap();
    let client = Client::with_http(config, Arc::new(MemoryStore::new())).unwrap();

    let user = client.login(&Login::new("alice", "secret"), false).await.unwrap();
    assert_eq!(user["username"], "alice");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_logout_clears_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server, 3600, Some("refresh-1"));
    assert!(client.is_logged_in());

    client.logout().await.unwrap();
    assert!(client.is_logged_out());
    assert!(client.session().credentials().is_none());
}

// ============================================================================
// Signing Tests
// ============================================================================

#[tokio::test]
async fn test_signed_request_carries_valid_mac() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo/t1"))
        .and(header_regex(
            "authorization",
            r#"^MAC id="access-1",ts="\d+",nonce="n\d+",mac="[A-Za-z0-9+/]+=*"$"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "todo_id": "t1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server, 3600, None);
    let todo = client.schema("todo").fetch("t1").await.unwrap();
    assert_eq!(todo["todo_id"], "t1");

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0]
        .headers
        .get("authorization")
        .unwrap()
        .to_str()
        .unwrap();
    let (id, ts, nonce, _) = mac_fields(auth);

    let expected = generate_mac(
        "GET",
        &AccessToken::new(id),
        &MacKey::new("access-1-mac"),
        &format!("127.0.0.1:{}", server.address().port()),
        "/todo/t1",
        false,
        ts,
        &nonce,
    )
    .unwrap();
    assert_eq!(auth, expected);
}

#[tokio::test]
async fn test_fixed_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo/t1"))
        .and(header("accept", "application/vnd.stackmob+json; version=0"))
        .and(header("x-stackmob-api-key", "test-key"))
        .and(header("x-stackmob-api-key-test-key", "1"))
        .and(header("x-stackmob-proxy-plain", "stackmob-api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).schema("todo").fetch("t1").await.unwrap();
}

// ============================================================================
// Refresh Tests
// ============================================================================

#[tokio::test]
async fn test_expired_session_refreshes_once_then_resubmits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/refreshToken"))
        .and(header("content-type", FORM))
        .and(body_string(
            "grant_type=refresh_token&mac_algorithm=hmac-sha1&refresh_token=refresh-1&token_type=mac",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "access-2",
            Some("refresh-2"),
            3600,
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/todo/t1"))
        .and(header_regex("authorization", r#"^MAC id="access-2","#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "todo_id": "t1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server, 0, Some("refresh-1"));
    assert_eq!(client.session().state(), SessionState::ExpiredRefreshable);
    assert!(client.is_logged_in());

    let todo = client.schema("todo").fetch("t1").await.unwrap();
    assert_eq!(todo["todo_id"], "t1");

    let creds = client.session().credentials().unwrap();
    assert_eq!(creds.access_token.as_str(), "access-2");
    assert_eq!(creds.user, "alice");
    assert_eq!(client.session().state(), SessionState::ValidSession);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url.path(), "/user/refreshToken");
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(requests[1].url.path(), "/todo/t1");
}

#[tokio::test]
async fn test_concurrent_calls_share_one_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/refreshToken"))
        .and(body_string(
            "grant_type=refresh_token&mac_algorithm=hmac-sha1&refresh_token=refresh-1&token_type=mac",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("access-2", Some("refresh-2"), 3600, None))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    // A second exchange would reuse the spent token and lose the session.
    Mock::given(method("POST"))
        .and(path("/user/refreshToken"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(0)
        .mount(&server)
        .await;

    for id in ["t1", "t2"] {
        Mock::given(method("GET"))
            .and(path(format!("/todo/{id}")))
            .and(header_regex("authorization", r#"^MAC id="access-2","#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "todo_id": id })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_with_session(&server, 0, Some("refresh-1"));
    let todos = client.schema("todo");
    let (first, second) = tokio::join!(todos.fetch("t1"), todos.fetch("t2"));

    assert_eq!(first.unwrap()["todo_id"], "t1");
    assert_eq!(second.unwrap()["todo_id"], "t2");

    let creds = client.session().credentials().unwrap();
    assert_eq!(creds.access_token.as_str(), "access-2");
    assert_eq!(
        client.session().refresh_token().map(|t| t.as_str().to_string()).as_deref(),
        Some("refresh-2")
    );
    assert_eq!(client.session().state(), SessionState::ValidSession);

    let refreshes = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/user/refreshToken")
        .count();
    assert_eq!(refreshes, 1);
}

#[tokio::test]
async fn test_failed_refresh_discards_token_and_resubmits_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/refreshToken"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_grant" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/todo/t1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "expired" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server, 0, Some("refresh-1"));
    let err = client.schema("todo").fetch("t1").await.unwrap_err();

    match err {
        Error::Protocol(e) => assert_eq!(e.error.as_deref(), Some("expired")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!client.session().has_refresh_token());
    assert_eq!(client.session().state(), SessionState::ExpiredTerminal);
}

#[tokio::test]
async fn test_refresh_without_token_fails_immediately() {
    let server = MockServer::start().await;
    let client = client_with_session(&server, 0, None);

    let err = client.refresh_session().await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::NoRefreshToken)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_session_refreshes_expired_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/refreshToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(
            "access-2",
            Some("refresh-2"),
            3600,
            Some("alice"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server, 0, Some("refresh-1"));
    assert!(client.has_valid_oauth().is_none());

    let user = client.validate_session().await.unwrap();
    assert_eq!(user.as_deref(), Some("alice"));
    assert_eq!(client.has_valid_oauth().as_deref(), Some("alice"));
}

// ============================================================================
// Object Tests
// ============================================================================

#[tokio::test]
async fn test_query_sends_params_and_directive_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("age[lt]", "25"))
        .and(query_param("done", "false"))
        .and(header("range", "objects=0-9"))
        .and(header("x-stackmob-orderby", "age:asc"))
        .and(header("x-stackmob-select", "name,age"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "todo_id": "a", "age": 20 },
            { "todo_id": "b", "age": 21 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let query = Query::new()
        .lt("age", 25)
        .equals("done", false)
        .order_asc("age")
        .select("name")
        .select("age")
        .set_range(0, 9);
    let todos = client(&server).schema("todo").query(&query).await.unwrap();

    assert_eq!(todos.len(), 2);
    assert_eq!(todos[1]["todo_id"], "b");
}

#[tokio::test]
async fn test_or_query_encodes_group_prefixes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(query_param("[or1].age[lt]", "25"))
        .and(query_param("[or1].[and1].city", "NYC"))
        .and(query_param("[or1].[and1].name[ne]", "john"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let query = Query::new()
        .lt("age", 25)
        .or(&Query::new().equals("city", "NYC").not_equals("name", "john"))
        .unwrap();
    let todos = client(&server).schema("todo").query(&query).await.unwrap();
    assert!(todos.is_empty());
}

#[tokio::test]
async fn test_count_reads_content_range() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo"))
        .and(header("range", "objects=0-0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "0-0/42")
                .set_body_json(json!([{ "todo_id": "a" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let count = client(&server)
        .schema("todo")
        .count(&Query::new())
        .await
        .unwrap();
    assert_eq!(count, 42);
}

#[tokio::test]
async fn test_count_falls_back_to_body_length() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "todo_id": "a" }])))
        .mount(&server)
        .await;

    let count = client(&server)
        .schema("todo")
        .count(&Query::new().equals("done", true))
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_create_update_and_destroy() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/todo"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "todo_id": "t1", "name": "write" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "todo_id": "t1", "name": "write", "createddate": 1, "lastmoddate": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/todo/t1"))
        .and(body_json(json!({ "name": "rewrite" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "todo_id": "t1" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/todo/t1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let todos = client.schema("todo");

    let created = todos
        .create(json!({ "todo_id": "t1", "name": "write" }))
        .await
        .unwrap();
    assert_eq!(created["todo_id"], "t1");

    todos
        .update("t1", json!({ "name": "rewrite", "lastmoddate": 5 }))
        .await
        .unwrap();
    todos.destroy("t1").await.unwrap();
}

#[tokio::test]
async fn test_empty_success_body_is_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let value = client(&server).schema("todo").fetch("t1").await.unwrap();
    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn test_fetch_expanded_sends_depth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todo/t1"))
        .and(query_param("_expand", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "todo_id": "t1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.schema("todo").fetch_expanded("t1", 2).await.unwrap();

    let err = client.schema("todo").fetch_expanded("t1", 4).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidInput(InvalidInputError::ExpandDepth { depth: 4 })
    ));
}

#[tokio::test]
async fn test_relationship_operations() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/todo/t1/tags"))
        .and(body_json(json!([{ "name": "home" }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "succeeded": ["g1"] })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/todo/t1/tags"))
        .and(body_json(json!(["g2", "g3"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "todo_id": "t1" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/todo/t1/tags/g2,g3"))
        .and(header("x-stackmob-cascadedelete", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let todos = client.schema("todo");

    todos
        .add_relationship("t1", "tags", vec![json!({ "name": "home" })])
        .await
        .unwrap();
    todos
        .append_and_save("t1", "tags", vec![json!("g2"), json!("g3")])
        .await
        .unwrap();
    todos
        .delete_and_save("t1", "tags", vec![json!("g2"), json!("g3")], true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_user_create_is_unsigned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user"))
        .and(body_json(json!({ "username": "bob", "password": "pw" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "username": "bob" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_session(&server, 3600, None);
    let user = client
        .create_user(json!({ "username": "bob", "password": "pw" }))
        .await
        .unwrap();
    assert_eq!(user["username"], "bob");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_custom_code_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hello_world"))
        .and(body_json(json!({ "name": "bob" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "msg": "hi bob" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = std::collections::BTreeMap::new();
    params.insert("name".to_string(), json!("bob"));

    let response = client(&server)
        .custom_code("hello_world", params, Some(reqwest::Method::POST))
        .await
        .unwrap();
    assert_eq!(response.into_value()["msg"], "hi bob");
}

// ============================================================================
// Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_file_store_session_survives_restart() {
    let server = MockServer::start().await;
    mount_login(&server, 3600).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");

    let first = Client::with_http(config(&server), Arc::new(FileStore::open(&path).unwrap())).unwrap();
    first.login(&Login::new("alice", "secret"), true).await.unwrap();
    drop(first);

    let second = Client::with_http(config(&server), Arc::new(FileStore::open(&path).unwrap())).unwrap();
    assert!(second.is_logged_in());
    assert_eq!(second.logged_in_user().as_deref(), Some("alice"));
    assert_eq!(
        second.session().refresh_token().unwrap().as_str(),
        "refresh-1"
    );
}
