use std::time::Duration;

use qdb_cli::client::http::{Credentials, HttpQuestDb, STATEMENT_TIMEOUT_HEADER};
use qdb_cli::client::{DbError, QuestDb};
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{client_for, ddl_error, ddl_ok, mock_chk};

#[tokio::test]
async fn test_run_ddl_sends_statement_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exec"))
        .and(query_param("query", "DROP TABLE 'trades';"))
        .and(header(STATEMENT_TIMEOUT_HEADER, "5000"))
        .respond_with(ddl_ok())
        .expect(1)
        .mount(&server)
        .await;

    let db = client_for(&server, None);
    db.run_ddl("DROP TABLE 'trades';", Some(5000)).await.unwrap();
}

#[tokio::test]
async fn test_basic_auth_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exec"))
        // admin:quest
        .and(header("authorization", "Basic YWRtaW46cXVlc3Q="))
        .and(header_regex("user-agent", "^qdb-cli/"))
        .respond_with(ddl_ok())
        .expect(1)
        .mount(&server)
        .await;

    let db = client_for(
        &server,
        Some(Credentials {
            user: "admin".to_string(),
            password: Some("quest".to_string()),
        }),
    );
    db.run_ddl("ALTER TABLE 't' DEDUP DISABLE;", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_api_error_text_is_passed_through() {
    let server = MockServer::start().await;
    let sql = "RENAME TABLE 'a' TO 'b';";
    Mock::given(method("GET"))
        .and(path("/exec"))
        .respond_with(ddl_error(sql, "table does not exist [table=a]"))
        .mount(&server)
        .await;

    let db = client_for(&server, None);
    let err = db.run_ddl(sql, None).await.unwrap_err();

    assert_eq!(err.db_message(), Some("table does not exist [table=a]"));
    assert!(matches!(
        err,
        DbError::Api {
            status: Some(400),
            position: Some(0),
            ..
        }
    ));
}

#[tokio::test]
async fn test_non_json_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exec"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let db = client_for(&server, None);
    let err = db.run_ddl("DROP TABLE 't';", None).await.unwrap_err();

    assert_eq!(err.to_string(), "HTTP 401: Unauthorized");
}

#[tokio::test]
async fn test_table_exists() {
    let server = MockServer::start().await;
    mock_chk(&server, "trades", true).await;
    mock_chk(&server, "quotes", false).await;

    let db = client_for(&server, None);
    assert!(db.table_exists("trades").await.unwrap());
    assert!(!db.table_exists("quotes").await.unwrap());

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap();
    assert!(query.contains("f=json"));
    assert!(query.contains("version=2"));
}

#[tokio::test]
async fn test_table_exists_propagates_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chk"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let db = client_for(&server, None);
    let err = db.table_exists("trades").await.unwrap_err();

    assert!(matches!(err, DbError::Api { status: Some(500), .. }));
    assert_eq!(err.db_message(), Some("internal error"));
}

#[tokio::test]
async fn test_fetch_schema_text() {
    let server = MockServer::start().await;
    let ddl = "CREATE TABLE 'trades' (ts TIMESTAMP) timestamp(ts) PARTITION BY DAY WAL;";
    Mock::given(method("GET"))
        .and(path("/exec"))
        .and(query_param("query", "SHOW CREATE TABLE 'trades';"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": "SHOW CREATE TABLE 'trades';",
            "columns": [{"name": "ddl", "type": "STRING"}],
            "timestamp": -1,
            "dataset": [[ddl]],
            "count": 1
        })))
        .mount(&server)
        .await;

    let db = client_for(&server, None);
    assert_eq!(db.fetch_schema_text("trades").await.unwrap(), ddl);
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Grab a free port and release it so nothing is listening there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base_url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
    let db = HttpQuestDb::try_new(base_url, Duration::from_secs(5), None).unwrap();

    let err = db.table_exists("trades").await.unwrap_err();
    assert!(matches!(err, DbError::Transport(_)), "{err}");
}
