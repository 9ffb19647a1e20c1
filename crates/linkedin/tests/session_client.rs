use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use linkedin_api::client::{ApiRequest, ApiSession, SessionClient};
use linkedin_api::config::{ClientConfig, EvasionConfig};
use linkedin_api::cookies::{CookieRepository, CookieSet, SESSION_COOKIE, StoredCookie};
use linkedin_api::error::LinkedinError;
use linkedin_api::retry::{Recover, RetryPolicy, RetrySettings, RetryStatuses, get_with_retry};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn config(server: &MockServer, dir: &TempDir) -> ClientConfig {
    init_tracing();
    let mut config = ClientConfig::default()
        .with_site_base_url(server.uri())
        .with_cookies_dir(dir.path())
        .with_evasion(EvasionConfig::disabled());
    config.fetch_metadata = false;
    config
}

async fn mount_anonymous_cookies(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/uas/authenticate"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=\"ajax:123\"; Max-Age=3600; Path=/")
                .append_header("set-cookie", "bcookie=\"v=2&abc\"; Path=/"),
        )
        .mount(server)
        .await;
}

async fn mount_login(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/uas/authenticate"))
        .and(body_string_contains("session_key=ada"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn login_passed() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(r#"{"login_result":"PASS"}"#)
        .append_header("set-cookie", "li_at=session-token; Max-Age=3600; Path=/")
}

#[tokio::test]
async fn test_login_persists_cookies() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    mount_login(&server, login_passed()).await;

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    client.authenticate("ada", "pw", true).await.unwrap();

    assert!(client.is_authenticated());
    assert_eq!(client.csrf_token().as_deref(), Some("ajax:123"));
    assert_eq!(client.username().as_deref(), Some("ada"));

    let cached = CookieRepository::new(dir.path())
        .get("ada")
        .await
        .unwrap()
        .expect("fresh cached session");
    assert_eq!(cached.value("li_at"), Some("session-token"));
    assert_eq!(cached.value("bcookie"), Some("\"v=2&abc\""));
}

#[tokio::test]
async fn test_login_challenge() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    mount_login(
        &server,
        ResponseTemplate::new(200).set_body_string(
            r#"{"login_result":"CHALLENGE","challenge_url":"https://www.linkedin.com/checkpoint"}"#,
        ),
    )
    .await;

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    let err = client.authenticate("ada", "pw", true).await.unwrap_err();

    assert!(matches!(&err, LinkedinError::AuthenticationChallenge(r) if r == "CHALLENGE"));
    assert!(err.is_fatal());
    assert!(!dir.path().join("ada.json").exists());
}

#[tokio::test]
async fn test_login_unauthorized() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    mount_login(&server, ResponseTemplate::new(401)).await;

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    let err = client.authenticate("ada", "pw", false).await.unwrap_err();
    assert!(matches!(err, LinkedinError::Unauthorized));
}

#[tokio::test]
async fn test_other_login_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    mount_login(&server, ResponseTemplate::new(500)).await;

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    let err = client.authenticate("ada", "pw", false).await.unwrap_err();
    assert!(matches!(err, LinkedinError::AuthFailure { status: 500 }));
}

#[tokio::test]
async fn test_missing_session_cookie() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/uas/authenticate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    let err = client.authenticate("ada", "pw", false).await.unwrap_err();
    assert!(matches!(err, LinkedinError::MissingField(SESSION_COOKIE)));
}

#[tokio::test]
async fn test_fresh_cache_skips_login() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(path("/uas/authenticate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let expires = Utc::now().timestamp() + 3600;
    let cookies: CookieSet = [
        StoredCookie::new(SESSION_COOKIE, "\"ajax:cached\"").with_expires(expires),
        StoredCookie::new("li_at", "cached"),
    ]
    .into_iter()
    .collect();
    CookieRepository::new(dir.path())
        .save(&cookies, "ada")
        .await
        .unwrap();

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    client.authenticate("ada", "pw", true).await.unwrap();

    assert_eq!(client.csrf_token().as_deref(), Some("ajax:cached"));
}

#[tokio::test]
async fn test_expired_cache_falls_back_to_login() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    mount_login(&server, login_passed()).await;

    let stale: CookieSet = [StoredCookie::new(SESSION_COOKIE, "\"ajax:old\"")
        .with_expires(Utc::now().timestamp() - 60)]
    .into_iter()
    .collect();
    CookieRepository::new(dir.path())
        .save(&stale, "ada")
        .await
        .unwrap();

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    client.authenticate("ada", "pw", true).await.unwrap();

    assert_eq!(client.csrf_token().as_deref(), Some("ajax:123"));
}

#[tokio::test]
async fn test_api_calls_carry_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/voyager/api/me"))
        .and(header("csrf-token", "ajax:77"))
        .and(header("cookie", "JSESSIONID=\"ajax:77\"; li_at=token"))
        .and(header("x-restli-protocol-version", "2.0.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"plainId":1}"#)
                .append_header("set-cookie", "lidc=\"b=1\"; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = SessionClient::new(config(&server, &dir)).unwrap();
    client.set_cookies(
        [
            StoredCookie::new(SESSION_COOKIE, "\"ajax:77\""),
            StoredCookie::new("li_at", "token"),
        ]
        .into_iter()
        .collect(),
    );

    let response = client.get(ApiRequest::api("/me")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json_value().unwrap()["plainId"], 1);
    assert_eq!(client.cookies().value("lidc"), Some("\"b=1\""));
}

#[tokio::test]
async fn test_retry_reauthenticates_expired_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    Mock::given(method("POST"))
        .and(path("/uas/authenticate"))
        .respond_with(login_passed())
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/voyager/api/me"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/voyager/api/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = Arc::new(SessionClient::new(config(&server, &dir)).unwrap());
    client.authenticate("ada", "pw", false).await.unwrap();

    let settings = RetrySettings::new(RetryPolicy::enabled(2), RetryStatuses::new([401]));
    let recover: Arc<dyn Recover> = client.clone();
    let response = get_with_retry(
        client.as_ref(),
        &ApiRequest::api("/me"),
        &settings,
        Some(recover.as_ref()),
    )
    .await
    .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_metadata_scraped_after_login() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_anonymous_cookies(&server).await;
    mount_login(&server, login_passed()).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head>
            <meta name="applicationInstance" content="{&quot;trackingId&quot;:&quot;abc&quot;}">
            <meta name="clientPageInstanceId" content="page-1">
            </head></html>"#,
        ))
        .mount(&server)
        .await;

    let mut config = config(&server, &dir);
    config.fetch_metadata = true;
    let client = SessionClient::new(config).unwrap();
    client.authenticate("ada", "pw", false).await.unwrap();

    let metadata = client.metadata();
    assert_eq!(metadata.client_page_instance_id.as_deref(), Some("page-1"));
    assert_eq!(
        metadata.client_application_instance.unwrap()["trackingId"],
        "abc"
    );
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("GET"))
        .and(path("/voyager/api/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = config(&server, &dir);
    config.timeout_secs = 1;
    let client = SessionClient::new(config).unwrap();

    let err = client.get(ApiRequest::api("/me")).await.unwrap_err();
    assert!(matches!(err, LinkedinError::Timeout));
    assert!(err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn test_requests_wait_for_evasion_delay() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(path("/voyager/api/me"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = config(&server, &dir).with_evasion(EvasionConfig {
        enabled: true,
        min_delay_ms: 2_000,
        max_delay_ms: 2_000,
    });
    config.timeout_secs = 0;
    let client = SessionClient::new(config).unwrap();

    let start = tokio::time::Instant::now();
    client.get(ApiRequest::api("/me")).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(2));

    client.post(ApiRequest::api("/me")).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(4));
}
