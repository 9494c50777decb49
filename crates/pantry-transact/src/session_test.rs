use super::*;

fn prefixes() -> Vec<String> {
    vec!["QuadPoint Cloud".to_string(), "Transact Cloud POS".to_string()]
}

#[test]
fn extract_title_text_reads_plain_title() {
    let html = "<html><head><title>QuadPoint Cloud 5.2.1</title></head></html>";
    assert_eq!(extract_title_text(html), "QuadPoint Cloud 5.2.1");
}

#[test]
fn extract_title_text_collapses_whitespace_and_attributes() {
    let html = "<HTML><HEAD><TITLE lang=\"en\">\n   Transact Cloud POS\n   7.0.3  </TITLE>";
    assert_eq!(extract_title_text(html), "Transact Cloud POS 7.0.3");
}

#[test]
fn extract_title_text_decodes_entities() {
    let html = "<title>Pantry &amp; Co&nbsp;1.0</title>";
    assert_eq!(extract_title_text(html), "Pantry & Co 1.0");
}

#[test]
fn extract_title_text_decodes_numeric_references() {
    let html = "<title>Transact&#160;Cloud&#x20;POS &#8211; 7.1</title>";
    assert_eq!(extract_title_text(html), "Transact Cloud POS \u{2013} 7.1");
    assert_eq!(
        parse_client_version(
            &extract_title_text("<title>QuadPoint&#32;Cloud&#xA0;5.2</title>"),
            &["QuadPoint Cloud".to_string()],
        )
        .unwrap(),
        "5.2"
    );
}

#[test]
fn extract_title_text_leaves_unknown_entities_alone() {
    let html = "<title>A &amp;lt; B &bogus; &#xD800; &#39;</title>";
    assert_eq!(extract_title_text(html), "A &lt; B &bogus; &#xD800; '");
}

#[test]
fn extract_title_text_missing_title_is_empty() {
    assert_eq!(extract_title_text("<html><body>hi</body></html>"), "");
}

#[test]
fn parse_client_version_matches_first_prefix() {
    let version = parse_client_version("QuadPoint Cloud 5.2.1", &prefixes()).unwrap();
    assert_eq!(version, "5.2.1");
}

#[test]
fn parse_client_version_matches_renamed_vendor_prefix() {
    let version = parse_client_version("Transact Cloud POS 7.0.3", &prefixes()).unwrap();
    assert_eq!(version, "7.0.3");
}

#[test]
fn parse_client_version_rejects_unknown_title() {
    let err = parse_client_version("Sign in", &prefixes()).unwrap_err();
    match err {
        TransactError::MalformedTitle { title, expected } => {
            assert_eq!(title, "Sign in");
            assert!(expected.contains("QuadPoint Cloud"));
            assert!(expected.contains("Transact Cloud POS"));
        }
        other => panic!("expected MalformedTitle, got: {other:?}"),
    }
}

#[test]
fn parse_client_version_requires_separator_after_prefix() {
    let result = parse_client_version("QuadPoint Cloudy 1.0", &prefixes());
    assert!(matches!(result, Err(TransactError::MalformedTitle { .. })));
}

#[test]
fn parse_client_version_rejects_prefix_without_version() {
    let result = parse_client_version("QuadPoint Cloud", &prefixes());
    assert!(matches!(result, Err(TransactError::MalformedTitle { .. })));
}

#[test]
fn parse_bearer_token_extracts_token() {
    assert_eq!(parse_bearer_token("Bearer abc.def").unwrap(), "abc.def");
}

#[test]
fn parse_bearer_token_rejects_expired_literal() {
    assert!(matches!(
        parse_bearer_token("Bearer expired"),
        Err(TransactError::TokenExpired)
    ));
}

#[test]
fn parse_bearer_token_rejects_other_schemes() {
    assert!(matches!(
        parse_bearer_token("Basic dXNlcjpwdw=="),
        Err(TransactError::MalformedAuthorization { .. })
    ));
}

#[test]
fn parse_bearer_token_rejects_empty_token() {
    assert!(matches!(
        parse_bearer_token("Bearer "),
        Err(TransactError::MalformedAuthorization { .. })
    ));
}

#[test]
fn new_rejects_invalid_base_url() {
    let result = SessionManager::new(SessionSettings {
        base_url: "not a url".to_string(),
        tenant: "kitchen".to_string(),
        username: "bot".to_string(),
        password: "pw".to_string(),
        title_prefixes: prefixes(),
        request_timeout: Duration::from_secs(5),
        user_agent: "pantry-test/0.1".to_string(),
    });
    assert!(matches!(result, Err(TransactError::InvalidBaseUrl { .. })));
}

#[tokio::test]
async fn new_session_starts_not_ready() {
    let manager = SessionManager::new(SessionSettings {
        base_url: "https://pos.example.com/".to_string(),
        tenant: "kitchen".to_string(),
        username: "bot".to_string(),
        password: "pw".to_string(),
        title_prefixes: prefixes(),
        request_timeout: Duration::from_secs(5),
        user_agent: "pantry-test/0.1".to_string(),
    })
    .expect("manager");
    assert!(!manager.is_ready().await);
    assert_eq!(manager.status(), SessionStatus::NotReady);
    assert_eq!(manager.tenant_page, "https://pos.example.com/?tenant=kitchen");
    assert!(matches!(
        manager.lock().await.token(),
        Err(TransactError::NotReady)
    ));
}
