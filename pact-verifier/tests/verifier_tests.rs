//! End-to-end verification against a live mock provider.

use pact_verifier::{
    HttpClient, InteractionError, InteractionStatus, Lifecycle, MismatchKind, ReqwestClient,
    SourceOptions, Verifier, VerifierError,
};
use serde_json::json;
use std::sync::Arc;
use test_utils::fixtures::{
    CONSUMER, GET_USER_23, PROVIDER, STATE_NO_USER_200, STATE_USER_23, SampleUser, user_list_pact,
    user_pact, write_pact_file,
};
use test_utils::mocks::{RecordingHook, ScriptedClient, hook_log};
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Arc<dyn HttpClient> {
    Arc::new(ReqwestClient::with_defaults().unwrap())
}

/// Provider answering `GET /user?id=23` with `user` and 404 otherwise, which
/// also serves the user pact at `/getpact`.
async fn user_provider(user: SampleUser) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("id", "23"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user.body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/getpact"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_pact()))
        .mount(&server)
        .await;
    server
}

fn user_verifier(server: &MockServer) -> Verifier {
    Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(format!("{}/getpact", server.uri()), None)
        .service_provider(PROVIDER, client(), Url::parse(&server.uri()).unwrap())
        .provider_state(STATE_USER_23, None, None)
        .provider_state(STATE_NO_USER_200, None, None)
}

#[tokio::test]
async fn test_verify_success() {
    let server = user_provider(SampleUser::JOHN).await;
    let mut verifier = user_verifier(&server);

    verifier.verify().await.unwrap();

    let outcome = verifier.outcome().unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.executed(), 2);
    assert_eq!(outcome.consumer, CONSUMER);
    assert!(outcome.finished_at >= outcome.started_at);
    assert_eq!(verifier.lifecycle(), Lifecycle::Completed);
}

#[tokio::test]
async fn test_filter_by_state_then_full_verify() {
    let server = user_provider(SampleUser::JOHN).await;
    let mut verifier = user_verifier(&server);

    verifier.verify_state("", STATE_NO_USER_200).await.unwrap();
    let outcome = verifier.outcome().unwrap();
    assert_eq!(outcome.executed(), 1);
    assert_eq!(outcome.interactions[0].status, InteractionStatus::Skipped);
    assert_eq!(outcome.interactions[1].status, InteractionStatus::Passed);

    verifier.verify().await.unwrap();
    assert_eq!(verifier.outcome().unwrap().executed(), 2);
}

#[tokio::test]
async fn test_filter_by_description_then_full_verify() {
    let server = user_provider(SampleUser::JOHN).await;
    let mut verifier = user_verifier(&server);

    verifier.verify_state(GET_USER_23, "").await.unwrap();
    let outcome = verifier.outcome().unwrap();
    assert_eq!(outcome.executed(), 1);
    assert_eq!(outcome.interactions[0].description, GET_USER_23);

    verifier.verify().await.unwrap();
}

#[tokio::test]
async fn test_mismatch_reports_each_differing_field() {
    let server = user_provider(SampleUser::JOHN.with_names_of(SampleUser::JANE)).await;
    let mut verifier = user_verifier(&server);

    let err = verifier.verify().await.unwrap_err();
    assert!(matches!(err, VerifierError::VerificationFailed { failed: 1, total: 2 }));

    let outcome = verifier.outcome().unwrap();
    let mut paths: Vec<_> = outcome.mismatches().map(|m| m.path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["$.body.firstName", "$.body.lastName"]);
    assert!(outcome.mismatches().all(|m| m.kind == MismatchKind::Body));
    assert!(outcome.summary().contains(GET_USER_23));
}

#[tokio::test]
async fn test_no_filtered_interactions_makes_no_provider_call() {
    let server = MockServer::start().await;
    Mock::given(path("/user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let pact = write_pact_file(&user_pact()).unwrap();

    let mut verifier = Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(pact.display().to_string(), None)
        .service_provider(PROVIDER, client(), Url::parse(&server.uri()).unwrap());

    let err = verifier
        .verify_state("", "there is a user with id {0}")
        .await
        .unwrap_err();
    assert!(matches!(err, VerifierError::NoInteractionsSelected { .. }));
    assert!(verifier.outcome().is_none());
    std::fs::remove_file(pact).unwrap();
}

#[tokio::test]
async fn test_invalid_pact_uri_error_contains_source() {
    let mut verifier = Verifier::new()
        .honours_pact_with("consumer")
        .service_provider("provider", client(), Url::parse("http://localhost").unwrap())
        .pact_uri("badpath///", None);

    let err = verifier.verify().await.unwrap_err();
    assert!(matches!(err, VerifierError::InvalidSource { .. }));
    assert!(err.to_string().contains("badpath///"));
}

#[tokio::test]
async fn test_unset_names() {
    let err = Verifier::new().verify().await.unwrap_err();
    assert!(matches!(err, VerifierError::EmptyConsumer));

    let err = Verifier::new()
        .honours_pact_with("consumer")
        .verify()
        .await
        .unwrap_err();
    assert!(matches!(err, VerifierError::EmptyProvider));
}

#[tokio::test]
async fn test_state_hooks_wrap_each_interaction() {
    let server = user_provider(SampleUser::JOHN).await;
    let log = hook_log();
    let mut verifier = user_verifier(&server)
        .provider_state(
            STATE_USER_23,
            Some(RecordingHook::new(&log, "setup").shared()),
            Some(RecordingHook::new(&log, "teardown").shared()),
        )
        .provider_state(
            STATE_NO_USER_200,
            Some(RecordingHook::new(&log, "setup").shared()),
            Some(RecordingHook::new(&log, "teardown").failing("table locked").shared()),
        );

    verifier.verify().await.unwrap();

    assert_eq!(
        *log.read().await,
        vec![
            format!("setup:{STATE_USER_23}"),
            format!("teardown:{STATE_USER_23}"),
            format!("setup:{STATE_NO_USER_200}"),
            format!("teardown:{STATE_NO_USER_200}"),
        ]
    );
    let outcome = verifier.outcome().unwrap();
    assert!(outcome.interactions[1].passed());
    assert_eq!(outcome.interactions[1].warnings.len(), 1);
}

#[tokio::test]
async fn test_setup_failure_does_not_stop_other_interactions() {
    let server = user_provider(SampleUser::JOHN).await;
    let log = hook_log();
    let mut verifier = user_verifier(&server).provider_state(
        STATE_USER_23,
        Some(RecordingHook::new(&log, "setup").failing("seed failed").shared()),
        None,
    );

    let err = verifier.verify().await.unwrap_err();
    assert!(matches!(err, VerifierError::VerificationFailed { failed: 1, total: 2 }));

    let outcome = verifier.outcome().unwrap();
    assert!(matches!(
        &outcome.interactions[0].error,
        Some(InteractionError::ProviderStateSetup { state, .. }) if state == STATE_USER_23
    ));
    assert!(outcome.interactions[1].passed());
}

#[tokio::test]
async fn test_transport_failures_are_recorded_per_interaction() {
    let provider = Arc::new(ScriptedClient::new().unreachable());
    let pact = write_pact_file(&user_pact()).unwrap();
    let mut verifier = Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(pact.display().to_string(), None)
        .service_provider(PROVIDER, provider.clone(), Url::parse("http://provider.local").unwrap());

    let err = verifier.verify().await.unwrap_err();
    assert!(matches!(err, VerifierError::VerificationFailed { failed: 2, total: 2 }));
    assert!(verifier
        .outcome()
        .unwrap()
        .failures()
        .all(|r| matches!(r.error, Some(InteractionError::Transport { .. }))));
    assert_eq!(
        provider.targets().await,
        vec!["GET /user?id=23", "GET /user?id=200"]
    );
    assert!(provider.requests().await.iter().all(|r| r.body.is_none()));
    std::fs::remove_file(pact).unwrap();
}

#[tokio::test]
async fn test_remote_pact_fetched_with_bearer_token() {
    let broker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pacts/provider/go-api/consumer/chrome-browser/latest"))
        .and(header("Authorization", "Bearer broker-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_pact()))
        .expect(1)
        .mount(&broker)
        .await;

    let provider = Arc::new(
        ScriptedClient::new()
            .with_json("GET", "/user?id=23", 200, &SampleUser::JOHN.body())
            .with_json("GET", "/user?id=200", 404, &json!({})),
    );
    let mut verifier = Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(
            format!("{}/pacts/provider/go-api/consumer/chrome-browser/latest", broker.uri()),
            Some(SourceOptions::default().with_token("broker-token")),
        )
        .service_provider(PROVIDER, provider, Url::parse("http://provider.local").unwrap())
        .with_pact_client(client());

    verifier.verify().await.unwrap();
}

#[tokio::test]
async fn test_broker_rejection_is_invalid_source() {
    let broker = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&broker)
        .await;
    let uri = format!("{}/pacts/latest", broker.uri());

    let mut verifier = Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(uri.clone(), None)
        .service_provider(PROVIDER, client(), Url::parse(&broker.uri()).unwrap());

    let err = verifier.verify().await.unwrap_err();
    assert!(matches!(err, VerifierError::InvalidSource { .. }));
    assert!(err.to_string().contains(&uri));
}

#[tokio::test]
async fn test_v3_matchers_against_live_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/json;charset=utf-8")
                .set_body_raw(
                    json!({
                        "users": [
                            {"id": 7, "firstName": "Ada", "lastName": "Lovelace", "admin": true},
                            {"id": 8, "firstName": "Alan", "lastName": "Turing"}
                        ],
                        "generatedAt": "2025-06-30T12:00:00Z",
                        "nextPage": 2
                    })
                    .to_string(),
                    "application/json;charset=utf-8",
                ),
        )
        .mount(&server)
        .await;
    let pact = write_pact_file(&user_list_pact()).unwrap();

    let mut verifier = Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(format!("file://{}", pact.display()), None)
        .service_provider(PROVIDER, client(), Url::parse(&server.uri()).unwrap());

    verifier.verify().await.unwrap();
    std::fs::remove_file(pact).unwrap();
}

#[tokio::test]
async fn test_v3_min_count_violation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            json!({"users": [], "generatedAt": "yesterday"}).to_string(),
            "application/json; charset=utf-8",
        ))
        .mount(&server)
        .await;
    let pact = write_pact_file(&user_list_pact()).unwrap();

    let mut verifier = Verifier::new()
        .honours_pact_with(CONSUMER)
        .pact_uri(pact.display().to_string(), None)
        .service_provider(PROVIDER, client(), Url::parse(&server.uri()).unwrap());

    assert!(verifier.verify().await.is_err());
    let mut paths: Vec<_> = verifier
        .outcome()
        .unwrap()
        .mismatches()
        .map(|m| m.path.clone())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["$.body.generatedAt", "$.body.users"]);
    std::fs::remove_file(pact).unwrap();
}
