mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{
    MockRepository, app, app_with_shared, bearer, body_json, free_resource, in_one_day, location,
    one_day_ago, premium_resource,
};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;
use wellness_portal::{
    models::{ResourceStatus, Role, SubscriptionStatus},
    storage::MockStorageService,
};

fn signed_url_request(id: Option<&str>, user: Option<Uuid>) -> Request<Body> {
    let uri = match id {
        Some(id) => format!("/api/recursos/signed-url?id={}", id),
        None => "/api/recursos/signed-url".to_string(),
    };
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user_id) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user_id));
    }
    builder.body(Body::empty()).unwrap()
}

fn entitled_repo(user_id: Uuid) -> MockRepository {
    MockRepository::default()
        .with_user(user_id, Role::Member)
        .with_subscription(user_id, SubscriptionStatus::Active, Some(in_one_day()))
}

async fn assert_error(response: axum::response::Response, status: StatusCode, message: &str) {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["error"], message);
}

#[tokio::test]
async fn test_missing_id_is_bad_request() {
    let user_id = Uuid::new_v4();
    let response = app(entitled_repo(user_id), MockStorageService::new())
        .oneshot(signed_url_request(None, Some(user_id)))
        .await
        .unwrap();

    assert_error(response, StatusCode::BAD_REQUEST, "Missing id").await;
}

#[tokio::test]
async fn test_blank_id_is_bad_request_even_without_session() {
    let response = app(MockRepository::default(), MockStorageService::new())
        .oneshot(signed_url_request(Some(""), None))
        .await
        .unwrap();

    assert_error(response, StatusCode::BAD_REQUEST, "Missing id").await;
}

#[tokio::test]
async fn test_no_session_is_unauthenticated() {
    let resource = free_resource("libre", "https://cdn.example.com/libre.mp3");
    let id = resource.id.to_string();
    let repo = MockRepository::default().with_resource(resource);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), None))
        .await
        .unwrap();

    assert_error(response, StatusCode::UNAUTHORIZED, "Unauthenticated").await;
}

#[tokio::test]
async fn test_token_for_unknown_profile_is_unauthenticated() {
    let response = app(MockRepository::default(), MockStorageService::new())
        .oneshot(signed_url_request(
            Some(&Uuid::new_v4().to_string()),
            Some(Uuid::new_v4()),
        ))
        .await
        .unwrap();

    assert_error(response, StatusCode::UNAUTHORIZED, "Unauthenticated").await;
}

#[tokio::test]
async fn test_subscription_backend_error_is_server_error() {
    let user_id = Uuid::new_v4();
    let repo = MockRepository {
        fail_subscriptions: true,
        ..MockRepository::default()
    }
    .with_user(user_id, Role::Member);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(
            Some(&Uuid::new_v4().to_string()),
            Some(user_id),
        ))
        .await
        .unwrap();

    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Subscription check failed",
    )
    .await;
}

#[tokio::test]
async fn test_inactive_subscriptions_are_forbidden() {
    for status in [
        SubscriptionStatus::Canceled,
        SubscriptionStatus::PastDue,
        SubscriptionStatus::Incomplete,
        SubscriptionStatus::Trialing,
    ] {
        let user_id = Uuid::new_v4();
        let resource = premium_resource("meditacion", Some("meditacion/1-a.mp3"));
        let id = resource.id.to_string();
        let repo = MockRepository::default()
            .with_user(user_id, Role::Member)
            .with_subscription(user_id, status, Some(in_one_day()))
            .with_resource(resource);

        let response = app(repo, MockStorageService::new())
            .oneshot(signed_url_request(Some(&id), Some(user_id)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "status {status}");
        assert_eq!(body_json(response).await["error"], "Forbidden");
    }
}

#[tokio::test]
async fn test_expired_active_period_is_forbidden() {
    let user_id = Uuid::new_v4();
    let resource = premium_resource("yoga", Some("yoga/1-b.mp4"));
    let id = resource.id.to_string();
    let repo = MockRepository::default()
        .with_user(user_id, Role::Member)
        .with_subscription(user_id, SubscriptionStatus::Active, Some(one_day_ago()))
        .with_resource(resource);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert_error(response, StatusCode::FORBIDDEN, "Forbidden").await;
}

#[tokio::test]
async fn test_no_subscription_is_forbidden() {
    let user_id = Uuid::new_v4();
    let repo = MockRepository::default().with_user(user_id, Role::Member);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(
            Some(&Uuid::new_v4().to_string()),
            Some(user_id),
        ))
        .await
        .unwrap();

    assert_error(response, StatusCode::FORBIDDEN, "Forbidden").await;
}

#[tokio::test]
async fn test_resource_backend_error_is_server_error() {
    let user_id = Uuid::new_v4();
    let repo = MockRepository {
        fail_resources: true,
        ..entitled_repo(user_id)
    };

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(
            Some(&Uuid::new_v4().to_string()),
            Some(user_id),
        ))
        .await
        .unwrap();

    assert_error(
        response,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Resource lookup failed",
    )
    .await;
}

#[tokio::test]
async fn test_unpublished_resources_look_missing() {
    for status in [ResourceStatus::Draft, ResourceStatus::Archived] {
        let user_id = Uuid::new_v4();
        let mut resource = premium_resource("borrador", Some("borrador/1-c.pdf"));
        resource.status = status;
        let id = resource.id.to_string();
        let repo = entitled_repo(user_id).with_resource(resource);

        let hidden = app(repo, MockStorageService::new())
            .oneshot(signed_url_request(Some(&id), Some(user_id)))
            .await
            .unwrap();

        let unknown = app(entitled_repo(user_id), MockStorageService::new())
            .oneshot(signed_url_request(
                Some(&Uuid::new_v4().to_string()),
                Some(user_id),
            ))
            .await
            .unwrap();

        assert_eq!(hidden.status(), StatusCode::NOT_FOUND);
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(hidden).await, body_json(unknown).await);
    }
}

#[tokio::test]
async fn test_malformed_id_is_not_found() {
    let user_id = Uuid::new_v4();
    let response = app(entitled_repo(user_id), MockStorageService::new())
        .oneshot(signed_url_request(Some("not-a-uuid"), Some(user_id)))
        .await
        .unwrap();

    assert_error(response, StatusCode::NOT_FOUND, "Not found").await;
}

#[tokio::test]
async fn test_free_resource_redirects_to_public_url() {
    let user_id = Uuid::new_v4();
    let public_url = "https://cdn.example.com/libre/respiracion.mp3";
    let resource = free_resource("respiracion", public_url);
    let id = resource.id.to_string();
    let repo = entitled_repo(user_id).with_resource(resource);

    // Signing would fail; a public resource must never reach it.
    let response = app(repo, MockStorageService::new_failing())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), public_url);
}

#[tokio::test]
async fn test_premium_without_file_path_is_bad_request() {
    let user_id = Uuid::new_v4();
    let resource = premium_resource("roto", None);
    let id = resource.id.to_string();
    let repo = entitled_repo(user_id).with_resource(resource);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert_error(response, StatusCode::BAD_REQUEST, "No file_path for resource").await;
}

#[tokio::test]
async fn test_signing_failure_is_server_error() {
    let user_id = Uuid::new_v4();
    let resource = premium_resource("firma", Some("firma/1-d.mp3"));
    let id = resource.id.to_string();
    let repo = entitled_repo(user_id).with_resource(resource);

    let response = app(repo, MockStorageService::new_failing())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "Could not sign URL").await;
}

#[tokio::test]
async fn test_entitled_without_period_end_gets_signed_redirect() {
    let user_id = Uuid::new_v4();
    let resource = premium_resource("sin-fin", Some("sin-fin/1-e.mp3"));
    let id = resource.id.to_string();
    let repo = MockRepository::default()
        .with_user(user_id, Role::Member)
        .with_subscription(user_id, SubscriptionStatus::Active, None)
        .with_resource(resource);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert!(location(&response).contains("sin-fin/1-e.mp3"));
}

#[tokio::test]
async fn test_premium_round_trip_signs_private_path() {
    let user_id = Uuid::new_v4();
    let resource = premium_resource("a", Some("a/1-x.mp3"));
    let id = resource.id.to_string();
    let repo = Arc::new(entitled_repo(user_id).with_resource(resource));

    let first = app_with_shared(repo.clone(), MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();
    let second = app_with_shared(repo, MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(second.status(), StatusCode::TEMPORARY_REDIRECT);

    let first_url = location(&first);
    let second_url = location(&second);
    assert!(first_url.contains("/a/1-x.mp3"));
    assert!(first_url.contains("expires_in=60"));
    assert_ne!(first_url, second_url);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let user_id = Uuid::new_v4();
    let resource = premium_resource("cookie", Some("cookie/1-f.mp3"));
    let id = resource.id.to_string();
    let repo = entitled_repo(user_id).with_resource(resource);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/recursos/signed-url?id={}", id))
        .header(
            header::COOKIE,
            format!(
                "theme=dark; sb-access-token={}",
                common::session_token(user_id)
            ),
        )
        .body(Body::empty())
        .unwrap();

    let response = app(repo, MockStorageService::new())
        .oneshot(request)
        .await
        .unwrap();

    assert!(response.status().is_redirection());
}

#[tokio::test]
async fn test_unentitled_caller_is_forbidden_even_for_free_resource() {
    let user_id = Uuid::new_v4();
    let resource = free_resource("libre", "https://cdn.example.com/libre.mp3");
    let id = resource.id.to_string();
    let repo = MockRepository::default()
        .with_user(user_id, Role::Member)
        .with_resource(resource);

    let response = app(repo, MockStorageService::new())
        .oneshot(signed_url_request(Some(&id), Some(user_id)))
        .await
        .unwrap();

    assert_error(response, StatusCode::FORBIDDEN, "Forbidden").await;
}

#[tokio::test]
async fn test_malformed_query_string_gets_json_error() {
    let user_id = Uuid::new_v4();
    let id = Uuid::new_v4();
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/recursos/signed-url?id={id}&id={id}"))
        .header(header::AUTHORIZATION, bearer(user_id))
        .body(Body::empty())
        .unwrap();

    let response = app(entitled_repo(user_id), MockStorageService::new())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body = body_json(response).await;
    assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));
}
