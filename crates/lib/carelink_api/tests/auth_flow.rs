//! End-to-end authentication flows against the in-memory store.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use carelink_core::store::UserStore;
use common::{RESET_URL, TestApp, read_json, reset_params};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn register_login_and_profile() {
    let app = TestApp::new();
    let id = app.register("Ann@Example.com", "password1").await;

    let (access, refresh) = app.login("ann@example.com", "password1").await;
    assert_ne!(access, refresh);

    let (status, me) = app.call("GET", "/user/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id.as_str());
    assert_eq!(me["email"], "ann@example.com");
    assert_eq!(me["is_admin"], true, "first user is admin");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn second_user_is_not_admin() {
    let app = TestApp::new();
    app.register("admin@example.com", "password1").await;
    app.register("bob@example.com", "password1").await;
    let (access, _) = app.login("bob@example.com", "password1").await;
    let (_, me) = app.call("GET", "/user/me", Some(&access), None).await;
    assert_eq!(me["is_admin"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_registrations_make_one_admin() {
    let app = TestApp::new();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let router = app.router();
            tokio::spawn(async move {
                let req = Request::builder()
                    .method("POST")
                    .uri("/user/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "email": format!("user{i}@example.com"), "password": "password1" })
                            .to_string(),
                    ))
                    .unwrap();
                read_json(router.oneshot(req).await.unwrap()).await
            })
        })
        .collect();

    let mut admins = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK, "{body}");
        if body["is_admin"] == true {
            admins += 1;
        }
    }
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn deleting_every_user_does_not_free_the_admin_seat() {
    let app = TestApp::new();
    let admin_id = app.register("admin@example.com", "password1").await;
    app.store.soft_delete(admin_id.parse().unwrap()).await.unwrap();

    app.register("next@example.com", "password1").await;
    let (access, _) = app.login("next@example.com", "password1").await;
    let (_, me) = app.call("GET", "/user/me", Some(&access), None).await;
    assert_eq!(me["is_admin"], false);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;

    let (s1, wrong_password) = app
        .call(
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "nope-nope" })),
        )
        .await;
    let (s2, unknown_email) = app
        .call(
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "who@example.com", "password": "password1" })),
        )
        .await;

    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s2, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password["detail"], "Invalid credentials.");
}

#[tokio::test]
async fn registration_validation() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;

    let (status, body) = app
        .call(
            "POST",
            "/user/register",
            None,
            Some(json!({ "email": " ANN@example.com ", "password": "password2" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = app
        .call(
            "POST",
            "/user/register",
            None,
            Some(json!({ "email": "new@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/user/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "password1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::new();
    let req = Request::builder()
        .method("POST")
        .uri("/user/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = read_json(app.router().oneshot(req).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn protected_routes_need_a_valid_access_token() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;
    let (_, refresh) = app.login("ann@example.com", "password1").await;

    let (status, _) = app.call("GET", "/user/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("GET", "/user/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A refresh token is not an access token.
    let (status, _) = app.call("GET", "/user/me", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_issues_a_working_access_token() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;
    let (access, refresh) = app.login("ann@example.com", "password1").await;

    let (status, body) = app
        .call(
            "POST",
            "/user/token/refresh",
            None,
            Some(json!({ "refresh": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = body["access"].as_str().unwrap();
    let (status, _) = app.call("GET", "/user/me", Some(new_access), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            "POST",
            "/user/token/refresh",
            None,
            Some(json!({ "refresh": access })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_flow() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;
    let (access, _) = app.login("ann@example.com", "password1").await;

    let (status, body) = app
        .call(
            "POST",
            "/user/changePassword",
            Some(&access),
            Some(json!({
                "old_password": "wrong-one",
                "new_password": "password2",
                "confirm_password": "password2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Incorrect password.");

    let (status, _) = app
        .call(
            "POST",
            "/user/changePassword",
            Some(&access),
            Some(json!({
                "old_password": "password1",
                "new_password": "password2",
                "confirm_password": "password3",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "POST",
            "/user/changePassword",
            Some(&access),
            Some(json!({
                "old_password": "password1",
                "new_password": "password2",
                "confirm_password": "password2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, _) = app
        .call(
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "password1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login("ann@example.com", "password2").await;

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "ann@example.com");
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = TestApp::new();
    let id = app.register("ann@example.com", "password1").await;
    let user_id: Uuid = id.parse().unwrap();
    let mut sub = app.registry.register(user_id);

    let (status, _) = app
        .call(
            "POST",
            "/user/send-mail-reset-password",
            None,
            Some(json!({ "email": "ANN@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains(RESET_URL));
    let (uid, token) = reset_params(&sent[0].body);
    assert_eq!(
        sub.receiver.recv().await.unwrap(),
        "A password reset email has been sent."
    );

    let uri = format!("/user/reset-password?uid={uid}&token={token}");

    let (status, _) = app
        .call(
            "POST",
            &uri,
            None,
            Some(json!({ "password": "password2", "password2": "different" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            &uri,
            None,
            Some(json!({ "password": "password2", "password2": "password2" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sub.receiver.recv().await.unwrap(),
        "Your password has been reset."
    );

    app.login("ann@example.com", "password2").await;

    // The password changed, so the token is spent.
    let (status, body) = app
        .call(
            "POST",
            &uri,
            None,
            Some(json!({ "password": "password3", "password2": "password3" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "token_invalid");
    assert_eq!(body["detail"], "Token is not valid or expired.");
}

#[tokio::test]
async fn reset_rejects_bad_links() {
    let app = TestApp::new();
    let id = app.register("ann@example.com", "password1").await;
    app.call(
        "POST",
        "/user/send-mail-reset-password",
        None,
        Some(json!({ "email": "ann@example.com" })),
    )
    .await;
    let (uid, token) = reset_params(&app.mailer.sent()[0].body);
    let body = json!({ "password": "password2", "password2": "password2" });

    let (status, _) = app
        .call("POST", "/user/reset-password", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tampered = format!("/user/reset-password?uid={uid}&token={token}x");
    let (status, resp) = app.call("POST", &tampered, None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "token_invalid");

    let garbled = format!("/user/reset-password?uid=%21%21&token={token}");
    let (status, _) = app.call("POST", &garbled, None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Another user's uid with this user's token.
    let other = app.register("bob@example.com", "password1").await;
    let other_uid = carelink_core::auth::reset::encode_uid(other.parse().unwrap());
    let swapped = format!("/user/reset-password?uid={other_uid}&token={token}");
    let (status, _) = app.call("POST", &swapped, None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Still redeemable after all of that.
    let uri = format!("/user/reset-password?uid={uid}&token={token}");
    let (status, _) = app.call("POST", &uri, None, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "user {id}");
}

#[tokio::test]
async fn changing_password_invalidates_outstanding_reset_tokens() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;
    app.call(
        "POST",
        "/user/send-mail-reset-password",
        None,
        Some(json!({ "email": "ann@example.com" })),
    )
    .await;
    let (uid, token) = reset_params(&app.mailer.sent()[0].body);

    let (access, _) = app.login("ann@example.com", "password1").await;
    let (status, _) = app
        .call(
            "POST",
            "/user/changePassword",
            Some(&access),
            Some(json!({
                "old_password": "password1",
                "new_password": "password2",
                "confirm_password": "password2",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/user/reset-password?uid={uid}&token={token}");
    let (status, _) = app
        .call(
            "POST",
            &uri,
            None,
            Some(json!({ "password": "password3", "password2": "password3" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_mail_errors() {
    let app = TestApp::new();
    app.register("ann@example.com", "password1").await;

    let (status, _) = app
        .call(
            "POST",
            "/user/send-mail-reset-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.mailer.set_failing(true);
    let (status, body) = app
        .call(
            "POST",
            "/user/send-mail-reset-password",
            None,
            Some(json!({ "email": "ann@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["detail"], "Internal server error");
}

#[tokio::test]
async fn inactive_accounts_are_refused() {
    let app = TestApp::new();
    let id = app.register("ann@example.com", "password1").await;
    let (access, _) = app.login("ann@example.com", "password1").await;

    app.store
        .set_active(id.parse().unwrap(), false)
        .await
        .unwrap();

    let (status, _) = app.call("GET", "/user/me", Some(&access), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            "POST",
            "/user/login",
            None,
            Some(json!({ "email": "ann@example.com", "password": "password1" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_user_management() {
    let app = TestApp::new();
    let admin_id = app.register("admin@example.com", "password1").await;
    let bob_id = app.register("bob@example.com", "password1").await;
    let (admin, _) = app.login("admin@example.com", "password1").await;
    let (bob, _) = app.login("bob@example.com", "password1").await;

    let (status, _) = app.call("GET", "/user", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = app.call("GET", "/user", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let emails: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(emails, ["admin@example.com", "bob@example.com"]);

    let (status, _) = app
        .call("DELETE", &format!("/user/{admin_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("DELETE", &format!("/user/{bob_id}"), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call("DELETE", &format!("/user/{bob_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.store.count().await.unwrap(), 1);

    let (status, _) = app
        .call("DELETE", &format!("/user/{bob_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bob's token dies with the account.
    let (status, _) = app.call("GET", "/user/me", Some(&bob), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The email is free again.
    app.register("bob@example.com", "password9").await;
}
