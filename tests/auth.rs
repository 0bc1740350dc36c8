use actix_web::{dev::Payload, test, FromRequest};
use rib_live::auth::{create_jwt, Auth, Claims, Role};
use serial_test::serial;
use std::env;

// Helper that guarantees a sufficiently long secret for tests.
fn set_secret() {
    env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

#[actix_web::test]
#[serial]
async fn jwt_roundtrip_ok() {
    set_secret();
    let token = create_jwt("42", "tester", vec![Role::User]).expect("token");
    // The Auth extractor is the public way to validate, so use it here.
    let req = test::TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_http_request();
    let mut pl = Payload::None;
    let auth = Auth::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(auth.0.sub, "42");
    assert_eq!(auth.0.author().name, "tester");
    assert!(auth.0.roles.contains(&Role::User));
    assert!(!auth.0.can_moderate());
}

#[actix_web::test]
#[serial]
async fn extractor_rejects_invalid_or_missing_token() {
    set_secret();
    let req = test::TestRequest::default()
        .insert_header(("Authorization", "Bearer notatoken"))
        .to_http_request();
    let mut pl = Payload::None;
    assert!(Auth::from_request(&req, &mut pl).await.is_err());

    let req = test::TestRequest::default().to_http_request();
    assert!(Auth::from_request(&req, &mut pl).await.is_err());
}

#[::core::prelude::v1::test]
fn moderators_and_admins_can_moderate() {
    let claims = |roles| Claims { sub: "1".into(), name: "n".into(), exp: usize::MAX, roles };
    assert!(claims(vec![Role::Moderator]).can_moderate());
    assert!(claims(vec![Role::User, Role::Admin]).can_moderate());
    assert!(!claims(vec![Role::User]).can_moderate());
}

#[::core::prelude::v1::test]
#[serial]
fn missing_secret_is_an_error() {
    env::remove_var("JWT_SECRET");
    assert!(create_jwt("1", "n", vec![]).is_err());
    set_secret();
}
