#![cfg(feature = "inmem-store")]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App};
use chrono::Utc;
use rib_live::auth::{create_jwt, Role};
use rib_live::hub::ReplyHub;
use rib_live::models::AuthorRef;
use rib_live::rate_limit::ReplyRateLimiter;
use rib_live::repo::inmem::InMemRepo;
use rib_live::service::ThreadService;
use rib_live::{config, AppState};
use serial_test::serial;

const THREAD: &str = "thread-1";

fn setup_env() {
    std::env::set_var("JWT_SECRET", "test-secret-must-be-32-bytes-long!!");
}

fn token(id: &str, roles: Vec<Role>) -> String {
    create_jwt(id, &id.to_uppercase(), roles).unwrap()
}

fn bearer(id: &str, roles: Vec<Role>) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token(id, roles)))
}

fn state(repo: InMemRepo, hub: ReplyHub, rate_limiter: Option<ReplyRateLimiter>) -> web::Data<AppState> {
    web::Data::new(AppState { service: ThreadService::new(Arc::new(repo), hub), rate_limiter })
}

fn seeded(count: i64) -> InMemRepo {
    let repo = InMemRepo::new();
    let base = Utc::now() - chrono::Duration::days(1);
    for i in 0..count {
        repo.insert_at(THREAD, AuthorRef::new("carol", "Carol"), &format!("seed {i}"), base + chrono::Duration::seconds(i))
            .unwrap();
    }
    repo
}

#[actix_web::test]
#[serial]
async fn paging_walks_whole_thread_without_duplicates() {
    setup_env();
    let app = test::init_service(App::new().app_data(state(seeded(45), ReplyHub::default(), None)).configure(config)).await;

    let mut seen = HashSet::new();
    let mut sizes = Vec::new();
    let mut cursor: Option<String> = None;
    let mut last_ts: Option<String> = None;
    loop {
        let uri = match &cursor {
            Some(c) => format!("/api/v1/threads/{THREAD}/replies?limit=20&cursor={c}"),
            None => format!("/api/v1/threads/{THREAD}/replies?limit=20"),
        };
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), 200);
        let page: serde_json::Value = test::read_body_json(resp).await;
        let items = page["items"].as_array().unwrap();
        sizes.push(items.len());
        for item in items {
            assert!(seen.insert(item["id"].as_str().unwrap().to_string()));
            let ts = item["created_at"].as_str().unwrap().to_string();
            // newest first across page boundaries
            if let Some(prev) = &last_ts {
                assert!(ts < *prev);
            }
            last_ts = Some(ts);
        }
        match page["next_cursor"].as_str() {
            Some(c) => cursor = Some(c.to_string()),
            None => break,
        }
    }
    assert_eq!(sizes, vec![20, 20, 5]);
    assert_eq!(seen.len(), 45);
}

#[actix_web::test]
#[serial]
async fn empty_thread_and_bad_cursor() {
    setup_env();
    let app = test::init_service(App::new().app_data(state(InMemRepo::new(), ReplyHub::default(), None)).configure(config)).await;

    let req = test::TestRequest::get().uri("/api/v1/threads/nobody/replies").to_request();
    let page: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["items"].as_array().unwrap().len(), 0);
    assert!(page["next_cursor"].is_null());

    let req = test::TestRequest::get().uri("/api/v1/threads/nobody/replies?cursor=@@@").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
#[serial]
async fn create_requires_auth_and_content_and_announces() {
    setup_env();
    let hub = ReplyHub::default();
    let app = test::init_service(App::new().app_data(state(InMemRepo::new(), hub.clone(), None)).configure(config)).await;
    let mut room = hub.join(THREAD);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/threads/{THREAD}/replies"))
        .set_json(serde_json::json!({ "content": "hi" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/threads/{THREAD}/replies"))
        .insert_header(bearer("dave", vec![Role::User]))
        .set_json(serde_json::json!({ "content": "   " }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/threads/{THREAD}/replies"))
        .insert_header(bearer("dave", vec![Role::User]))
        .set_json(serde_json::json!({ "content": "hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let reply: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(reply["author"]["id"], "dave");
    assert_eq!(reply["author"]["name"], "DAVE");
    assert_eq!(reply["thread_id"], THREAD);

    let event = room.try_recv().unwrap();
    assert_eq!(event.thread_id(), THREAD);
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(wire["type"], "reply-created");
    assert_eq!(wire["reply"]["id"], reply["id"]);
}

#[actix_web::test]
#[serial]
async fn delete_is_limited_to_author_or_moderator() {
    setup_env();
    let repo = InMemRepo::new();
    let own = repo.insert_at(THREAD, AuthorRef::new("erin", "Erin"), "mine", Utc::now()).unwrap();
    let other = repo.insert_at(THREAD, AuthorRef::new("erin", "Erin"), "also mine", Utc::now()).unwrap();
    let hub = ReplyHub::default();
    let app = test::init_service(App::new().app_data(state(repo, hub.clone(), None)).configure(config)).await;
    let mut room = hub.join(THREAD);

    let uri = format!("/api/v1/threads/{THREAD}/replies/{}", own.id);
    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer("frank", vec![Role::User])).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer("erin", vec![Role::User])).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let wire = serde_json::to_value(room.try_recv().unwrap()).unwrap();
    assert_eq!(wire["type"], "reply-deleted");
    assert_eq!(wire["reply_id"], own.id.as_str());

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer("erin", vec![Role::User])).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let uri = format!("/api/v1/threads/{THREAD}/replies/{}", other.id);
    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer("mod", vec![Role::Moderator])).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
}

#[actix_web::test]
#[serial]
async fn posting_is_rate_limited_per_author() {
    setup_env();
    let limiter = ReplyRateLimiter::new(2, Duration::from_secs(60));
    let app = test::init_service(
        App::new().app_data(state(InMemRepo::new(), ReplyHub::default(), Some(limiter))).configure(config),
    )
    .await;

    let post = |who: &str| {
        test::TestRequest::post()
            .uri(&format!("/api/v1/threads/{THREAD}/replies"))
            .insert_header(bearer(who, vec![Role::User]))
            .set_json(serde_json::json!({ "content": "spam" }))
            .to_request()
    };
    assert_eq!(test::call_service(&app, post("gina")).await.status(), 201);
    assert_eq!(test::call_service(&app, post("gina")).await.status(), 201);
    assert_eq!(test::call_service(&app, post("gina")).await.status(), 429);
    assert_eq!(test::call_service(&app, post("hank")).await.status(), 201);
}

#[actix_web::test]
#[serial]
async fn events_endpoint_joins_the_room() {
    setup_env();
    let hub = ReplyHub::default();
    let app = test::init_service(App::new().app_data(state(InMemRepo::new(), hub.clone(), None)).configure(config)).await;

    let req = test::TestRequest::get().uri(&format!("/api/v1/threads/{THREAD}/events")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/x-ndjson");
    assert_eq!(hub.members(THREAD), 1);

    drop(resp);
    assert_eq!(hub.members(THREAD), 0);
}
