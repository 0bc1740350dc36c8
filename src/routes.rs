use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::hub::ndjson_stream;
use crate::models::*;
use crate::rate_limit::ReplyRateLimiter;
use crate::service::ThreadService;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = crate::config::MAX_PAGE_SIZE;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/threads/{thread_id}/replies")
                    .route(web::get().to(list_replies))
                    .route(web::post().to(create_reply)),
            )
            .service(web::resource("/threads/{thread_id}/replies/{reply_id}").route(web::delete().to(delete_reply)))
            .service(web::resource("/threads/{thread_id}/events").route(web::get().to(reply_events))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub service: ThreadService,
    pub rate_limiter: Option<ReplyRateLimiter>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Opaque cursor from a previous page's `next_cursor`.
    pub cursor: Option<String>,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/v1/threads/{thread_id}/replies",
    params(("thread_id" = String, Path, description = "Thread id"), PageParams),
    responses(
        (status = 200, description = "Replies, newest first", body = ReplyPage),
        (status = 400, description = "Malformed cursor")
    ),
    tag = "replies"
)]
pub async fn list_replies(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    let PageParams { cursor, limit } = query.into_inner();
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let cursor = cursor.filter(|c| !c.is_empty()).map(Cursor::new);
    let page = data.service.page(&thread_id, cursor.as_ref(), limit).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    post,
    path = "/api/v1/threads/{thread_id}/replies",
    params(("thread_id" = String, Path, description = "Thread id")),
    request_body = NewReply,
    responses(
        (status = 201, description = "Reply created", body = Reply),
        (status = 400, description = "Empty content"),
        (status = 401, description = "Unauthorized"),
        (status = 429, description = "Too many replies")
    ),
    tag = "replies"
)]
pub async fn create_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<NewReply>,
) -> Result<HttpResponse, ApiError> {
    let thread_id = path.into_inner();
    let NewReply { content } = payload.into_inner();
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest);
    }
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow(&auth.0.sub) {
            return Err(ApiError::TooManyRequests);
        }
    }
    let reply = data.service.post(&thread_id, auth.0.author(), content).await?;
    Ok(HttpResponse::Created().json(reply))
}

#[utoipa::path(
    delete,
    path = "/api/v1/threads/{thread_id}/replies/{reply_id}",
    params(
        ("thread_id" = String, Path, description = "Thread id"),
        ("reply_id" = String, Path, description = "Reply id")
    ),
    responses(
        (status = 204, description = "Reply deleted"),
        (status = 403, description = "Not the author or a moderator"),
        (status = 404, description = "Reply not found")
    ),
    tag = "replies"
)]
pub async fn delete_reply(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (thread_id, reply_id) = path.into_inner();
    let reply = data.service.get(&thread_id, &reply_id).await?;
    if reply.author.id != auth.0.sub && !auth.0.can_moderate() {
        return Err(ApiError::Forbidden);
    }
    data.service.remove(&thread_id, &reply_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/threads/{thread_id}/events",
    params(("thread_id" = String, Path, description = "Thread id")),
    responses(
        (status = 200, description = "Newline-delimited JSON stream of reply-created / reply-deleted events", content_type = "application/x-ndjson", body = String)
    ),
    tag = "replies"
)]
pub async fn reply_events(data: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let thread_id = path.into_inner();
    let rx = data.service.hub().join(&thread_id);
    log::debug!("room member joined thread {thread_id}");
    HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(ndjson_stream(rx))
}
