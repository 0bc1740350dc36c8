use crate::models::{AuthorRef, NewReply, Reply, ReplyPage};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::list_replies,
        crate::routes::create_reply,
        crate::routes::delete_reply,
        crate::routes::reply_events,
    ),
    components(schemas(Reply, NewReply, ReplyPage, AuthorRef)),
    tags(
        (name = "replies", description = "Thread replies and their live channel"),
    )
)]
pub struct ApiDoc;
