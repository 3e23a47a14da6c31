use crate::server::{Result, ServerError, ServerRouter, json::Json, requester::RequestingUser};
use artfeed_common::{
    model::{
        Id,
        post::PartialPost,
        user::{User, UserMarker},
    },
    ranking::Alive,
};
use artfeed_db::client::DbClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_user)
        .typed_get(get_user_posts)
}

async fn fetch_alive_user(db: &DbClient, id: Id<UserMarker>) -> Result<User> {
    let user = db
        .fetch_user(id)
        .await?
        .filter(Alive::is_alive)
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct GetUserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    GetUserPath { id }: GetUserPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<User>> {
    let user = fetch_alive_user(&db, id).await?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct GetUserPostsPath {
    id: Id<UserMarker>,
}

/// The author's posts that the requester may see, ranked by popularity.
async fn get_user_posts(
    GetUserPostsPath { id }: GetUserPostsPath,
    State(db): State<Arc<DbClient>>,
    requester: Option<RequestingUser>,
) -> Result<Json<Vec<PartialPost>>> {
    let author = fetch_alive_user(&db, id).await?;
    let posts = db
        .fetch_user_posts(author.id, requester.map(RequestingUser::user_id))
        .await?;

    Ok(Json(posts))
}
