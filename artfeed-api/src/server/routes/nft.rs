use crate::server::{Result, ServerError, ServerRouter, json::Json, requester::RequestingUser};
use artfeed_common::model::{
    Id,
    nft::{NftTokenDetail, NftTokenMarker},
};
use artfeed_db::client::DbClient;
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_nft_token)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/nft/{id}", rejection(ServerError))]
struct GetNftTokenPath {
    id: Id<NftTokenMarker>,
}

async fn get_nft_token(
    GetNftTokenPath { id }: GetNftTokenPath,
    State(db): State<Arc<DbClient>>,
    requester: Option<RequestingUser>,
) -> Result<Json<NftTokenDetail>> {
    let viewer = requester.map(RequestingUser::user_id);

    let token = db
        .fetch_nft_token(id)
        .await?
        .filter(|token| token.is_visible_for(viewer))
        .ok_or(ServerError::NftTokenByIdNotFound(id))?;

    let last_price = if token.is_listed {
        db.fetch_latest_price(id).await?
    } else {
        debug!(token = %id, "Token is not listed, skipping price lookup");
        None
    };

    Ok(Json(token.into_detail(last_price, viewer)))
}
