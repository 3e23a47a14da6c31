use crate::{
    server::form::{MEDIA_FIELD, ValidationErrors},
    service::post_creation::{CreatePostError, PostCreationService},
    storage::LocalMediaStorage,
};
use artfeed_common::{
    media::{
        MediaRules,
        inspect::FfprobeInspector,
        policy::{ContentPolicyError, PostContentPolicy},
        validation::MediaContentValidation,
    },
    model::{Id, nft::NftTokenMarker, post::PostMarker, user::UserMarker},
};
use artfeed_db::client::{DbClient, DbError};
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::PathRejection,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;
use tracing::error;

mod form;
mod json;
mod requester;
mod routes;

pub type ServerRouter = Router<ServerState>;

pub type MediaValidation = MediaContentValidation<FfprobeInspector>;
pub type PostCreation = PostCreationService<DbClient, LocalMediaStorage>;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct UploadSettings {
    /// Where multipart files are spooled; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub media_validation: Arc<MediaValidation>,
    pub content_policy: PostContentPolicy,
    pub post_creation: Arc<PostCreation>,
    pub uploads: UploadSettings,
}

impl ServerState {
    #[must_use]
    pub fn new(
        db_client: Arc<DbClient>,
        rules: &MediaRules,
        inspector: FfprobeInspector,
        storage: LocalMediaStorage,
        uploads: UploadSettings,
    ) -> Self {
        Self {
            post_creation: Arc::new(PostCreationService::new(Arc::clone(&db_client), storage)),
            db_client,
            media_validation: Arc::new(MediaContentValidation::new(rules, inspector)),
            content_policy: PostContentPolicy::new(rules.max_content_items),
            uploads,
        }
    }
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete service, ready to be served.
pub fn app(state: ServerState, max_request_bytes: usize) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Spooling an upload to disk failed: {0}")]
    Upload(std::io::Error),
    #[error("X-User-Id header was missing or invalid: {0}")]
    InvalidRequesterHeader(TypedHeaderRejection),
    #[error("Requesting user {0} does not exist")]
    UnknownRequester(Id<UserMarker>),
    #[error("The request failed validation: {0:?}")]
    Validation(ValidationErrors),
    #[error(transparent)]
    ContentPolicy(#[from] ContentPolicyError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    CreatePost(#[from] CreatePostError),
    #[error("Blocking task failed: {0}")]
    Task(#[from] JoinError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("NFT token with id {0} was not found.")]
    NftTokenByIdNotFound(Id<NftTokenMarker>),
}

impl From<ValidationErrors> for ServerError {
    fn from(value: ValidationErrors) -> Self {
        ServerError::Validation(value)
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::NftTokenByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequesterHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::UnknownRequester(_) => StatusCode::UNAUTHORIZED,
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(err) => err.status(),
            ServerError::InvalidRequesterHeader(_)
            | ServerError::Validation(_)
            | ServerError::ContentPolicy(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Upload(_)
            | ServerError::Database(_)
            | ServerError::CreatePost(_)
            | ServerError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn field_errors(self) -> Option<BTreeMap<String, Vec<String>>> {
        match self {
            ServerError::Validation(errors) => Some(errors.into_inner()),
            ServerError::ContentPolicy(err) => {
                Some(BTreeMap::from([(MEDIA_FIELD.to_owned(), vec![err.to_string()])]))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            errors: self.field_errors(),
        };
        (status, Json(error_response)).into_response()
    }
}
