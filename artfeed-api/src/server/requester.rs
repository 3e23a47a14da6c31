use crate::server::ServerError;
use artfeed_common::{
    model::{Id, user::UserMarker},
    ranking::Alive,
};
use artfeed_db::client::DbClient;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Header, HeaderName, HeaderValue};
use std::sync::Arc;

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// `X-User-Id`, set by the authenticating proxy in front of this service.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct XUserId(pub Id<UserMarker>);

impl Header for XUserId {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        if values.next().is_some() {
            return Err(headers::Error::invalid());
        }

        let id: u64 = value
            .to_str()
            .map_err(|_| headers::Error::invalid())?
            .trim()
            .parse()
            .map_err(|_| headers::Error::invalid())?;

        Ok(Self(Id::from(id)))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        values.extend(std::iter::once(HeaderValue::from(u64::from(self.0))));
    }
}

/// An existing, not deleted user named by the `X-User-Id` header. Use
/// `Option<RequestingUser>` on endpoints that anonymous clients may call.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct RequestingUser {
    id: Id<UserMarker>,
}

impl RequestingUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }

    async fn resolve(db: &DbClient, id: Id<UserMarker>) -> Result<Self, ServerError> {
        let user = db
            .fetch_user(id)
            .await?
            .filter(Alive::is_alive)
            .ok_or(ServerError::UnknownRequester(id))?;

        Ok(Self { id: user.id })
    }
}

impl<S> FromRequestParts<S> for RequestingUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(XUserId(id)) =
            <TypedHeader<XUserId> as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidRequesterHeader)?;

        Self::resolve(&Arc::<DbClient>::from_ref(state), id).await
    }
}

impl<S> OptionalFromRequestParts<S> for RequestingUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let header =
            <TypedHeader<XUserId> as OptionalFromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidRequesterHeader)?;

        match header {
            Some(TypedHeader(XUserId(id))) => {
                Self::resolve(&Arc::<DbClient>::from_ref(state), id)
                    .await
                    .map(Some)
            }
            None => Ok(None),
        }
    }
}
