use crate::record::{
    CategoryRecord, NftTokenRecord, PostMediaRecord, PostRecord, TagRecord, UserRecord,
};
use artfeed_common::{
    model::{
        ArtfeedSnowflake, ArtfeedSnowflakeGenerator, Id, ModelValidationError,
        category::{Category, CategoryMarker},
        media::PostMedia,
        nft::{NftToken, NftTokenMarker, Price},
        post::{PartialPost, Post, PostMarker},
        tag::{Tag, TagName},
        user::{User, UserMarker},
    },
    ranking,
    snowflake::{NodeId, SnowflakeError},
};
use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions, query_as, query_scalar};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Applying migrations failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeError),
}

/// Columns of a [`PostRecord`], for `posts.posts JOIN users.users`.
macro_rules! post_columns {
    () => {
        "
        posts.post_snowflake,
        posts.title,
        posts.content,
        posts.status,
        posts.visibility,
        posts.views_quantity,
        posts.favorites_quantity,
        posts.likes_quantity,
        posts.is_deleted,
        posts.is_reported,
        posts.is_commenting_allowed,
        posts.created_at,
        posts.updated_at,
        users.user_snowflake,
        users.handle,
        users.is_deleted AS author_is_deleted
        "
    };
}

/// SQL twin of [`ranking::Alive`] for posts joined with their author.
macro_rules! alive_post {
    () => {
        "(NOT posts.is_deleted AND NOT posts.is_reported AND NOT users.is_deleted)"
    };
}

/// Public and published, or private and owned by `$1`. A `NULL` viewer only
/// matches the first half.
macro_rules! visible_for_viewer {
    () => {
        "(
            (posts.visibility = 'public' AND posts.status = 'published')
            OR (posts.visibility = 'private' AND posts.user_snowflake = $1)
        )"
    };
}

pub(crate) type SharedGenerator = Arc<Mutex<ArtfeedSnowflakeGenerator>>;

pub(crate) fn generate_snowflake(generator: &SharedGenerator) -> Result<ArtfeedSnowflake> {
    let snowflake = generator
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .generate()?;

    Ok(snowflake)
}

pub struct DbClient {
    pub(crate) pool: PgPool,
    pub(crate) snowflake_generator: SharedGenerator,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, node: NodeId) -> Self {
        let snowflake_generator = Arc::new(Mutex::new(ArtfeedSnowflakeGenerator::new(node)));

        Self {
            pool,
            snowflake_generator,
        }
    }

    pub async fn connect(url: &str, max_connections: u32, node: NodeId) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, node = node.get(), "Connected to the database");

        Ok(Self::new(pool, node))
    }

    /// Applies everything in `migrations/` that has not run yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.handle,
                users.is_deleted
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(user_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// Returns the subset of `category_ids` that exists.
    pub async fn fetch_categories(
        &self,
        category_ids: &[Id<CategoryMarker>],
    ) -> Result<Vec<Category>> {
        let snowflakes: Vec<i64> = category_ids.iter().map(|id| id.to_db()).collect();

        let records = query_as::<_, CategoryRecord>(
            "
            SELECT
                categories.category_snowflake,
                categories.name
            FROM
                users.categories
            WHERE
                categories.category_snowflake = ANY($1)
            ",
        )
        .bind(snowflakes)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Category::from).collect())
    }

    /// A single alive post with all its relations.
    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(concat!(
            "SELECT",
            post_columns!(),
            "FROM posts.posts JOIN users.users USING (user_snowflake)
            WHERE posts.post_snowflake = $1 AND ",
            alive_post!(),
        ))
        .bind(post_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let tags = self.fetch_post_tags(post_id).await?;
        let categories = self.fetch_post_categories(post_id).await?;
        let media = self.fetch_post_media(post_id).await?;

        let post = record.into_post(tags, categories, media)?;
        Ok(Some(post))
    }

    async fn fetch_post_tags(&self, post_id: Id<PostMarker>) -> Result<Vec<Tag>> {
        let records = query_as::<_, TagRecord>(
            "
            SELECT
                tags.tag_snowflake,
                tags.name
            FROM
                posts.post_tags JOIN posts.tags USING (tag_snowflake)
            WHERE
                post_tags.post_snowflake = $1
            ORDER BY
                tags.name
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let tags = records
            .into_iter()
            .map(Tag::try_from)
            .collect::<Result<_, _>>()?;
        Ok(tags)
    }

    async fn fetch_post_categories(&self, post_id: Id<PostMarker>) -> Result<Vec<Category>> {
        let records = query_as::<_, CategoryRecord>(
            "
            SELECT
                categories.category_snowflake,
                categories.name
            FROM
                posts.post_categories JOIN users.categories USING (category_snowflake)
            WHERE
                post_categories.post_snowflake = $1
            ORDER BY
                categories.name
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Category::from).collect())
    }

    async fn fetch_post_media(&self, post_id: Id<PostMarker>) -> Result<Vec<PostMedia>> {
        let records = query_as::<_, PostMediaRecord>(
            "
            SELECT
                post_media.media_snowflake,
                post_media.post_snowflake,
                post_media.kind,
                post_media.original,
                post_media.formatted_path,
                post_media.preview_path,
                post_media.created_at,
                post_media.updated_at
            FROM
                posts.post_media
            WHERE
                post_media.post_snowflake = $1
            ORDER BY
                post_media.media_snowflake
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let media = records
            .into_iter()
            .map(PostMedia::try_from)
            .collect::<Result<_, _>>()?;
        Ok(media)
    }

    /// The ranked feed: public posts, plus the viewer's own private ones.
    pub async fn fetch_visible_posts(
        &self,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Vec<PartialPost>> {
        let records = query_as::<_, PostRecord>(concat!(
            "SELECT",
            post_columns!(),
            "FROM posts.posts JOIN users.users USING (user_snowflake) WHERE ",
            alive_post!(),
            " AND ",
            visible_for_viewer!(),
        ))
        .bind(viewer.map(Id::to_db))
        .fetch_all(&self.pool)
        .await?;

        let candidates = records
            .into_iter()
            .map(PartialPost::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(candidates = candidates.len(), "Ranking feed");

        Ok(rank(candidates, viewer))
    }

    pub async fn fetch_user_posts(
        &self,
        author: Id<UserMarker>,
        viewer: Option<Id<UserMarker>>,
    ) -> Result<Vec<PartialPost>> {
        let records = query_as::<_, PostRecord>(concat!(
            "SELECT",
            post_columns!(),
            "FROM posts.posts JOIN users.users USING (user_snowflake)
            WHERE posts.user_snowflake = $2 AND ",
            alive_post!(),
            " AND ",
            visible_for_viewer!(),
        ))
        .bind(viewer.map(Id::to_db))
        .bind(author.to_db())
        .fetch_all(&self.pool)
        .await?;

        let candidates = records
            .into_iter()
            .map(PartialPost::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rank(candidates, viewer))
    }

    pub async fn fetch_nft_token(&self, token_id: Id<NftTokenMarker>) -> Result<Option<NftToken>> {
        let record = query_as::<_, NftTokenRecord>(
            "
            SELECT
                tokens.token_snowflake,
                tokens.title,
                tokens.description,
                tokens.cover_image,
                tokens.nft_file,
                tokens.is_listed,
                tokens.is_minted,
                tokens.is_hidden,
                creators.user_snowflake AS creator_snowflake,
                creators.handle AS creator_handle,
                creators.is_deleted AS creator_is_deleted,
                owners.user_snowflake AS owner_snowflake,
                owners.handle AS owner_handle,
                owners.is_deleted AS owner_is_deleted
            FROM
                nft.tokens
                JOIN users.users AS creators
                    ON creators.user_snowflake = tokens.creator_snowflake
                JOIN users.users AS owners
                    ON owners.user_snowflake = tokens.owner_snowflake
            WHERE
                tokens.token_snowflake = $1
            ",
        )
        .bind(token_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let tag_names: Vec<String> = query_scalar(
            "
            SELECT
                tags.name
            FROM
                nft.token_tags JOIN posts.tags USING (tag_snowflake)
            WHERE
                token_tags.token_snowflake = $1
            ORDER BY
                tags.name
            ",
        )
        .bind(token_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let tags = tag_names
            .iter()
            .map(|name| TagName::new(name))
            .collect::<Result<_, _>>()
            .map_err(ModelValidationError::from)?;

        let token = record.into_token(tags)?;
        Ok(Some(token))
    }

    /// Price of the most recent price record for the token, listed or not.
    pub async fn fetch_latest_price(&self, token_id: Id<NftTokenMarker>) -> Result<Option<Price>> {
        let price: Option<i64> = query_scalar(
            "
            SELECT
                price_history.price
            FROM
                nft.price_history
            WHERE
                price_history.token_snowflake = $1
            ORDER BY
                price_history.created DESC,
                price_history.price_snowflake DESC
            LIMIT 1
            ",
        )
        .bind(token_id.to_db())
        .fetch_optional(&self.pool)
        .await?;

        Ok(price.map(Price))
    }
}

fn rank(candidates: Vec<PartialPost>, viewer: Option<Id<UserMarker>>) -> Vec<PartialPost> {
    if viewer.is_some() {
        ranking::visible_for(candidates, viewer)
    } else {
        ranking::public(candidates)
    }
}
