use crate::client::{DbClient, Result, SharedGenerator, generate_snowflake};
use artfeed_common::model::{
    Id,
    media::{CreatePostMedia, PostMediaMarker},
    post::{CreatePost, PostMarker, PostStatus},
    user::UserMarker,
};
use sqlx::{Postgres, Transaction, query, query_scalar};
use std::future::Future;
use tracing::debug;

/// Opens units of work that write a post and its media atomically.
pub trait PostStore: Send + Sync {
    type Transaction: PostTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// Dropping a transaction without committing discards every write made
/// through it.
pub trait PostTransaction: Send {
    /// Inserts a `pending` post and links its tags and categories, creating
    /// tags that do not exist yet.
    fn insert_post(
        &mut self,
        post: &CreatePost,
        author: Id<UserMarker>,
    ) -> impl Future<Output = Result<Id<PostMarker>>> + Send;

    fn insert_media(
        &mut self,
        post: Id<PostMarker>,
        media: &CreatePostMedia,
    ) -> impl Future<Output = Result<Id<PostMediaMarker>>> + Send;

    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}

pub struct DbTransaction {
    transaction: Transaction<'static, Postgres>,
    snowflake_generator: SharedGenerator,
}

impl PostStore for DbClient {
    type Transaction = DbTransaction;

    async fn begin(&self) -> Result<DbTransaction> {
        let transaction = self.pool.begin().await?;

        Ok(DbTransaction {
            transaction,
            snowflake_generator: self.snowflake_generator.clone(),
        })
    }
}

impl PostTransaction for DbTransaction {
    async fn insert_post(
        &mut self,
        post: &CreatePost,
        author: Id<UserMarker>,
    ) -> Result<Id<PostMarker>> {
        let post_snowflake = generate_snowflake(&self.snowflake_generator)?;

        let returned_snowflake: i64 = query_scalar(
            "
            INSERT INTO posts.posts (
                post_snowflake,
                user_snowflake,
                title,
                content,
                status,
                visibility,
                is_commenting_allowed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING posts.post_snowflake
            ",
        )
        .bind(post_snowflake.get().cast_signed())
        .bind(author.to_db())
        .bind(post.title.get())
        .bind(&post.content)
        .bind(PostStatus::Pending.as_str())
        .bind(post.visibility.as_str())
        .bind(post.is_commenting_allowed)
        .fetch_one(&mut *self.transaction)
        .await?;

        for tag in &post.tags {
            let tag_snowflake = generate_snowflake(&self.snowflake_generator)?;

            // The no-op update makes RETURNING yield the existing row too.
            let tag_snowflake: i64 = query_scalar(
                "
                INSERT INTO posts.tags (tag_snowflake, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING tags.tag_snowflake
                ",
            )
            .bind(tag_snowflake.get().cast_signed())
            .bind(tag.get())
            .fetch_one(&mut *self.transaction)
            .await?;

            query(
                "
                INSERT INTO posts.post_tags (post_snowflake, tag_snowflake)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(returned_snowflake)
            .bind(tag_snowflake)
            .execute(&mut *self.transaction)
            .await?;
        }

        for category in &post.categories {
            query(
                "
                INSERT INTO posts.post_categories (post_snowflake, category_snowflake)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(returned_snowflake)
            .bind(category.to_db())
            .execute(&mut *self.transaction)
            .await?;
        }

        debug!(
            post = returned_snowflake,
            tags = post.tags.len(),
            categories = post.categories.len(),
            "Inserted post"
        );

        Ok(Id::from_db(returned_snowflake))
    }

    async fn insert_media(
        &mut self,
        post: Id<PostMarker>,
        media: &CreatePostMedia,
    ) -> Result<Id<PostMediaMarker>> {
        let media_snowflake = generate_snowflake(&self.snowflake_generator)?;

        let returned_snowflake: i64 = query_scalar(
            "
            INSERT INTO posts.post_media (media_snowflake, post_snowflake, kind, original)
            VALUES ($1, $2, $3, $4)
            RETURNING post_media.media_snowflake
            ",
        )
        .bind(media_snowflake.get().cast_signed())
        .bind(post.to_db())
        .bind(media.kind.as_str())
        .bind(media.original.get())
        .fetch_one(&mut *self.transaction)
        .await?;

        Ok(Id::from_db(returned_snowflake))
    }

    async fn commit(self) -> Result<()> {
        self.transaction.commit().await?;
        Ok(())
    }
}

/// These run against a throwaway database created from `DATABASE_URL` with
/// the migrations applied: `cargo test -p artfeed-db -- --ignored`.
#[cfg(test)]
mod tests {
    use crate::{
        client::DbClient,
        store::{PostStore, PostTransaction},
    };
    use artfeed_common::{
        model::{
            Id,
            category::CategoryMarker,
            media::{ContentKind, CreatePostMedia, MediaPath},
            nft::{NftTokenMarker, Price},
            post::{CreatePost, PartialPost, PostMarker, PostStatus, PostTitle, Visibility},
            tag::TagName,
            user::UserMarker,
        },
        snowflake::NodeId,
    };
    use sqlx::{PgPool, query};
    use time::macros::datetime;

    const AUTHOR: u64 = 100;
    const STRANGER: u64 = 200;
    const CATEGORY: u64 = 300;

    async fn seed(pool: &PgPool) -> DbClient {
        for (id, handle) in [(AUTHOR, "author"), (STRANGER, "stranger")] {
            query("INSERT INTO users.users (user_snowflake, handle) VALUES ($1, $2)")
                .bind(Id::<UserMarker>::from(id).to_db())
                .bind(handle)
                .execute(pool)
                .await
                .unwrap();
        }
        query("INSERT INTO users.categories (category_snowflake, name) VALUES ($1, 'landscapes')")
            .bind(Id::<CategoryMarker>::from(CATEGORY).to_db())
            .execute(pool)
            .await
            .unwrap();

        DbClient::new(pool.clone(), NodeId::new(1).unwrap())
    }

    fn new_post(title: &str, visibility: Visibility) -> CreatePost {
        CreatePost {
            title: PostTitle::new(title.to_owned()).unwrap(),
            visibility,
            ..CreatePost::default()
        }
    }

    async fn create(
        client: &DbClient,
        post: &CreatePost,
        media: &[CreatePostMedia],
    ) -> Id<PostMarker> {
        let mut transaction = client.begin().await.unwrap();
        let post_id = transaction
            .insert_post(post, Id::from(AUTHOR))
            .await
            .unwrap();
        for item in media {
            transaction.insert_media(post_id, item).await.unwrap();
        }
        transaction.commit().await.unwrap();

        post_id
    }

    async fn publish(pool: &PgPool, post_id: Id<PostMarker>) {
        query("UPDATE posts.posts SET status = 'published' WHERE post_snowflake = $1")
            .bind(post_id.to_db())
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn committed_post_reads_back_with_links(pool: PgPool) {
        let client = seed(&pool).await;
        let post = CreatePost {
            content: "golden hour".to_owned(),
            tags: vec![
                TagName::new("sunset").unwrap(),
                TagName::new("# sunset").unwrap(),
                TagName::new("coast").unwrap(),
            ],
            categories: vec![Id::from(CATEGORY)],
            ..new_post("Evening", Visibility::Public)
        };
        let media = CreatePostMedia {
            kind: ContentKind::Image,
            original: MediaPath::new("posts/image/a.png".to_owned()),
        };

        let post_id = create(&client, &post, &[media]).await;
        let stored = client.fetch_post(post_id).await.unwrap().unwrap();

        assert_eq!(stored.author.id, Id::from(AUTHOR));
        assert_eq!(stored.status, PostStatus::Pending);
        assert_eq!(stored.visibility, Visibility::Public);
        assert_eq!(stored.content, "golden hour");
        assert_eq!(
            stored.tags.iter().map(|tag| tag.name.get()).collect::<Vec<_>>(),
            ["coast", "sunset"]
        );
        assert_eq!(stored.categories.len(), 1);
        assert_eq!(stored.categories[0].name, "landscapes");
        assert_eq!(stored.media.len(), 1);
        assert_eq!(stored.media[0].post, post_id);
        assert_eq!(stored.media[0].original.get(), "posts/image/a.png");
        assert_eq!(stored.media[0].formatted, None);

        // A second post reuses the existing tag row.
        let again = CreatePost {
            tags: vec![TagName::new("#sunset").unwrap()],
            ..new_post("Again", Visibility::Public)
        };
        create(&client, &again, &[]).await;
        let tag_rows: i64 = sqlx::query_scalar("SELECT count(*) FROM posts.tags")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tag_rows, 2);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn dropped_transaction_writes_nothing(pool: PgPool) {
        let client = seed(&pool).await;

        let post_id = {
            let mut transaction = client.begin().await.unwrap();
            let post_id = transaction
                .insert_post(&new_post("Draft", Visibility::Public), Id::from(AUTHOR))
                .await
                .unwrap();
            transaction
                .insert_media(
                    post_id,
                    &CreatePostMedia {
                        kind: ContentKind::Video,
                        original: MediaPath::new("posts/video/b.mp4".to_owned()),
                    },
                )
                .await
                .unwrap();
            post_id
        };

        assert_eq!(client.fetch_post(post_id).await.unwrap(), None);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn feeds_respect_visibility(pool: PgPool) {
        let client = seed(&pool).await;
        let public = create(&client, &new_post("Public", Visibility::Public), &[]).await;
        publish(&pool, public).await;
        let private = create(&client, &new_post("Private", Visibility::Private), &[]).await;
        create(&client, &new_post("Pending", Visibility::Public), &[]).await;

        let ids = |posts: Vec<PartialPost>| {
            let mut ids: Vec<Id<PostMarker>> = posts.into_iter().map(|post| post.id).collect();
            ids.sort();
            ids
        };
        let mut own = vec![public, private];
        own.sort();

        assert_eq!(ids(client.fetch_visible_posts(None).await.unwrap()), [public]);
        assert_eq!(
            ids(client.fetch_visible_posts(Some(Id::from(STRANGER))).await.unwrap()),
            [public]
        );
        assert_eq!(
            ids(client.fetch_visible_posts(Some(Id::from(AUTHOR))).await.unwrap()),
            own
        );
        assert_eq!(
            ids(client.fetch_user_posts(Id::from(AUTHOR), None).await.unwrap()),
            [public]
        );
        assert!(
            client
                .fetch_user_posts(Id::from(STRANGER), Some(Id::from(STRANGER)))
                .await
                .unwrap()
                .is_empty()
        );

        query("UPDATE posts.posts SET is_reported = TRUE WHERE post_snowflake = $1")
            .bind(public.to_db())
            .execute(&pool)
            .await
            .unwrap();
        assert!(client.fetch_visible_posts(None).await.unwrap().is_empty());
        assert_eq!(client.fetch_post(public).await.unwrap(), None);
    }

    #[sqlx::test]
    #[ignore = "needs a postgres server in DATABASE_URL"]
    async fn token_reads_back_with_latest_price(pool: PgPool) {
        let client = seed(&pool).await;
        let token = Id::<NftTokenMarker>::from(400);

        query(
            "
            INSERT INTO nft.tokens
                (token_snowflake, title, nft_file, creator_snowflake, owner_snowflake, is_listed)
            VALUES ($1, 'Dunes', 'nft/dunes.png', $2, $3, TRUE)
            ",
        )
        .bind(token.to_db())
        .bind(Id::<UserMarker>::from(AUTHOR).to_db())
        .bind(Id::<UserMarker>::from(STRANGER).to_db())
        .execute(&pool)
        .await
        .unwrap();
        query("INSERT INTO posts.tags (tag_snowflake, name) VALUES (500, 'desert')")
            .execute(&pool)
            .await
            .unwrap();
        query("INSERT INTO nft.token_tags (token_snowflake, tag_snowflake) VALUES ($1, 500)")
            .bind(token.to_db())
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(client.fetch_latest_price(token).await.unwrap(), None);

        for (price_snowflake, price, created) in [
            (601_i64, 1_000_i64, datetime!(2024-03-01 12:00)),
            (602, 2_500, datetime!(2024-05-01 12:00)),
            (603, 1_800, datetime!(2024-04-01 12:00)),
        ] {
            query(
                "
                INSERT INTO nft.price_history (price_snowflake, token_snowflake, price, created)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(price_snowflake)
            .bind(token.to_db())
            .bind(price)
            .bind(created)
            .execute(&pool)
            .await
            .unwrap();
        }

        let stored = client.fetch_nft_token(token).await.unwrap().unwrap();
        assert_eq!(stored.title, "Dunes");
        assert_eq!(stored.creator.id, Id::from(AUTHOR));
        assert_eq!(stored.owner.id, Id::from(STRANGER));
        assert_eq!(stored.tags, [TagName::new("desert").unwrap()]);
        assert_eq!(stored.cover_image, None);
        assert_eq!(client.fetch_latest_price(token).await.unwrap(), Some(Price(2_500)));

        assert_eq!(client.fetch_nft_token(Id::from(401)).await.unwrap(), None);
    }
}
