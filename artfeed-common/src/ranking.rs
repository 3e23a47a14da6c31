//! Popularity ordering and the visibility rules that decide which posts a
//! viewer may see.

use crate::model::{
    Id,
    post::{EngagementCounters, PostStatus, Visibility},
    user::UserMarker,
};
use std::cmp::Ordering;

pub const LIKES_TO_VIEWS_WEIGHT: f64 = 0.5;
pub const LIKES_WEIGHT: f64 = 0.5;

/// Soft-deleted or reported entities, and anything owned by a soft-deleted
/// user, are not alive and never show up in any listing.
pub trait Alive {
    fn is_alive(&self) -> bool;
}

pub trait Rankable: Alive {
    fn author_id(&self) -> Id<UserMarker>;
    fn status(&self) -> PostStatus;
    fn visibility(&self) -> Visibility;
    fn counters(&self) -> EngagementCounters;

    fn is_public(&self) -> bool {
        self.is_alive()
            && self.visibility() == Visibility::Public
            && self.status() == PostStatus::Published
    }

    fn is_private_for(&self, user: Id<UserMarker>) -> bool {
        self.is_alive() && self.visibility() == Visibility::Private && self.author_id() == user
    }

    /// Anonymous viewers only see public posts.
    fn is_visible_for(&self, viewer: Option<Id<UserMarker>>) -> bool {
        self.is_public() || viewer.is_some_and(|user| self.is_private_for(user))
    }
}

/// `0.5 * likes / max(views, 1) + 0.5 * likes`.
#[must_use]
pub fn popularity_score(counters: EngagementCounters) -> f64 {
    let likes = f64::from(counters.likes);
    let safe_views = f64::from(counters.views.max(1));

    LIKES_TO_VIEWS_WEIGHT * (likes / safe_views) + LIKES_WEIGHT * likes
}

fn compare_popularity<P: Rankable>(a: &P, b: &P) -> Ordering {
    let (a, b) = (a.counters(), b.counters());

    popularity_score(b)
        .total_cmp(&popularity_score(a))
        .then_with(|| b.views.cmp(&a.views))
}

/// Most popular first, ties broken by view count.
pub fn rank_by_popularity<P: Rankable>(posts: &mut [P]) {
    posts.sort_by(compare_popularity);
}

/// Alive, public and published posts, ranked.
#[must_use]
pub fn public<P: Rankable>(candidates: impl IntoIterator<Item = P>) -> Vec<P> {
    let mut posts: Vec<P> = candidates
        .into_iter()
        .filter(Rankable::is_public)
        .collect();
    rank_by_popularity(&mut posts);
    posts
}

/// Every public post plus the viewer's own private posts, ranked.
#[must_use]
pub fn visible_for<P: Rankable>(
    candidates: impl IntoIterator<Item = P>,
    viewer: Option<Id<UserMarker>>,
) -> Vec<P> {
    let mut posts: Vec<P> = candidates
        .into_iter()
        .filter(|post| post.is_visible_for(viewer))
        .collect();
    rank_by_popularity(&mut posts);
    posts
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            post::{EngagementCounters, PartialPost, PostStatus, PostTitle, Visibility},
        },
        ranking::{popularity_score, public, rank_by_popularity, visible_for},
    };
    use time::OffsetDateTime;

    fn post(id: u64, author: u64, views: u32, likes: u32) -> PartialPost {
        PartialPost {
            id: Id::from(id),
            author_id: Id::from(author),
            title: PostTitle::default(),
            content: String::new(),
            status: PostStatus::Published,
            visibility: Visibility::Public,
            counters: EngagementCounters {
                views,
                favorites: 0,
                likes,
            },
            is_commenting_allowed: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            is_deleted: false,
            is_reported: false,
            author_is_deleted: false,
        }
    }

    fn ids(posts: &[PartialPost]) -> Vec<u64> {
        posts.iter().map(|post| post.id.into()).collect()
    }

    #[test]
    fn unviewed_posts_count_as_one_view() {
        let unviewed = EngagementCounters {
            views: 0,
            favorites: 0,
            likes: 5,
        };
        let viewed = EngagementCounters {
            views: 10,
            ..unviewed
        };

        assert!((popularity_score(unviewed) - 5.0).abs() < f64::EPSILON);
        assert!((popularity_score(viewed) - 2.75).abs() < f64::EPSILON);
    }

    #[test]
    fn ranks_by_score_then_views() {
        let mut posts = vec![
            post(1, 1, 10, 5),
            post(2, 1, 0, 5),
            post(3, 1, 0, 0),
            post(4, 1, 7, 0),
        ];

        rank_by_popularity(&mut posts);

        assert_eq!(ids(&posts), [2, 1, 4, 3]);
    }

    #[test]
    fn public_requires_published_and_alive() {
        let mut pending = post(1, 1, 0, 9);
        pending.status = PostStatus::Pending;
        let mut private = post(2, 1, 0, 9);
        private.visibility = Visibility::Private;
        let mut deleted = post(3, 1, 0, 9);
        deleted.is_deleted = true;
        let mut reported = post(4, 1, 0, 9);
        reported.is_reported = true;
        let mut orphaned = post(5, 1, 0, 9);
        orphaned.author_is_deleted = true;
        let visible = post(6, 1, 0, 1);

        let posts = public([pending, private, deleted, reported, orphaned, visible]);

        assert_eq!(ids(&posts), [6]);
    }

    #[test]
    fn private_posts_only_visible_to_author() {
        let mut own = post(1, 1, 0, 1);
        own.visibility = Visibility::Private;
        let mut foreign = post(2, 2, 0, 1);
        foreign.visibility = Visibility::Private;
        let shared = post(3, 2, 0, 3);

        let for_author = visible_for([own.clone(), foreign.clone(), shared.clone()], Some(Id::from(1)));
        assert_eq!(ids(&for_author), [3, 1]);

        let anonymous = visible_for([own, foreign, shared], None);
        assert_eq!(ids(&anonymous), [3]);
    }

    #[test]
    fn own_private_post_hidden_once_reported() {
        let mut own = post(1, 1, 0, 1);
        own.visibility = Visibility::Private;
        own.is_reported = true;

        assert!(visible_for([own], Some(Id::from(1))).is_empty());
    }
}
