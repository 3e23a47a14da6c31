use crate::server::ServerRouter;

mod nft;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(users::routes())
        .merge(nft::routes())
}
