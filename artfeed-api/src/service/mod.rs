pub mod post_creation;
