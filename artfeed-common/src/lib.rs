pub mod media;
pub mod model;
pub mod ranking;
pub mod snowflake;
