pub mod fixture;
pub mod http_feed;

pub use fixture::FixtureFeed;
pub use http_feed::HttpFeed;
