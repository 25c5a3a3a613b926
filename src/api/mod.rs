//! HTTP API handlers for cratedigger

pub mod downloads;
pub mod health;
pub mod results;
pub mod search;
pub mod watchlist;

pub use downloads::download_routes;
pub use health::health_routes;
pub use results::result_routes;
pub use search::search_routes;
pub use watchlist::watchlist_routes;
