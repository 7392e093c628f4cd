pub mod downloads;
pub mod handlers;
pub mod library;
pub mod lyrics;
pub mod middleware;
pub mod routes;
pub mod ws;

pub use routes::create_router;
