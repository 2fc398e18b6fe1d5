pub mod activity;
pub mod campaign;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod targets;
pub mod ws;

pub use routes::create_router;
pub use ws::{spawn_campaign_feed, WsBroadcaster, WsMessage};
