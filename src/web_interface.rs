pub mod default_page;
pub mod handlers;
pub mod routes;
pub mod types;
pub mod web_server;

pub use handlers::{ApiContext, ApiReply, CapturedRequest, DefaultSite};
pub use web_server::WebServer;
