pub mod admin_handlers;
pub mod live;

pub use admin_handlers::*;
pub use live::{live_console, LiveState};
