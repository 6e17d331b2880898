mod backend;
mod feed;
mod history;
mod proxy;
mod relay;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod payload;

pub use app::start_app;
pub use payload::{AccidentSnapshot, Emergency, RelayPayload};
