pub mod dto;
mod error;
pub mod handlers;
mod server;
mod state;

#[cfg(test)]
mod tests;

pub use error::{ApiError, ApiResult};
pub use server::{router, start_server};
pub use state::AppState;
