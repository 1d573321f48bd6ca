pub mod analysis;
pub mod common;
pub mod reports;
pub mod uploads;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
