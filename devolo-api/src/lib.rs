// DEVOLO API Library
//
// Provides the HTTP surface of the DEVOLO backend

pub mod http;

// Re-export commonly used types
pub use http::{create_router, AppState};
