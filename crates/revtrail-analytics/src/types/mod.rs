pub mod analytics;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use analytics::*;
pub use requests::*;
pub use responses::*;
