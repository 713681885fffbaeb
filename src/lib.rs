pub mod config;
pub mod executor;
pub mod logging;
pub mod model;
pub mod promote;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use logging::*;
pub use model::*;
pub use traits::*;
