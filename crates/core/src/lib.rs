pub mod clock;
pub mod config;
pub mod models;

pub use clock::*;
pub use config::*;
pub use models::*;
