pub mod config;
pub mod duration;
pub mod error;
pub mod resource;
pub mod usage;

pub use config::Config;
pub use error::*;
pub use resource::*;
pub use usage::*;
