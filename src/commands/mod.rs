pub mod config;
pub mod permissions;
pub mod room;

pub use config::*;
pub use permissions::*;
pub use room::*;
