pub mod config;
pub mod error;
pub mod location;
pub mod logging;
pub mod platform;
pub mod sim;
pub mod status;
