pub mod category;
pub mod config;
pub mod profile;
pub mod stats;
pub mod timer;
