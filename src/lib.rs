pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod images;
pub mod logging;
pub mod session;
