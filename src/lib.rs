pub mod app;
pub mod board;
pub mod build_info;
pub mod commands;
pub mod config;
pub mod debounce;
pub mod error;
pub mod model;
pub mod output;
pub mod remote;
pub mod session;
pub mod store;
pub mod sync;
