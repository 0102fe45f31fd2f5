pub mod config;
pub mod error;
pub mod event;
pub mod request;
pub mod route;
pub mod state;
