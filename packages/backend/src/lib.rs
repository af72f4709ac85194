pub mod config;
pub mod logging;
pub mod request;
pub mod response;
pub mod service;
