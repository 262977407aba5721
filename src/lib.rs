pub mod api;
pub mod app;
pub mod cli;
pub mod error;
pub mod import;
pub mod notify;
pub mod recipients;
pub mod selection;
pub mod session;
pub mod store;
pub mod template;
pub mod ui;
pub mod utils;
pub mod validation;
