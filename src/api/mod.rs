pub mod bulk_email;
pub mod chats;
pub mod client;
pub mod models;
pub mod support;
pub mod users;

pub use client::ApiClient;
