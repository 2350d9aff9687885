pub mod auth;
pub mod chat;
pub mod download;
pub mod history;
pub mod suggest;
pub mod system;
