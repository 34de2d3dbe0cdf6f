pub mod chat;
pub mod blog;
