pub mod chat;
pub mod learning;
pub mod plus;
pub mod spreadsheet;
pub mod user;
