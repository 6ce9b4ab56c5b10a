pub mod export;
pub mod handlers;
pub mod operations;
pub mod tracking;
pub mod transforms;
pub mod validation;
