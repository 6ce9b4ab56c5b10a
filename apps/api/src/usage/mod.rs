pub mod counters;
pub mod handlers;
pub mod plans;
pub mod web_search;
