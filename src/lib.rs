pub mod backend;
pub mod card_filter;
pub mod cli;
pub mod context;
pub mod error;
pub mod models;
pub mod opt;
pub mod store;
