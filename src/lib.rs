pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod forecast;
pub mod geocode;
pub mod kpi;
pub mod loader;
pub mod pages;
pub mod security;
pub mod table;
pub mod time;
pub mod view;

pub use error::{DashboardError, Result};
pub use table::EventTable;
