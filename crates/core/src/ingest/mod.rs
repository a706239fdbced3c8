pub mod boe;
pub mod error;
pub mod fetch;
pub mod live;
pub mod ons;
pub mod types;
