pub mod aggregate;
pub mod store;
pub mod types;
