pub mod context;
pub mod flow;
