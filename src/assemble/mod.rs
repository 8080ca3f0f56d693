//! Assembly of stored sections into a complete configuration file.

pub mod renderer;
pub mod selector;

pub use renderer::{render, write_config};
pub use selector::select_active;
