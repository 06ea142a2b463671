pub mod config;
pub mod providers;
pub mod selector;
pub mod store;
pub mod sync;
