pub mod archive_utils;
pub mod config;
pub mod errors;
pub mod poem_import;
pub mod poem_store;
pub mod poem_types;
pub mod render;
pub mod search;
