pub mod cli;
pub mod config;
pub mod document;
pub mod fetch;
pub mod models;
pub mod settings;
pub mod store;
pub mod ui;
