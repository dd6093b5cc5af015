pub mod cli;
pub mod config;
pub mod error;
pub mod geocode;
pub mod logging;
pub mod markers;
pub mod pin_editor;
pub mod review;
pub mod route;
pub mod scanner;
pub mod session;
pub mod spreadsheet;
pub mod trees;
