pub mod camera;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod report;
pub mod state;
