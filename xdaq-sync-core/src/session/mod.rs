pub mod controller;
pub mod issues;
pub mod recorder;
pub mod recording;
pub mod shutdown;
