pub mod acquisition_source;
pub mod camera_client;
pub mod run_observer;
