pub mod checksum;
pub mod manifest;
pub mod snapshot;
