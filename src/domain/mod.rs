pub mod constants;
pub mod manifest;
pub mod types;
