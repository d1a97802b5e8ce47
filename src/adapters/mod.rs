//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Locating the MSBuild executable on the host
//! - Spawning MSBuild and capturing its outcome

pub mod engine;
pub mod locator;
