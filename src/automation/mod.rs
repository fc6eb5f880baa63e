//! Everything around the detection pipeline.
//!
//! This module provides:
//! - Configuration loading (`config`)
//! - Synthetic clicks (`input`)
//! - The scan trigger (`trigger`)
//! - The capture → detect → click loop (`runner`)
//! - Post-run temp file cleanup (`cleanup`)

pub mod cleanup;
pub mod config;
pub mod input;
pub mod runner;
pub mod trigger;

pub use cleanup::remove_transient_files;
pub use config::AcceptConfig;
pub use input::SystemClicker;
pub use runner::Runner;
pub use trigger::spawn_listener;
