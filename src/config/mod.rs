// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: turning the raw model into a checked `ConfigFile`.
//! - `profiles.rs`: the path/target registry.

pub mod loader;
pub mod model;
pub mod profiles;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, ServeSection};
pub use profiles::{ProfileConfig, ProfileRegistry, TargetProfile};
