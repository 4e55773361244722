//! Configuration management for the avatar agent
//!
//! Supports loading configuration from:
//! - YAML/TOML files (config/default, config/{env})
//! - Environment variables (AVATAR_AGENT_ prefix)
//!
//! The configuration source is read-only at startup: values are passed
//! into the factories at construction and never validated, renewed, or
//! hot-reloaded by the core.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, AvatarSettings, BackendSettings, ConfigError, CropRectangle,
    IceServerSettings, RecognitionSettings, RuntimeEnvironment, ServerConfig, Settings,
    SpeechServiceSettings, VoiceSettings,
};
