//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Speech service credentials
    #[serde(default)]
    pub speech: SpeechServiceSettings,

    /// Synthesis voice
    #[serde(default)]
    pub voice: VoiceSettings,

    /// Avatar rendering configuration
    #[serde(default)]
    pub avatar: AvatarSettings,

    /// ICE server descriptor for the real-time transport
    #[serde(default)]
    pub ice: IceServerSettings,

    /// Chat backend endpoint
    #[serde(default)]
    pub backend: BackendSettings,

    /// Speech recognition provider
    #[serde(default)]
    pub recognition: RecognitionSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Speech service subscription
///
/// Passed through to the synthesizer factory as supplied; never
/// validated or rotated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechServiceSettings {
    /// Service region, e.g. "westus2"
    #[serde(default)]
    pub region: String,

    /// Subscription key
    #[serde(default)]
    pub subscription_key: String,
}

impl Default for SpeechServiceSettings {
    fn default() -> Self {
        Self {
            region: std::env::var("SPEECH_REGION").unwrap_or_default(),
            subscription_key: std::env::var("SPEECH_SUB_KEY").unwrap_or_default(),
        }
    }
}

/// Synthesis voice selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    #[serde(default = "default_voice_name")]
    pub name: String,
}

fn default_voice_name() -> String {
    std::env::var("VOICE_NAME").unwrap_or_else(|_| "en-US-JennyNeural".to_string())
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            name: default_voice_name(),
        }
    }
}

/// Video crop rectangle applied to the avatar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRectangle {
    pub top_left_x: u32,
    pub top_left_y: u32,
    pub bottom_right_x: u32,
    pub bottom_right_y: u32,
}

impl Default for CropRectangle {
    fn default() -> Self {
        Self {
            top_left_x: 600,
            top_left_y: 50,
            bottom_right_x: 1320,
            bottom_right_y: 1080,
        }
    }
}

/// Avatar character, style, and rendering options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarSettings {
    #[serde(default = "default_avatar_character")]
    pub character: String,

    #[serde(default = "default_avatar_style")]
    pub style: String,

    /// RGBA hex color behind the rendered avatar
    #[serde(default = "default_background_color")]
    pub background_color: String,

    #[serde(default)]
    pub crop: CropRectangle,
}

fn default_avatar_character() -> String {
    std::env::var("AVATAR_CHARACTER").unwrap_or_else(|_| "lisa".to_string())
}

fn default_avatar_style() -> String {
    std::env::var("AVATAR_STYLE").unwrap_or_else(|_| "casual-sitting".to_string())
}

fn default_background_color() -> String {
    std::env::var("AVATAR_BACKGROUND_COLOR").unwrap_or_else(|_| "#FFFFFFFF".to_string())
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            character: default_avatar_character(),
            style: default_avatar_style(),
            background_color: default_background_color(),
            crop: CropRectangle::default(),
        }
    }
}

/// Exactly one ICE server descriptor, passed to the transport as supplied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerSettings {
    pub url: String,
    pub username: String,
    pub credential: String,
}

impl Default for IceServerSettings {
    fn default() -> Self {
        Self {
            url: std::env::var("ICE_URL").unwrap_or_default(),
            username: std::env::var("ICE_USERNAME").unwrap_or_default(),
            credential: std::env::var("ICE_CREDENTIAL").unwrap_or_default(),
        }
    }
}

/// Chat backend endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL; the client appends /getAssistantResponse/chats
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_backend_base_url() -> String {
    std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn default_backend_timeout_ms() -> u64 {
    30_000
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            timeout_ms: default_backend_timeout_ms(),
        }
    }
}

/// Speech recognition provider
///
/// Availability is keyed on `url` being configured; language is fixed at
/// creation and interim results are never consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionSettings {
    /// Recognition service URL; None means the platform offers no
    /// recognition capability
    #[serde(default = "default_recognition_url")]
    pub url: Option<String>,

    #[serde(default = "default_recognition_language")]
    pub language: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_recognition_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_recognition_url() -> Option<String> {
    std::env::var("RECOGNITION_URL").ok()
}

fn default_recognition_language() -> String {
    "en-US".to_string()
}

fn default_recognition_timeout_ms() -> u64 {
    30_000
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            url: default_recognition_url(),
            language: default_recognition_language(),
            timeout_ms: default_recognition_timeout_ms(),
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (AVATAR_AGENT_ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("AVATAR_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.recognition.language, "en-US");
        assert_eq!(settings.avatar.background_color, "#FFFFFFFF");
    }

    #[test]
    fn test_default_crop_rectangle() {
        let crop = CropRectangle::default();
        assert_eq!(crop.top_left_x, 600);
        assert_eq!(crop.top_left_y, 50);
        assert_eq!(crop.bottom_right_x, 1320);
        assert_eq!(crop.bottom_right_y, 1080);
    }

    #[test]
    fn test_env_override_reaches_settings() {
        std::env::set_var("AVATAR_AGENT__SERVER__PORT", "9090");
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.server.port, 9090);
        std::env::remove_var("AVATAR_AGENT__SERVER__PORT");
    }

    #[test]
    fn test_settings_roundtrip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.server.port, settings.server.port);
        assert_eq!(parsed.avatar.crop, settings.avatar.crop);
    }
}
