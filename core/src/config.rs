use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Hosted completion API families the backend can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Groq,
    Together,
}

impl ProviderKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Groq => "groq",
            ProviderKind::Together => "together",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Together => "TOGETHER_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::Together => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Groq => "https://api.groq.com/openai",
            ProviderKind::Together => "https://api.together.xyz",
        }
    }
}

/// One provider slot (primary or fallback)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Overrides the provider's public endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            model: None,
            base_url: None,
        }
    }

    /// True when a non-empty credential is present
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }

    pub fn endpoint(&self) -> String {
        self.base_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.kind.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub primary: Option<ProviderSettings>,
    pub fallback: Option<ProviderSettings>,
    /// Upper bound on a single outbound completion call
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: Some(ProviderSettings::new(ProviderKind::Gemini)),
            fallback: Some(ProviderSettings::new(ProviderKind::Groq)),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Origins allowed by CORS; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Root directory for locally stored uploads, served under `/uploads`
    pub upload_dir: PathBuf,
    /// Prefix for URLs returned for locally stored uploads
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            allowed_origins: vec!["*".to_string()],
            upload_dir: PathBuf::from("uploads"),
            public_base_url: String::new(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is forgotten
    pub ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            cleanup_interval_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Per-file character budget for extracted text placed in a chat prompt
    pub file_excerpt_chars: usize,
    /// Character budget for text submitted to the summarizer
    pub summary_input_chars: usize,
    /// Replay only the most recent N history turns when set
    pub max_history_turns: Option<usize>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            file_excerpt_chars: 3000,
            summary_input_chars: 65000,
            max_history_turns: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Envelope sender; defaults to the SMTP username
    pub from: Option<String>,
    /// Recipient of contact-form messages
    pub to: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    #[default]
    Local,
    Cloudinary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub backend: ImageBackend,
    pub cloud_name: Option<String>,
    pub upload_preset: Option<String>,
    pub folder: Option<String>,
    /// Overrides the Cloudinary API endpoint
    pub base_url: Option<String>,
}

/// Complete backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifiedConfig {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub session: SessionConfig,
    pub prompt: PromptConfig,
    pub mail: MailConfig,
    pub images: ImagesConfig,
}

impl UnifiedConfig {
    /// Loads configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads the default config file if it exists, otherwise returns defaults
    pub fn load_from_default() -> Result<Self, ConfigError> {
        match get_default_config_file() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Loads `.env` and applies process environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "Failed to load .env file");
            }
        }
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("STUDYMATE_BIND_ADDR") {
            self.server.bind_addr = addr.parse().map_err(|e| ConfigError::Invalid {
                key: "STUDYMATE_BIND_ADDR".to_string(),
                message: format!("{}", e),
            })?;
        } else if let Some(port) = get("PORT") {
            let port: u16 = port.parse().map_err(|e| ConfigError::Invalid {
                key: "PORT".to_string(),
                message: format!("{}", e),
            })?;
            // A bare PORT binds every interface
            self.server.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
        }

        for slot in [&mut self.providers.primary, &mut self.providers.fallback]
            .into_iter()
            .flatten()
        {
            if slot.api_key.is_none() {
                slot.api_key = get(slot.kind.api_key_env());
            }
        }

        if let Some(host) = get("SMTP_HOST") {
            self.mail.smtp_host = Some(host);
        }
        if let Some(port) = get("SMTP_PORT") {
            self.mail.smtp_port = port.parse().map_err(|e| ConfigError::Invalid {
                key: "SMTP_PORT".to_string(),
                message: format!("{}", e),
            })?;
        }
        if let Some(user) = get("SMTP_USERNAME") {
            self.mail.username = Some(user);
        }
        if let Some(password) = get("SMTP_PASSWORD") {
            self.mail.password = Some(password);
        }
        if let Some(from) = get("CONTACT_FROM") {
            self.mail.from = Some(from);
        }
        if let Some(to) = get("CONTACT_TO") {
            self.mail.to = Some(to);
        }

        if let Some(backend) = get("IMAGE_BACKEND") {
            self.images.backend = match backend.to_ascii_lowercase().as_str() {
                "local" => ImageBackend::Local,
                "cloudinary" => ImageBackend::Cloudinary,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "IMAGE_BACKEND".to_string(),
                        message: format!("unknown backend '{}'", other),
                    })
                }
            };
        }
        if let Some(cloud) = get("CLOUDINARY_CLOUD_NAME") {
            self.images.cloud_name = Some(cloud);
        }
        if let Some(preset) = get("CLOUDINARY_UPLOAD_PRESET") {
            self.images.upload_preset = Some(preset);
        }

        Ok(())
    }
}

/// Default config file location: `<config_dir>/studymate/config.toml`
pub fn get_default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("studymate").join("config.toml"))
}
