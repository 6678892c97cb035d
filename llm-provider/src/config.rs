//! Per-provider configuration (§4.8's `ProviderRegistryConfig` entry shape,
//! §9's "Provider registry").

/// Supported backing LLM transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmKind {
    Ollama,
    OpenAiCompatible,
}

impl LlmKind {
    /// `type` tag recognized in the provider registry (§9). Unknown tags
    /// fail construction with a precise message — see `config::parse_kind`.
    pub fn as_tag(self) -> &'static str {
        match self {
            LlmKind::Ollama => "ollama",
            LlmKind::OpenAiCompatible => "openai-compatible",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ollama" => Some(LlmKind::Ollama),
            "openai-compatible" | "azure-openai" | "openai" => Some(LlmKind::OpenAiCompatible),
            _ => None,
        }
    }
}

/// One provider registry entry (§9 "Provider registry").
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub kind: LlmKind,
    pub display_name: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub custom_instructions: Option<String>,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: LlmKind::Ollama,
            display_name: "ollama".to_string(),
            endpoint: "http://127.0.0.1:11434".to_string(),
            api_key: None,
            model: String::new(),
            custom_instructions: None,
            max_retries: 3,
        }
    }
}
