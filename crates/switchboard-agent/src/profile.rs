// ABOUTME: ProviderProfile: the tagged union of supported model providers and their settings.
// ABOUTME: Resolved once from a single discriminator (API_HOST) plus provider-specific variables.

use switchboard_core::Error;

/// Environment variable selecting the provider profile.
pub const DISCRIMINATOR_VAR: &str = "API_HOST";
pub const DEFAULT_HOST: &str = "github";

const GITHUB_BASE_URL: &str = "https://models.github.ai/inference";
const GITHUB_DEFAULT_MODEL: &str = "openai/gpt-4o";
const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434/v1";
const OLLAMA_DEFAULT_MODEL: &str = "llama3.1:latest";
const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Exactly one provider configuration. Each variant carries only the
/// parameters its provider needs.
#[derive(Clone, PartialEq)]
pub enum ProviderProfile {
    Azure {
        endpoint: String,
        deployment: String,
        api_key: String,
    },
    GitHub {
        token: String,
        model: String,
    },
    Ollama {
        endpoint: String,
        model: String,
    },
    OpenAi {
        api_key: String,
        model: String,
        base_url: String,
    },
    Anthropic {
        api_key: String,
        model: String,
        base_url: String,
    },
}

/// Read a variable, treating empty values as unset.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str, host: &str) -> Result<String, Error> {
    non_empty(lookup, key).ok_or_else(|| {
        Error::Configuration(format!(
            "{} environment variable not set (required when {}={})",
            key, DISCRIMINATOR_VAR, host
        ))
    })
}

impl ProviderProfile {
    /// Resolve the profile from process environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Resolve the profile from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let host = non_empty(&lookup, DISCRIMINATOR_VAR).unwrap_or_else(|| DEFAULT_HOST.to_string());
        Self::select(&host, lookup)
    }

    /// Build the profile named by `host`. Unknown names are rejected before
    /// anything touches the network.
    pub fn select(host: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let host = host.trim().to_ascii_lowercase();
        match host.as_str() {
            "azure" => {
                let endpoint = required(&lookup, "AZURE_OPENAI_ENDPOINT", &host)?;
                Ok(ProviderProfile::Azure {
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    deployment: required(&lookup, "AZURE_OPENAI_CHAT_DEPLOYMENT", &host)?,
                    api_key: required(&lookup, "AZURE_OPENAI_API_KEY", &host)?,
                })
            }
            "github" => Ok(ProviderProfile::GitHub {
                token: required(&lookup, "GITHUB_TOKEN", &host)?,
                model: non_empty(&lookup, "GITHUB_MODEL")
                    .unwrap_or_else(|| GITHUB_DEFAULT_MODEL.to_string()),
            }),
            "ollama" => Ok(ProviderProfile::Ollama {
                endpoint: non_empty(&lookup, "OLLAMA_ENDPOINT")
                    .unwrap_or_else(|| OLLAMA_DEFAULT_ENDPOINT.to_string()),
                model: non_empty(&lookup, "OLLAMA_MODEL")
                    .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            }),
            "openai" => Ok(ProviderProfile::OpenAi {
                api_key: required(&lookup, "OPENAI_API_KEY", &host)?,
                model: non_empty(&lookup, "OPENAI_MODEL")
                    .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
                base_url: non_empty(&lookup, "OPENAI_BASE_URL")
                    .unwrap_or_else(|| OPENAI_DEFAULT_BASE_URL.to_string()),
            }),
            "anthropic" => Ok(ProviderProfile::Anthropic {
                api_key: required(&lookup, "ANTHROPIC_API_KEY", &host)?,
                model: non_empty(&lookup, "ANTHROPIC_MODEL")
                    .unwrap_or_else(|| ANTHROPIC_DEFAULT_MODEL.to_string()),
                base_url: non_empty(&lookup, "ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| ANTHROPIC_DEFAULT_BASE_URL.to_string()),
            }),
            other => Err(Error::Configuration(format!(
                "unsupported LLM provider: {} (expected one of azure, github, ollama, openai, anthropic)",
                other
            ))),
        }
    }

    /// Discriminator value for this profile.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderProfile::Azure { .. } => "azure",
            ProviderProfile::GitHub { .. } => "github",
            ProviderProfile::Ollama { .. } => "ollama",
            ProviderProfile::OpenAi { .. } => "openai",
            ProviderProfile::Anthropic { .. } => "anthropic",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderProfile::Azure { deployment, .. } => deployment,
            ProviderProfile::GitHub { model, .. }
            | ProviderProfile::Ollama { model, .. }
            | ProviderProfile::OpenAi { model, .. }
            | ProviderProfile::Anthropic { model, .. } => model,
        }
    }

    /// API root the adapter appends its endpoint path to.
    pub fn base_url(&self) -> String {
        match self {
            ProviderProfile::Azure { endpoint, .. } => format!("{}/openai/v1", endpoint),
            ProviderProfile::GitHub { .. } => GITHUB_BASE_URL.to_string(),
            ProviderProfile::Ollama { endpoint, .. } => endpoint.clone(),
            ProviderProfile::OpenAi { base_url, .. }
            | ProviderProfile::Anthropic { base_url, .. } => base_url.clone(),
        }
    }
}

// Credentials never appear in logs.
impl std::fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("provider", &self.name())
            .field("model", &self.model())
            .field("base_url", &self.base_url())
            .finish()
    }
}
