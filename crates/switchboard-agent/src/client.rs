// ABOUTME: Factory for model backends from a resolved ProviderProfile.
// ABOUTME: Maps each profile to the HTTP adapter and authentication style it needs.

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::Error;

use crate::profile::ProviderProfile;
use crate::providers::anthropic::AnthropicBackend;
use crate::providers::openai::{Auth, OpenAiBackend};
use crate::runtime::{BackendError, ModelBackend};

/// Create the backend for a profile. Every request made through it is bounded
/// by `timeout`.
pub fn create_backend(
    profile: &ProviderProfile,
    timeout: Duration,
) -> Result<Arc<dyn ModelBackend>, Error> {
    let backend: Arc<dyn ModelBackend> = match profile {
        ProviderProfile::Azure { api_key, .. } => Arc::new(
            OpenAiBackend::new(
                profile.name(),
                profile.base_url(),
                profile.model(),
                Auth::ApiKeyHeader(api_key.clone()),
                timeout,
            )
            .map_err(config_error)?,
        ),
        ProviderProfile::GitHub { token, .. } => Arc::new(
            OpenAiBackend::new(
                profile.name(),
                profile.base_url(),
                profile.model(),
                Auth::Bearer(token.clone()),
                timeout,
            )
            .map_err(config_error)?,
        ),
        ProviderProfile::Ollama { .. } => Arc::new(
            OpenAiBackend::new(
                profile.name(),
                profile.base_url(),
                profile.model(),
                Auth::None,
                timeout,
            )
            .map_err(config_error)?,
        ),
        ProviderProfile::OpenAi { api_key, .. } => Arc::new(
            OpenAiBackend::new(
                profile.name(),
                profile.base_url(),
                profile.model(),
                Auth::Bearer(api_key.clone()),
                timeout,
            )
            .map_err(config_error)?,
        ),
        ProviderProfile::Anthropic { api_key, .. } => Arc::new(
            AnthropicBackend::new(api_key.clone(), profile.base_url(), profile.model(), timeout)
                .map_err(config_error)?,
        ),
    };

    tracing::debug!(
        provider = backend.provider_name(),
        model = backend.model_name(),
        "model backend created"
    );
    Ok(backend)
}

/// Resolve the profile from the environment and create its backend.
pub fn create_backend_from_env(timeout: Duration) -> Result<Arc<dyn ModelBackend>, Error> {
    let profile = ProviderProfile::from_env()?;
    create_backend(&profile, timeout)
}

fn config_error(err: BackendError) -> Error {
    Error::Configuration(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use switchboard_core::ErrorKind;

    use crate::ENV_MUTEX;

    /// Uses match instead of unwrap_err() because Arc<dyn ModelBackend> doesn't impl Debug.
    fn expect_err(result: Result<Arc<dyn ModelBackend>, Error>) -> Error {
        match result {
            Err(e) => e,
            Ok(backend) => panic!("expected error, got backend for {}", backend.provider_name()),
        }
    }

    fn profile(vars: &[(&str, &str)]) -> Result<ProviderProfile, Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ProviderProfile::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn creates_backend_for_each_profile() {
        let cases: Vec<(Vec<(&str, &str)>, &str, &str)> = vec![
            (
                vec![
                    ("API_HOST", "azure"),
                    ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
                    ("AZURE_OPENAI_CHAT_DEPLOYMENT", "gpt-4o-mini"),
                    ("AZURE_OPENAI_API_KEY", "az-key"),
                ],
                "azure",
                "gpt-4o-mini",
            ),
            (vec![("GITHUB_TOKEN", "ghp_x")], "github", "openai/gpt-4o"),
            (vec![("API_HOST", "ollama")], "ollama", "llama3.1:latest"),
            (
                vec![("API_HOST", "openai"), ("OPENAI_API_KEY", "sk-x")],
                "openai",
                "gpt-4o",
            ),
            (
                vec![("API_HOST", "anthropic"), ("ANTHROPIC_API_KEY", "sk-ant")],
                "anthropic",
                "claude-sonnet-4-5-20250929",
            ),
        ];

        for (vars, provider, model) in cases {
            let profile = profile(&vars).unwrap();
            let backend = match create_backend(&profile, Duration::from_secs(5)) {
                Ok(b) => b,
                Err(e) => panic!("{} should build: {}", provider, e),
            };
            assert_eq!(backend.provider_name(), provider);
            assert_eq!(backend.model_name(), model);
        }
    }

    #[test]
    fn create_backend_from_env_unknown_host() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: test-only env manipulation, serialized by ENV_MUTEX.
        unsafe { std::env::set_var("API_HOST", "bogus") };

        let err = expect_err(create_backend_from_env(Duration::from_secs(5)));

        // SAFETY: test-only env manipulation, serialized by ENV_MUTEX.
        unsafe { std::env::remove_var("API_HOST") };

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("unsupported LLM provider: bogus"));
    }

    #[test]
    fn create_backend_from_env_missing_token() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let saved = std::env::var("GITHUB_TOKEN").ok();
        // SAFETY: test-only env manipulation, serialized by ENV_MUTEX.
        unsafe {
            std::env::set_var("API_HOST", "github");
            std::env::remove_var("GITHUB_TOKEN");
        }

        let err = expect_err(create_backend_from_env(Duration::from_secs(5)));

        // SAFETY: test-only env manipulation, serialized by ENV_MUTEX.
        unsafe {
            std::env::remove_var("API_HOST");
            if let Some(token) = saved {
                std::env::set_var("GITHUB_TOKEN", token);
            }
        }

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn live_backend_answers() {
        use crate::runtime::CompletionRequest;
        use switchboard_core::Message;

        let backend = create_backend_from_env(Duration::from_secs(60))
            .unwrap_or_else(|e| panic!("provider must be configured: {}", e));
        let conversation = vec![Message::user("Reply with the single word: pong")];
        let response = backend
            .complete(&CompletionRequest {
                instructions: "You are terse.",
                capabilities: &[],
                conversation: &conversation,
            })
            .await;
        assert!(response.is_ok(), "live test failed: {:?}", response.err());
    }
}
