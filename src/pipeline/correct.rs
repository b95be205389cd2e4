//! Language-model correction of OCR text.
//!
//! OCR on Vietnamese scans drops or swaps diacritics (`Cong ty` for
//! `Công ty`, `hop dong` for `hợp đồng`). A chat model with a strict
//! instruction prompt repairs those without rewriting content.
//!
//! The pass is best-effort. [`CorrectionEngine::correct`] always returns
//! text: the model's answer when it passes validation, the input otherwise.
//!
//! ## Retry strategy
//!
//! HTTP 429 / 503 errors are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with 500 ms base and 2 retries waits
//! 500 ms then 1 s before giving up.

use crate::config::{ExtractionConfig, MAX_RETRIES};
use crate::error::{CorrectionError, ExtractError};
use crate::output::CorrectionOutcome;
use crate::pipeline::postprocess::clean_model_response;
use crate::prompts::{correction_user_message, DEFAULT_CORRECTION_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Inputs shorter than this (trimmed, in characters) are returned unchanged.
pub const MIN_CORRECTION_CHARS: usize = 10;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// A correction backend: proposes a corrected version of OCR text.
#[async_trait]
pub trait Corrector: Send + Sync {
    async fn propose(&self, raw_text: &str) -> Result<String, CorrectionError>;
}

// ── LLM corrector ────────────────────────────────────────────────────────

/// Correction through an edgequake-llm chat provider.
pub struct LlmCorrector {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmCorrector {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_CORRECTION_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries.min(MAX_RETRIES),
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Build a corrector from the configured provider chain.
    ///
    /// `Ok(None)` when nothing was configured and nothing could be detected.
    /// An explicitly chosen provider that cannot be built is an error.
    pub fn from_config(config: &ExtractionConfig) -> Result<Option<Self>, ExtractError> {
        Ok(resolve_provider(config)?.map(|provider| Self::new(provider, config)))
    }
}

#[async_trait]
impl Corrector for LlmCorrector {
    async fn propose(&self, raw_text: &str) -> Result<String, CorrectionError> {
        let user_message = correction_user_message(raw_text);
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(user_message.as_str()),
        ];

        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Correction: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "Correction: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Correction: attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(CorrectionError::Api {
            retries: self.max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt - 1)`, saturating.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the chat provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model` or
///    [`DEFAULT_MODEL`]. Failure is an error: the caller asked for it.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    also explicit, also an error on failure.
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured model.
/// 5. **Auto-detection** (`ProviderFactory::from_env`).
///
/// Steps 4 and 5 are guesses; when they fail the result is `None` and
/// correction is disabled.
fn resolve_provider(config: &ExtractionConfig) -> Result<Option<Arc<dyn LLMProvider>>, ExtractError> {
    if let Some(ref provider) = config.provider {
        return Ok(Some(Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model).map(Some);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(Some);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            match create_provider("openai", model) {
                Ok(provider) => return Ok(Some(provider)),
                Err(e) => warn!("OPENAI_API_KEY is set but the provider failed: {}", e),
            }
        }
    }

    match ProviderFactory::from_env() {
        Ok((llm_provider, _embedding)) => Ok(Some(llm_provider)),
        Err(e) => {
            warn!(
                "No LLM provider detected (set OPENAI_API_KEY, ANTHROPIC_API_KEY, or --provider); \
                 correction disabled: {}",
                e
            );
            Ok(None)
        }
    }
}

// ── Correction engine ────────────────────────────────────────────────────

/// Text returned by the correction pass and how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub text: String,
    pub outcome: CorrectionOutcome,
}

/// Validation and fallback policy around a [`Corrector`].
#[derive(Clone)]
pub struct CorrectionEngine {
    corrector: Option<Arc<dyn Corrector>>,
    timeout: Duration,
}

impl CorrectionEngine {
    /// `None` disables correction: every call returns its input.
    pub fn new(corrector: Option<Arc<dyn Corrector>>, config: &ExtractionConfig) -> Self {
        Self {
            corrector,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Engine backed by the configured LLM provider, or disabled.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let corrector: Option<Arc<dyn Corrector>> = if config.correction_enabled {
            LlmCorrector::from_config(config)?.map(|c| Arc::new(c) as Arc<dyn Corrector>)
        } else {
            info!("Correction disabled by configuration");
            None
        };
        Ok(Self::new(corrector, config))
    }

    pub fn is_enabled(&self) -> bool {
        self.corrector.is_some()
    }

    /// Correct `raw_text`, falling back to it on any anomaly.
    pub async fn correct(&self, raw_text: &str) -> Correction {
        let unchanged = |outcome| Correction {
            text: raw_text.to_string(),
            outcome,
        };

        if raw_text.trim().chars().count() < MIN_CORRECTION_CHARS {
            return unchanged(CorrectionOutcome::SkippedShort);
        }
        let Some(corrector) = self.corrector.as_ref() else {
            return unchanged(CorrectionOutcome::Disabled);
        };

        let response = match tokio::time::timeout(self.timeout, corrector.propose(raw_text)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("Correction failed, keeping OCR text: {}", e);
                return unchanged(CorrectionOutcome::Failed(e.to_string()));
            }
            Err(_) => {
                let e = CorrectionError::Timeout {
                    secs: self.timeout.as_secs(),
                };
                warn!("Correction failed, keeping OCR text: {}", e);
                return unchanged(CorrectionOutcome::Failed(e.to_string()));
            }
        };

        let mut corrected = clean_model_response(&response);
        if let Err(reason) = validate(raw_text, &corrected) {
            warn!("Correction rejected, keeping OCR text: {}", reason);
            return unchanged(CorrectionOutcome::Rejected(reason));
        }

        // Aggregated page text ends with a newline; keep that shape.
        if raw_text.ends_with('\n') && !corrected.ends_with('\n') {
            corrected.push('\n');
        }
        info!(
            "Correction applied: {} → {} chars",
            raw_text.chars().count(),
            corrected.chars().count()
        );
        Correction {
            text: corrected,
            outcome: CorrectionOutcome::Applied,
        }
    }
}

/// A response must be non-empty and at least half the input's length.
fn validate(raw_text: &str, corrected: &str) -> Result<(), String> {
    if corrected.trim().is_empty() {
        return Err("empty response".to_string());
    }
    let raw_len = raw_text.trim().chars().count();
    let corrected_len = corrected.chars().count();
    if corrected_len * 2 < raw_len {
        return Err(format!(
            "response too short ({} chars for {} chars of input)",
            corrected_len, raw_len
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Rewrite = Box<dyn Fn(&str) -> String + Send + Sync>;

    /// Answers with a fixed rewrite of its input and counts calls.
    struct Echo(Rewrite, AtomicUsize);

    fn echo(f: impl Fn(&str) -> String + Send + Sync + 'static) -> Echo {
        Echo(Box::new(f), AtomicUsize::new(0))
    }

    #[async_trait]
    impl Corrector for Echo {
        async fn propose(&self, raw_text: &str) -> Result<String, CorrectionError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok((self.0)(raw_text))
        }
    }

    struct Broken;

    #[async_trait]
    impl Corrector for Broken {
        async fn propose(&self, _raw_text: &str) -> Result<String, CorrectionError> {
            Err(CorrectionError::Api {
                retries: 2,
                detail: "503 Service Unavailable".into(),
            })
        }
    }

    fn engine(corrector: impl Corrector + 'static) -> CorrectionEngine {
        CorrectionEngine::new(Some(Arc::new(corrector)), &ExtractionConfig::default())
    }

    const RAW: &str = "--- Page 1 ---\nCong ty co phan ABC\n";

    #[tokio::test]
    async fn accepted_correction_keeps_trailing_newline() {
        let e = engine(echo(|_| "--- Page 1 ---\nCông ty cổ phần ABC".into()));
        let c = e.correct(RAW).await;
        assert_eq!(c.outcome, CorrectionOutcome::Applied);
        assert_eq!(c.text, "--- Page 1 ---\nCông ty cổ phần ABC\n");
    }

    #[tokio::test]
    async fn short_input_is_identity_without_a_call() {
        let counted = Arc::new(echo(|s| s.to_uppercase()));
        let e = CorrectionEngine::new(Some(counted.clone()), &ExtractionConfig::default());
        for input in ["", "   ", "abc", "  123456789  "] {
            let c = e.correct(input).await;
            assert_eq!(c.text, input);
            assert_eq!(c.outcome, CorrectionOutcome::SkippedShort);
        }
        assert_eq!(counted.1.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_and_truncated_responses_are_rejected() {
        let c = engine(echo(|_| "  \n".into())).correct(RAW).await;
        assert_eq!(c.text, RAW);
        assert!(matches!(c.outcome, CorrectionOutcome::Rejected(_)));

        let c = engine(echo(|_| "Công ty".into())).correct(RAW).await;
        assert_eq!(c.text, RAW);
        assert!(matches!(c.outcome, CorrectionOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn wrapped_response_is_unwrapped() {
        let e = engine(echo(|raw| {
            format!("{}\n```\n{}\n```", crate::prompts::RESPONSE_MARKER, raw.trim())
        }));
        let c = e.correct(RAW).await;
        assert_eq!(c.outcome, CorrectionOutcome::Applied);
        assert_eq!(c.text, RAW);
    }

    #[tokio::test]
    async fn transport_failure_returns_input() {
        let c = engine(Broken).correct(RAW).await;
        assert_eq!(c.text, RAW);
        assert!(matches!(c.outcome, CorrectionOutcome::Failed(ref d) if d.contains("503")));
    }

    #[tokio::test]
    async fn disabled_engine_returns_input() {
        let e = CorrectionEngine::new(None, &ExtractionConfig::default());
        assert!(!e.is_enabled());
        let c = e.correct(RAW).await;
        assert_eq!(c.text, RAW);
        assert_eq!(c.outcome, CorrectionOutcome::Disabled);
    }

    #[tokio::test]
    async fn unchanged_output_is_idempotent() {
        let e = engine(echo(|s| s.to_string()));
        let once = e.correct(RAW).await;
        let twice = e.correct(&once.text).await;
        assert_eq!(twice.outcome, CorrectionOutcome::Applied);
        assert_eq!(twice.text, once.text);
    }

    #[test]
    fn half_length_boundary() {
        assert!(validate("abcdefghij", "abcde").is_ok());
        assert!(validate("abcdefghij", "abcd").is_err());
        // Counted in characters: 5 two-byte letters are half of 10.
        assert!(validate("đđđđđđđđđđ", "ơơơơơ").is_ok());
    }

    #[test]
    fn options_follow_config() {
        let opts = build_options(&ExtractionConfig::default());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn disabled_config_builds_disabled_engine() {
        let config = ExtractionConfig::builder()
            .correction_enabled(false)
            .build()
            .unwrap();
        assert!(!CorrectionEngine::from_config(&config).unwrap().is_enabled());
    }

    // ── LlmCorrector against a scripted provider ──────────────────────────

    /// Fails the first `failures` chats, then answers `reply`.
    struct FlakyProvider {
        failures: usize,
        reply: &'static str,
        calls: AtomicUsize,
        seen: std::sync::Mutex<Vec<ChatMessage>>,
    }

    impl FlakyProvider {
        fn new(failures: usize, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                failures,
                reply,
                calls: AtomicUsize::new(0),
                seen: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-1"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            *self.seen.lock().unwrap() = messages.to_vec();
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(LlmError::RateLimited(format!("429 on call {}", n + 1)))
            } else {
                Ok(LLMResponse::new(self.reply, "flaky-1"))
            }
        }
    }

    fn llm_config(max_retries: u32) -> ExtractionConfig {
        ExtractionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(500)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn llm_corrector_retries_then_answers() {
        let provider = FlakyProvider::new(2, "Công ty cổ phần ABC");
        let corrector = LlmCorrector::new(provider.clone(), &llm_config(2));

        let started = tokio::time::Instant::now();
        let answer = corrector.propose("Cong ty co phan ABC").await.unwrap();

        assert_eq!(answer, "Công ty cổ phần ABC");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        // 500 ms then 1 s of backoff.
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn llm_corrector_gives_up_after_retries() {
        let provider = FlakyProvider::new(usize::MAX, "unused");
        let corrector = LlmCorrector::new(provider.clone(), &llm_config(1));

        match corrector.propose("Cong ty co phan ABC").await {
            Err(CorrectionError::Api { retries, detail }) => {
                assert_eq!(retries, 1);
                assert!(detail.contains("429 on call 2"), "{detail}");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn llm_corrector_frames_prompt_and_text() {
        let provider = FlakyProvider::new(0, "ok");
        let corrector = LlmCorrector::new(provider.clone(), &llm_config(0));
        corrector.propose("Cong ty co phan ABC").await.unwrap();

        let seen = provider.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].role, ChatRole::System);
        assert_eq!(seen[0].content, DEFAULT_CORRECTION_PROMPT);
        assert_eq!(seen[1].role, ChatRole::User);
        assert!(seen[1].content.contains("Cong ty co phan ABC"));
        assert!(seen[1]
            .content
            .trim_end()
            .ends_with(crate::prompts::RESPONSE_MARKER));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 70), u64::MAX);
        assert_eq!(backoff_ms(u64::MAX, 2), u64::MAX);
    }

    #[test]
    fn retry_count_is_capped() {
        let mut config = ExtractionConfig::default();
        config.max_retries = u32::MAX;
        let corrector = LlmCorrector::new(FlakyProvider::new(0, "ok"), &config);
        assert_eq!(corrector.max_retries, MAX_RETRIES);
    }
}
