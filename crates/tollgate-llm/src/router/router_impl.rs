//! LLM Router implementation
//!
//! Selection, bounded concurrency, per-attempt timeout and the sequential
//! fallback chain.

use super::config::RouterConfig;
use super::provider::LlmProvider;
use super::registry::ProviderRegistry;
use super::types::{
    AttemptRecord, Invocation, RouteFailure, RouteOutcome, RouteRequest, RouteSuccess, Selection,
};
use crate::classify::{classify, ClassifiedError, ErrorKind};
use crate::completion::CompletionResponse;
use crate::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Reason attached to the degraded no-adapter outcome
pub const PROVIDER_NOT_AVAILABLE: &str = "provider_not_available";

enum AttemptError {
    Failed(ClassifiedError),
    Cancelled,
}

/// Routes calls across the registered providers
pub struct LlmRouter {
    registry: ProviderRegistry,
    config: RouterConfig,
    semaphore: Arc<Semaphore>,
}

impl LlmRouter {
    /// Create a router over a startup-built registry
    #[must_use]
    pub fn new(registry: ProviderRegistry, config: RouterConfig) -> Self {
        let permits = config.max_concurrent_requests.max(1);
        Self {
            registry,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// The provider registry
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Router configuration
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Permits not currently held by an attempt
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Provider unpinned requests start with
    ///
    /// The configured default when it is available, otherwise the first
    /// available adapter in registration order.
    #[must_use]
    pub fn default_provider(&self) -> Option<Arc<dyn LlmProvider>> {
        self.config
            .default_provider
            .as_deref()
            .and_then(|id| self.registry.get(id))
            .or_else(|| {
                self.registry
                    .available_ids()
                    .first()
                    .and_then(|id| self.registry.get(id))
            })
    }

    /// Pick the primary provider and model
    ///
    /// `None` when no adapter can serve the request: a pinned provider that is
    /// unknown or unavailable, or no available provider at all.
    #[must_use]
    pub fn select(&self, provider: Option<&str>, model: Option<&str>) -> Option<Selection> {
        let (adapter, pinned) = match provider {
            Some(id) => (self.registry.get(id)?, true),
            None => (self.default_provider()?, false),
        };
        let model = model
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| adapter.default_model().to_string());
        Some(Selection {
            provider: adapter.name().to_string(),
            model,
            pinned,
        })
    }

    /// Run one logical request, falling back across providers when allowed
    #[instrument(
        skip(self, request, cancel),
        fields(provider = ?request.provider, model = ?request.model)
    )]
    pub async fn execute(&self, request: &RouteRequest, cancel: &CancellationToken) -> RouteOutcome {
        let started = Instant::now();

        let Some(selection) = self.select(request.provider.as_deref(), request.model.as_deref())
        else {
            warn!(requested = ?request.provider, "No provider available for request");
            return RouteOutcome::NoProvider {
                reason: PROVIDER_NOT_AVAILABLE.to_string(),
                requested: request.provider.clone(),
            };
        };

        let mut attempts = Vec::new();
        let primary = match self
            .attempt_on(&selection.provider, &selection.model, request, cancel, &mut attempts)
            .await
        {
            Ok(response) => {
                return RouteOutcome::Completed(RouteSuccess {
                    response,
                    provider: selection.provider,
                    model: selection.model,
                    fallback_occurred: false,
                    originating_error: None,
                    attempts,
                    latency_ms: elapsed_ms(started),
                })
            }
            Err(AttemptError::Cancelled) => return RouteOutcome::Cancelled { attempts },
            Err(AttemptError::Failed(error)) => error,
        };

        if selection.pinned || !self.config.fallback_enabled || !primary.kind.triggers_fallback() {
            debug!(
                provider = %selection.provider,
                kind = %primary.kind,
                pinned = selection.pinned,
                "Not falling back"
            );
            return RouteOutcome::Failed(RouteFailure {
                error: primary,
                provider: selection.provider,
                model: selection.model,
                attempts,
            });
        }

        let mut last = (primary.clone(), selection.provider.clone(), selection.model.clone());
        let candidates: Vec<String> = self
            .registry
            .available_ids()
            .into_iter()
            .filter(|id| *id != selection.provider)
            .map(str::to_string)
            .collect();

        for id in candidates {
            if cancel.is_cancelled() {
                return RouteOutcome::Cancelled { attempts };
            }
            let Some(adapter) = self.registry.get(&id) else {
                continue;
            };
            let model = adapter.default_model().to_string();
            info!(from = %last.1, to = %id, kind = %last.0.kind, "Falling back to next provider");

            match self.attempt_on(&id, &model, request, cancel, &mut attempts).await {
                Ok(response) => {
                    return RouteOutcome::Completed(RouteSuccess {
                        response,
                        provider: id,
                        model,
                        fallback_occurred: true,
                        originating_error: Some(primary),
                        attempts,
                        latency_ms: elapsed_ms(started),
                    })
                }
                Err(AttemptError::Cancelled) => return RouteOutcome::Cancelled { attempts },
                Err(AttemptError::Failed(error)) => last = (error, id, model),
            }
        }

        let (error, provider, model) = last;
        warn!(attempts = attempts.len(), kind = %error.kind, "All provider attempts failed");
        RouteOutcome::Failed(RouteFailure {
            error,
            provider,
            model,
            attempts,
        })
    }

    /// One attempt against one provider, recorded into `attempts`
    async fn attempt_on(
        &self,
        provider: &str,
        model: &str,
        request: &RouteRequest,
        cancel: &CancellationToken,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Result<CompletionResponse, AttemptError> {
        let started = Instant::now();
        let result = match self.registry.get(provider) {
            Some(adapter) => self.attempt(adapter.as_ref(), model, request, cancel).await,
            None => Err(AttemptError::Failed(
                ClassifiedError::new(ErrorKind::Unknown, "provider not available")
                    .with_provider(provider),
            )),
        };

        // Cancelled attempts are not recorded
        let error = match &result {
            Ok(_) => None,
            Err(AttemptError::Failed(error)) => {
                warn!(provider, model, kind = %error.kind, retryable = error.retryable, "Provider attempt failed");
                Some(error.clone())
            }
            Err(AttemptError::Cancelled) => None,
        };
        if matches!(result, Err(AttemptError::Cancelled)) {
            return result;
        }
        attempts.push(AttemptRecord {
            provider: provider.to_string(),
            model: model.to_string(),
            error,
            latency_ms: elapsed_ms(started),
        });
        result
    }

    async fn attempt(
        &self,
        adapter: &dyn LlmProvider,
        model: &str,
        request: &RouteRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, AttemptError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AttemptError::Cancelled),
            permit = self.semaphore.acquire() => permit.map_err(|_| {
                AttemptError::Failed(
                    ClassifiedError::new(ErrorKind::Unknown, "router is shutting down")
                        .with_provider(adapter.name()),
                )
            })?,
        };

        let params = request.params_for(model);
        debug!(provider = adapter.name(), model, max_tokens = ?params.max_tokens, "Calling provider");

        let call = async {
            match &request.invocation {
                Invocation::Generate { prompt } => adapter.generate(prompt, &params).await,
                Invocation::Chat { messages } => adapter.chat(messages, &params).await,
            }
        };
        let timeout = Duration::from_millis(self.config.request_timeout_ms);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptError::Cancelled),
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(Error::Cancelled)) => Err(AttemptError::Cancelled),
                Ok(Err(e)) => Err(AttemptError::Failed(classify(&e).with_provider(adapter.name()))),
                Err(_) => Err(AttemptError::Failed(
                    classify(&Error::Timeout(self.config.request_timeout_ms))
                        .with_provider(adapter.name()),
                )),
            },
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
