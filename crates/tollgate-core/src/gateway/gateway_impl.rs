//! Gateway implementation

use super::types::{
    GatewayConfig, GenerationResult, HealthReport, HealthStatus, ProviderInfo, RequestOptions,
    ResponseMetadata,
};
use crate::budget::{BudgetLedger, UsageReport};
use crate::error::{Error, Result};
use crate::optimizer::{OptimizationPlan, RequestOptimizer, Verdict};
use crate::usage::UsageRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tollgate_llm::{
    Invocation, LlmRouter, Message, ModelDescriptor, PricingTable, RouteOutcome, RouteRequest,
    RouteSuccess, Selection, TokenAccountant, TokenCountResult, TokenUsage,
    PROVIDER_NOT_AVAILABLE,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Provider id counted under when no provider is registered
pub const GENERIC_PROVIDER: &str = "generic";

/// Entry point for every inbound operation
///
/// Per request: estimate prompt units, clamp the response ceiling, run one
/// budget check, let the optimizer decide, route with fallback, then write
/// exactly one usage record for the logical call.
pub struct Gateway {
    router: Arc<LlmRouter>,
    tokens: Arc<TokenAccountant>,
    ledger: Arc<BudgetLedger>,
    pricing: Arc<PricingTable>,
    optimizer: RequestOptimizer,
    config: GatewayConfig,
}

/// Per-request context threaded through `execute`
struct Prepared {
    request_id: String,
    user_id: String,
    selection: Selection,
    plan: OptimizationPlan,
    degraded: bool,
}

impl Gateway {
    /// Assemble a gateway from its collaborators
    #[must_use]
    pub fn new(
        router: Arc<LlmRouter>,
        tokens: Arc<TokenAccountant>,
        ledger: Arc<BudgetLedger>,
        pricing: Arc<PricingTable>,
        config: GatewayConfig,
    ) -> Self {
        let optimizer = RequestOptimizer::new(Arc::clone(&pricing), config.optimizer);
        Self {
            router,
            tokens,
            ledger,
            pricing,
            optimizer,
            config,
        }
    }

    /// The router
    #[must_use]
    pub fn router(&self) -> &LlmRouter {
        &self.router
    }

    /// The budget ledger
    #[must_use]
    pub fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }

    /// Single-prompt generation
    ///
    /// # Errors
    /// Budget rejection, unknown provider/model pin, provider failure after
    /// fallback, or cancellation
    pub async fn generate(
        &self,
        prompt: &str,
        options: &RequestOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        if prompt.trim().is_empty() {
            return Err(Error::InvalidRequest("prompt is empty".to_string()));
        }
        let invocation = Invocation::Generate {
            prompt: prompt.to_string(),
        };
        self.execute(invocation, options, cancel).await
    }

    /// Multi-turn chat
    ///
    /// # Errors
    /// Same as [`Gateway::generate`]
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        options: &RequestOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        if messages.is_empty() {
            return Err(Error::InvalidRequest("conversation has no messages".to_string()));
        }
        self.execute(Invocation::Chat { messages }, options, cancel)
            .await
    }

    #[instrument(
        skip(self, invocation, options, cancel),
        fields(user_id = ?options.user_id, provider = ?options.provider, model = ?options.model)
    )]
    async fn execute(
        &self,
        invocation: Invocation,
        options: &RequestOptions,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult> {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        if let Some(provider) = options.provider.as_deref() {
            if !self.router.registry().is_registered(provider) {
                return Err(Error::UnknownProvider(provider.to_string()));
            }
        }

        let Some(selection) = self
            .router
            .select(options.provider.as_deref(), options.model.as_deref())
        else {
            warn!(%request_id, requested = ?options.provider, "No provider available, returning placeholder");
            return Ok(self.placeholder(request_id, options, started));
        };
        self.ensure_model_known(&selection, options)?;

        let prepared = self
            .prepare(request_id, invocation, options, selection)
            .await?;
        debug!(
            request_id = %prepared.request_id,
            provider = %prepared.selection.provider,
            model = %prepared.selection.model,
            ceiling = prepared.plan.final_response_ceiling,
            "Request approved"
        );

        let route = RouteRequest {
            invocation: prepared.plan.final_prompt.clone(),
            provider: options.provider.clone(),
            model: Some(prepared.selection.model.clone()),
            max_tokens: Some(prepared.plan.final_response_ceiling),
            temperature: options.temperature,
            stop: options.stop.clone(),
        };

        match self.router.execute(&route, cancel).await {
            RouteOutcome::Completed(success) => Ok(self.complete(prepared, success, started).await),
            RouteOutcome::Failed(failure) => {
                let record = UsageRecord::failure(
                    &prepared.user_id,
                    &failure.provider,
                    &failure.model,
                    elapsed_ms(started),
                );
                if let Err(e) = self.ledger.record(&record).await {
                    warn!(request_id = %prepared.request_id, error = %e, "Failed to record failed call");
                }
                warn!(
                    request_id = %prepared.request_id,
                    kind = %failure.error.kind,
                    attempts = failure.attempts.len(),
                    "Request failed"
                );
                Err(Error::Provider(failure.error))
            }
            RouteOutcome::NoProvider { .. } => Ok(self.placeholder(prepared.request_id, options, started)),
            RouteOutcome::Cancelled { attempts } => {
                info!(request_id = %prepared.request_id, attempts = attempts.len(), "Request cancelled");
                Err(Error::Cancelled)
            }
        }
    }

    fn ensure_model_known(&self, selection: &Selection, options: &RequestOptions) -> Result<()> {
        let Some(model) = options.model.as_deref() else {
            return Ok(());
        };
        let offered = self
            .router
            .registry()
            .get(&selection.provider)
            .is_some_and(|adapter| adapter.available_models().iter().any(|m| m == model));
        if offered || self.pricing.contains(&selection.provider, model) {
            Ok(())
        } else {
            Err(Error::UnknownModel {
                provider: selection.provider.clone(),
                model: model.to_string(),
            })
        }
    }

    /// Estimate, clamp, check budget and optimize
    async fn prepare(
        &self,
        request_id: String,
        invocation: Invocation,
        options: &RequestOptions,
        selection: Selection,
    ) -> Result<Prepared> {
        let user_id = options
            .user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.config.default_user.clone());

        let prompt_units = self
            .count_invocation(&invocation, &selection.provider, &selection.model)
            .await
            .units;

        let (limits, plan_degraded) = self.ledger.limits_for(&user_id).await;
        let ceiling = self.optimizer.response_ceiling(
            options.max_tokens,
            &selection.provider,
            &selection.model,
            &limits,
        );
        let estimated_units = u64::from(prompt_units) + u64::from(ceiling.value);

        let decision = self
            .ledger
            .evaluate(
                &user_id,
                limits,
                plan_degraded,
                estimated_units,
                &selection.provider,
                &selection.model,
            )
            .await;
        let degraded = decision.degraded;

        let plan = self.optimizer.optimize(
            invocation,
            prompt_units,
            &selection.provider,
            &selection.model,
            ceiling,
            &decision,
        );

        if let Verdict::Reject(decision) = &plan.verdict {
            info!(%request_id, %user_id, reasons = ?decision.reasons, "Request rejected by budget");
            return Err(Error::BudgetExceeded(decision.clone()));
        }

        Ok(Prepared {
            request_id,
            user_id,
            selection,
            plan,
            degraded,
        })
    }

    async fn count_invocation(
        &self,
        invocation: &Invocation,
        provider: &str,
        model: &str,
    ) -> TokenCountResult {
        match invocation {
            Invocation::Generate { prompt } => self.tokens.estimate(prompt, provider, model).await,
            Invocation::Chat { messages } => {
                self.tokens
                    .estimate_messages(messages, provider, model)
                    .await
            }
        }
    }

    /// Bill the successful attempt and build the result
    async fn complete(
        &self,
        prepared: Prepared,
        success: RouteSuccess,
        started: Instant,
    ) -> GenerationResult {
        let Prepared {
            request_id,
            user_id,
            plan,
            mut degraded,
            ..
        } = prepared;
        let RouteSuccess {
            response,
            provider,
            model,
            fallback_occurred,
            originating_error,
            attempts,
            ..
        } = success;

        let (usage, usage_estimated) = match response.usage {
            Some(usage) => (usage, false),
            None => {
                let input = self
                    .count_invocation(&plan.final_prompt, &provider, &model)
                    .await
                    .units;
                let output = if response.content.is_empty() {
                    0
                } else {
                    self.tokens.estimate(&response.content, &provider, &model).await.units
                };
                debug!(%request_id, input, output, "Provider reported no usage, estimating");
                (TokenUsage::new(input, output), true)
            }
        };

        let cost = self.pricing.estimate_cost(
            &provider,
            &model,
            usage.prompt_tokens,
            usage.completion_tokens,
        );
        let latency_ms = elapsed_ms(started);

        let mut record =
            UsageRecord::success(&user_id, &provider, &model, usage, cost, latency_ms);
        if usage_estimated {
            record = record.estimated();
        }
        if let Err(e) = self.ledger.record(&record).await {
            warn!(%request_id, error = %e, "Failed to record usage");
            degraded = true;
        }

        info!(
            %request_id,
            %provider,
            %model,
            tokens = usage.total_tokens,
            cost,
            latency_ms,
            fallback = fallback_occurred,
            "Request completed"
        );

        GenerationResult {
            content: response.content,
            provider,
            model,
            usage,
            metadata: ResponseMetadata {
                request_id,
                finish_reason: response.finish_reason,
                fallback_occurred,
                fallback_error: originating_error,
                cached: false,
                mock: false,
                reason: None,
                degraded,
                usage_estimated,
                optimizations: plan.applied_optimizations,
                cost,
                latency_ms,
                attempts,
            },
        }
    }

    /// The degraded shape returned when no adapter can serve a request
    fn placeholder(
        &self,
        request_id: String,
        options: &RequestOptions,
        started: Instant,
    ) -> GenerationResult {
        GenerationResult {
            content: String::new(),
            provider: options.provider.clone().unwrap_or_default(),
            model: options.model.clone().unwrap_or_default(),
            usage: TokenUsage::default(),
            metadata: ResponseMetadata {
                request_id,
                mock: true,
                reason: Some(PROVIDER_NOT_AVAILABLE.to_string()),
                degraded: true,
                latency_ms: elapsed_ms(started),
                ..Default::default()
            },
        }
    }

    /// Estimate units for text
    ///
    /// Without a provider the router's default is used; without a model,
    /// that provider's default model. With nothing available the count
    /// falls back to the generic heuristic under [`GENERIC_PROVIDER`].
    pub async fn count_units(
        &self,
        text: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<TokenCountResult> {
        let adapter = match provider {
            Some(id) => self.router.registry().get(id),
            None => self.router.default_provider(),
        };
        let provider = match (provider, &adapter) {
            (Some(id), _) => id.to_string(),
            (None, Some(adapter)) => adapter.name().to_string(),
            (None, None) => GENERIC_PROVIDER.to_string(),
        };
        let model = model
            .map(str::to_string)
            .or_else(|| adapter.as_ref().map(|a| a.default_model().to_string()))
            .unwrap_or_default();

        Ok(self.tokens.estimate(text, &provider, &model).await)
    }

    /// Registered providers in registration order
    #[must_use]
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        self.router
            .registry()
            .iter()
            .map(|(id, status, adapter)| ProviderInfo {
                id: id.to_string(),
                display_name: adapter.map_or_else(|| id.to_string(), |a| a.display_name().to_string()),
                capabilities: adapter.map(|a| a.capabilities()).unwrap_or_default(),
                default_model: adapter.map(|a| a.default_model().to_string()),
                status: status.clone(),
            })
            .collect()
    }

    /// Catalog entries, optionally for one provider
    #[must_use]
    pub fn list_models(&self, provider: Option<&str>) -> Vec<ModelDescriptor> {
        self.pricing.list(provider)
    }

    /// Availability of one provider or all of them
    ///
    /// # Errors
    /// Returns error if `provider` is not registered
    pub fn health_check(&self, provider: Option<&str>) -> Result<HealthReport> {
        let registry = self.router.registry();
        let providers: BTreeMap<String, bool> = match provider {
            Some(id) => {
                let status = registry
                    .status(id)
                    .ok_or_else(|| Error::UnknownProvider(id.to_string()))?;
                BTreeMap::from([(id.to_string(), status.is_available())])
            }
            None => registry
                .iter()
                .map(|(id, status, _)| (id.to_string(), status.is_available()))
                .collect(),
        };

        let available = providers.values().filter(|up| **up).count();
        let status = if available == 0 {
            HealthStatus::Unhealthy
        } else if available == providers.len() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        Ok(HealthReport { status, providers })
    }

    /// Limits, consumption and headroom for a user
    ///
    /// # Errors
    /// Returns error if the usage store cannot be read
    pub async fn usage_report(&self, user_id: &str) -> Result<UsageReport> {
        self.ledger.usage_report(user_id).await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
