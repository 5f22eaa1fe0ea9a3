//! Request optimizer

use super::types::{Optimization, OptimizationPlan, OptimizerConfig, ResponseCeiling, Verdict};
use crate::budget::{BudgetCheckKind, BudgetDecision};
use crate::plan::PlanLimits;
use std::sync::Arc;
use tollgate_llm::{Invocation, PricingTable};
use tracing::debug;

/// Adjusts response ceilings and turns budget decisions into verdicts
pub struct RequestOptimizer {
    pricing: Arc<PricingTable>,
    config: OptimizerConfig,
}

impl RequestOptimizer {
    /// Create an optimizer reading prices and limits from `pricing`
    #[must_use]
    pub fn new(pricing: Arc<PricingTable>, config: OptimizerConfig) -> Self {
        Self { pricing, config }
    }

    /// Optimizer configuration
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Ceiling for a request, clamped to the plan and model maximums
    ///
    /// Without a requested ceiling the smallest of the configured default,
    /// the plan maximum and the model maximum is used, and nothing is
    /// recorded as applied.
    #[must_use]
    pub fn response_ceiling(
        &self,
        requested: Option<u32>,
        provider: &str,
        model: &str,
        limits: &PlanLimits,
    ) -> ResponseCeiling {
        let model_max = self
            .pricing
            .get(provider, model)
            .map(|d| d.max_output_tokens);

        let Some(requested) = requested else {
            let value = model_max
                .unwrap_or(u32::MAX)
                .min(limits.max_tokens_per_request)
                .min(self.config.default_response_ceiling);
            return ResponseCeiling::unchanged(value);
        };

        let mut ceiling = ResponseCeiling::unchanged(requested);
        if ceiling.value > limits.max_tokens_per_request {
            ceiling.applied.push(Optimization::ClampedToPlan {
                from: ceiling.value,
                to: limits.max_tokens_per_request,
            });
            ceiling.value = limits.max_tokens_per_request;
        }
        if let Some(max) = model_max {
            if ceiling.value > max {
                ceiling.applied.push(Optimization::ClampedToModel {
                    from: ceiling.value,
                    to: max,
                });
                ceiling.value = max;
            }
        }
        ceiling
    }

    /// Decide how (and whether) the request is sent
    pub fn optimize(
        &self,
        prompt: Invocation,
        prompt_units: u32,
        provider: &str,
        model: &str,
        response_ceiling: ResponseCeiling,
        budget: &BudgetDecision,
    ) -> OptimizationPlan {
        let ResponseCeiling {
            value: mut ceiling,
            mut applied,
        } = response_ceiling;

        if prompt_units > self.config.prompt_warning_threshold {
            debug!(prompt_units, "Prompt above warning threshold, sending unchanged");
            applied.push(Optimization::PromptLengthWarning {
                units: prompt_units,
                threshold: self.config.prompt_warning_threshold,
            });
        }

        let verdict = if budget.approved {
            Verdict::Proceed
        } else if let Some(shrunk) = self.shrink_to_fit(prompt_units, ceiling, budget) {
            debug!(from = ceiling, to = shrunk, "Shrinking response ceiling to fit budget");
            applied.push(Optimization::ShrunkToBudget {
                from: ceiling,
                to: shrunk,
            });
            ceiling = shrunk;
            Verdict::Proceed
        } else {
            Verdict::Reject(Box::new(budget.clone()))
        };

        if matches!(verdict, Verdict::Proceed) {
            if let Some(suggestion) = self.cheaper_suggestion(prompt_units, provider, model) {
                applied.push(suggestion);
            }
        }

        OptimizationPlan {
            final_prompt: prompt,
            final_response_ceiling: ceiling,
            prompt_units,
            applied_optimizations: applied,
            verdict,
        }
    }

    /// A smaller ceiling that fits the units left today, when that is the only problem
    fn shrink_to_fit(&self, prompt_units: u32, ceiling: u32, budget: &BudgetDecision) -> Option<u32> {
        if !budget.only_tokens_exceeded() {
            return None;
        }
        let remaining = budget.check(BudgetCheckKind::DailyTokens)?.remaining() as u64;
        if remaining == 0 {
            return None;
        }
        let available = remaining.saturating_sub(u64::from(prompt_units));
        if available < u64::from(self.config.min_response_tokens) {
            return None;
        }
        let available = u32::try_from(available).unwrap_or(u32::MAX);
        Some(ceiling.min(available))
    }

    fn cheaper_suggestion(&self, prompt_units: u32, provider: &str, model: &str) -> Option<Optimization> {
        if prompt_units >= self.config.small_prompt_threshold {
            return None;
        }
        let current = self.pricing.get(provider, model)?;
        if !current.tier().is_high_cost() {
            return None;
        }
        let cheaper = self.pricing.cheaper_alternative(provider, model)?;
        Some(Optimization::CheaperModelSuggested {
            model: cheaper.model,
            input_cost_per_million: cheaper.input_cost_per_million,
        })
    }
}
