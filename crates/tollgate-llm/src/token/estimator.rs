//! Unit estimation: native BPE where we have one, heuristics elsewhere

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

// Loading can only fail if the embedded vocabulary is corrupt; estimation then
// degrades to the heuristic instead of panicking.
static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| cl100k_base().ok());
static O200K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| o200k_base().ok());

/// How a unit count was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Exact count from the provider's BPE vocabulary
    Tiktoken,
    /// Character/word heuristic
    Heuristic,
}

impl EstimationMethod {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tiktoken => "tiktoken",
            Self::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Character/word heuristic parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicProfile {
    /// Characters per unit
    pub chars_per_unit: f64,
    /// Units per whitespace-separated word
    pub units_per_word: f64,
}

impl HeuristicProfile {
    /// `max(chars/4, words*1.3)`
    pub const GENERIC: Self = Self {
        chars_per_unit: 4.0,
        units_per_word: 1.3,
    };

    /// Profile for a provider whose tokenizer is denser than average
    pub const DENSE: Self = Self {
        chars_per_unit: 3.5,
        units_per_word: 1.3,
    };

    /// Pick the profile for a provider id
    #[must_use]
    pub fn for_provider(provider: &str) -> Self {
        match provider {
            "anthropic" => Self::DENSE,
            _ => Self::GENERIC,
        }
    }

    /// Estimate units, rounded up, never below 1
    #[must_use]
    pub fn estimate(&self, text: &str) -> u32 {
        let chars = text.chars().count() as f64;
        let words = text.split_whitespace().count() as f64;
        let by_chars = ceil_units(chars / self.chars_per_unit);
        let by_words = ceil_units(words * self.units_per_word);
        by_chars.max(by_words).max(1.0).min(u32::MAX as f64) as u32
    }
}

// 10 words * 1.3 is 13.000000000000002 in binary floating point; round away
// that noise before taking the ceiling.
fn ceil_units(value: f64) -> f64 {
    ((value * 1e6).round() / 1e6).ceil()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Cl100k,
    O200k,
}

fn native_encoding(provider: &str, model: &str) -> Option<Encoding> {
    if provider != "openai" {
        return None;
    }
    let model = model.to_ascii_lowercase();
    if model.starts_with("gpt-4o")
        || model.starts_with("gpt-4.1")
        || model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
    {
        Some(Encoding::O200k)
    } else if model.starts_with("gpt-4") || model.starts_with("gpt-3.5") {
        Some(Encoding::Cl100k)
    } else {
        None
    }
}

/// Exact count with the provider's vocabulary, if one is bundled
#[must_use]
pub fn count_native(provider: &str, model: &str, text: &str) -> Option<u32> {
    let bpe = match native_encoding(provider, model)? {
        Encoding::Cl100k => CL100K.as_ref()?,
        Encoding::O200k => O200K.as_ref()?,
    };
    let count = bpe.encode_with_special_tokens(text).len();
    Some(u32::try_from(count).unwrap_or(u32::MAX).max(1))
}

/// Estimate units for `text`, preferring an exact count
#[must_use]
pub fn estimate_units(provider: &str, model: &str, text: &str) -> (u32, EstimationMethod) {
    match count_native(provider, model, text) {
        Some(units) => (units, EstimationMethod::Tiktoken),
        None => (
            HeuristicProfile::for_provider(provider).estimate(text),
            EstimationMethod::Heuristic,
        ),
    }
}
