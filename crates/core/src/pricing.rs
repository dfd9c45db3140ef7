use std::cmp::Reverse;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::UsageTokens;

/// Stored price rule. `model` is either an exact model id or a glob pattern
/// containing `*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRule {
    pub model: String,
    pub input_per_1m: f64,
    pub cached_input_per_1m: f64,
    pub output_per_1m: f64,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRuleInput {
    pub model: String,
    pub input_per_1m: f64,
    pub cached_input_per_1m: f64,
    pub output_per_1m: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub input_per_1m: f64,
    pub cached_input_per_1m: f64,
    pub output_per_1m: f64,
}

impl From<&PriceRule> for Rates {
    fn from(rule: &PriceRule) -> Self {
        Self {
            input_per_1m: rule.input_per_1m,
            cached_input_per_1m: rule.cached_input_per_1m,
            output_per_1m: rule.output_per_1m,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub cached_input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
}

impl CostBreakdown {
    pub fn add(&mut self, other: &CostBreakdown) {
        self.input_cost_usd += other.input_cost_usd;
        self.cached_input_cost_usd += other.cached_input_cost_usd;
        self.output_cost_usd += other.output_cost_usd;
        self.total_cost_usd += other.total_cost_usd;
    }
}

pub fn compute_cost_usd(tokens: UsageTokens, rates: &Rates) -> f64 {
    compute_cost_breakdown(tokens, rates).total_cost_usd
}

pub fn compute_cost_breakdown(tokens: UsageTokens, rates: &Rates) -> CostBreakdown {
    // Cached tokens are carved out of input; reasoning is billed as output.
    let non_cached_input = tokens.input_tokens.saturating_sub(tokens.cached_tokens) as f64;
    let cached_input = tokens.cached_tokens as f64;
    let output = tokens.output_tokens.saturating_add(tokens.reasoning_tokens) as f64;
    let input_cost = (non_cached_input / 1_000_000.0) * rates.input_per_1m;
    let cached_input_cost = (cached_input / 1_000_000.0) * rates.cached_input_per_1m;
    let output_cost = (output / 1_000_000.0) * rates.output_per_1m;
    CostBreakdown {
        input_cost_usd: input_cost,
        cached_input_cost_usd: cached_input_cost,
        output_cost_usd: output_cost,
        total_cost_usd: input_cost + cached_input_cost + output_cost,
    }
}

/// Anchored glob match where `*` matches any sequence, including the empty one.
pub fn glob_matches(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut remainder) = value.strip_prefix(first) else {
        return false;
    };
    let rest: Vec<&str> = parts.collect();
    let Some((last, middle)) = rest.split_last() else {
        return remainder.is_empty();
    };
    for part in middle {
        if part.is_empty() {
            continue;
        }
        match remainder.find(part) {
            Some(index) => remainder = &remainder[index + part.len()..],
            None => return false,
        }
    }
    remainder.ends_with(last)
}

/// `(literal characters, total length)`; larger wins.
pub fn pattern_specificity(pattern: &str) -> (usize, usize) {
    let literal = pattern.chars().filter(|ch| *ch != '*').count();
    (literal, pattern.chars().count())
}

/// Resolves a model id to billing rates from a snapshot of price rules.
#[derive(Debug, Clone, Default)]
pub struct PriceMatcher {
    exact: HashMap<String, Rates>,
    wildcards: Vec<(String, Rates)>,
}

impl PriceMatcher {
    pub fn new(rules: &[PriceRule]) -> Self {
        let mut exact = HashMap::new();
        let mut wildcards = Vec::new();
        for rule in rules {
            if rule.model.contains('*') {
                wildcards.push((rule.model.clone(), Rates::from(rule)));
            } else {
                exact.insert(rule.model.clone(), Rates::from(rule));
            }
        }
        // Most specific first; the pattern text breaks full ties so the
        // order never depends on storage order.
        wildcards.sort_by(|(a, _), (b, _)| {
            Reverse(pattern_specificity(a))
                .cmp(&Reverse(pattern_specificity(b)))
                .then_with(|| a.cmp(b))
        });
        Self { exact, wildcards }
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty()
    }

    /// Key of the rule that prices `model`, if any.
    pub fn matched_rule(&self, model: &str) -> Option<&str> {
        if let Some((key, _)) = self.exact.get_key_value(model) {
            return Some(key.as_str());
        }
        self.wildcards
            .iter()
            .find(|(pattern, _)| glob_matches(pattern, model))
            .map(|(pattern, _)| pattern.as_str())
    }

    /// Unmatched models resolve to zero rates.
    pub fn rates_for(&self, model: &str) -> Rates {
        if let Some(rates) = self.exact.get(model) {
            return *rates;
        }
        self.wildcards
            .iter()
            .find(|(pattern, _)| glob_matches(pattern, model))
            .map(|(_, rates)| *rates)
            .unwrap_or_default()
    }

    pub fn cost_for(&self, model: &str, tokens: UsageTokens) -> CostBreakdown {
        compute_cost_breakdown(tokens, &self.rates_for(model))
    }
}
