use std::collections::HashSet;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::pricing::{self, match_catalog_entry, now_stamp};
use crate::services::{SharedConfig, open_db};
use meter_core::{PriceRule, PriceRuleInput};
use meter_db::Db;

/// Outcome of pricing the observed models from a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSyncReport {
    /// Observed models that received a rule.
    pub priced: Vec<String>,
    /// Observed models that already had an exact rule; left untouched.
    pub kept: Vec<String>,
    /// Observed models with no catalog row.
    pub unmatched: Vec<String>,
    /// Stored entries whose cost changed afterwards.
    pub recomputed: usize,
}

#[derive(Clone)]
pub struct PricingService {
    config: SharedConfig,
}

impl PricingService {
    pub(super) fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    fn db(&self) -> Result<Db> {
        open_db(&self.config)
    }

    pub fn list_rules(&self) -> Result<Vec<PriceRule>> {
        let db = self.db()?;
        Ok(db.list_price_rules()?)
    }

    /// Returns the number of entries repriced.
    pub fn upsert_rule(&self, rule: &PriceRuleInput) -> Result<usize> {
        validate_rule(rule)?;
        let mut db = self.db()?;
        db.upsert_price_rule(rule, &now_stamp())?;
        self.after_change(&mut db)
    }

    pub fn delete_rule(&self, model: &str) -> Result<usize> {
        let mut db = self.db()?;
        if !db.delete_price_rule(model.trim())? {
            return Err(AppError::NotFound(format!("price rule {} not found", model)));
        }
        self.after_change(&mut db)
    }

    pub fn replace_rules(&self, rules: &[PriceRuleInput]) -> Result<usize> {
        rules.iter().try_for_each(validate_rule)?;
        let mut db = self.db()?;
        db.replace_price_rules(rules, &now_stamp())?;
        self.after_change(&mut db)
    }

    /// Bulk upsert of catalog rows; rules the catalog does not list survive.
    pub fn sync_catalog(&self, rows: &[PriceRuleInput]) -> Result<usize> {
        rows.iter().try_for_each(validate_rule)?;
        let mut db = self.db()?;
        let written = db.upsert_price_rules(rows, &now_stamp())?;
        tracing::info!(written, "price catalog synced");
        self.after_change(&mut db)
    }

    /// Prices every model seen in the store from `catalog`, keyed by the
    /// observed name. Models that already have an exact rule are kept as is.
    pub fn sync_catalog_for_models(&self, catalog: &[PriceRuleInput]) -> Result<CatalogSyncReport> {
        let mut db = self.db()?;
        let existing: HashSet<String> = db
            .list_price_rules()?
            .into_iter()
            .map(|rule| rule.model)
            .collect();
        let mut report = CatalogSyncReport::default();
        let mut rows = Vec::new();
        for model in db.distinct_models()? {
            if existing.contains(&model) {
                report.kept.push(model);
                continue;
            }
            match match_catalog_entry(catalog, &model) {
                Some(entry) => {
                    rows.push(PriceRuleInput {
                        model: model.clone(),
                        ..entry.clone()
                    });
                    report.priced.push(model);
                }
                None => report.unmatched.push(model),
            }
        }
        if !report.unmatched.is_empty() {
            tracing::debug!(models = ?report.unmatched, "no catalog price for models");
        }
        if rows.is_empty() {
            return Ok(report);
        }
        db.upsert_price_rules(&rows, &now_stamp())?;
        report.recomputed = self.after_change(&mut db)?;
        Ok(report)
    }

    pub fn recompute_costs(&self) -> Result<usize> {
        let mut db = self.db()?;
        Ok(db.update_entry_costs()?)
    }

    fn after_change(&self, db: &mut Db) -> Result<usize> {
        if let Err(err) = pricing::sync_pricing_defaults(
            &self.config.db_path,
            &self.config.pricing_defaults_path,
        ) {
            tracing::warn!(error = %err, "failed to update pricing defaults");
        }
        Ok(db.update_entry_costs()?)
    }
}

fn validate_rule(rule: &PriceRuleInput) -> Result<()> {
    if rule.model.trim().is_empty() {
        return Err(AppError::InvalidInput("price rule model is empty".to_string()));
    }
    let rates = [rule.input_per_1m, rule.cached_input_per_1m, rule.output_per_1m];
    if rates.iter().any(|rate| !rate.is_finite() || *rate < 0.0) {
        return Err(AppError::InvalidInput(format!(
            "price rule {} has a negative or non-finite rate",
            rule.model
        )));
    }
    Ok(())
}
