use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{SecondsFormat, Utc};

use crate::error::{AppError, Result};
use meter_core::PriceRuleInput;
use meter_db::Db;

pub fn apply_pricing_defaults(db_path: &Path, defaults_path: &Path) -> Result<()> {
    let rules = if defaults_path.exists() {
        load_pricing_defaults(defaults_path)?
    } else {
        load_initial_pricing()?
    };
    let mut db = Db::open(db_path)?;
    db.replace_price_rules(&rules, &now_stamp())?;
    Ok(())
}

/// Rewrites the defaults file from the stored rules. Nothing is written while
/// the store is empty and no file exists yet.
pub fn sync_pricing_defaults(db_path: &Path, defaults_path: &Path) -> Result<()> {
    let db = Db::open(db_path)?;
    let rules = db.list_price_rules()?;
    if rules.is_empty() && !defaults_path.exists() {
        return Ok(());
    }
    let inputs = rules
        .into_iter()
        .map(|rule| PriceRuleInput {
            model: rule.model,
            input_per_1m: rule.input_per_1m,
            cached_input_per_1m: rule.cached_input_per_1m,
            output_per_1m: rule.output_per_1m,
        })
        .collect::<Vec<_>>();
    write_pricing_defaults(defaults_path, &inputs)
}

pub fn load_pricing_defaults(path: &Path) -> Result<Vec<PriceRuleInput>> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(AppError::from)
}

pub fn load_initial_pricing() -> Result<Vec<PriceRuleInput>> {
    let data = include_str!("../initial-pricing.json");
    serde_json::from_str(data).map_err(AppError::from)
}

pub fn write_pricing_defaults(path: &Path, rules: &[PriceRuleInput]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, rules).map_err(AppError::from)
}

pub(crate) fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drops one trailing `-latest`, `-YYYY-MM-DD`, or `-YYYYMMDD` suffix.
pub fn strip_version_suffix(model: &str) -> Option<&str> {
    if let Some(base) = model.strip_suffix("-latest") {
        return Some(base).filter(|base| !base.is_empty());
    }
    let bytes = model.as_bytes();
    let dashed = bytes.len() > 11 && {
        let tail = &bytes[bytes.len() - 11..];
        tail[0] == b'-'
            && tail[5] == b'-'
            && tail[8] == b'-'
            && [1, 2, 3, 4, 6, 7, 9, 10]
                .iter()
                .all(|&index| tail[index].is_ascii_digit())
    };
    if dashed {
        return Some(&model[..model.len() - 11]);
    }
    let compact = bytes.len() > 9 && {
        let tail = &bytes[bytes.len() - 9..];
        tail[0] == b'-' && tail[1..].iter().all(u8::is_ascii_digit)
    };
    if compact {
        return Some(&model[..model.len() - 9]);
    }
    None
}

/// Finds the catalog row for an observed model: an exact name first, then a
/// match once a date or `-latest` suffix is dropped from either side. When
/// several dated rows collapse onto the model, the newest date wins.
/// Substring containment is never used.
pub fn match_catalog_entry<'a>(
    catalog: &'a [PriceRuleInput],
    model: &str,
) -> Option<&'a PriceRuleInput> {
    if let Some(entry) = catalog.iter().find(|entry| entry.model == model) {
        return Some(entry);
    }
    if let Some(base) = strip_version_suffix(model)
        && let Some(entry) = catalog.iter().find(|entry| entry.model == base)
    {
        return Some(entry);
    }
    catalog
        .iter()
        .filter(|entry| strip_version_suffix(&entry.model) == Some(model))
        .max_by(|a, b| a.model.cmp(&b.model))
}
