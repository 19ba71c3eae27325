//! Internal build policy: per-handler rules of field → regex.
//!
//! An event is allowed when any rule of its handler matches. A rule matches
//! when every field it names is present and its pattern matches the field
//! value from the start. Handlers without rules allow nothing.

use crate::config::FreshmakerConfig;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub fn is_allowed(config: &FreshmakerConfig, handler: &str, fields: &BTreeMap<&str, String>) -> bool {
    let Some(rules) = config.handler_build_allowlist.get(handler) else {
        debug!(handler = %handler, "No allowlist rules for handler");
        return false;
    };

    rules.iter().any(|rule| {
        rule.iter().all(|(field, pattern)| {
            let Some(value) = fields.get(field.as_str()) else {
                return false;
            };
            match Regex::new(&format!("^(?:{pattern})")) {
                Ok(re) => re.is_match(value),
                Err(e) => {
                    warn!(handler = %handler, field = %field, error = %e, "Invalid allowlist pattern");
                    false
                }
            }
        })
    })
}
