//! 🏷️ Fields: the guest list for every access-log column.
//!
//! The load balancer writes thirty columns per line whether you asked for them or not.
//! This module decides which ones get into the club. You hand it a comma-separated
//! allow-list, it checks every name against the schema, and it hands back a
//! [`FieldSelection`] that the record parser consults once per column per line.
//!
//! 🧠 Knowledge graph:
//! - [`FIELD_NAMES`]: the fixed ALB schema, in wire order. Index 1 is the timestamp.
//! - [`FieldSelection::resolve`]: blank selection means "everyone's invited".
//! - The parser only ever asks by index, so lookups are a `Vec<bool>` and not a hash set.
//!
//! 🦆 The duck is on the guest list. The duck is always on the guest list.

use anyhow::{Result, bail};

/// 📜 The ALB access-log columns, in the order the load balancer writes them.
///
/// See the "Access log entries" page of the Elastic Load Balancing docs. If AWS ever
/// adds a thirty-first column, this table and every log line disagree, and the parser
/// will say so loudly.
pub const FIELD_NAMES: [&str; 30] = [
    "type",
    "time",
    "elb",
    "client:port",
    "target:port",
    "request_processing_time",
    "target_processing_time",
    "response_processing_time",
    "elb_status_code",
    "target_status_code",
    "received_bytes",
    "sent_bytes",
    "request",
    "user_agent",
    "ssl_cipher",   // https listener
    "ssl_protocol", // https listener
    "target_group_arn",
    "trace_id",
    "domain_name",     // https listener
    "chosen_cert_arn", // https listener
    "matched_rule_priority",
    "request_creation_time",
    "actions_executed",
    "redirect_url",
    "error_reason",
    "target:port_list",
    "target_status_code_list",
    "classification",
    "classification_reason",
    "conn_trace_id", // https listener
];

/// 🔢 How many tokens a well-formed line must have.
pub const FIELD_COUNT: usize = FIELD_NAMES.len();

/// ⏰ Schema position of the request timestamp.
pub const TIME_FIELD_INDEX: usize = 1;

/// 🎟️ A validated subset of [`FIELD_NAMES`].
///
/// Built once from config, then shared read-only by every object pipeline.
/// Invariant: every selected name exists in the schema. There is no way to
/// construct one that breaks this, short of `unsafe` and a bad attitude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    // -- one flag per schema column, indexed like FIELD_NAMES
    included: Vec<bool>,
}

impl FieldSelection {
    /// 🚪 Resolve a user-supplied selection string against the schema.
    ///
    /// - Empty or blank selection: every column is selected.
    /// - Otherwise: split on `,`, trim each token, and look it up. The first unknown
    ///   token fails the whole thing with `invalid field name '<token>' provided`.
    ///   Nothing is half-applied; you get a full selection or an error.
    pub fn resolve(selection: &str) -> Result<Self> {
        if selection.trim().is_empty() {
            // 🎉 open bar
            return Ok(Self::all());
        }

        let mut included = vec![false; FIELD_COUNT];
        for raw_token in selection.split(',') {
            let the_token = raw_token.trim();
            match FIELD_NAMES.iter().position(|name| *name == the_token) {
                Some(index) => included[index] = true,
                // -- 💀 not on the list, not getting in
                None => bail!("invalid field name '{}' provided", the_token),
            }
        }

        Ok(Self { included })
    }

    /// 🌍 Every column. The "I'll figure out what I need later" selection.
    pub fn all() -> Self {
        Self {
            included: vec![true; FIELD_COUNT],
        }
    }

    /// ✅ Is the column at `index` selected? Out-of-range indices are never selected.
    pub fn include_field(&self, index: usize) -> bool {
        self.included.get(index).copied().unwrap_or(false)
    }

    /// ✅ Same question, asked by name. Names outside the schema are never selected.
    pub fn includes_name(&self, name: &str) -> bool {
        FIELD_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .is_some_and(|index| self.include_field(index))
    }

    /// 🏷️ Schema name for a column index, or `invalid field index <i>` if there isn't one.
    pub fn name_for_index(&self, index: usize) -> Result<&'static str> {
        match FIELD_NAMES.get(index) {
            Some(name) => Ok(*name),
            None => bail!("invalid field index {}", index),
        }
    }

    /// 🔢 How many columns made the cut.
    pub fn len(&self) -> usize {
        self.included.iter().filter(|flag| **flag).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self::all()
    }
}
