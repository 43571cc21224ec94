//! Encoding of query parameter keys.
//!
//! A key is `[or<k>].[and<n>].field[op]`, where both group prefixes and the
//! operator suffix are optional.

use std::fmt;

/// Comparison operator carried as a `field[op]` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Lte,
    Gt,
    Gte,
    Ne,
    Null,
    In,
    Near,
    Within,
    Empty,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Ne,
        Operator::Null,
        Operator::In,
        Operator::Near,
        Operator::Within,
        Operator::Empty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Ne => "ne",
            Operator::Null => "null",
            Operator::In => "in",
            Operator::Near => "near",
            Operator::Within => "within",
            Operator::Empty => "empty",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == suffix)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `field` or `field[op]`.
pub fn encode(field: &str, operator: Option<Operator>) -> String {
    match operator {
        Some(op) => format!("{field}[{op}]"),
        None => field.to_string(),
    }
}

pub(crate) fn or_prefix(group: u32) -> String {
    format!("[or{group}].")
}

pub(crate) fn and_prefix(group: u32) -> String {
    format!("[and{group}].")
}

/// A decoded parameter key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamKey {
    pub or_group: Option<u32>,
    pub and_group: Option<u32>,
    pub field: String,
    pub operator: Option<Operator>,
}

impl ParamKey {
    /// Split an encoded key into its group prefixes, field and operator.
    ///
    /// Bracketed suffixes that are not known operators stay part of the
    /// field name.
    pub fn parse(key: &str) -> Self {
        let (or_group, rest) = strip_group(key, "[or");
        let (and_group, rest) = strip_group(rest, "[and");

        let (field, operator) = match rest.strip_suffix(']').and_then(|s| s.rsplit_once('[')) {
            Some((field, suffix)) => match Operator::from_suffix(suffix) {
                Some(op) => (field, Some(op)),
                None => (rest, None),
            },
            None => (rest, None),
        };

        Self {
            or_group,
            and_group,
            field: field.to_string(),
            operator,
        }
    }

    pub fn encode(&self) -> String {
        let mut key = String::new();
        if let Some(group) = self.or_group {
            key.push_str(&or_prefix(group));
        }
        if let Some(group) = self.and_group {
            key.push_str(&and_prefix(group));
        }
        key.push_str(&encode(&self.field, self.operator));
        key
    }
}

fn strip_group<'a>(key: &'a str, open: &str) -> (Option<u32>, &'a str) {
    let Some(rest) = key.strip_prefix(open) else {
        return (None, key);
    };
    let Some((number, rest)) = rest.split_once("].") else {
        return (None, key);
    };
    match number.parse() {
        Ok(group) => (Some(group), rest),
        Err(_) => (None, key),
    }
}
