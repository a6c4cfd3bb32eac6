use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ORDER_FIELD: &str = "created_at";

/// Equality filters, ANDed. Ordered so generated requests are stable.
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Query,
    Count,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Count => "count",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub ascending: bool,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            field: DEFAULT_ORDER_FIELD.to_string(),
            ascending: false,
        }
    }
}

/// Inclusive row window, zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    /// Rows covered by the window; zero when `to` precedes `from`.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.to - self.from + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to < self.from
    }
}

/// Declarative query against one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<RowRange>,
}

impl QueryDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: None,
            filters: Filters::new(),
            order: None,
            limit: None,
            range: None,
        }
    }

    pub fn select(mut self, projection: impl Into<String>) -> Self {
        self.select = Some(projection.into());
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            field: field.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some(RowRange { from, to });
        self
    }

    /// Ordering actually sent to the store: newest first unless overridden.
    pub fn effective_order(&self) -> Order {
        self.order.clone().unwrap_or_default()
    }

    /// Projection with insignificant whitespace removed. Quoted segments are kept intact.
    pub fn compact_select(&self) -> String {
        let raw = self.select.as_deref().unwrap_or("*");
        let mut out = String::with_capacity(raw.len());
        let mut quoted = false;
        for ch in raw.chars() {
            if ch == '"' {
                quoted = !quoted;
            }
            if ch.is_whitespace() && !quoted {
                continue;
            }
            out.push(ch);
        }
        if out.is_empty() {
            out.push('*');
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_range_counts_inclusive_rows() {
        assert_eq!(RowRange { from: 20, to: 39 }.len(), 20);
        assert_eq!(RowRange { from: 7, to: 7 }.len(), 1);
    }

    #[test]
    fn inverted_row_range_is_empty() {
        let range = RowRange { from: 5, to: 4 };
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
    }
}
