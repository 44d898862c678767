//! Result table: folded outcomes with partitioned columns
//!
//! The table is rebuilt from the queue's full snapshots rather than diffed,
//! so re-folding after a partial failure is always safe. Columns fall into
//! three groups: input arguments (schema order), a fixed response-derived
//! set, and score columns attached by external evaluators.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::param::{schema_position, ArgumentCombo, ParamValue};
use crate::queue::RequestOutcome;

/// Response-derived columns, in table order.
pub const RESPONSE_COLUMNS: &[&str] = &[
    "latency",
    "response",
    "response_id",
    "response_object",
    "response_created",
    "response_model",
    "response_system_fingerprint",
    "prompt_tokens",
    "completion_tokens",
    "total_tokens",
    "error",
];

/// Which partition a column belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnGroup {
    /// Derived from argument combinations
    Input,
    /// Derived from responses and latencies
    Response,
    /// Attached by an external evaluator
    Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Column {
    group: ColumnGroup,
    cells: Vec<Value>,
}

/// Accumulated experiment results in column-major form.
///
/// Rows are append-only: every fold appends to the rows restored from a
/// loaded snapshot, and nothing is ever removed or updated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: IndexMap<String, Column>,
}

impl ResultTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the full table from complete queue snapshots.
    ///
    /// `base` carries rows restored from a loaded snapshot; folded records
    /// are appended after them. Score columns are not carried over here: the
    /// experiment re-attaches them from its registry after every fold,
    /// padding new rows with null.
    #[must_use]
    pub fn rebuild(
        base: Option<&Self>,
        input_args: &[ArgumentCombo],
        results: &[RequestOutcome],
        latencies: &[Duration],
    ) -> Self {
        let base_rows = base.map_or(0, Self::row_count);
        let new_rows = input_args.len();

        // input columns: union of the base's and every key the combos assign,
        // in canonical schema order
        let mut input_names: Vec<String> = base
            .map(|t| t.input_columns().into_iter().map(String::from).collect())
            .unwrap_or_default();
        for combo in input_args {
            for (name, _) in combo.iter() {
                if !input_names.iter().any(|n| n == name) {
                    input_names.push(name.to_string());
                }
            }
        }
        input_names.sort_by_key(|name| schema_position(name));

        let mut columns = IndexMap::new();
        for name in &input_names {
            let mut cells = base_column_cells(base, name, base_rows);
            cells.reserve(new_rows);
            for combo in input_args {
                cells.push(match combo.get(name) {
                    Some(ParamValue::Given(v)) => v.clone(),
                    Some(ParamValue::Omit) | None => Value::Null,
                });
            }
            columns.insert(
                name.clone(),
                Column {
                    group: ColumnGroup::Input,
                    cells,
                },
            );
        }

        for &name in RESPONSE_COLUMNS {
            let mut cells = base_column_cells(base, name, base_rows);
            cells.reserve(new_rows);
            for (outcome, latency) in results.iter().zip(latencies) {
                cells.push(response_cell(name, outcome, *latency));
            }
            columns.insert(
                name.to_string(),
                Column {
                    group: ColumnGroup::Response,
                    cells,
                },
            );
        }

        Self { columns }
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns
            .first()
            .map_or(0, |(_, column)| column.cells.len())
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Check that every column holds exactly one cell per row.
    ///
    /// A decoded snapshot can carry columns of unequal length; rendering,
    /// export, and folding all assume alignment.
    ///
    /// # Errors
    ///
    /// Returns a state-shape error naming the first misaligned column.
    pub(crate) fn check_aligned(&self) -> Result<()> {
        let rows = self.row_count();
        for (name, column) in &self.columns {
            if column.cells.len() != rows {
                return Err(Error::StateShape(format!(
                    "column '{name}' has {} cells but the table has {rows} rows",
                    column.cells.len()
                )));
            }
        }
        Ok(())
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Cells of one column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|c| c.cells.as_slice())
    }

    /// Partition group of one column.
    #[must_use]
    pub fn group_of(&self, name: &str) -> Option<ColumnGroup> {
        self.columns.get(name).map(|c| c.group)
    }

    fn columns_in_group(&self, group: ColumnGroup) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, column)| column.group == group)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Names of input-argument columns.
    #[must_use]
    pub fn input_columns(&self) -> Vec<&str> {
        self.columns_in_group(ColumnGroup::Input)
    }

    /// Names of response-derived columns.
    #[must_use]
    pub fn response_columns(&self) -> Vec<&str> {
        self.columns_in_group(ColumnGroup::Response)
    }

    /// Names of score columns.
    #[must_use]
    pub fn score_columns(&self) -> Vec<&str> {
        self.columns_in_group(ColumnGroup::Score)
    }

    /// Input columns that took more than one distinct value.
    #[must_use]
    pub fn varied_input_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, column)| column.group == ColumnGroup::Input)
            .filter(|(_, column)| {
                let mut seen: Vec<&Value> = Vec::new();
                for cell in &column.cells {
                    if !seen.contains(&cell) {
                        seen.push(cell);
                    }
                    if seen.len() > 1 {
                        return true;
                    }
                }
                false
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Attach or replace a score column, padding to the current row count.
    pub(crate) fn attach_score(&mut self, name: &str, mut cells: Vec<Value>) {
        cells.resize(self.row_count(), Value::Null);
        self.columns.insert(
            name.to_string(),
            Column {
                group: ColumnGroup::Score,
                cells,
            },
        );
    }

    /// Project onto the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns a state-shape error when a name is missing from the table.
    pub fn project(&self, names: &[String]) -> Result<Self> {
        let mut columns = IndexMap::with_capacity(names.len());
        for name in names {
            let column = self
                .columns
                .get(name)
                .ok_or_else(|| Error::StateShape(format!("column '{name}' missing from table")))?;
            columns.insert(name.clone(), column.clone());
        }
        Ok(Self { columns })
    }

    /// A copy of the table without the named columns.
    #[must_use]
    pub fn hiding(&self, hidden: &[String]) -> Self {
        let columns = self
            .columns
            .iter()
            .filter(|(name, _)| !hidden.iter().any(|h| h == *name))
            .map(|(name, column)| (name.clone(), column.clone()))
            .collect();
        Self { columns }
    }

    /// Export rows as pretty-printed JSON records.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_json_string(&self) -> Result<String> {
        let mut rows = Vec::with_capacity(self.row_count());
        for i in 0..self.row_count() {
            let mut row = serde_json::Map::new();
            for (name, column) in &self.columns {
                row.insert(name.clone(), column.cells[i].clone());
            }
            rows.push(Value::Object(row));
        }
        Ok(serde_json::to_string_pretty(&Value::Array(rows))?)
    }
}

fn base_column_cells(base: Option<&ResultTable>, name: &str, base_rows: usize) -> Vec<Value> {
    base.and_then(|t| t.column(name))
        .map_or_else(|| vec![Value::Null; base_rows], <[Value]>::to_vec)
}

fn response_cell(name: &str, outcome: &RequestOutcome, latency: Duration) -> Value {
    if name == "latency" {
        return serde_json::Number::from_f64(latency.as_secs_f64())
            .map_or(Value::Null, Value::Number);
    }
    match outcome {
        RequestOutcome::Failure(marker) => {
            if name == "error" {
                Value::String(marker.clone())
            } else {
                Value::Null
            }
        }
        RequestOutcome::Success(response) => match name {
            "response" => response.extracted_text().map_or(Value::Null, Value::String),
            "response_id" => opt_text(response.id.as_deref()),
            "response_object" => opt_text(response.object.as_deref()),
            "response_created" => response.created.map_or(Value::Null, Value::from),
            "response_model" => opt_text(response.model.as_deref()),
            "response_system_fingerprint" => opt_text(response.system_fingerprint.as_deref()),
            "prompt_tokens" => response
                .usage
                .map_or(Value::Null, |u| Value::from(u.prompt_tokens)),
            "completion_tokens" => response
                .usage
                .map_or(Value::Null, |u| Value::from(u.completion_tokens)),
            "total_tokens" => response
                .usage
                .map_or(Value::Null, |u| Value::from(u.total_tokens)),
            _ => Value::Null,
        },
    }
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_string()))
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_CELL: usize = 40;
        fn render(value: &Value) -> String {
            let text = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if text.chars().count() > MAX_CELL {
                let cut: String = text.chars().take(MAX_CELL - 3).collect();
                format!("{cut}...")
            } else {
                text
            }
        }

        let names: Vec<&str> = self.column_names().collect();
        writeln!(f, "{}", names.join(" | "))?;
        for i in 0..self.row_count() {
            let cells: Vec<String> = self
                .columns
                .values()
                .map(|column| render(&column.cells[i]))
                .collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}
