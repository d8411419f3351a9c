use indexmap::IndexMap;

use crate::{
    error::{AnalysisError, Result},
    geofile::AttributeValue,
};

use super::{AttributeTable, Tabular};

/// Summary computed over the rows of each group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reducer {
    /// Number of rows, as an integer.
    Count,
    /// Sum of a numeric column, nulls skipped.
    Sum(String),
    /// Mean of a numeric column, nulls skipped. Null when every value is null.
    Mean(String),
}

impl Reducer {
    /// Name of the column holding this reducer's result in an aggregation table.
    pub fn column_name(&self) -> String {
        match self {
            Reducer::Count => "count".to_string(),
            Reducer::Sum(column) => format!("sum_{}", column),
            Reducer::Mean(column) => format!("mean_{}", column),
        }
    }

    fn source_column(&self) -> Option<&str> {
        match self {
            Reducer::Count => None,
            Reducer::Sum(column) | Reducer::Mean(column) => Some(column),
        }
    }

    fn reduce<T: Tabular>(&self, table: &T, indices: &[usize]) -> Result<AttributeValue> {
        match self {
            Reducer::Count => Ok(AttributeValue::Integer(indices.len() as i64)),
            Reducer::Sum(column) => {
                let values = numeric_values(table, column, indices)?;
                Ok(AttributeValue::Real(values.iter().sum()))
            }
            Reducer::Mean(column) => {
                let values = numeric_values(table, column, indices)?;
                if values.is_empty() {
                    return Ok(AttributeValue::Null);
                }
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                Ok(AttributeValue::Real(mean))
            }
        }
    }
}

/// One group: its key values, in key column order, and one value per reducer.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRow {
    pub keys: Vec<AttributeValue>,
    pub values: Vec<AttributeValue>,
}

/// Row indices of `table` grouped by their values in the `keys` columns, groups in order of first
/// occurrence. Null is a key value like any other here.
pub(crate) fn group_rows<T: Tabular>(
    table: &T,
    keys: &[&str],
) -> Result<IndexMap<Vec<AttributeValue>, Vec<usize>>> {
    for key in keys {
        table.require_column(key)?;
    }
    let mut groups: IndexMap<Vec<AttributeValue>, Vec<usize>> = IndexMap::new();
    for (index, row) in table.rows().enumerate() {
        let key = keys
            .iter()
            .map(|column| row.get(*column).cloned().unwrap_or_default())
            .collect();
        groups.entry(key).or_default().push(index);
    }
    Ok(groups)
}

/// Group the rows of `table` by `group_keys` and apply every reducer to each group.
pub fn aggregate<T: Tabular>(
    table: &T,
    group_keys: &[&str],
    reducers: &[Reducer],
) -> Result<Vec<AggregationRow>> {
    for column in reducers.iter().filter_map(Reducer::source_column) {
        table.require_column(column)?;
    }
    let groups = group_rows(table, group_keys)?;
    log::debug!(
        "Aggregating {} rows into {} groups by {:?}",
        table.row_count(),
        groups.len(),
        group_keys
    );
    groups
        .into_iter()
        .map(|(keys, indices)| {
            let values = reducers
                .iter()
                .map(|reducer| reducer.reduce(table, &indices))
                .collect::<Result<Vec<AttributeValue>>>()?;
            Ok(AggregationRow { keys, values })
        })
        .collect()
}

/// Aggregation rows as a table: the key columns followed by one column per reducer.
pub fn aggregation_table(
    group_keys: &[&str],
    reducers: &[Reducer],
    rows: Vec<AggregationRow>,
) -> Result<AttributeTable> {
    let columns = group_keys
        .iter()
        .map(|key| key.to_string())
        .chain(reducers.iter().map(Reducer::column_name))
        .collect();
    let values = rows
        .into_iter()
        .map(|row| row.keys.into_iter().chain(row.values).collect())
        .collect();
    AttributeTable::from_values(columns, values)
}

fn numeric_values<T: Tabular>(table: &T, column: &str, indices: &[usize]) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(indices.len());
    for index in indices {
        match table.row(*index).get(column) {
            None | Some(AttributeValue::Null) => {}
            Some(value) => match value.as_f64() {
                Some(number) => values.push(number),
                None => {
                    return Err(AnalysisError::NotNumeric {
                        column: column.to_string(),
                        value: value.to_string(),
                    })
                }
            },
        }
    }
    Ok(values)
}
