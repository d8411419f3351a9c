use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    error::Result,
    geofile::{AttributeValue, Attributes},
};

use super::{MergedColumns, Tabular};

/// Left rows whose join key found no partner, reported after a join for review.
#[derive(Debug, Clone)]
pub struct JoinKeyMismatch<L> {
    pub column: String,
    /// The unmatched left rows, as returned by [`anti_join`].
    pub unmatched: L,
    /// Distinct unmatched key values with their row counts, in order of first occurrence.
    pub keys: Vec<(AttributeValue, usize)>,
}

impl<L: Tabular> JoinKeyMismatch<L> {
    pub fn is_empty(&self) -> bool {
        self.unmatched.row_count() == 0
    }
}

/// Right row indices by join key. Null keys are left out since they never match.
fn key_index<'a, R: Tabular>(right: &'a R, on: &str) -> HashMap<&'a AttributeValue, Vec<usize>> {
    let mut index: HashMap<&AttributeValue, Vec<usize>> = HashMap::new();
    for (row_index, row) in right.rows().enumerate() {
        if let Some(key) = row.get(on).filter(|key| !key.is_null()) {
            index.entry(key).or_default().push(row_index);
        }
    }
    index
}

fn matches<'a>(
    index: &'a HashMap<&AttributeValue, Vec<usize>>,
    row: &Attributes,
    on: &str,
) -> Option<&'a Vec<usize>> {
    row.get(on)
        .filter(|key| !key.is_null())
        .and_then(|key| index.get(key))
}

/// Keep every row of `left`, extended with the columns of every `right` row whose `on` value is
/// equal. A left row matching several right rows is repeated once per match, in right order.
/// Unmatched left rows get nulls. The `on` column of `right` is not repeated in the output.
pub fn left_join<L: Tabular, R: Tabular>(left: &L, right: &R, on: &str) -> Result<L> {
    left.require_column(on)?;
    right.require_column(on)?;
    let index = key_index(right, on);
    let merged = MergedColumns::new(left.columns(), right.columns(), Some(on));

    let mut rows = Vec::with_capacity(left.row_count());
    for (row_index, row) in left.rows().enumerate() {
        match matches(&index, row, on) {
            Some(right_indices) => {
                for right_index in right_indices {
                    rows.push((row_index, merged.merge(row, Some(right.row(*right_index)))));
                }
            }
            None => rows.push((row_index, merged.merge(row, None))),
        }
    }
    log::debug!(
        "Joined {} left rows with {} right rows on '{}' into {} rows",
        left.row_count(),
        right.row_count(),
        on,
        rows.len()
    );
    left.derive(merged.output_columns(), rows)
}

/// The rows of `left` whose `on` value matches no row of `right`, unchanged.
pub fn anti_join<L: Tabular, R: Tabular>(left: &L, right: &R, on: &str) -> Result<L> {
    left.require_column(on)?;
    right.require_column(on)?;
    let index = key_index(right, on);
    let rows = left
        .rows()
        .enumerate()
        .filter(|(_, row)| matches(&index, row, on).is_none())
        .map(|(row_index, row)| (row_index, row.clone()))
        .collect();
    left.derive(left.columns().to_vec(), rows)
}

/// [`left_join`], plus a report of the left keys that found no partner. Every unmatched key is
/// logged as a warning, a mismatch is never an error.
pub fn left_join_with_diagnostics<L: Tabular, R: Tabular>(
    left: &L,
    right: &R,
    on: &str,
) -> Result<(L, JoinKeyMismatch<L>)> {
    let joined = left_join(left, right, on)?;
    let unmatched = anti_join(left, right, on)?;

    let mut keys: IndexMap<AttributeValue, usize> = IndexMap::new();
    for row in unmatched.rows() {
        let key = row.get(on).cloned().unwrap_or_default();
        *keys.entry(key).or_default() += 1;
    }
    for (key, count) in &keys {
        log::warn!(
            "No match for {} = {} ({} rows), review the key before recoding it",
            on,
            key,
            count
        );
    }
    if !keys.is_empty() {
        log::warn!(
            "{} of {} rows found no match on '{}'",
            unmatched.row_count(),
            left.row_count(),
            on
        );
    }
    Ok((
        joined,
        JoinKeyMismatch {
            column: on.to_string(),
            unmatched,
            keys: keys.into_iter().collect(),
        },
    ))
}

/// Replace every `from` value of `column` with `to`. Joins compare keys exactly, so a known
/// miscode has to be fixed this way before joining.
pub fn recode<T: Tabular>(
    table: &T,
    column: &str,
    from: &AttributeValue,
    to: &AttributeValue,
) -> Result<T> {
    table.require_column(column)?;
    let mut recoded = 0;
    let rows = table
        .rows()
        .enumerate()
        .map(|(row_index, row)| {
            let mut row = row.clone();
            if let Some(value) = row.get_mut(column) {
                if value == from {
                    *value = to.clone();
                    recoded += 1;
                }
            }
            (row_index, row)
        })
        .collect();
    log::info!("Recoded {} rows of '{}' from {} to {}", recoded, column, from, to);
    table.derive(table.columns().to_vec(), rows)
}


#[cfg(test)]
mod feature_tests {
    use super::left_join;
    use crate::{
        geofile::{collection::tests::square, AttributeValue, FeatureCollection},
        table::{AttributeTable, Tabular},
    };

    #[test]
    fn test_left_join_keeps_geometry() {
        let parks = FeatureCollection::from_features(
            vec![square(0.0, 0.0, 1.0, "Victoria"), square(5.0, 0.0, 2.0, "Hyde")],
            None,
        )
        .unwrap();
        let visitors = AttributeTable::from_values(
            vec!["name".to_string(), "visitors".to_string()],
            vec![vec!["Hyde".into(), AttributeValue::Integer(9000)]],
        )
        .unwrap();
        let joined = left_join(&parks, &visitors, "name").unwrap();
        assert_eq!(2, joined.row_count());
        assert_eq!(parks.features()[1].geometry, joined.features()[1].geometry);
        assert_eq!(AttributeValue::Integer(9000), joined.row(1)["visitors"]);
    }
}
