pub mod aggregate;
pub mod attribute_table;
pub mod join;

pub use self::attribute_table::AttributeTable;

use crate::{
    error::{AnalysisError, Result},
    geofile::Attributes,
};

/// Row-oriented access shared by feature collections and plain attribute tables, so that
/// aggregation and joins work on either.
pub trait Tabular: Sized {
    fn columns(&self) -> &[String];

    fn row_count(&self) -> usize;

    fn row(&self, index: usize) -> &Attributes;

    /// Build a container of the same kind whose rows derive from rows of `self`. Each new row is
    /// paired with the index of its source row, which carries over anything besides attributes
    /// (e.g. geometry).
    fn derive(&self, columns: Vec<String>, rows: Vec<(usize, Attributes)>) -> Result<Self>;

    fn rows(&self) -> Box<dyn Iterator<Item = &Attributes> + '_> {
        Box::new((0..self.row_count()).map(move |index| self.row(index)))
    }

    fn require_column(&self, column: &str) -> Result<()> {
        if self.columns().iter().any(|name| name == column) {
            Ok(())
        } else {
            Err(AnalysisError::UnknownColumn(column.to_string()))
        }
    }
}

/// Same table with column `from` renamed to `to`, keeping its position.
pub fn rename_column<T: Tabular>(table: &T, from: &str, to: &str) -> Result<T> {
    table.require_column(from)?;
    if from != to && table.columns().iter().any(|name| name == to) {
        return Err(AnalysisError::DuplicateColumn(to.to_string()));
    }
    let rename = |name: &String| {
        if name == from {
            to.to_string()
        } else {
            name.clone()
        }
    };
    let columns = table.columns().iter().map(rename).collect();
    let rows = table
        .rows()
        .enumerate()
        .map(|(index, row)| {
            let renamed = row
                .iter()
                .map(|(name, value)| (rename(name), value.clone()))
                .collect();
            (index, renamed)
        })
        .collect();
    table.derive(columns, rows)
}

/// Check that `attributes` carries exactly `columns` and return them in schema order.
pub(crate) fn conform_to_schema(
    columns: &[String],
    mut attributes: Attributes,
    index: usize,
) -> Result<Attributes> {
    if attributes.len() != columns.len() {
        return Err(AnalysisError::SchemaMismatch { index });
    }
    let mut ordered = Attributes::with_capacity(columns.len());
    for column in columns {
        match attributes.swap_remove(column) {
            Some(value) => {
                ordered.insert(column.clone(), value);
            }
            None => return Err(AnalysisError::SchemaMismatch { index }),
        }
    }
    Ok(ordered)
}

/// Output names of columns from two inputs combined side by side. A name present on both sides is
/// suffixed with `_1` on the left and `_2` on the right. `skip_right` names a right column left
/// out of the output, e.g. a join key.
pub(crate) struct MergedColumns {
    pub left: Vec<(String, String)>,
    pub right: Vec<(String, String)>,
}

impl MergedColumns {
    pub fn new(left: &[String], right: &[String], skip_right: Option<&str>) -> Self {
        let right: Vec<&String> = right
            .iter()
            .filter(|name| Some(name.as_str()) != skip_right)
            .collect();
        let left_names = left
            .iter()
            .map(|name| {
                let output = if right.contains(&name) {
                    format!("{}_1", name)
                } else {
                    name.clone()
                };
                (name.clone(), output)
            })
            .collect();
        let right_names = right
            .iter()
            .map(|name| {
                let output = if left.contains(*name) {
                    format!("{}_2", name)
                } else {
                    (*name).clone()
                };
                ((*name).clone(), output)
            })
            .collect();
        Self {
            left: left_names,
            right: right_names,
        }
    }

    pub fn output_columns(&self) -> Vec<String> {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|(_, output)| output.clone())
            .collect()
    }

    /// Combine a left row with an optional right row. Missing right rows produce nulls.
    pub fn merge(&self, left: &Attributes, right: Option<&Attributes>) -> Attributes {
        let mut merged = Attributes::with_capacity(self.left.len() + self.right.len());
        for (source, output) in &self.left {
            let value = left.get(source).cloned().unwrap_or_default();
            merged.insert(output.clone(), value);
        }
        for (source, output) in &self.right {
            let value = right
                .and_then(|row| row.get(source))
                .cloned()
                .unwrap_or_default();
            merged.insert(output.clone(), value);
        }
        merged
    }
}
