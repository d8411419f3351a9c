use crate::{
    error::Result,
    geofile::{AttributeValue, Attributes},
};

use super::{conform_to_schema, Tabular};

/// Rows of attributes without geometry, e.g. the result of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    columns: Vec<String>,
    rows: Vec<Attributes>,
}

impl AttributeTable {
    pub fn new(columns: Vec<String>, rows: Vec<Attributes>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| conform_to_schema(&columns, row, index))
            .collect::<Result<Vec<Attributes>>>()?;
        Ok(Self { columns, rows })
    }

    /// Build a table from positional rows, each holding one value per column.
    pub fn from_values(columns: Vec<String>, rows: Vec<Vec<AttributeValue>>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect();
        Self::new(columns, rows)
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&AttributeValue>> {
        self.require_column(name)?;
        Ok(self.rows.iter().filter_map(|row| row.get(name)).collect())
    }
}

impl Tabular for AttributeTable {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row(&self, index: usize) -> &Attributes {
        &self.rows[index]
    }

    fn derive(&self, columns: Vec<String>, rows: Vec<(usize, Attributes)>) -> Result<Self> {
        Self::new(columns, rows.into_iter().map(|(_, row)| row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeTable;
    use crate::{error::AnalysisError, geofile::AttributeValue, table::Tabular};

    #[test]
    fn test_from_values_checks_row_width() {
        let columns = vec!["code".to_string(), "population".to_string()];
        let table = AttributeTable::from_values(
            columns.clone(),
            vec![vec!["E09000002".into(), AttributeValue::Integer(218_900)]],
        )
        .unwrap();
        assert_eq!(1, table.row_count());
        assert_eq!(
            vec![&AttributeValue::Integer(218_900)],
            table.column("population").unwrap()
        );

        let short = AttributeTable::from_values(columns, vec![vec!["E09000003".into()]]);
        assert!(matches!(
            short,
            Err(AnalysisError::SchemaMismatch { index: 0 })
        ));
    }

    #[test]
    fn test_unknown_column() {
        let table = AttributeTable::new(vec!["code".to_string()], vec![]).unwrap();
        assert!(matches!(
            table.column("name"),
            Err(AnalysisError::UnknownColumn(name)) if name == "name"
        ));
    }
}
