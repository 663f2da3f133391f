//! Tabular entries: rows of text/sensor cells under named columns.

use parking_lot::RwLock;

/// One cell of a table row.
///
/// Cells mirror the scalar entry shapes (text and sensor) but are owned by
/// their table and are not individually addressable in the registry.
#[derive(Debug, Clone)]
pub enum TableCell {
    Text {
        id: String,
        name: String,
        value: String,
    },
    Sensor {
        id: String,
        name: String,
        value: f64,
        unit: String,
    },
}

impl TableCell {
    pub fn id(&self) -> &str {
        match self {
            TableCell::Text { id, .. } => id,
            TableCell::Sensor { id, .. } => id,
        }
    }

    pub fn display_value(&self) -> String {
        match self {
            TableCell::Text { value, .. } => value.clone(),
            TableCell::Sensor { value, unit, .. } => {
                if unit.is_empty() {
                    format!("{}", value)
                } else {
                    format!("{} {}", value, unit)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct TableData {
    columns: Vec<String>,
    rows: Vec<Vec<TableCell>>,
}

/// A 2-D structure of rows and columns, replaced wholesale by the owning
/// plugin on update. Its string form is the comma-joined first row.
#[derive(Debug)]
pub struct TableEntry {
    id: String,
    name: String,
    data: RwLock<TableData>,
}

impl TableEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            data: RwLock::new(TableData {
                columns,
                rows: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> Vec<String> {
        self.data.read().columns.clone()
    }

    pub fn rows(&self) -> Vec<Vec<TableCell>> {
        self.data.read().rows.clone()
    }

    /// Replace the table contents.
    pub fn set_rows(&self, columns: Vec<String>, rows: Vec<Vec<TableCell>>) {
        let mut data = self.data.write();
        data.columns = columns;
        data.rows = rows;
    }

    /// Comma-joined first row, or empty string for an empty table.
    pub fn first_row_string(&self) -> String {
        let data = self.data.read();
        match data.rows.first() {
            Some(row) => row
                .iter()
                .map(|cell| cell.display_value())
                .collect::<Vec<_>>()
                .join(", "),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Vec<TableCell>> {
        vec![
            vec![
                TableCell::Text {
                    id: "core0".into(),
                    name: "Core 0".into(),
                    value: "Core 0".into(),
                },
                TableCell::Sensor {
                    id: "core0-load".into(),
                    name: "Load".into(),
                    value: 12.5,
                    unit: "%".into(),
                },
            ],
            vec![
                TableCell::Text {
                    id: "core1".into(),
                    name: "Core 1".into(),
                    value: "Core 1".into(),
                },
                TableCell::Sensor {
                    id: "core1-load".into(),
                    name: "Load".into(),
                    value: 40.0,
                    unit: "%".into(),
                },
            ],
        ]
    }

    #[test]
    fn test_first_row_string() {
        let table = TableEntry::new("cores", "Cores", vec!["Core".into(), "Load".into()]);
        assert_eq!(table.first_row_string(), "");

        table.set_rows(table.columns(), sample_rows());
        assert_eq!(table.first_row_string(), "Core 0, 12.5 %");
    }

    #[test]
    fn test_replace_rows() {
        let table = TableEntry::new("cores", "Cores", vec!["Core".into(), "Load".into()]);
        table.set_rows(table.columns(), sample_rows());
        assert_eq!(table.rows().len(), 2);

        table.set_rows(table.columns(), Vec::new());
        assert!(table.rows().is_empty());
    }
}
