use crate::cert::record::ListColumn;
use std::fmt::Display;

/// Trait for types that can provide column values
pub trait GetColumnValue {
    fn get_column_value(&self, column: &ListColumn) -> String;
}

/// Output format configuration
#[derive(Clone, Debug)]
pub struct OutputFormat {
    pub raw: bool,
}

/// Build table data from rows and columns, headers first
pub fn build_table_data<T>(rows: &[T], columns: &[ListColumn]) -> Vec<Vec<String>>
where
    T: GetColumnValue,
{
    let mut data = Vec::with_capacity(rows.len() + 1);
    data.push(columns.iter().map(|col| col.header().to_string()).collect());
    for row in rows {
        data.push(columns.iter().map(|col| row.get_column_value(col)).collect());
    }
    data
}

impl OutputFormat {
    pub fn new(raw: bool) -> Self {
        Self { raw }
    }

    /// Print tabular data - either raw (tab-separated) or formatted (column-aligned)
    pub fn print_table<T>(&self, data: &[Vec<T>])
    where
        T: Display + AsRef<str>,
    {
        if data.is_empty() {
            return;
        }

        if self.raw {
            // Raw output: tab-separated values
            for row in data {
                let line = row
                    .iter()
                    .map(|cell| cell.as_ref())
                    .collect::<Vec<_>>()
                    .join("\t");
                println!("{line}");
            }
        } else {
            self.print_formatted_table(data);
        }
    }

    /// Print key-value pairs
    pub fn print_key_value<K, V>(&self, pairs: &[(K, V)])
    where
        K: Display + AsRef<str>,
        V: Display + AsRef<str>,
    {
        let data: Vec<Vec<String>> = pairs
            .iter()
            .map(|(k, v)| vec![k.to_string(), v.to_string()])
            .collect();

        self.print_table(&data);
    }

    fn print_formatted_table<T>(&self, data: &[Vec<T>])
    where
        T: Display + AsRef<str>,
    {
        if data.is_empty() {
            return;
        }

        // Calculate column widths
        let num_cols = data[0].len();
        let mut col_widths = vec![0; num_cols];

        for row in data {
            for (i, cell) in row.iter().enumerate() {
                col_widths[i] = col_widths[i].max(cell.as_ref().len());
            }
        }

        for row in data {
            let formatted_cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    if i == row.len() - 1 {
                        // Last column - no padding needed
                        cell.to_string()
                    } else {
                        format!("{:<width$}", cell.as_ref(), width = col_widths[i])
                    }
                })
                .collect();

            println!("{}", formatted_cells.join("  "));
        }
    }
}
