//! Table output formatting

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

/// Format data as a table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

#[derive(Tabled)]
struct Field {
    #[tabled(rename = "FIELD")]
    name: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Two-column `FIELD | VALUE` table for single-record views
pub fn format_fields(fields: &[(&str, String)]) -> String {
    let rows: Vec<Field> = fields
        .iter()
        .map(|(name, value)| Field {
            name: name.to_string(),
            value: value.clone(),
        })
        .collect();
    format_table(&rows)
}
