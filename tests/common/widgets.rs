//! Synthetic widget records shared by the integration suites

use recordset::database::{MemoryFailure, MemoryRow, SqlValue};

pub const INSERT_WIDGET: &str = "INSERT INTO widgets (id, name, category) VALUES ($1, $2, $3)";
pub const SELECT_WIDGETS: &str = "SELECT id, name, category FROM widgets ORDER BY id";

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
    pub category: String,
}

impl Widget {
    pub fn new(id: i64, category: &str) -> Self {
        Self {
            id,
            name: format!("widget-{id}"),
            category: category.to_string(),
        }
    }
}

/// `count` widgets with ids `0..count`, cycling through three categories
pub fn synthetic_widgets(count: usize) -> Vec<Widget> {
    const CATEGORIES: [&str; 3] = ["gear", "bolt", "spring"];
    (0..count)
        .map(|i| Widget::new(i as i64, CATEGORIES[i % CATEGORIES.len()]))
        .collect()
}

pub fn encode_widget(widget: &Widget) -> Vec<SqlValue> {
    vec![
        SqlValue::BigInt(widget.id),
        SqlValue::from(widget.name.as_str()),
        SqlValue::from(widget.category.as_str()),
    ]
}

pub fn widget_row(widget: &Widget) -> MemoryRow {
    MemoryRow::new(encode_widget(widget))
}

pub fn decode_widget(row: &MemoryRow) -> Result<Widget, MemoryFailure> {
    match (row.get(0), row.get(1), row.get(2)) {
        (Some(SqlValue::BigInt(id)), Some(SqlValue::Text(name)), Some(SqlValue::Text(category))) => {
            Ok(Widget {
                id: *id,
                name: name.clone(),
                category: category.clone(),
            })
        }
        _ => Err(MemoryFailure(format!("unexpected widget row: {row:?}"))),
    }
}

/// Id carried by an encoded widget parameter row
pub fn encoded_id(row: &[SqlValue]) -> Option<i64> {
    row.first().and_then(SqlValue::as_i64)
}
