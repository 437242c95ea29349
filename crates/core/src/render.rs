use crate::{QueryExpansion, ResultRow};

const DIVIDER: &str = "----------------------------------------";

pub fn render_expansion(expansion: &QueryExpansion) -> String {
    format!(
        "Original Question: {}\n{}\n",
        expansion.query,
        expansion.completion.trim()
    )
}

pub fn render_row(row: &ResultRow) -> String {
    let mut rendered = format!("Original Query: {}\nExpansion(s):\n", row.query);
    if !row.alternate_queries.is_empty() {
        rendered.push_str(&row.formatted_alternate_queries());
        rendered.push('\n');
    }
    rendered.push_str("Decision Thought Process:\n");
    rendered.push_str(&row.thought_process);
    rendered.push('\n');
    rendered
}

pub fn render_rows(rows: &[ResultRow]) -> String {
    rows.iter()
        .map(|row| format!("{}{DIVIDER}\n", render_row(row)))
        .collect()
}
