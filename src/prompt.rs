//! Prompt construction for translation and labeling.
//!
//! Every translation prompt embeds the serialized schema snapshot;
//! backends are never called without schema context.

use crate::schema::SchemaDescriptor;

/// System prompt for SQL translation.
pub const TRANSLATE_SYSTEM: &str =
    "You are a SQL expert. Convert natural language to SQL queries. \
     Return ONLY the SQL query, no explanations.";

/// System prompt for display-name generation.
pub const LABEL_SYSTEM: &str =
    "You are a helpful assistant that generates concise, descriptive names \
     for database queries.";

/// Serialize a schema snapshot into prompt form.
#[must_use]
pub fn schema_block(schema: &SchemaDescriptor) -> String {
    let mut lines = Vec::new();
    for table in &schema.tables {
        lines.push(format!("Table: {}", table.name));
        lines.push("Columns:".to_string());
        for column in &table.columns {
            lines.push(format!("  - {} ({})", column.name, column.data_type));
        }
        lines.push(format!("Row count: {}", table.row_count));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Build the translation prompt for a natural-language query.
#[must_use]
pub fn translation_prompt(query_text: &str, schema: &SchemaDescriptor) -> String {
    format!(
        "Given the following database schema:\n\n{}\n\
         Convert this natural language query to SQL: \"{query_text}\"\n\n\
         Rules:\n\
         - Return ONLY the SQL query, no explanations\n\
         - Use proper SQLite syntax\n\
         - Handle date/time queries appropriately (e.g., \"last week\" = date('now', '-7 days'))\n\
         - Be careful with column names and table names\n\
         - If the query is ambiguous, make reasonable assumptions\n\n\
         SQL Query:",
        schema_block(schema)
    )
}

/// Build the display-label prompt for a completed query.
#[must_use]
pub fn label_prompt(query_text: &str, sql: &str) -> String {
    format!(
        "Generate a concise, descriptive name (max 50 characters) for this \
         query: \"{query_text}\" with SQL: \"{sql}\". \
         Return only the name, no quotes or explanations."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, TableDescriptor};

    fn users_schema() -> SchemaDescriptor {
        SchemaDescriptor {
            tables: vec![TableDescriptor {
                name: "users".to_string(),
                columns: vec![
                    ColumnDescriptor {
                        name: "id".to_string(),
                        data_type: "INTEGER".to_string(),
                    },
                    ColumnDescriptor {
                        name: "name".to_string(),
                        data_type: "TEXT".to_string(),
                    },
                ],
                row_count: 42,
            }],
        }
    }

    #[test]
    fn schema_block_lists_tables_columns_and_counts() {
        let block = schema_block(&users_schema());
        assert!(block.contains("Table: users"));
        assert!(block.contains("  - id (INTEGER)"));
        assert!(block.contains("Row count: 42"));
    }

    #[test]
    fn translation_prompt_embeds_schema_and_query() {
        let prompt = translation_prompt("show me all users", &users_schema());
        assert!(prompt.contains("Table: users"));
        assert!(prompt.contains("\"show me all users\""));
        assert!(prompt.contains("SQLite"));
    }

    #[test]
    fn label_prompt_embeds_query_and_sql() {
        let prompt = label_prompt("show me all users", "SELECT * FROM users;");
        assert!(prompt.contains("show me all users"));
        assert!(prompt.contains("SELECT * FROM users;"));
        assert!(prompt.contains("max 50 characters"));
    }
}
