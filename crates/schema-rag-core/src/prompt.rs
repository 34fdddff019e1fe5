//! Prompt assembly.
//!
//! Pure string building: each mode's template is filled with the retrieved
//! context and the caller's inputs. The agent template names the same
//! section markers the [`Extractor`](crate::extract::Extractor) looks for.

use std::collections::HashSet;

use crate::extract::MarkerSet;
use crate::models::{RetrievedDocument, CONTEXT_SEPARATOR};

const SCHEMA_FORMAT: &str = r#"{
  "TABLES": {
    "table_name": {
      "COLUMNS": {
        "column_name": {
          "TYPE": "data_type",
          "NULLABLE": true,
          "UNIQUE": false,
          "DEFAULT": null,
          "CHECKS": [],
          "IS_PRIMARY": false,
          "IS_INDEX": false,
          "COMMENT": "column description"
        }
      },
      "PRIMARY_KEYS": ["column1"],
      "FOREIGN_KEYS": [
        {
          "COLUMNS": ["local_column"],
          "FOREIGN_TABLE": "referenced_table",
          "REFERRED_COLUMNS": ["referenced_column"],
          "ON_DELETE": "CASCADE | RESTRICT | SET NULL",
          "ON_UPDATE": "CASCADE | RESTRICT | SET NULL"
        }
      ],
      "CHECKS": [],
      "INDEXES": [["column1"], ["column1", "column2"]],
      "COMMENT": "table description"
    }
  }
}"#;

/// Schema-design prompt for agent mode.
pub fn agent_prompt(resources: &str, schema: &str, request: &str, markers: &MarkerSet) -> String {
    let schema = if schema.trim().is_empty() {
        "(empty: no tables yet)"
    } else {
        schema
    };
    format!(
        "You are a database system design expert. Analyze the current schema and the \
user request, and propose changes that follow sound relational design: normalization, \
referential integrity, indexing, appropriate data types, consistent naming, and scalability.\n\
\n\
Reference material:\n\
{resources}\n\
CURRENT DATABASE SCHEMA:\n\
{schema}\n\
\n\
The schema uses this JSON layout:\n\
{SCHEMA_FORMAT}\n\
\n\
USER REQUEST:\n\
{request}\n\
\n\
Explain the current design, any issues, the changes you propose, and their risks.\n\
Then give the complete new schema in the JSON layout above, inside a ```json block, under the header\n\
# {json_start}\n\
and close it with\n\
# {json_end}\n\
Finally give the DDL that migrates the current schema to the new one, inside a ```sql block, under the header\n\
# {sql_start}\n\
and close it with\n\
# {sql_end}\n",
        json_start = markers.json.start,
        json_end = markers.json.end,
        sql_start = markers.sql.start,
        sql_end = markers.sql.end,
    )
}

/// Render chat context: each document framed by a separator. The `Source:`
/// line is written once per locator, on its first chunk.
pub fn chat_context(documents: &[RetrievedDocument]) -> String {
    let mut out = String::new();
    let mut cited = HashSet::new();
    for doc in documents {
        out.push_str(CONTEXT_SEPARATOR);
        out.push('\n');
        if !doc.locator.is_empty() && cited.insert(doc.locator.as_str()) {
            out.push_str(&format!("Source: {}\n\n", doc.locator));
        }
        out.push_str(doc.body.trim());
        out.push('\n');
    }
    out.push_str(CONTEXT_SEPARATOR);
    out.push('\n');
    out
}

/// Conversational prompt for chat mode.
pub fn chat_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a helpful assistant answering questions about databases. \
Answer in plain prose using the context below; say so when the context does not cover the question.\n\
\n\
Context:\n\
{context}\n\
User query: {query}\n"
    )
}

/// Markdown reporting prompt for report mode.
pub fn report_prompt(analytics: &str, schema: &str) -> String {
    format!(
        "You are a database reliability engineer writing a report for a project manager.\n\
Using the usage analytics and the schema below, write a concise markdown report covering \
resource trends (disk, CPU, memory, network), costs, notable schema observations, and \
concrete recommendations.\n\
\n\
resources: none\n\
\n\
ANALYTICS:\n\
{analytics}\n\
\n\
DATABASE SCHEMA:\n\
{schema}\n"
    )
}
