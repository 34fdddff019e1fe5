//! Explicit section markers.
//!
//! The agent prompt asks the model to wrap its answer in header lines such
//! as `# SCHEMA CHANGES` … `# END SCHEMA CHANGES`. Header matching ignores
//! the markdown heading level, emphasis, a trailing colon, and case. When
//! the end header is missing the section stops at another segment's header,
//! the first blank line after its content, or the end of the text.

use serde::{Deserialize, Serialize};

use super::{Candidate, Origin, SegmentKind, Strategy};

/// Start/end header titles for one segment kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPair {
    pub start: String,
    pub end: String,
}

impl MarkerPair {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Marker titles for every segment kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSet {
    pub json: MarkerPair,
    pub sql: MarkerPair,
}

impl Default for MarkerSet {
    fn default() -> Self {
        Self {
            json: MarkerPair::new("SCHEMA CHANGES", "END SCHEMA CHANGES"),
            sql: MarkerPair::new("SCHEMA DDL", "END SCHEMA DDL"),
        }
    }
}

impl MarkerSet {
    fn pair(&self, kind: SegmentKind) -> &MarkerPair {
        match kind {
            SegmentKind::Json => &self.json,
            SegmentKind::Sql => &self.sql,
        }
    }

    /// Headers belonging to every kind other than `kind`.
    fn foreign_headers(&self, kind: SegmentKind) -> Vec<&str> {
        [SegmentKind::Json, SegmentKind::Sql]
            .into_iter()
            .filter(|k| *k != kind)
            .flat_map(|k| {
                let pair = self.pair(k);
                [pair.start.as_str(), pair.end.as_str()]
            })
            .collect()
    }
}

/// Takes the text between a start header and its end header.
pub struct MarkerStrategy {
    markers: MarkerSet,
}

impl MarkerStrategy {
    pub fn new(markers: MarkerSet) -> Self {
        Self { markers }
    }
}

impl Default for MarkerStrategy {
    fn default() -> Self {
        Self::new(MarkerSet::default())
    }
}

impl Strategy for MarkerStrategy {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn find(&self, text: &str, kind: SegmentKind) -> Option<Candidate> {
        let pair = self.markers.pair(kind);
        let stops = self.markers.foreign_headers(kind);
        let (offset, body) = section(text, &pair.start, &pair.end, &stops)?;
        Some(Candidate {
            language: kind.canonical_language().to_string(),
            body,
            offset,
            origin: Origin::Marker,
        })
    }
}

/// Normalize a potential header line to its bare title.
fn header_title(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| c == '#' || c == '*' || c == '_' || c.is_whitespace())
        .trim_end_matches(|c: char| c == '*' || c == '_' || c == ':' || c.is_whitespace())
        .to_ascii_uppercase()
}

fn is_header(line: &str, title: &str) -> bool {
    !title.trim().is_empty() && header_title(line) == title.trim().to_ascii_uppercase()
}

/// Find the section body following `start`, returning its byte offset.
/// Any header in `stops` closes an unterminated section.
fn section(text: &str, start: &str, end: &str, stops: &[&str]) -> Option<(usize, String)> {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n');
    let mut start_offset = None;

    for line in lines.by_ref() {
        let line_start = offset;
        offset += line.len();
        if is_header(line, start) {
            start_offset = Some(line_start);
            break;
        }
    }
    let start_offset = start_offset?;

    let mut body: Vec<&str> = Vec::new();
    let mut terminated = false;
    for line in lines {
        if is_header(line, end) {
            terminated = true;
            break;
        }
        if stops.iter().any(|stop| is_header(line, stop)) {
            break;
        }
        body.push(line);
    }

    if !terminated {
        // Implicit terminator: first blank line after content.
        let first_content = body.iter().position(|l| !l.trim().is_empty());
        if let Some(first) = first_content {
            if let Some(blank) = body[first..].iter().position(|l| l.trim().is_empty()) {
                body.truncate(first + blank);
            }
        }
    }

    let concat = body.concat();
    let joined = strip_outer_fence(concat.trim());
    if joined.is_empty() {
        None
    } else {
        Some((start_offset, joined.to_string()))
    }
}

/// Drop a fence wrapping the whole section, if there is one.
fn strip_outer_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    let rest = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(text: &str, kind: SegmentKind) -> Option<String> {
        MarkerStrategy::default().find(text, kind).map(|c| c.body)
    }

    #[test]
    fn test_section_between_markers() {
        let text = "analysis\n# SCHEMA CHANGES\n{\"TABLES\": {}}\n\n# END SCHEMA CHANGES\nbye";
        assert_eq!(find(text, SegmentKind::Json).as_deref(), Some("{\"TABLES\": {}}"));
    }

    #[test]
    fn test_explicit_end_allows_blank_lines() {
        let text = "# SCHEMA DDL\nCREATE TABLE a (id int);\n\nCREATE TABLE b (id int);\n# END SCHEMA DDL\n";
        assert_eq!(
            find(text, SegmentKind::Sql).as_deref(),
            Some("CREATE TABLE a (id int);\n\nCREATE TABLE b (id int);")
        );
    }

    #[test]
    fn test_missing_end_stops_at_blank_line() {
        let text = "## Schema DDL:\n\nDROP TABLE old;\nCREATE TABLE new (id int);\n\nThat is all.";
        assert_eq!(
            find(text, SegmentKind::Sql).as_deref(),
            Some("DROP TABLE old;\nCREATE TABLE new (id int);")
        );
    }

    #[test]
    fn test_missing_end_runs_to_end_of_text() {
        let text = "# SCHEMA DDL\nALTER TABLE t ADD c int;";
        assert_eq!(find(text, SegmentKind::Sql).as_deref(), Some("ALTER TABLE t ADD c int;"));
    }

    #[test]
    fn test_missing_end_stops_at_next_segment_header() {
        let text = "# SCHEMA CHANGES\n{\"TABLES\": {}}\n# SCHEMA DDL\nCREATE TABLE t (id int);\n";
        assert_eq!(find(text, SegmentKind::Json).as_deref(), Some("{\"TABLES\": {}}"));
        assert_eq!(
            find(text, SegmentKind::Sql).as_deref(),
            Some("CREATE TABLE t (id int);")
        );
    }

    #[test]
    fn test_missing_end_stops_at_foreign_end_header() {
        let text = "# SCHEMA DDL\nDROP TABLE t;\n# END SCHEMA CHANGES\ntrailing";
        assert_eq!(find(text, SegmentKind::Sql).as_deref(), Some("DROP TABLE t;"));
    }

    #[test]
    fn test_header_variants() {
        let text = "**schema changes**\n[1, 2]\n**END SCHEMA CHANGES**";
        assert_eq!(find(text, SegmentKind::Json).as_deref(), Some("[1, 2]"));
    }

    #[test]
    fn test_end_header_is_not_a_start() {
        let text = "# END SCHEMA CHANGES\nnothing here";
        assert!(find(text, SegmentKind::Json).is_none());
    }

    #[test]
    fn test_empty_section_is_not_found() {
        let text = "# SCHEMA DDL\n# END SCHEMA DDL";
        assert!(find(text, SegmentKind::Sql).is_none());
    }

    #[test]
    fn test_inner_fence_is_stripped() {
        let text = "# SCHEMA DDL\n```\nDROP TABLE t;\n```\n# END SCHEMA DDL";
        assert_eq!(find(text, SegmentKind::Sql).as_deref(), Some("DROP TABLE t;"));
    }

    #[test]
    fn test_custom_markers() {
        let strategy = MarkerStrategy::new(MarkerSet {
            json: MarkerPair::new("PROPOSED SCHEMA", "END PROPOSED SCHEMA"),
            sql: MarkerPair::new("MIGRATION", "END MIGRATION"),
        });
        let text = "# MIGRATION\nDROP TABLE t;\n# END MIGRATION";
        let found = strategy.find(text, SegmentKind::Sql).unwrap();
        assert_eq!(found.body, "DROP TABLE t;");
        assert_eq!(found.language, "sql");
        assert_eq!(found.origin, Origin::Marker);
    }
}
