use lazy_static::lazy_static;
use regex::Regex;
use shared::SchemaField;

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"^#{1,6}\s+(.*)$").unwrap();
    // "- name (type): description", bullet marker -, * or +, name optionally backticked
    static ref BULLET: Regex =
        Regex::new(r"^\s*[-*+]\s+`?([A-Za-z0-9_][A-Za-z0-9_ .-]*?)`?\s*\(([^)]+)\)\s*:\s*(.+)$")
            .unwrap();
    // "| name | type | description |"
    static ref TABLE_ROW: Regex =
        Regex::new(r"^\s*\|\s*`?([^|`]+?)`?\s*\|\s*([^|]+?)\s*\|\s*([^|]*?)\s*\|\s*$").unwrap();
    static ref TABLE_SEPARATOR: Regex = Regex::new(r"^\s*\|[\s:|-]+\|\s*$").unwrap();
}

/// Best-effort scan of a model README for an "Inputs" section describing the
/// expected input fields, one per bullet or table row shaped like
/// `name (type): description`. Lines that don't match are ignored; a README
/// with no such section yields an empty schema.
pub fn parse_input_schema(readme: &str) -> Vec<SchemaField> {
    let mut fields = Vec::new();
    let mut in_inputs_section = false;

    for line in readme.lines() {
        if let Some(caps) = HEADING.captures(line) {
            in_inputs_section = caps[1].to_lowercase().contains("input");
            continue;
        }
        if !in_inputs_section {
            continue;
        }

        if let Some(caps) = BULLET.captures(line) {
            fields.push(SchemaField {
                name: caps[1].trim().to_string(),
                field_type: caps[2].trim().to_string(),
                description: caps[3].trim().to_string(),
            });
        } else if TABLE_SEPARATOR.is_match(line) {
            continue;
        } else if let Some(caps) = TABLE_ROW.captures(line) {
            let name = caps[1].trim().to_string();
            // Header rows name the columns rather than a field.
            if name.eq_ignore_ascii_case("name") || name.eq_ignore_ascii_case("field") {
                continue;
            }
            fields.push(SchemaField {
                name,
                field_type: caps[2].trim().to_string(),
                description: caps[3].trim().to_string(),
            });
        }
    }

    fields
}
