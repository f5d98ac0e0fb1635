//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// First block of a UUID, enough to tell networks apart on one host.
pub fn short_uuid(uuid: &str) -> String {
    uuid.split('-').next().unwrap_or(uuid).to_string()
}

/// Comma-separated list, or "-" when empty.
pub fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

/// "yes"/"no" for a known flag, "-" when unset.
pub fn format_flag(flag: Option<bool>) -> String {
    match flag {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uuid() {
        assert_eq!(short_uuid("8d6ac1b6-0b3c-4d6a-9a36-3c1f2a9a1d11"), "8d6ac1b6");
        assert_eq!(short_uuid("plain"), "plain");
        assert_eq!(short_uuid(""), "");
    }

    #[test]
    fn test_join_or_dash() {
        assert_eq!(join_or_dash(&[]), "-");
        assert_eq!(
            join_or_dash(&["a".to_string(), "b".to_string()]),
            "a, b"
        );
    }

    #[test]
    fn test_format_flag() {
        assert_eq!(format_flag(Some(true)), "yes");
        assert_eq!(format_flag(Some(false)), "no");
        assert_eq!(format_flag(None), "-");
    }

    #[test]
    fn test_new_table_renders_header() {
        let mut table = new_table(&["NAME", "UUID"]);
        table.add_row(["k8snet", "8d6ac1b6"]);
        let rendered = table.to_string();
        assert!(rendered.contains("NAME"));
        assert!(rendered.contains("k8snet"));
    }
}
