//! HTML pages for command replies.
//!
//! Only `<` and `>` are escaped. Keys and values are otherwise inserted verbatim.

use serde_json::Value;

use crate::models::{FieldMap, Row};

const HEADER_BACKGROUND: &str = "#f3f3f3";
const DEFAULT_BACKGROUND: &str = "#c9f3cc";

/// Replace `<` and `>` with their entities
pub fn escape(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Text shown for a cell value
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn document(body: &str) -> String {
    format!(
        r#"<html style="width: fit-content">
  <head>
    <meta charset="utf-8">
    <style>
      th {{ background: {header} !important; }}
      th.default {{ background: {default} !important; }}
      p {{ font-size: 150%; margin: 10px 10px 0 10px; }}
    </style>
  </head>
  <body style="height: fit-content; min-height: 50%">
{body}
  </body>
</html>"#,
        header = HEADER_BACKGROUND,
        default = DEFAULT_BACKGROUND,
        body = body
    )
}

fn paragraph(text: &str) -> String {
    format!("<p>{}</p>", escape(text))
}

fn table(header: String, body: Vec<String>) -> String {
    format!(
        r#"<table border="1" cellpadding="5" style="margin: 10px; border-collapse: collapse">
<tbody align="center" valign="center">
{}
{}
</tbody>
</table>"#,
        header,
        body.join("\n")
    )
}

fn header_row<'a, F>(keys: impl Iterator<Item = &'a str>, is_default: F) -> String
where
    F: Fn(&str) -> bool,
{
    let cells: Vec<String> = keys
        .map(|key| {
            if is_default(key) {
                format!(r#"<th class="default">{}</th>"#, escape(key))
            } else {
                format!("<th>{}</th>", escape(key))
            }
        })
        .collect();

    format!("<tr>{}</tr>", cells.join(""))
}

fn body_row(row: &Row) -> String {
    let cells: Vec<String> = row
        .values()
        .map(|value| format!("<td>{}</td>", escape(&display_value(value))))
        .collect();

    format!("<tr>{}</tr>", cells.join(""))
}

/// Table with one header row from the first row's keys and one body row per entry
pub fn rows_table(rows: &[Row]) -> String {
    let header = match rows.first() {
        Some(first) => header_row(first.keys().map(String::as_str), |_| false),
        None => String::new(),
    };

    table(header, rows.iter().map(body_row).collect())
}

/// Single-column listing of table names
pub fn tables_page(names: &[String]) -> String {
    let body = names
        .iter()
        .map(|name| format!("<tr><td>{}</td></tr>", escape(name)))
        .collect();

    document(&table("<tr><th>Table</th></tr>".to_string(), body))
}

pub fn rows_page(rows: &[Row]) -> String {
    document(&rows_table(rows))
}

/// The stored row after an insert; fields the caller did not supply are highlighted
pub fn created_page(table_name: &str, row: &Row, supplied: &FieldMap) -> String {
    let header = header_row(row.keys().map(String::as_str), |key| {
        !supplied.contains_key(key)
    });

    let body = [
        paragraph(&format!("Inserted the following row into {}", table_name)),
        paragraph("Fields highlighted in green hold default values:"),
        table(header, vec![body_row(row)]),
    ];

    document(&body.join("\n"))
}

/// Matching rows before and after an update
pub fn updated_page(before: &[Row], after: &[Row]) -> String {
    let after_section = if after.is_empty() {
        paragraph("No rows match the query after the update")
    } else {
        rows_table(after)
    };

    let body = [
        paragraph("Before:"),
        rows_table(before),
        paragraph("After:"),
        after_section,
    ];

    document(&body.join("\n"))
}

/// Rows about to be removed with instructions for confirming
pub fn remove_confirm_page(rows: &[Row], confirm_token: &str, timeout_secs: u64) -> String {
    let body = [
        paragraph("If you are sure you want to delete the following rows"),
        paragraph(&format!(
            "send \"{}\" within {} seconds",
            confirm_token, timeout_secs
        )),
        rows_table(rows),
    ];

    document(&body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn escapes_angle_brackets_only() {
        assert_eq!(escape("<b>&\"'</b>"), "&lt;b&gt;&\"'&lt;/b&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn displays_values_like_text() {
        assert_eq!(display_value(&json!("koishi")), "koishi");
        assert_eq!(display_value(&json!(18)), "18");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&Value::Null), "null");
        assert_eq!(display_value(&json!([1, "a"])), "[1,\"a\"]");
    }

    #[test]
    fn header_comes_from_first_row() {
        let rows = vec![
            row(json!({"id": 1, "name": "koishi"})),
            row(json!({"id": 2, "name": "satori"})),
        ];

        let html = rows_table(&rows);

        assert_eq!(html.matches("<th>").count(), 2);
        assert!(html.contains("<tr><th>id</th><th>name</th></tr>"));
        assert!(html.contains("<tr><td>1</td><td>koishi</td></tr>"));
        assert!(html.contains("<tr><td>2</td><td>satori</td></tr>"));
    }

    #[test]
    fn values_with_markup_are_escaped() {
        for value in ["<script>alert(1)</script>", "a<b", ">>", "<img src=x onerror=y>"] {
            let rows = vec![row(json!({ "<key>": value }))];
            let html = rows_page(&rows);

            let expected = value.replace('<', "&lt;").replace('>', "&gt;");
            assert!(html.contains(&format!("<td>{}</td>", expected)), "value {value}");
            assert!(html.contains("<th>&lt;key&gt;</th>"));
            assert!(!html.contains(value));
        }
    }

    #[test]
    fn created_page_marks_defaults() {
        let stored = row(json!({"id": 7, "name": "koishi", "age": "18", "authority": 1}));
        let supplied: FieldMap = [("name", "koishi"), ("age", "18")].into_iter().collect();

        let html = created_page("user", &stored, &supplied);

        assert!(html.contains("Inserted the following row into user"));
        assert!(html.contains(
            r#"<tr><th class="default">id</th><th>name</th><th>age</th><th class="default">authority</th></tr>"#
        ));
        assert!(html.contains("<tr><td>7</td><td>koishi</td><td>18</td><td>1</td></tr>"));
    }

    #[test]
    fn updated_page_notes_empty_after_view() {
        let before = vec![row(json!({"name": "koishi"}))];

        let html = updated_page(&before, &[]);

        assert!(html.contains("Before:"));
        assert!(html.contains("<td>koishi</td>"));
        assert!(html.contains("No rows match the query after the update"));
    }

    #[test]
    fn tables_page_lists_names() {
        let html = tables_page(&["channel".to_string(), "user".to_string()]);

        assert!(html.contains("<tr><th>Table</th></tr>"));
        assert!(html.contains("<tr><td>channel</td></tr>"));
        assert!(html.contains("<tr><td>user</td></tr>"));
    }

    #[test]
    fn confirm_page_shows_token_and_timeout() {
        let rows = vec![row(json!({"name": "nonebot"}))];
        let html = remove_confirm_page(&rows, "confirm", 30);

        assert!(html.contains("send \"confirm\" within 30 seconds"));
        assert!(html.contains("<td>nonebot</td>"));
    }
}
