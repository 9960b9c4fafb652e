use crate::domain::metric::Metric;
use std::fmt::Write;

/// HTML table of every metric; rows keep the order they are given in.
pub fn render(metrics: &[Metric]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Metrics</title></head>\n<body>\n\
         <table>\n<tr><th>Name</th><th>Type</th><th>Value</th></tr>\n",
    );
    for metric in metrics {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&metric.id),
            metric.kind(),
            metric.value.render()
        );
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_and_escaping() {
        let html = render(&[Metric::gauge("<b>", 1.5), Metric::counter("hits", 3)]);
        assert!(html.contains("<td>&lt;b&gt;</td><td>gauge</td><td>1.5</td>"));
        assert!(html.contains("<td>hits</td><td>counter</td><td>3</td>"));
        assert!(html.find("&lt;b&gt;").unwrap() < html.find("hits").unwrap());
    }

    #[test]
    fn test_escape_table() {
        let cases = [
            ("plain", "plain"),
            ("a&b", "a&amp;b"),
            ("\"quoted\"", "&quot;quoted&quot;"),
            ("it's", "it&#39;s"),
            ("&lt;", "&amp;lt;"),
            ("<a href='x'>", "&lt;a href=&#39;x&#39;&gt;"),
        ];
        for (raw, expected) in cases {
            assert_eq!(escape(raw), expected, "{raw}");
        }
    }
}
