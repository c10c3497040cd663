/// Wrap width for plain-text fallbacks derived from HTML bodies
pub const FALLBACK_WIDTH: usize = 78;

/// Convert an HTML body into the plain-text rendering sent alongside it
pub fn html_to_plain_text(html_content: &str) -> String {
    let result = html2text::from_read(html_content.as_bytes(), FALLBACK_WIDTH);

    // Trailing whitespace off every line, leading kept for indentation
    let cleaned = result
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>();

    // Collapse runs of more than one blank line
    let mut final_result = String::new();
    let mut blank_line_count = 0;

    for line in cleaned {
        if line.trim().is_empty() {
            blank_line_count += 1;
            if blank_line_count > 1 {
                continue;
            }
        } else {
            blank_line_count = 0;
        }
        final_result.push_str(line);
        final_result.push('\n');
    }

    tracing::debug!(
        "Derived plain-text fallback: {} HTML bytes -> {} text bytes",
        html_content.len(),
        final_result.len()
    );

    final_result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_plain_text() {
        let html = "<p>Hello world!</p><p>Second paragraph.</p>";
        let result = html_to_plain_text(html);

        assert!(result.contains("Hello world!"));
        assert!(result.contains("Second paragraph."));
        assert!(!result.contains("<p>"));
    }

    #[test]
    fn test_full_document_drops_markup() {
        let html = r#"
<html>
    <head></head>
    <body>
        <h1>Hello, Welcome to the mailing group</h1>
        <p>See you in the inbox</p>
        <br/>
        <br/>
        <p>Regards</p>
    </body>
</html>
"#;
        let result = html_to_plain_text(html);

        assert!(result.contains("Welcome to the mailing group"));
        assert!(result.contains("See you in the inbox"));
        assert!(result.contains("Regards"));
        assert!(!result.contains("<body>"));
        assert!(!result.contains("\n\n\n"));
    }

    #[test]
    fn test_simple_paragraph() {
        assert_eq!(html_to_plain_text("<p>Hi</p>"), "Hi");
    }
}
