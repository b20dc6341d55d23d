//! Call-control documents returned to the provider

/// Answer document: fork the call audio to the media stream, greet the
/// callee, then hold the line while the session runs.
///
/// The document is identical for every call, so it is rendered once at
/// startup; the stream's `start` message carries the call SID used for
/// correlation.
pub fn answer_document(stream_url: &str, greeting: &str, hold_secs: u64) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response>",
            r#"<Start><Stream url="{}"/></Start>"#,
            "<Say>{}</Say>",
            r#"<Pause length="{}"/>"#,
            "</Response>"
        ),
        escape_xml(stream_url),
        escape_xml(greeting),
        hold_secs
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
