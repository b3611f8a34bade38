use mailparse::ParsedMail;
use scraper::Html;

/// Collapse a message body into one line of at most `max_chars` characters.
pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.chars().take(max_chars).collect()
}

/// Readable text of a raw RFC 822 message: the first text/plain part,
/// else the first text/html part flattened to text.
pub fn body_text(raw_rfc822: &[u8]) -> String {
    match mailparse::parse_mail(raw_rfc822) {
        Ok(parsed) => extract_text_part(&parsed)
            .or_else(|| extract_html_part(&parsed))
            .unwrap_or_else(|| {
                parsed
                    .get_body()
                    .unwrap_or_else(|_| String::from_utf8_lossy(raw_rfc822).into_owned())
            }),
        Err(_) => String::from_utf8_lossy(raw_rfc822).into_owned(),
    }
}

fn extract_text_part(p: &ParsedMail) -> Option<String> {
    if p.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
        return p.get_body().ok();
    }
    p.subparts.iter().find_map(extract_text_part)
}

fn extract_html_part(p: &ParsedMail) -> Option<String> {
    if p.ctype.mimetype.eq_ignore_ascii_case("text/html") {
        let html = p.get_body().ok()?;
        return Some(html_to_text(&html));
    }
    p.subparts.iter().find_map(extract_html_part)
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 200) {
        Ok(text) => text,
        Err(_) => fragment_text(html),
    }
}

/// Text nodes of an HTML fragment, in document order.
fn fragment_text(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect()
}
