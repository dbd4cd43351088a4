use crate::error::{Result, ScribeError};
use crate::types::Metadata;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::collections::HashSet;
use std::path::Path;

pub const HEADER_MARKER: &str = "---";
const COMMENT_MARKER: char = '#';
const WORDS_PER_MINUTE: usize = 200;

const NAIVE_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

const ZONED_DATETIME_FORMATS: [&str; 8] = [
    "%e %b %Y %I:%M:%S %p %z",
    "%e %b %Y %H:%M:%S %z",
    "%e %B %Y %I:%M:%S %p %z",
    "%e %B %Y %H:%M:%S %z",
    "%e %b %Y %I:%M %p %z",
    "%e %b %Y %H:%M %z",
    "%e %B %Y %I:%M %p %z",
    "%e %B %Y %H:%M %z",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub metadata: Metadata,
    /// Whether the document opened with a metadata header at all.
    pub has_header: bool,
    pub body: String,
}

/// Splits a source document into its metadata header and markdown body.
///
/// A document without a leading `---` line has no header; that is not an
/// error and the whole text becomes the body. Inside a header, blank lines
/// and `#` comment lines are skipped, every other line must be `key: value`.
pub fn extract_metadata(content: &str, path: &Path) -> Result<ParsedDocument> {
    let content = content.replace("\r\n", "\n");
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let trimmed = content.trim_start();

    let mut lines = trimmed.split_inclusive('\n');
    let opening = match lines.next() {
        Some(first) if first.trim() == HEADER_MARKER => first,
        _ => {
            return Ok(ParsedDocument {
                metadata: Metadata::default(),
                has_header: false,
                body: content.to_string(),
            });
        }
    };

    let opening_line = content[..content.len() - trimmed.len()].matches('\n').count() + 1;
    let mut offset = opening.len();
    let mut metadata = Metadata::default();
    let mut seen = HashSet::new();
    let mut closed = false;

    for (index, line) in lines.enumerate() {
        offset += line.len();
        let line_number = opening_line + index + 1;
        let text = line.trim();

        if text == HEADER_MARKER {
            closed = true;
            break;
        }

        if text.is_empty() || text.starts_with(COMMENT_MARKER) {
            continue;
        }

        let Some((key, value)) = text.split_once(':') else {
            return Err(ScribeError::malformed(
                path,
                line_number,
                format!("expected `key: value`, found `{text}`"),
            ));
        };

        let key = match key.trim().to_lowercase().as_str() {
            "created" => "date".to_string(),
            other => other.to_string(),
        };

        if key.is_empty() {
            return Err(ScribeError::malformed(path, line_number, "empty key"));
        }

        if !seen.insert(key.clone()) {
            return Err(ScribeError::malformed(
                path,
                line_number,
                format!("duplicate key `{key}`"),
            ));
        }

        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "title" => metadata.title = Some(value.to_string()),
            "author" => metadata.author = Some(value.to_string()),
            "summary" => metadata.summary = Some(value.to_string()),
            "date" => {
                let date = parse_date(value).ok_or_else(|| {
                    ScribeError::malformed(path, line_number, format!("unrecognized date `{value}`"))
                })?;
                metadata.date = Some(date);
            }
            "draft" => {
                metadata.draft = parse_bool(value).ok_or_else(|| {
                    ScribeError::malformed(
                        path,
                        line_number,
                        format!("`draft` must be true or false, found `{value}`"),
                    )
                })?;
            }
            _ => {
                metadata.extra.insert(key, value.to_string());
            }
        }
    }

    if !closed {
        return Err(ScribeError::malformed(
            path,
            opening_line,
            "metadata header is never closed",
        ));
    }

    Ok(ParsedDocument {
        metadata,
        has_header: true,
        body: trimmed[offset..].to_string(),
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&datetime));
        }
    }

    ZONED_DATETIME_FORMATS.iter().find_map(|format| {
        DateTime::parse_from_str(value, format)
            .ok()
            .map(|date| date.with_timezone(&Utc))
    })
}

/// Splits `2024-01-15-hello-world` into its date and the remaining stem.
pub fn parse_date_from_filename(stem: &str) -> Option<(NaiveDate, &str)> {
    let date_part = stem.get(..10)?;
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;

    let rest = match stem.get(10..) {
        Some(rest) if rest.starts_with('-') => &rest[1..],
        Some("") | None => "",
        Some(_) => return None,
    };

    Some((date, rest))
}

pub fn extract_excerpt(content: &str, max_chars: usize) -> Option<String> {
    let paragraph = content
        .split("\n\n")
        .map(str::trim)
        .find(|block| {
            !block.is_empty()
                && !block.starts_with('#')
                && !block.starts_with("```")
                && !block.starts_with('|')
        })?;

    let text: String = paragraph
        .chars()
        .filter(|c| !['#', '*', '_', '`', '[', ']', '(', ')'].contains(c))
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.chars().count() <= max_chars {
        Some(text.to_string())
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        let last_space = truncated.rfind(' ').unwrap_or(truncated.len());
        Some(format!("{}...", truncated[..last_space].trim_end()))
    }
}

pub fn strip_html_tags(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut inside_tag = false;

    for character in html.chars() {
        match character {
            '<' => inside_tag = true,
            '>' if inside_tag => {
                inside_tag = false;
                output.push(' ');
            }
            _ if !inside_tag => output.push(character),
            _ => {}
        }
    }

    output
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn reading_time(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(content: &str) -> Result<ParsedDocument> {
        extract_metadata(content, &PathBuf::from("test.md"))
    }

    #[test]
    fn test_header_fields() {
        let doc = parse(
            "---\ntitle:  Hello World \nauthor: Ada\nsummary: A *short* intro\ndate: 2024-01-15\ndraft: yes\n---\nBody text\n",
        )
        .unwrap();
        assert!(doc.has_header);
        assert_eq!(doc.metadata.title.as_deref(), Some("Hello World"));
        assert_eq!(doc.metadata.author.as_deref(), Some("Ada"));
        assert_eq!(doc.metadata.summary.as_deref(), Some("A *short* intro"));
        assert_eq!(
            doc.metadata.date.unwrap().to_rfc3339(),
            "2024-01-15T00:00:00+00:00"
        );
        assert!(doc.metadata.draft);
        assert_eq!(doc.body, "Body text\n");
    }

    #[test]
    fn test_no_header_is_not_an_error() {
        let doc = parse("# Just a post\n\nSome words.").unwrap();
        assert!(!doc.has_header);
        assert_eq!(doc.metadata, Metadata::default());
        assert_eq!(doc.body, "# Just a post\n\nSome words.");
    }

    #[test]
    fn test_comment_lines_are_ignored() {
        let doc = parse("---\ntitle: Post\n# author: Nobody\n#draft: true\n---\n").unwrap();
        assert_eq!(doc.metadata.author, None);
        assert!(!doc.metadata.draft);
        assert!(doc.metadata.extra.is_empty());
    }

    #[test]
    fn test_empty_values_are_absent() {
        let doc = parse("---\ntitle: Post\nauthor:   \n---\n").unwrap();
        assert_eq!(doc.metadata.author, None);
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let doc = parse("---\ntitle: Post\nTags: rust, blog\n---\n").unwrap();
        assert_eq!(
            doc.metadata.extra.get("tags").map(String::as_str),
            Some("rust, blog")
        );
    }

    #[test]
    fn test_value_may_contain_colons() {
        let doc = parse("---\ntitle: Rust: the good parts\n---\n").unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Rust: the good parts"));
    }

    #[test]
    fn test_created_is_an_alias_for_date() {
        let doc = parse("---\ntitle: Post\ncreated: 5 Mar 2023 14:30 +0100\n---\n").unwrap();
        assert_eq!(
            doc.metadata.date.unwrap().to_rfc3339(),
            "2023-03-05T13:30:00+00:00"
        );
    }

    #[test]
    fn test_unterminated_header() {
        let error = parse("---\ntitle: Post\n").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { line: 1, .. }));

        let error = parse("\n\n---\ntitle: Post\n# author: me\n").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { line: 3, .. }));
    }

    #[test]
    fn test_body_text_inside_open_header() {
        let error = parse("---\ntitle: Post\nBody").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { line: 3, .. }));
    }

    #[test]
    fn test_invalid_draft_value() {
        let error = parse("---\ntitle: Post\ndraft: maybe\n---\n").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { line: 3, .. }));
    }

    #[test]
    fn test_invalid_date_value() {
        let error = parse("---\ntitle: Post\ndate: last tuesday\n---\n").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_line_without_separator() {
        let error = parse("---\ntitle: Post\njust words\n---\n").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { line: 3, .. }));
    }

    #[test]
    fn test_duplicate_key() {
        let error = parse("---\ntitle: One\ntitle: Two\n---\n").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { line: 3, .. }));
    }

    #[test]
    fn test_crlf_header() {
        let doc = parse("---\r\ntitle: Windows\r\n---\r\nBody\r\n").unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Windows"));
        assert_eq!(doc.body, "Body\n");
    }

    #[test]
    fn test_header_round_trip() {
        let original = parse(
            "---\ntitle: Round Trip\nauthor: Ada\nsummary: Short\ndate: 2024-02-01 09:30\ndraft: true\nmood: sunny\n---\nBody",
        )
        .unwrap();
        let reparsed = parse(&original.metadata.to_header()).unwrap();
        assert_eq!(reparsed.metadata, original.metadata);
    }

    #[test]
    fn test_parse_date_from_filename() {
        let (date, rest) = parse_date_from_filename("2024-01-15-hello-world").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(rest, "hello-world");
        assert_eq!(parse_date_from_filename("about"), None);
        assert_eq!(parse_date_from_filename("2024-13-45-nope"), None);
    }

    #[test]
    fn test_extract_excerpt_skips_headings() {
        let content = "# Title\n\nThis is the *first* paragraph.\n\nSecond.";
        assert_eq!(
            extract_excerpt(content, 100),
            Some("This is the first paragraph.".to_string())
        );
    }

    #[test]
    fn test_extract_excerpt_truncation() {
        let content = "This is a very long paragraph that should be truncated at some point.";
        let excerpt = extract_excerpt(content, 30).unwrap();
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.len() <= 33);
    }

    #[test]
    fn test_word_count_and_reading_time() {
        let text = strip_html_tags("<p>one <em>two</em> three</p>");
        assert_eq!(word_count(&text), 3);
        assert_eq!(reading_time(3), 1);
        assert_eq!(reading_time(401), 3);
    }
}
