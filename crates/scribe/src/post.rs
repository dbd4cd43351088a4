use crate::error::{Result, ScribeError};
use crate::markdown::MarkdownRenderer;
use crate::parsing::{
    ParsedDocument, extract_excerpt, parse_date_from_filename, reading_time, strip_html_tags,
    word_count,
};
use crate::types::{DateSource, Post};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const EXCERPT_CHARS: usize = 200;

/// Lower-cases and hyphenates `input`, dropping everything outside `[a-z0-9-]`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for character in input.chars().flat_map(char::to_lowercase) {
        if character.is_ascii_lowercase() || character.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(character);
        } else if character.is_whitespace() || matches!(character, '-' | '_' | '.' | '/') {
            pending_hyphen = true;
        }
    }

    slug
}

/// Everything the builder needs to know about one source file.
pub struct PostSource<'a> {
    pub path: &'a Path,
    pub document: ParsedDocument,
    pub body_html: String,
    pub modified: Option<SystemTime>,
}

pub fn build_post(source: PostSource<'_>, renderer: &MarkdownRenderer) -> Result<Post> {
    let PostSource {
        path,
        document,
        body_html,
        modified,
    } = source;

    let raw_stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    let (filename_date, stem) = match parse_date_from_filename(&raw_stem) {
        Some((date, rest)) => (Some(date), rest.to_string()),
        None => (None, raw_stem.clone()),
    };

    let title = match &document.metadata.title {
        Some(title) => title.clone(),
        None => stem.clone(),
    };

    let slug = slugify(&title);
    if slug.is_empty() {
        return Err(ScribeError::EmptySlug {
            path: path.to_path_buf(),
        });
    }

    if document.has_header && document.metadata.title.is_none() {
        return Err(ScribeError::malformed(path, 1, "missing required field `title`"));
    }

    let (date, date_source) = if let Some(date) = document.metadata.date {
        (date, DateSource::Metadata)
    } else if let Some(date) = filename_date {
        (
            Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
            DateSource::FileName,
        )
    } else {
        let modified = modified.unwrap_or(SystemTime::UNIX_EPOCH);
        (DateTime::<Utc>::from(modified), DateSource::Modified)
    };

    let summary_html = match &document.metadata.summary {
        Some(summary) => Some(renderer.render_inline(summary)),
        None => extract_excerpt(&document.body, EXCERPT_CHARS).map(|excerpt| escape_text(&excerpt)),
    };

    let words = word_count(&strip_html_tags(&body_html));
    let draft = document.metadata.draft;

    Ok(Post {
        output_path: PathBuf::from(&slug).join("index.html"),
        url: format!("/{slug}/"),
        slug,
        title,
        metadata: document.metadata,
        body_html,
        summary_html,
        source_path: path.to_path_buf(),
        date,
        date_source,
        draft,
        word_count: words,
        reading_time: reading_time(words),
    })
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::extract_metadata;
    use std::time::Duration;

    fn build(path: &str, content: &str) -> Result<Post> {
        let path = PathBuf::from(path);
        let renderer = MarkdownRenderer::plain();
        let document = extract_metadata(content, &path)?;
        let body_html = renderer.render(&document.body, &path)?;
        build_post(
            PostSource {
                path: &path,
                document,
                body_html,
                modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(86_400)),
            },
            &renderer,
        )
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("Rust 2024: what's new?"), "rust-2024-whats-new");
        assert_eq!(slugify("snake_case.and-dots"), "snake-case-and-dots");
        assert_eq!(slugify("--edge--"), "edge");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn test_slug_from_title() {
        let post = build("posts/whatever.md", "---\ntitle: Hello World\n---\nBody").unwrap();
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.output_path, PathBuf::from("hello-world/index.html"));
        assert_eq!(post.url, "/hello-world/");
    }

    #[test]
    fn test_headerless_post_uses_filename() {
        let post = build("posts/2024-03-01-First_Steps.md", "Some words here.").unwrap();
        assert_eq!(post.title, "First_Steps");
        assert_eq!(post.slug, "first-steps");
        assert_eq!(post.date_source, DateSource::FileName);
        assert_eq!(post.date.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(post.word_count, 3);
    }

    #[test]
    fn test_metadata_date_wins() {
        let post = build(
            "posts/2024-03-01-first.md",
            "---\ntitle: First\ndate: 2023-12-25\n---\n",
        )
        .unwrap();
        assert_eq!(post.date_source, DateSource::Metadata);
        assert_eq!(post.date.to_rfc3339(), "2023-12-25T00:00:00+00:00");
    }

    #[test]
    fn test_modified_time_fallback() {
        let post = build("posts/plain.md", "---\ntitle: Plain\n---\n").unwrap();
        assert_eq!(post.date_source, DateSource::Modified);
        assert_eq!(post.date.to_rfc3339(), "1970-01-02T00:00:00+00:00");
    }

    #[test]
    fn test_empty_title_and_blank_filename() {
        let error = build("posts/   .md", "---\ntitle:\n---\nBody").unwrap_err();
        assert!(matches!(error, ScribeError::EmptySlug { .. }));

        let error = build("posts/ .md", "No header at all").unwrap_err();
        assert!(matches!(error, ScribeError::EmptySlug { .. }));
    }

    #[test]
    fn test_header_without_title() {
        let error = build("posts/untitled.md", "---\nauthor: Ada\n---\nBody").unwrap_err();
        assert!(matches!(error, ScribeError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_summary_is_rendered_inline() {
        let post = build(
            "posts/a.md",
            "---\ntitle: A\nsummary: Some *emphasis* & more\n---\nBody",
        )
        .unwrap();
        assert_eq!(
            post.summary_html.as_deref(),
            Some("Some <em>emphasis</em> &amp; more")
        );
    }

    #[test]
    fn test_excerpt_fallback_is_escaped() {
        let post = build("posts/a.md", "---\ntitle: A\n---\nFirst <tag> paragraph.\n\nSecond.")
            .unwrap();
        assert_eq!(
            post.summary_html.as_deref(),
            Some("First &lt;tag&gt; paragraph.")
        );
    }
}
