use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub description: Option<String>,
    pub base_url: String,
    pub author: Option<String>,
    pub language: String,
    pub feed_limit: usize,
    /// Posts per index page; `0` lists every post on one page.
    pub page_size: usize,
    pub render_drafts: bool,
    pub highlight: bool,
    pub syntax_theme: String,
    pub timeout_secs: u64,
    pub extensions: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Untitled Blog".to_string(),
            description: None,
            base_url: String::new(),
            author: None,
            language: "en".to_string(),
            feed_limit: default_feed_limit(),
            page_size: 10,
            render_drafts: false,
            highlight: true,
            syntax_theme: "base16-ocean.dark".to_string(),
            timeout_secs: 120,
            extensions: vec!["md".to_string(), "markdown".to_string()],
        }
    }
}

pub fn default_feed_limit() -> usize {
    20
}

/// Recognized header fields plus everything else the author wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub draft: bool,
    pub extra: BTreeMap<String, String>,
}

impl Metadata {
    /// Serializes the metadata back into a `---` delimited header block.
    pub fn to_header(&self) -> String {
        let mut header = String::from("---\n");
        if let Some(title) = &self.title {
            header.push_str(&format!("title: {title}\n"));
        }
        if let Some(author) = &self.author {
            header.push_str(&format!("author: {author}\n"));
        }
        if let Some(summary) = &self.summary {
            header.push_str(&format!("summary: {summary}\n"));
        }
        if let Some(date) = &self.date {
            header.push_str(&format!("date: {}\n", date.to_rfc3339()));
        }
        if self.draft {
            header.push_str("draft: true\n");
        }
        for (key, value) in &self.extra {
            header.push_str(&format!("{key}: {value}\n"));
        }
        header.push_str("---\n");
        header
    }
}

/// Where a post's display date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Metadata,
    FileName,
    Modified,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    pub metadata: Metadata,
    pub body_html: String,
    pub summary_html: Option<String>,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub url: String,
    pub date: DateTime<Utc>,
    pub date_source: DateSource,
    pub draft: bool,
    pub word_count: usize,
    pub reading_time: usize,
}
