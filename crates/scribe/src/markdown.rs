use crate::error::{Result, ScribeError};
use crate::types::SiteConfig;
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::path::Path;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

/// Inline tags an author may write directly; every other piece of raw HTML
/// is escaped and shown as text.
const CONVENIENCE_TAGS: [&str; 8] = ["br", "kbd", "sub", "sup", "mark", "abbr", "ins", "del"];

/// URL schemes a link or image may point at. Scheme-less destinations are
/// relative and always allowed.
const ALLOWED_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Replacement destination for links with a disallowed scheme.
const BLOCKED_URL: &str = "#";

pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

struct CodeBlock {
    lang: Option<String>,
    content: String,
}

/// Fits every table row to the column count of the delimiter row: short
/// rows gain empty cells, surplus cells are dropped.
#[derive(Default)]
struct TableRepair {
    columns: usize,
    cell: usize,
    skipping: bool,
}

impl TableRepair {
    fn apply<'a>(&mut self, event: Event<'a>, events: &mut Vec<Event<'a>>) -> Option<Event<'a>> {
        if self.skipping {
            if matches!(event, Event::End(TagEnd::TableCell)) {
                self.skipping = false;
                self.cell += 1;
            }
            return None;
        }

        match event {
            Event::Start(Tag::Table(ref alignments)) => {
                self.columns = alignments.len();
                events.push(event);
            }
            Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
                self.cell = 0;
                events.push(event);
            }
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                while self.cell < self.columns {
                    events.push(Event::Start(Tag::TableCell));
                    events.push(Event::End(TagEnd::TableCell));
                    self.cell += 1;
                }
                events.push(event);
            }
            Event::Start(Tag::TableCell) => {
                if self.cell >= self.columns {
                    self.skipping = true;
                } else {
                    events.push(event);
                }
            }
            Event::End(TagEnd::TableCell) => {
                self.cell += 1;
                events.push(event);
            }
            other => return Some(other),
        }

        None
    }
}

impl MarkdownRenderer {
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let theme = if config.highlight {
            let mut themes = ThemeSet::load_defaults().themes;
            let theme = themes.remove(&config.syntax_theme).ok_or_else(|| {
                ScribeError::UnknownSyntaxTheme {
                    name: config.syntax_theme.clone(),
                }
            })?;
            Some(theme)
        } else {
            None
        };

        Ok(Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }

    /// A renderer that never highlights code blocks.
    pub fn plain() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme: None,
        }
    }

    /// Renders a markdown body into a fragment of semantic HTML.
    pub fn render(&self, content: &str, path: &Path) -> Result<String> {
        let parser = Parser::new_ext(content, markdown_options());
        let mut events: Vec<Event> = Vec::new();
        let mut code_block: Option<CodeBlock> = None;
        let mut table = TableRepair::default();

        for event in parser {
            let Some(event) = table.apply(event, &mut events) else {
                continue;
            };

            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split(|c: char| c == ',' || c.is_whitespace())
                            .next()
                            .filter(|lang| !lang.is_empty())
                            .map(String::from),
                        CodeBlockKind::Indented => None,
                    };
                    code_block = Some(CodeBlock {
                        lang,
                        content: String::new(),
                    });
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(block) = code_block.take() {
                        let html = self.render_code_block(&block, path)?;
                        events.push(Event::Html(CowStr::from(html)));
                    }
                }
                Event::Text(text) if code_block.is_some() => {
                    if let Some(block) = code_block.as_mut() {
                        block.content.push_str(&text);
                    }
                }
                Event::InlineHtml(html) => {
                    if is_convenience_tag(&html) {
                        events.push(Event::InlineHtml(html));
                    } else {
                        events.push(Event::Text(html));
                    }
                }
                Event::Start(Tag::HtmlBlock) => events.push(Event::Start(Tag::Paragraph)),
                Event::End(TagEnd::HtmlBlock) => events.push(Event::End(TagEnd::Paragraph)),
                Event::Html(html) => events.push(Event::Text(html)),
                Event::Start(tag) => events.push(Event::Start(safe_destination(tag))),
                other => events.push(other),
            }
        }

        let mut html_output = String::with_capacity(content.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html_output, events.into_iter());
        Ok(html_output)
    }

    /// Renders a snippet such as a summary as phrasing content only.
    ///
    /// Block structure (paragraphs, headings, lists, quotes, code blocks,
    /// tables) is flattened into its text, separated by single spaces, so the
    /// result can sit inside a `<p>`.
    pub fn render_inline(&self, content: &str) -> String {
        let mut events: Vec<Event> = Vec::new();
        let mut separate = false;

        for event in Parser::new_ext(content, markdown_options()) {
            let event = match event {
                Event::Start(tag) if is_phrasing(&tag) => Event::Start(safe_destination(tag)),
                Event::End(end) if is_phrasing_end(end) => Event::End(end),
                Event::Start(_) | Event::End(_) | Event::Rule => {
                    separate = true;
                    continue;
                }
                Event::TaskListMarker(_) | Event::FootnoteReference(_) => continue,
                Event::Html(html) | Event::InlineHtml(html) if !is_convenience_tag(&html) => {
                    Event::Text(html)
                }
                Event::SoftBreak | Event::HardBreak => Event::Text(CowStr::Borrowed(" ")),
                other => other,
            };

            if separate && !events.is_empty() {
                events.push(Event::Text(CowStr::Borrowed(" ")));
            }
            separate = false;
            events.push(event);
        }

        let mut html_output = String::with_capacity(content.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut html_output, events.into_iter());
        html_output.trim().to_string()
    }

    fn render_code_block(&self, block: &CodeBlock, path: &Path) -> Result<String> {
        let escaped = escape_html(&block.content);

        let Some(lang) = &block.lang else {
            return Ok(format!("<pre><code>{escaped}</code></pre>\n"));
        };

        let syntax = self.syntax_set.find_syntax_by_token(lang);
        match (&self.theme, syntax) {
            (Some(theme), Some(syntax)) => {
                highlighted_html_for_string(&block.content, &self.syntax_set, syntax, theme)
                    .map_err(|error| ScribeError::RenderFailure {
                        path: path.to_path_buf(),
                        message: format!("highlighting `{lang}` code block: {error}"),
                    })
            }
            _ => Ok(format!(
                "<pre><code class=\"language-{}\">{escaped}</code></pre>\n",
                escape_html(lang)
            )),
        }
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn is_phrasing(tag: &Tag) -> bool {
    matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_phrasing_end(end: TagEnd) -> bool {
    matches!(
        end,
        TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
    )
}

/// Points links and images with a disallowed scheme at `#`.
fn safe_destination(tag: Tag<'_>) -> Tag<'_> {
    match tag {
        Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        } => Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        },
        Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        } => Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        },
        other => other,
    }
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    // Browsers ignore whitespace and control characters inside a scheme.
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();

    let scheme = normalized
        .find(|c| matches!(c, ':' | '/' | '?' | '#'))
        .filter(|&at| normalized[at..].starts_with(':'))
        .map(|at| normalized[..at].to_ascii_lowercase());

    match scheme {
        Some(scheme) if !ALLOWED_SCHEMES.contains(&scheme.as_str()) => {
            CowStr::Borrowed(BLOCKED_URL)
        }
        _ => url,
    }
}

fn is_convenience_tag(html: &str) -> bool {
    let Some(inner) = html
        .trim()
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
    else {
        return false;
    };

    let inner = inner.strip_prefix('/').unwrap_or(inner);
    let name = inner.trim_end_matches('/').trim_end().to_ascii_lowercase();
    CONVENIENCE_TAGS.contains(&name.as_str())
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
