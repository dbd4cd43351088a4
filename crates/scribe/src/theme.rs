use crate::error::{IoContext, Result, ScribeError};
use crate::types::{Post, SiteConfig};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use walkdir::WalkDir;

const TEMPLATES_DIR: &str = "templates";
const STATIC_DIR: &str = "static";

/// The built-in theme, keyed by path relative to the theme root. Writing
/// these files out gives a directory theme that renders identically.
pub const BUILTIN_THEME_FILES: [(&str, &str); 6] = [
    (
        "templates/base.html",
        include_str!("../themes/default/templates/base.html"),
    ),
    (
        "templates/index.html",
        include_str!("../themes/default/templates/index.html"),
    ),
    (
        "templates/post.html",
        include_str!("../themes/default/templates/post.html"),
    ),
    (
        "templates/feed.xml",
        include_str!("../themes/default/templates/feed.xml"),
    ),
    (
        "static/style.css",
        include_str!("../themes/default/static/style.css"),
    ),
    (
        "static/robots.txt",
        include_str!("../themes/default/static/robots.txt"),
    ),
];

fn builtin_files(dir: &str) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
    BUILTIN_THEME_FILES.into_iter().filter_map(move |(path, contents)| {
        path.strip_prefix(dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|name| (name, contents))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Index,
    Post,
    Feed,
}

impl PageKind {
    pub fn name(self) -> &'static str {
        match self {
            PageKind::Index => "index",
            PageKind::Post => "post",
            PageKind::Feed => "feed",
        }
    }

    pub fn template_name(self) -> &'static str {
        match self {
            PageKind::Index => "index.html",
            PageKind::Post => "post.html",
            PageKind::Feed => "feed.xml",
        }
    }
}

/// Data handed to exactly one kind of template.
///
/// Every value is escaped on output. Only fields whose name ends in `_html`
/// hold pre-rendered markup, and templates opt into emitting them raw with
/// `| safe`.
pub trait PagePayload: Serialize {
    const KIND: PageKind;
}

/// Listing view of a post shared by the index, post and feed payloads.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub url: &'a str,
    pub permalink: String,
    pub author: Option<&'a str>,
    pub summary_html: Option<&'a str>,
    pub date_iso: String,
    pub date_display: String,
    pub date_rfc2822: String,
    pub word_count: usize,
    pub reading_time: usize,
    pub draft: bool,
}

impl<'a> PostSummary<'a> {
    pub fn new(post: &'a Post, config: &'a SiteConfig) -> Self {
        Self {
            title: &post.title,
            slug: &post.slug,
            url: &post.url,
            permalink: format!("{}{}", config.base_url, post.url),
            author: post
                .metadata
                .author
                .as_deref()
                .or(config.author.as_deref()),
            summary_html: post.summary_html.as_deref(),
            date_iso: post.date.format("%Y-%m-%d").to_string(),
            date_display: post.date.format("%-d %B %Y").to_string(),
            date_rfc2822: post.date.to_rfc2822(),
            word_count: post.word_count,
            reading_time: post.reading_time,
            draft: post.draft,
        }
    }
}

/// Position of one index page among all of them. Pages count from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: usize,
    pub total: usize,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl Pagination {
    pub fn new(current: usize, total: usize, config: &SiteConfig) -> Self {
        Self {
            current,
            total,
            prev_url: (current > 1).then(|| index_page_url(config, current - 1)),
            next_url: (current < total).then(|| index_page_url(config, current + 1)),
        }
    }
}

/// Output path of index page `page`; the first page is the site root.
pub fn index_page_path(page: usize) -> PathBuf {
    if page <= 1 {
        PathBuf::from("index.html")
    } else {
        PathBuf::from("page").join(page.to_string()).join("index.html")
    }
}

pub fn index_page_url(config: &SiteConfig, page: usize) -> String {
    if page <= 1 {
        format!("{}/", config.base_url)
    } else {
        format!("{}/page/{page}/", config.base_url)
    }
}

#[derive(Debug, Serialize)]
pub struct IndexPage<'a> {
    pub site: &'a SiteConfig,
    /// Rendered body of the site's intro document, first page only.
    pub intro_html: Option<&'a str>,
    pub posts: Vec<PostSummary<'a>>,
    pub pagination: Pagination,
}

impl PagePayload for IndexPage<'_> {
    const KIND: PageKind = PageKind::Index;
}

#[derive(Debug, Serialize)]
pub struct PostPage<'a> {
    pub site: &'a SiteConfig,
    pub post: PostSummary<'a>,
    pub body_html: &'a str,
}

impl<'a> PostPage<'a> {
    pub fn new(post: &'a Post, config: &'a SiteConfig) -> Self {
        Self {
            site: config,
            post: PostSummary::new(post, config),
            body_html: &post.body_html,
        }
    }
}

impl PagePayload for PostPage<'_> {
    const KIND: PageKind = PageKind::Post;
}

enum StaticFiles {
    Builtin,
    Directory(PathBuf),
    None,
}

pub struct ThemeEngine {
    tera: Tera,
    static_files: StaticFiles,
}

impl ThemeEngine {
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![""]);
        tera.add_raw_templates(builtin_files(TEMPLATES_DIR).collect::<Vec<_>>())?;

        Ok(Self {
            tera,
            static_files: StaticFiles::Builtin,
        })
    }

    /// Loads every file under `<theme_dir>/templates` as a template named by
    /// its relative path; `<theme_dir>/static` is copied verbatim.
    pub fn from_directory(theme_dir: &Path) -> Result<Self> {
        let templates_dir = theme_dir.join(TEMPLATES_DIR);
        let static_dir = theme_dir.join(STATIC_DIR);

        let mut files = Vec::new();
        if templates_dir.is_dir() {
            for entry in WalkDir::new(&templates_dir)
                .min_depth(1)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|error| ScribeError::WalkDir {
                    path: templates_dir.clone(),
                    message: error.to_string(),
                })?;

                if !entry.file_type().is_file() {
                    continue;
                }

                let name = entry
                    .path()
                    .strip_prefix(&templates_dir)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                files.push((entry.path().to_path_buf(), Some(name)));
            }
        }

        let mut tera = Tera::default();
        // Escape every template regardless of its extension.
        tera.autoescape_on(vec![""]);
        tera.add_template_files(files)?;

        let static_files = if static_dir.is_dir() {
            StaticFiles::Directory(static_dir)
        } else {
            StaticFiles::None
        };

        Ok(Self { tera, static_files })
    }

    pub fn has_template(&self, kind: PageKind) -> bool {
        self.tera
            .get_template_names()
            .any(|name| name == kind.template_name())
    }

    /// Fails on the first page kind the theme cannot render.
    pub fn ensure_complete(&self) -> Result<()> {
        for kind in [PageKind::Index, PageKind::Post, PageKind::Feed] {
            if !self.has_template(kind) {
                return Err(ScribeError::MissingTemplate {
                    name: kind.name().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn render<P: PagePayload>(&self, payload: &P) -> Result<String> {
        if !self.has_template(P::KIND) {
            return Err(ScribeError::MissingTemplate {
                name: P::KIND.name().to_string(),
            });
        }

        let context = Context::from_serialize(payload)?;
        Ok(self.tera.render(P::KIND.template_name(), &context)?)
    }

    /// Copies the theme's static assets into `output_dir`, returning the
    /// relative paths written.
    pub fn copy_static(&self, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        match &self.static_files {
            StaticFiles::None => {}
            StaticFiles::Builtin => {
                for (name, contents) in builtin_files(STATIC_DIR) {
                    let dest = output_dir.join(name);
                    fs::write(&dest, contents).io_context("writing", &dest)?;
                    written.push(PathBuf::from(name));
                }
            }
            StaticFiles::Directory(static_dir) => {
                for entry in WalkDir::new(static_dir).min_depth(1).sort_by_file_name() {
                    let entry = entry.map_err(|error| ScribeError::WalkDir {
                        path: static_dir.clone(),
                        message: error.to_string(),
                    })?;

                    if !entry.file_type().is_file() {
                        continue;
                    }

                    let relative = entry
                        .path()
                        .strip_prefix(static_dir)
                        .map_err(|_| ScribeError::WalkDir {
                            path: entry.path().to_path_buf(),
                            message: "entry escaped the static directory".to_string(),
                        })?
                        .to_path_buf();
                    let dest = output_dir.join(&relative);

                    if let Some(parent) = dest.parent() {
                        fs::create_dir_all(parent).io_context("creating", parent)?;
                    }

                    fs::copy(entry.path(), &dest).io_context("copying", entry.path())?;
                    written.push(relative);
                }
            }
        }

        Ok(written)
    }
}
