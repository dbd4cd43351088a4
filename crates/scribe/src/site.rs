use crate::error::{IoContext, Result, ScribeError};
use crate::feeds::{FEED_PATH, FeedPage};
use crate::index::SiteIndex;
use crate::markdown::MarkdownRenderer;
use crate::output::write_output;
use crate::parsing::extract_metadata;
use crate::post::{PostSource, build_post};
use crate::theme::{IndexPage, Pagination, PostPage, PostSummary, ThemeEngine, index_page_path};
use crate::types::{Post, SiteConfig};
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

pub const CONFIG_FILE: &str = "scribe.toml";

/// File stem of the optional intro document at the source root. Its body is
/// shown above the post list instead of being published as a post.
pub const INTRO_STEM: &str = "index";

/// Source files found under the source root.
#[derive(Debug, Default)]
struct Sources {
    posts: Vec<PathBuf>,
    intro: Option<PathBuf>,
}

/// A source file left out of the build, with the reason.
#[derive(Debug)]
pub struct BuildWarning {
    pub path: PathBuf,
    pub error: ScribeError,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped {}: {}", self.path.display(), self.error)
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub published: usize,
    pub drafts: usize,
    pub pages_written: usize,
    pub warnings: Vec<BuildWarning>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

pub fn load_config(path: &Path) -> Result<SiteConfig> {
    let content = fs::read_to_string(path).io_context("reading config", path)?;
    let mut config: SiteConfig =
        toml::from_str(&content).map_err(|error| ScribeError::ConfigParse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;

    config.base_url = config.base_url.trim_end_matches('/').to_string();
    Ok(config)
}

/// Reads `scribe.toml` from the source root, or falls back to defaults.
pub fn load_site_config(source_dir: &Path) -> Result<SiteConfig> {
    let config_path = source_dir.join(CONFIG_FILE);
    if config_path.is_file() {
        load_config(&config_path)
    } else {
        debug!(path = %config_path.display(), "no config file, using defaults");
        Ok(SiteConfig::default())
    }
}

pub struct SiteBuilder {
    source_dir: PathBuf,
    config: SiteConfig,
    theme: Option<ThemeEngine>,
}

impl SiteBuilder {
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            config: SiteConfig::default(),
            theme: None,
        }
    }

    pub fn config(mut self, mut config: SiteConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        self.config = config;
        self
    }

    pub fn theme(mut self, theme: ThemeEngine) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Builds the whole site into `output_dir`.
    ///
    /// Every page is rendered in memory before anything touches the
    /// destination, so a fatal error leaves it exactly as it was. Files the
    /// build does not manage are never removed.
    pub fn build(&self, output_dir: &Path) -> Result<BuildReport> {
        let start = Instant::now();

        let builtin;
        let theme = match &self.theme {
            Some(theme) => theme,
            None => {
                builtin = ThemeEngine::builtin()?;
                &builtin
            }
        };
        theme.ensure_complete()?;

        if self.config.base_url.is_empty() {
            warn!("base_url is not set; feed links will be relative");
        }

        let renderer = MarkdownRenderer::new(&self.config)?;
        let sources = self.discover()?;
        info!(
            count = sources.posts.len(),
            source = %self.source_dir.display(),
            "discovered posts"
        );

        let stop = AtomicBool::new(false);
        let outcomes: Option<Vec<(PathBuf, Result<Post>)>> = sources
            .posts
            .par_iter()
            .map(|path| {
                if stop.load(Ordering::Relaxed) {
                    return None;
                }
                if self.deadline_passed(start) {
                    stop.store(true, Ordering::Relaxed);
                    return None;
                }
                Some((path.clone(), self.load_post(path, &renderer)))
            })
            .collect();
        let outcomes = outcomes.ok_or(ScribeError::Timeout {
            seconds: self.config.timeout_secs,
        })?;

        let mut posts = Vec::new();
        let mut warnings = Vec::new();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(post) => posts.push(post),
                Err(error) if error.is_per_file() => {
                    debug!(path = %path.display(), %error, "excluding post");
                    warnings.push(BuildWarning { path, error });
                }
                Err(error) => return Err(error),
            }
        }

        if posts.is_empty() {
            return Err(ScribeError::NoPosts {
                failed: warnings.len(),
            });
        }

        let intro = match sources.intro {
            Some(path) => match self.load_intro(&path, &renderer) {
                Ok(html) => Some(html),
                Err(error) if error.is_per_file() => {
                    debug!(path = %path.display(), %error, "excluding intro");
                    warnings.push(BuildWarning { path, error });
                    None
                }
                Err(error) => return Err(error),
            },
            None => None,
        };

        let index = SiteIndex::build(posts, self.config.render_drafts)?;
        self.check_deadline(start)?;

        let pages = self.render_pages(theme, &index, intro.as_deref())?;
        self.check_deadline(start)?;

        let pages_written = write_output(theme, &pages, output_dir)?;

        let report = BuildReport {
            published: index.posts().len(),
            drafts: index.drafts().len(),
            pages_written,
            warnings,
            elapsed: start.elapsed(),
        };
        info!(
            published = report.published,
            drafts = report.drafts,
            warnings = report.warnings.len(),
            output = %output_dir.display(),
            "build finished"
        );

        Ok(report)
    }

    fn discover(&self) -> Result<Sources> {
        let mut sources = Sources::default();

        for entry in WalkDir::new(&self.source_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored(entry))
        {
            let entry = entry.map_err(|error| ScribeError::WalkDir {
                path: self.source_dir.clone(),
                message: error.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let matches_extension = entry
                .path()
                .extension()
                .map(|extension| {
                    self.config
                        .extensions
                        .iter()
                        .any(|wanted| extension.eq_ignore_ascii_case(wanted.as_str()))
                })
                .unwrap_or(false);

            if !matches_extension {
                continue;
            }

            let is_intro = entry.depth() == 1
                && entry.path().file_stem().is_some_and(|stem| stem == INTRO_STEM);
            if is_intro && sources.intro.is_none() {
                sources.intro = Some(entry.into_path());
            } else if !is_intro {
                sources.posts.push(entry.into_path());
            }
        }

        Ok(sources)
    }

    fn load_post(&self, path: &Path, renderer: &MarkdownRenderer) -> Result<Post> {
        debug!(path = %path.display(), "building post");

        let content = fs::read_to_string(path).io_context("reading post", path)?;
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok();

        let document = extract_metadata(&content, path)?;
        let body_html = renderer.render(&document.body, path)?;

        build_post(
            PostSource {
                path,
                document,
                body_html,
                modified,
            },
            renderer,
        )
    }

    fn load_intro(&self, path: &Path, renderer: &MarkdownRenderer) -> Result<String> {
        debug!(path = %path.display(), "rendering intro");

        let content = fs::read_to_string(path).io_context("reading intro", path)?;
        let document = extract_metadata(&content, path)?;
        renderer.render(&document.body, path)
    }

    fn render_pages(
        &self,
        theme: &ThemeEngine,
        index: &SiteIndex,
        intro: Option<&str>,
    ) -> Result<Vec<(PathBuf, String)>> {
        let config = &self.config;

        let listing = index.pages(config.page_size);
        let mut pages = Vec::with_capacity(listing.len() + index.posts().len() + 1);
        for (number, posts) in listing.iter().enumerate() {
            let current = number + 1;
            let html = theme.render(&IndexPage {
                site: config,
                intro_html: intro.filter(|_| current == 1),
                posts: posts
                    .iter()
                    .map(|post| PostSummary::new(post, config))
                    .collect(),
                pagination: Pagination::new(current, listing.len(), config),
            })?;
            pages.push((index_page_path(current), html));
        }

        let drafts: &[Post] = if config.render_drafts {
            index.drafts()
        } else {
            &[]
        };
        let post_pages: Vec<&Post> = index.posts().iter().chain(drafts).collect();
        let rendered: Result<Vec<(PathBuf, String)>> = post_pages
            .par_iter()
            .map(|post| {
                let html = theme.render(&PostPage::new(post, config))?;
                Ok((post.output_path.clone(), html))
            })
            .collect();

        let feed = theme.render(&FeedPage::new(index, config))?;

        pages.extend(rendered?);
        pages.push((PathBuf::from(FEED_PATH), feed));
        Ok(pages)
    }

    fn deadline_passed(&self, start: Instant) -> bool {
        self.config.timeout_secs > 0
            && start.elapsed() > Duration::from_secs(self.config.timeout_secs)
    }

    fn check_deadline(&self, start: Instant) -> Result<()> {
        if self.deadline_passed(start) {
            return Err(ScribeError::Timeout {
                seconds: self.config.timeout_secs,
            });
        }
        Ok(())
    }
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.') || name.starts_with('_'))
            .unwrap_or(false)
}
