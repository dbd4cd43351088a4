use scribe_ssg::{
    BUILTIN_THEME_FILES, CONFIG_FILE, INTRO_STEM, SiteBuilder, ThemeEngine, load_config,
    load_site_config,
};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

const CONFIG_SKELETON: &str = r#"title = "Untitled Blog"
# description = "What this blog is about"
# base_url = "https://example.com"
# author = "Your Name"
language = "en"
feed_limit = 20
page_size = 10
render_drafts = false
highlight = true
syntax_theme = "base16-ocean.dark"
timeout_secs = 120
extensions = ["md", "markdown"]
"#;

const INTRO_SKELETON: &str = "Welcome to my blog. This text comes from `index.md` and is shown above \
the list of posts.
";

const POST_SKELETON: &str = "---
title: {title}
# author: Your Name
# summary: One sentence shown on the index page and in the feed.
# date: {date}
# draft: true
---

Start writing here.
";

pub struct BuildOptions<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub theme: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub drafts: bool,
    pub base_url: Option<&'a str>,
}

pub fn build_site(options: BuildOptions<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match options.config {
        Some(path) => load_config(path)?,
        None => load_site_config(options.source)?,
    };

    if let Some(url) = options.base_url {
        config.base_url = url.to_string();
    }
    if options.drafts {
        config.render_drafts = true;
    }

    let theme = match options.theme {
        Some(dir) => ThemeEngine::from_directory(dir)?,
        None => ThemeEngine::builtin()?,
    };

    println!("Building site...");

    let report = SiteBuilder::new(options.source)
        .config(config)
        .theme(theme)
        .build(options.output)?;

    for warning in &report.warnings {
        eprintln!("Warning: {warning}");
    }

    println!(
        "Built {} posts ({} drafts) into {} in {:.2?}",
        report.published,
        report.drafts,
        options.output.display(),
        report.elapsed
    );

    if report.is_partial() {
        eprintln!("{} file(s) were skipped", report.warnings.len());
    }

    Ok(())
}

/// Lays out a new site under `root`: a `posts/` source directory with a
/// config file and intro, and an editable copy of the built-in theme.
/// Existing files are left untouched.
pub fn init_site(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = root.join("posts");
    fs::create_dir_all(&source)?;

    create_file(&source.join(CONFIG_FILE), CONFIG_SKELETON)?;
    create_file(&source.join(format!("{INTRO_STEM}.md")), INTRO_SKELETON)?;

    let theme_dir = root.join("theme");
    for (relative, contents) in BUILTIN_THEME_FILES {
        let path = theme_dir.join(relative);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        create_file(&path, contents)?;
    }

    println!(
        "Build with: scribe build --source {} --theme {}",
        source.display(),
        theme_dir.display()
    );

    Ok(())
}

fn create_file(path: &Path, contents: &str) -> io::Result<()> {
    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(contents.as_bytes())?;
            println!("Created {}", path.display());
            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            eprintln!("Warning: not creating {} because it already exists", path.display());
            Ok(())
        }
        Err(error) => Err(error),
    }
}

pub fn new_post(id: &str, source: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(format!("Invalid post id '{id}': use letters, digits and hyphens").into());
    }

    let path = source.join(format!("{id}.md"));
    if path.exists() {
        return Err(format!("A post already exists at {}", path.display()).into());
    }

    fs::create_dir_all(source)?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    fs::write(&path, skeleton(id, &today))?;

    println!("Created {}", path.display());

    Ok(())
}

fn skeleton(id: &str, date: &str) -> String {
    let title = id
        .split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    POST_SKELETON
        .replace("{title}", &title)
        .replace("{date}", date)
}
