use crate::error::{Result, ScribeError};
use crate::types::Post;
use std::collections::HashMap;
use std::path::PathBuf;

/// Published posts in listing order, plus the drafts held back from it.
#[derive(Debug, Clone)]
pub struct SiteIndex {
    posts: Vec<Post>,
    drafts: Vec<Post>,
}

impl SiteIndex {
    /// Orders posts newest first, breaking date ties by slug so that the
    /// listing is identical across runs.
    ///
    /// Every slug that will be written to disk must be unique: published
    /// posts always, drafts only when `include_drafts` is set.
    pub fn build(mut posts: Vec<Post>, include_drafts: bool) -> Result<Self> {
        posts.sort_by(|a, b| a.source_path.cmp(&b.source_path));

        let mut seen: HashMap<&str, &PathBuf> = HashMap::new();
        for post in posts.iter().filter(|post| include_drafts || !post.draft) {
            if let Some(existing_path) = seen.insert(&post.slug, &post.source_path) {
                return Err(ScribeError::DuplicateSlug {
                    slug: post.slug.clone(),
                    path: post.source_path.clone(),
                    existing_path: existing_path.clone(),
                });
            }
        }

        let (drafts, mut posts): (Vec<Post>, Vec<Post>) =
            posts.into_iter().partition(|post| post.draft);

        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));

        Ok(Self { posts, drafts })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn drafts(&self) -> &[Post] {
        &self.drafts
    }

    pub fn recent(&self, limit: usize) -> &[Post] {
        &self.posts[..limit.min(self.posts.len())]
    }

    /// Splits the listing into index pages of at most `page_size` posts.
    /// There is always at least one page, even when it is empty.
    pub fn pages(&self, page_size: usize) -> Vec<&[Post]> {
        if page_size == 0 || self.posts.is_empty() {
            return vec![self.posts.as_slice()];
        }
        self.posts.chunks(page_size).collect()
    }
}
