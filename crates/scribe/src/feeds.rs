use crate::index::SiteIndex;
use crate::theme::{PageKind, PagePayload, PostSummary};
use crate::types::SiteConfig;
use serde::Serialize;

pub const FEED_PATH: &str = "rss.xml";

#[derive(Debug, Serialize)]
pub struct FeedEntry<'a> {
    #[serde(flatten)]
    pub summary: PostSummary<'a>,
    pub body_html: &'a str,
}

/// The feed is a projection of the newest `feed_limit` published posts.
#[derive(Debug, Serialize)]
pub struct FeedPage<'a> {
    pub site: &'a SiteConfig,
    pub feed_url: String,
    pub updated: Option<String>,
    pub entries: Vec<FeedEntry<'a>>,
}

impl<'a> FeedPage<'a> {
    pub fn new(index: &'a SiteIndex, config: &'a SiteConfig) -> Self {
        let recent = index.recent(config.feed_limit);

        Self {
            site: config,
            feed_url: format!("{}/{}", config.base_url, FEED_PATH),
            // Newest post date rather than the wall clock keeps rebuilds identical.
            updated: recent.first().map(|post| post.date.to_rfc2822()),
            entries: recent
                .iter()
                .map(|post| FeedEntry {
                    summary: PostSummary::new(post, config),
                    body_html: &post.body_html,
                })
                .collect(),
        }
    }
}

impl PagePayload for FeedPage<'_> {
    const KIND: PageKind = PageKind::Feed;
}
