//! The `search.json` index: one record per published post, in listing
//! order, for client-side search.

use crate::post::Post;
use serde::Serialize;

/// One entry in `search.json`.
#[derive(Serialize, Debug, PartialEq)]
pub struct SearchRecord<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    /// ISO `YYYY-MM-DD`.
    pub date: String,
    pub tags: Vec<&'a str>,
    pub excerpt: String,
}

impl<'a> From<&'a Post> for SearchRecord<'a> {
    fn from(post: &'a Post) -> SearchRecord<'a> {
        SearchRecord {
            title: &post.title,
            slug: &post.slug,
            date: post.date.format("%Y-%m-%d").to_string(),
            tags: post.tag_names(),
            excerpt: post.search_excerpt(),
        }
    }
}

/// Serializes the search index for `posts`, preserving their order.
pub fn render_search_index(posts: &[Post]) -> serde_json::Result<String> {
    let records: Vec<SearchRecord> = posts.iter().map(SearchRecord::from).collect();
    serde_json::to_string_pretty(&records)
}
