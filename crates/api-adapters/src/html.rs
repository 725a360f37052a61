//! Server-rendered thread page.

use askama::Template;
use domains::AssembledNode;

/// Left margin per nesting level, in pixels.
const INDENT_PX: usize = 24;

/// One comment as laid out on the page.
pub struct Row {
    pub indent: usize,
    pub author: String,
    pub body: String,
    pub posted: String,
    pub likes: u64,
    pub replies: u64,
    pub deleted: bool,
}

#[derive(Template)]
#[template(path = "thread.html")]
pub struct ThreadPage {
    pub title: String,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub total: usize,
    pub rows: Vec<Row>,
}

impl ThreadPage {
    /// Flattens the tree in reading order, root first.
    pub fn from_tree(tree: &AssembledNode) -> Self {
        let rows: Vec<Row> = tree
            .depth_first()
            .map(|(depth, node)| Row {
                indent: depth * INDENT_PX,
                author: node.author_name.clone(),
                body: node.body.clone(),
                posted: node.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
                likes: node.like_count,
                replies: node.reply_count,
                deleted: node.deleted,
            })
            .collect();

        Self {
            title: tree.title.clone().unwrap_or_else(|| tree.body.clone()),
            tags: tree.tags.clone(),
            links: tree.resource_links.clone(),
            total: rows.len(),
            rows,
        }
    }
}
