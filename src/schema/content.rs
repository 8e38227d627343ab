/// Content trees — precompiled conditional/computed text structure.
use serde::{Deserialize, Serialize};

use super::callable::{Expression, Predicate};

/// Source text for a scene body or a title: either plain prose (compiled as
/// a single paragraph with no dependencies) or a full content tree.
pub enum ContentSource {
    Text(String),
    Tree(ContentTree),
}

impl From<&str> for ContentSource {
    fn from(text: &str) -> ContentSource {
        ContentSource::Text(text.to_string())
    }
}

impl From<String> for ContentSource {
    fn from(text: String) -> ContentSource {
        ContentSource::Text(text)
    }
}

/// An ordered sequence of nodes plus the state-dependency callables the
/// conditional and insert nodes refer to by index.
pub struct ContentTree {
    pub nodes: Vec<ContentNode>,
    pub dependencies: Vec<Dependency>,
}

/// A node of a content tree. Conditional and insert nodes reference an
/// index into the tree's dependency list.
pub enum ContentNode {
    Text(String),
    Paragraph(Vec<ContentNode>),
    Heading(Vec<ContentNode>),
    Conditional {
        predicate: usize,
        content: Vec<ContentNode>,
    },
    Insert(usize),
}

/// A boolean- or value-producing callable attached to a content tree,
/// evaluated exactly once per compilation pass.
pub enum Dependency {
    Predicate(Predicate),
    Insert(Expression),
}

/// The block kind of a rendered unit of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Paragraph,
    Heading,
}

/// A compiled block ready for the display surface: a kind and the text
/// spans that survived conditional elision and insert substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedBlock {
    pub kind: BlockKind,
    pub spans: Vec<String>,
}

impl RenderedBlock {
    pub fn paragraph(text: &str) -> RenderedBlock {
        RenderedBlock {
            kind: BlockKind::Paragraph,
            spans: vec![text.to_string()],
        }
    }
}
