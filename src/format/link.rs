//! Link token classification and resolution
//!
//! Link tokens come out of the span parser as raw inner text. This
//! module classifies them (same-project vs cross-project) and resolves
//! their existence against the page index, a read-only collaborator
//! owned by the storage layer. Resolution never mutates the tree, and
//! a missing target is not an error: the link still renders, styled as
//! not-found, and activating it is expected to create the page.

use serde::{Deserialize, Serialize};

/// Read-only page/title lookups, supplied by the host
///
/// Kept abstract so the engine never learns how pages are stored; the
/// excluded storage layer implements it over its own index.
pub trait PageIndex {
    /// Page id for a title within a project, if the page exists
    fn lookup(&self, project: &str, title: &str) -> Option<String>;
}

/// The project a link token is resolved relative to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project: String,
}

impl ProjectContext {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
        }
    }
}

/// Classification of a link token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// `[name]`, resolved within the current project
    Internal { name: String },

    /// `[/project/page]` or deeper; the first segment names the
    /// project, the last names the page
    CrossProject { project: String, path: Vec<String> },
}

/// Outcome of resolving a link token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    /// Whether the target page currently exists
    pub exists: bool,

    /// Navigation target, well-formed whether or not the page exists
    pub href: String,

    pub kind: LinkKind,
}

/// Classify a link token's inner text
pub fn classify(target: &str) -> LinkKind {
    if let Some(path) = target.strip_prefix('/') {
        let segments: Vec<String> = path.split('/').map(str::to_string).collect();
        if segments.len() >= 2 && segments.iter().all(|s| !s.is_empty()) {
            let project = segments[0].clone();
            return LinkKind::CrossProject {
                project,
                path: segments[1..].to_vec(),
            };
        }
    }
    LinkKind::Internal {
        name: target.to_string(),
    }
}

/// Resolve a link token against the page index
///
/// Read-only: consults the index, never the tree. The href is always
/// produced; `exists` drives the found/not-found styling and whether a
/// preview lookup makes sense.
pub fn resolve_link(target: &str, ctx: &ProjectContext, index: &dyn PageIndex) -> ResolvedLink {
    let kind = classify(target);
    match &kind {
        LinkKind::Internal { name } => {
            let exists = index.lookup(&ctx.project, name).is_some();
            ResolvedLink {
                exists,
                href: format!("/{}/{}", ctx.project, name),
                kind,
            }
        }
        LinkKind::CrossProject { project, path } => {
            let title = path.last().map(String::as_str).unwrap_or_default();
            let exists = index.lookup(project, title).is_some();
            ResolvedLink {
                exists,
                href: format!("/{}/{}", project, path.join("/")),
                kind,
            }
        }
    }
}
