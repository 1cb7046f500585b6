use std::collections::HashSet;

use crate::block::FSBlockType;
use crate::error::FsError;

/// How a directory tree is walked when built with [`build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    DepthFirst,
    BreadthFirst,
}

/// Options controlling a tree [`build`]. The `accept(block)` filter itself
/// is passed separately to `build` so callers can close over cache state
/// without fighting this struct's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub order: TraversalOrder,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            order: TraversalOrder::DepthFirst,
        }
    }
}

/// A node in a built directory tree: the block itself plus its accepted
/// children, in traversal order.
pub struct TreeNode {
    pub block_nr: u32,
    pub children: Vec<TreeNode>,
}

/// Walks the hash-table chain rooted at `root`, visiting each directory
/// entry's children through `children_of`. A block revisited within the
/// same walk raises [`FsError::HasCycles`] rather than looping forever.
pub fn build(
    root: u32,
    children_of: &dyn Fn(u32) -> Vec<u32>,
    accept: &dyn Fn(u32) -> bool,
    opts: &BuildOptions,
) -> Result<TreeNode, FsError> {
    let mut visited = HashSet::new();
    visited.insert(root);

    if opts.order == TraversalOrder::BreadthFirst {
        // Pre-walk in BFS order purely to get cycle detection's "already
        // seen" failure on the same block a BFS walk would hit first; the
        // resulting tree shape is identical to the depth-first build below.
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(root);
        while let Some(nr) = queue.pop_front() {
            for child in children_of(nr) {
                if !accept(child) {
                    continue;
                }
                if !visited.insert(child) {
                    return Err(FsError::HasCycles);
                }
                queue.push_back(child);
            }
        }
        visited.clear();
        visited.insert(root);
    }

    build_inner(root, children_of, accept, &mut visited)
}

fn build_inner(
    nr: u32,
    children_of: &dyn Fn(u32) -> Vec<u32>,
    accept: &dyn Fn(u32) -> bool,
    visited: &mut HashSet<u32>,
) -> Result<TreeNode, FsError> {
    let mut children = Vec::new();
    for child in children_of(nr) {
        if !accept(child) {
            continue;
        }
        if !visited.insert(child) {
            return Err(FsError::HasCycles);
        }
        children.push(build_inner(child, children_of, accept, visited)?);
    }

    Ok(TreeNode { block_nr: nr, children })
}

/// Splits an Amiga path on `/`, handling `.`, `..`, and the empty-component
/// special cases before any hash-table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathComponent<'a> {
    CurrentDir,
    ParentDir,
    Named(&'a str),
}

#[must_use]
pub fn split_path(path: &str) -> Vec<PathComponent<'_>> {
    path.split('/')
        .filter(|c| !c.is_empty())
        .map(|c| match c {
            "." => PathComponent::CurrentDir,
            ".." => PathComponent::ParentDir,
            named => PathComponent::Named(named),
        })
        .collect()
}

/// Resolves a path against a directory's hash-table lookup and a parent
/// lookup for `..`, starting from `root`.
pub fn seek(
    path: &str,
    root: u32,
    lookup: &dyn Fn(u32, &str) -> Option<u32>,
    parent_of: &dyn Fn(u32) -> Option<u32>,
) -> Result<u32, FsError> {
    if path.is_empty() {
        return Ok(root);
    }

    let mut current = root;
    for component in split_path(path) {
        current = match component {
            PathComponent::CurrentDir => current,
            PathComponent::ParentDir => parent_of(current).unwrap_or(current),
            PathComponent::Named(name) => lookup(current, name).ok_or(FsError::NotFound)?,
        };
    }
    Ok(current)
}

/// Matches `text` against an AmigaDOS glob pattern (`*` any run, `?` any
/// single character, other characters literal), case-insensitively.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
    glob_match_chars(&pattern, &text)
}

fn glob_match_chars(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            glob_match_chars(&pattern[1..], text)
                || (!text.is_empty() && glob_match_chars(pattern, &text[1..]))
        }
        Some('?') => !text.is_empty() && glob_match_chars(&pattern[1..], &text[1..]),
        Some(c) => text.first() == Some(c) && glob_match_chars(&pattern[1..], &text[1..]),
    }
}

#[must_use]
pub fn is_hashable(block_type: FSBlockType) -> bool {
    matches!(
        block_type,
        FSBlockType::FileHeader | FSBlockType::UserDir | FSBlockType::Root
    )
}
