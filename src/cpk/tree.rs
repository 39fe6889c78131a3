use crate::cpk::Entry;
use std::{collections::HashMap, slice};

/// Joins the components of a virtual path.
pub const SEPARATOR: char = '\\';

pub(crate) type EntryMap = HashMap<u32, Entry>;
pub(crate) type ChildMap = HashMap<u32, Vec<u32>>;
pub(crate) type NameMap = HashMap<u32, String>;

/// Read-only view over the maps built when the archive was opened.
#[derive(Clone, Copy)]
pub(crate) struct Tree<'tree> {
    entries: &'tree EntryMap,
    children: &'tree ChildMap,
    names: &'tree NameMap,
}

impl<'tree> Tree<'tree> {
    #[must_use]
    pub(crate) fn new(
        entries: &'tree EntryMap,
        children: &'tree ChildMap,
        names: &'tree NameMap,
    ) -> Self {
        Self {
            entries,
            children,
            names,
        }
    }

    #[must_use]
    pub(crate) fn root(self) -> Children<'tree> {
        self.children_of(0, "")
    }

    fn children_of(self, parent: u32, path: &str) -> Children<'tree> {
        let hashes = self.children.get(&parent).map_or(&[][..], Vec::as_slice);
        Children {
            tree: self,
            path: path.to_owned(),
            hashes: hashes.iter(),
        }
    }
}

/// A directory within the archive. Its children are only looked up when asked for.
#[derive(Clone)]
pub struct DirectoryNode<'tree> {
    tree: Tree<'tree>,
    entry: &'tree Entry,
    name: &'tree str,
    path: String,
}

impl<'tree> DirectoryNode<'tree> {
    #[must_use]
    pub fn entry(&self) -> &'tree Entry {
        self.entry
    }

    #[must_use]
    pub fn name(&self) -> &'tree str {
        self.name
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Enumerates the entries directly inside this directory.
    ///
    /// Each call starts over and yields the same nodes in the same order.
    #[must_use]
    pub fn children(&self) -> Children<'tree> {
        self.tree.children_of(self.entry.hash, &self.path)
    }
}

#[derive(Clone)]
pub struct FileNode<'tree> {
    entry: &'tree Entry,
    name: &'tree str,
    path: String,
}

impl<'tree> FileNode<'tree> {
    #[must_use]
    pub fn entry(&self) -> &'tree Entry {
        self.entry
    }

    #[must_use]
    pub fn name(&self) -> &'tree str {
        self.name
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Clone)]
pub enum Node<'tree> {
    Directory(DirectoryNode<'tree>),
    File(FileNode<'tree>),
}

impl<'tree> Node<'tree> {
    #[must_use]
    pub fn entry(&self) -> &'tree Entry {
        match self {
            Self::Directory(x) => x.entry(),
            Self::File(x) => x.entry(),
        }
    }

    #[must_use]
    pub fn hash(&self) -> u32 {
        self.entry().hash()
    }

    #[must_use]
    pub fn name(&self) -> &'tree str {
        match self {
            Self::Directory(x) => x.name(),
            Self::File(x) => x.name(),
        }
    }

    /// The virtual path of this node, components joined by [`SEPARATOR`].
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Directory(x) => x.path(),
            Self::File(x) => x.path(),
        }
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

/// Lazy sequence over the entries of one directory level.
#[derive(Clone)]
pub struct Children<'tree> {
    tree: Tree<'tree>,
    path: String,
    hashes: slice::Iter<'tree, u32>,
}

impl<'tree> Children<'tree> {
    fn make_node(&self, entry: &'tree Entry) -> Node<'tree> {
        let name = self
            .tree
            .names
            .get(&entry.hash)
            .map_or("", String::as_str);
        let path = if self.path.is_empty() {
            name.to_owned()
        } else {
            format!("{}{SEPARATOR}{name}", self.path)
        };

        if entry.is_directory() {
            Node::Directory(DirectoryNode {
                tree: self.tree,
                entry,
                name,
                path,
            })
        } else {
            Node::File(FileNode { entry, name, path })
        }
    }
}

impl<'tree> Iterator for Children<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let hash = self.hashes.next()?;
            if let Some(entry) = self.tree.entries.get(hash) {
                return Some(self.make_node(entry));
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.hashes.len()))
    }
}
