//! The filesystem operations provisioning needs, behind a trait so the policy can run
//! against the real disk ([`OsFs`]) or an in-memory tree ([`MemFs`]).

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};

pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;
    /// Create a single directory, the parent must already exist.
    fn create_dir(&self, path: &Path) -> IoResult<()>;
    fn remove_dir_all(&self, path: &Path) -> IoResult<()>;
    /// Names of the entries of a directory, sorted.
    fn list_dir(&self, path: &Path) -> IoResult<Vec<String>>;
    fn rename(&self, from: &Path, to: &Path) -> IoResult<()>;
    fn write(&self, path: &Path, contents: &[u8]) -> IoResult<()>;
    fn read(&self, path: &Path) -> IoResult<Vec<u8>>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl Filesystem for OsFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir(&self, path: &Path) -> IoResult<()> {
        fs::create_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> IoResult<()> {
        fs::remove_dir_all(path)
    }

    fn list_dir(&self, path: &Path) -> IoResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn rename(&self, from: &Path, to: &Path) -> IoResult<()> {
        fs::rename(from, to)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> IoResult<()> {
        fs::write(path, contents)
    }

    fn read(&self, path: &Path) -> IoResult<Vec<u8>> {
        fs::read(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct MemState {
    nodes: BTreeMap<PathBuf, Node>,
    /// paths whose creation fails with PermissionDenied
    denied: HashSet<PathBuf>,
    /// rename sources that fail as if the destination vanished
    failing_renames: HashSet<PathBuf>,
}

/// In-memory filesystem with fault injection, used to exercise the provisioning policy
/// without touching the disk.
#[derive(Debug, Default)]
pub struct MemFs {
    state: RefCell<MemState>,
}

fn not_found(path: &Path) -> IoError {
    IoError::new(
        IoErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl MemState {
    fn is_dir(&self, path: &Path) -> bool {
        // the empty parent of a relative path always exists
        path.as_os_str().is_empty() || matches!(self.nodes.get(path), Some(Node::Dir))
    }

    fn parent_is_dir(&self, path: &Path) -> bool {
        path.parent().is_some_and(|parent| self.is_dir(parent))
    }

    fn subtree(&self, root: &Path) -> Vec<PathBuf> {
        self.nodes
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect()
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` and all of its ancestors.
    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.add_dir(path);
        self
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state.borrow_mut();
        for ancestor in path.as_ref().ancestors() {
            if !ancestor.as_os_str().is_empty() {
                state.nodes.insert(ancestor.to_path_buf(), Node::Dir);
            }
        }
    }

    /// Put a file at `path`, creating missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.state
            .borrow_mut()
            .nodes
            .insert(path.to_path_buf(), Node::File(contents.into()));
    }

    /// Make every later `create_dir(path)` fail with PermissionDenied.
    pub fn deny_create(&self, path: impl AsRef<Path>) {
        self.state
            .borrow_mut()
            .denied
            .insert(path.as_ref().to_path_buf());
    }

    /// Make every later rename of `from` fail as if its destination had vanished.
    pub fn fail_rename(&self, from: impl AsRef<Path>) {
        self.state
            .borrow_mut()
            .failing_renames
            .insert(from.as_ref().to_path_buf());
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        self.state.borrow().is_dir(path.as_ref())
    }

    pub fn is_file(&self, path: impl AsRef<Path>) -> bool {
        matches!(
            self.state.borrow().nodes.get(path.as_ref()),
            Some(Node::File(_))
        )
    }

    /// Every path currently present, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.borrow().nodes.keys().cloned().collect()
    }
}

impl Filesystem for MemFs {
    fn exists(&self, path: &Path) -> bool {
        self.state.borrow().nodes.contains_key(path)
    }

    fn create_dir(&self, path: &Path) -> IoResult<()> {
        let mut state = self.state.borrow_mut();
        if state.denied.contains(path) {
            return Err(IoError::new(
                IoErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        if state.nodes.contains_key(path) {
            return Err(IoError::new(
                IoErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        if !state.parent_is_dir(path) {
            return Err(not_found(path));
        }
        state.nodes.insert(path.to_path_buf(), Node::Dir);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> IoResult<()> {
        let mut state = self.state.borrow_mut();
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        for victim in state.subtree(path) {
            state.nodes.remove(&victim);
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> IoResult<Vec<String>> {
        let state = self.state.borrow();
        if !matches!(state.nodes.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        // BTreeMap keeps these sorted already
        Ok(state
            .nodes
            .keys()
            .filter(|child| child.parent() == Some(path))
            .filter_map(|child| child.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn rename(&self, from: &Path, to: &Path) -> IoResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.nodes.contains_key(from) {
            return Err(not_found(from));
        }
        if state.failing_renames.contains(from) || !state.parent_is_dir(to) {
            return Err(not_found(to.parent().unwrap_or(to)));
        }
        if state.is_dir(to) {
            return Err(IoError::new(
                IoErrorKind::AlreadyExists,
                format!("{} is a directory", to.display()),
            ));
        }
        for old in state.subtree(from) {
            if let (Some(node), Ok(rest)) = (state.nodes.remove(&old), old.strip_prefix(from)) {
                let new = if rest.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rest)
                };
                state.nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> IoResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.parent_is_dir(path) {
            return Err(not_found(path));
        }
        if state.is_dir(path) {
            return Err(IoError::new(
                IoErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }
        state
            .nodes
            .insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    fn read(&self, path: &Path) -> IoResult<Vec<u8>> {
        match self.state.borrow().nodes.get(path) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            Some(Node::Dir) => Err(IoError::new(
                IoErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}
