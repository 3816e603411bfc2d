//! External git contract.
//!
//! The index consumes exactly two operations: resolve a reference to an
//! immutable commit identifier, and read a file's bytes at that commit. The
//! commit sha is treated as opaque everywhere else.

use crate::error::GitError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Read access to a repository's commits.
pub trait CommitSource: Send + Sync {
    /// Resolve a reference (branch, tag, sha prefix) to a full commit sha.
    fn resolve_ref(&self, reference: &str) -> Result<String, GitError>;

    /// File bytes at a commit; `None` when the path does not exist there.
    fn read_file(&self, sha: &str, path: &str) -> Result<Option<Vec<u8>>, GitError>;
}

/// Git-backed commit source.
pub struct GitRepo {
    repo: Mutex<git2::Repository>,
}

impl GitRepo {
    pub fn open(path: &Path) -> Result<Self, GitError> {
        Ok(Self {
            repo: Mutex::new(git2::Repository::open(path)?),
        })
    }
}

impl CommitSource for GitRepo {
    fn resolve_ref(&self, reference: &str) -> Result<String, GitError> {
        let repo = self.repo.lock().unwrap();
        let object = repo
            .revparse_single(reference)
            .map_err(|_| GitError::RefNotFound(reference.to_string()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| GitError::RefNotFound(reference.to_string()))?;
        Ok(commit.id().to_string())
    }

    fn read_file(&self, sha: &str, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let repo = self.repo.lock().unwrap();
        let oid = git2::Oid::from_str(sha)?;
        let commit = repo.find_commit(oid)?;
        let tree = commit.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(e) => e,
            Err(_) => return Ok(None),
        };
        let object = entry.to_object(&repo)?;
        let result = match object.peel_to_blob() {
            Ok(blob) => Ok(Some(blob.content().to_vec())),
            Err(_) => Ok(None),
        };
        result
    }
}

/// In-memory commit source for tests and embedders that already hold file
/// contents. References resolve to themselves.
#[derive(Default)]
pub struct StaticCommitSource {
    commits: HashMap<String, HashMap<String, Vec<u8>>>,
    refs: HashMap<String, String>,
}

impl StaticCommitSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file at a commit.
    pub fn add_file(&mut self, sha: &str, path: &str, content: &str) {
        self.commits
            .entry(sha.to_string())
            .or_default()
            .insert(path.to_string(), content.as_bytes().to_vec());
    }

    /// Map a symbolic reference to a sha.
    pub fn add_ref(&mut self, reference: &str, sha: &str) {
        self.refs.insert(reference.to_string(), sha.to_string());
    }
}

impl CommitSource for StaticCommitSource {
    fn resolve_ref(&self, reference: &str) -> Result<String, GitError> {
        if let Some(sha) = self.refs.get(reference) {
            return Ok(sha.clone());
        }
        if self.commits.contains_key(reference) {
            return Ok(reference.to_string());
        }
        Err(GitError::RefNotFound(reference.to_string()))
    }

    fn read_file(&self, sha: &str, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        Ok(self
            .commits
            .get(sha)
            .and_then(|files| files.get(path))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_round_trip() {
        let mut source = StaticCommitSource::new();
        source.add_file("abc123", "src/app.ts", "export {}");
        source.add_ref("main", "abc123");

        assert_eq!(source.resolve_ref("main").unwrap(), "abc123");
        assert_eq!(source.resolve_ref("abc123").unwrap(), "abc123");
        assert!(source.resolve_ref("missing").is_err());
        assert_eq!(
            source.read_file("abc123", "src/app.ts").unwrap().unwrap(),
            b"export {}"
        );
        assert!(source.read_file("abc123", "nope.ts").unwrap().is_none());
    }
}
