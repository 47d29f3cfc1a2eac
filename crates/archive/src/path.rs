//! Archive entry naming
//!
//! Archive names are forward-slash separated and, unless a caller explicitly
//! asks for absolute naming, relative and free of upward traversal. Paths that
//! lie outside the root are clamped rather than rejected: any leading `..`
//! segments are dropped, and each clamp is logged at `debug`.

use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// How archive names are derived from walked paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Naming {
    /// Name every entry relative to the archive root
    #[default]
    RootRelative,
    /// Use the path as given: absolute paths keep their absolute names,
    /// relative paths are stored as written (lexically cleaned)
    AsGiven,
}

/// Compute the archive name of `path` for the given naming policy
pub fn entry_name(root: &Path, path: &Path, naming: Naming) -> Result<String> {
    match naming {
        Naming::RootRelative => relative_name(root, path),
        Naming::AsGiven if path.is_absolute() => join_components(root, path, &clean(path)),
        Naming::AsGiven => {
            let cleaned = clean(path);
            let (rest, clamped) = strip_upward(&cleaned);
            if clamped > 0 {
                tracing::debug!(path = %path.display(), clamped, "Clamped upward traversal in archive name");
            }
            if rest.as_os_str().is_empty() {
                return Ok(".".to_string());
            }
            join_components(root, path, &rest)
        }
    }
}

/// Compute the name of `path` relative to `root`
///
/// The directory part is made relative to `root` and any leading `..`
/// segments are stripped; the final component is always kept. If exactly
/// one of the two paths is absolute, both are first made absolute against
/// the current directory.
pub fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let (root, path) = if root.is_absolute() == path.is_absolute() {
        (clean(root), clean(path))
    } else {
        (absolute(root, path)?, absolute(path, root)?)
    };

    if root == path {
        return Ok(".".to_string());
    }

    let Some(base) = path.file_name() else {
        return Err(Error::path_resolution(
            &path,
            &root,
            "path has no final component",
        ));
    };
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let rel = pathdiff::diff_paths(dir, &root).ok_or_else(|| {
        Error::path_resolution(&path, &root, "path cannot be expressed relative to root")
    })?;

    let (rel, clamped) = strip_upward(&rel);
    if clamped > 0 {
        tracing::debug!(
            path = %path.display(),
            root = %root.display(),
            clamped,
            "Clamped upward traversal in archive name"
        );
    }

    let mut name = join_components(&root, &path, &rel)?;
    if !name.is_empty() {
        name.push('/');
    }
    name.push_str(utf8(&root, &path, base)?);
    Ok(name)
}

/// Resolve an archive name to its destination under `dst`
///
/// Absolute names, and a name identical to `dst`, are used verbatim. Any
/// other name is cleaned and has leading `..` segments dropped, so the
/// result never escapes `dst`.
#[must_use]
pub fn resolve_target(dst: &Path, name: &str) -> PathBuf {
    let name_path = Path::new(name);
    if name_path == dst || name_path.is_absolute() {
        return name_path.to_path_buf();
    }

    let (rest, clamped) = strip_upward(&clean(name_path));
    if clamped > 0 {
        tracing::debug!(name, clamped, "Clamped upward traversal in entry name");
    }

    let mut target = dst.to_path_buf();
    for component in rest.components() {
        if let Component::Normal(part) = component {
            target.push(part);
        }
    }
    target
}

/// Lexically normalize a path: drop `.` and fold `..` into a preceding
/// normal component. Leading `..` of a relative path are kept; `..` directly
/// under the filesystem root is dropped.
pub(crate) fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Number of normal components, used as directory depth
pub(crate) fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

fn strip_upward(path: &Path) -> (PathBuf, usize) {
    let mut clamped = 0;
    let mut rest = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir if rest.as_os_str().is_empty() => clamped += 1,
            other => rest.push(other.as_os_str()),
        }
    }
    (rest, clamped)
}

fn absolute(path: &Path, other: &Path) -> Result<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    std::path::absolute(path)
        .map(|p| clean(&p))
        .map_err(|e| Error::path_resolution(path, other, e.to_string()))
}

fn join_components(root: &Path, path: &Path, rel: &Path) -> Result<String> {
    let mut name = String::new();
    for component in rel.components() {
        match component {
            Component::RootDir => name.push('/'),
            Component::Prefix(prefix) => name.push_str(utf8(root, path, prefix.as_os_str())?),
            Component::Normal(part) => {
                if !name.is_empty() && !name.ends_with('/') {
                    name.push('/');
                }
                name.push_str(utf8(root, path, part)?);
            }
            Component::CurDir | Component::ParentDir => {}
        }
    }
    Ok(name)
}

fn utf8<'a>(root: &Path, path: &Path, part: &'a OsStr) -> Result<&'a str> {
    part.to_str()
        .ok_or_else(|| Error::path_resolution(path, root, "path is not valid UTF-8"))
}
