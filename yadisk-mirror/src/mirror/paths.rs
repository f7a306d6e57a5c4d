use std::fmt;
use std::path::{Component, Path};

use thiserror::Error;

/// Segment prefixes that keep a path out of the mirror, besides `.` and `_`.
pub const RESERVED_PREFIXES: &[&str] = &["venv"];

#[derive(Debug, Error)]
pub enum PathError {
    #[error("{0} is not below the sync root")]
    OutsideRoot(String),
    #[error("path contains unsupported component: {0}")]
    UnsupportedComponent(String),
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(String),
}

/// Collapses separators, `.` and `..` segments into a forward-slash path.
///
/// A leading `/` survives, a `..` that climbs above a relative start is kept,
/// and the empty path becomes `"."`.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Whether a path relative to the sync root takes part in the mirror.
pub fn is_sync_eligible(relative: &str) -> bool {
    if relative.contains('&') {
        return false;
    }
    relative
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .all(|segment| {
            !segment.starts_with('.')
                && !segment.starts_with('_')
                && !RESERVED_PREFIXES
                    .iter()
                    .any(|prefix| segment.starts_with(prefix))
        })
}

/// Canonical directory path relative to the mirror root; empty for the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_relative(path: &str) -> Self {
        let normalized = normalize(path);
        if normalized == "." || normalized == "/" {
            return Self::root();
        }
        Self(normalized.trim_start_matches('/').to_string())
    }

    pub fn join(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self::from_relative(name)
        } else {
            Self::from_relative(&format!("{}/{name}", self.0))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

/// Maps a local directory below `root` onto its mirror path.
pub fn relative_remote_path(root: &Path, dir: &Path) -> Result<RemotePath, PathError> {
    let relative = dir
        .strip_prefix(root)
        .map_err(|_| PathError::OutsideRoot(dir.display().to_string()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| PathError::NonUtf8(dir.display().to_string()))?;
                parts.push(part);
            }
            Component::CurDir => continue,
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => {
                return Err(PathError::UnsupportedComponent(dir.display().to_string()));
            }
        }
    }
    Ok(RemotePath::from_relative(&parts.join("/")))
}

/// Trims trailing separators from a configured remote folder, keeping bare
/// roots such as `/` and `disk:/` intact.
pub fn normalize_remote_root(root: &str) -> String {
    let unified = root.trim().replace('\\', "/");
    let trimmed = unified.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.ends_with(':') {
        format!("{trimmed}/")
    } else {
        normalize(trimmed)
    }
}

/// Full remote path for a directory, or for a file inside it.
pub fn remote_join(remote_root: &str, dir: &RemotePath, name: Option<&str>) -> String {
    let tail = match name {
        Some(name) => dir.join(name),
        None => dir.clone(),
    };
    if tail.is_root() {
        remote_root.to_string()
    } else if remote_root.ends_with('/') {
        format!("{remote_root}{}", tail.as_str())
    } else {
        format!("{remote_root}/{}", tail.as_str())
    }
}
