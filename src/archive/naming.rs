use std::path::{Path, PathBuf};

/// Result of parsing an artifact file stem.
///
/// The strict grammar is `prefix-action_rotation-sequence`, where `sequence` is all digits.
/// Anything else takes the fallback path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedName {
    Parsed {
        prefix: String,
        action: String,
        rotation: String,
    },
    Fallback {
        prefix: String,
        action: String,
        /// The full stem; every fallback file is its own group.
        key: String,
        /// Stem text after the first `-`, or the whole stem when there is none.
        archive_name: String,
    },
}

/// Action used for stems without any `-`.
pub const UNKNOWN_ACTION: &str = "unknown";

/// Parse a file stem (no extension). Pure and deterministic.
pub fn parse_artifact_name(stem: &str) -> ParsedName {
    if let Some(parsed) = parse_strict(stem) {
        return parsed;
    }
    match stem.split_once('-') {
        Some((prefix, rest)) => {
            let action = rest.split_once('_').map_or(rest, |(a, _)| a);
            ParsedName::Fallback {
                prefix: non_empty_or_unknown(prefix),
                action: non_empty_or_unknown(action),
                key: stem.to_string(),
                archive_name: rest.to_string(),
            }
        }
        None => ParsedName::Fallback {
            prefix: stem.to_string(),
            action: UNKNOWN_ACTION.to_string(),
            key: stem.to_string(),
            archive_name: stem.to_string(),
        },
    }
}

fn parse_strict(stem: &str) -> Option<ParsedName> {
    let (head, sequence) = stem.rsplit_once('-')?;
    if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (prefix, rest) = head.split_once('-')?;
    let (action, rotation) = rest.split_once('_')?;
    if prefix.is_empty() || action.is_empty() || rotation.is_empty() {
        return None;
    }
    Some(ParsedName::Parsed {
        prefix: prefix.to_string(),
        action: action.to_string(),
        rotation: rotation.to_string(),
    })
}

fn non_empty_or_unknown(s: &str) -> String {
    if s.is_empty() {
        UNKNOWN_ACTION.to_string()
    } else {
        s.to_string()
    }
}

/// Identity of an archive group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// All files sharing `(prefix, action, rotation)`.
    Category {
        prefix: String,
        action: String,
        rotation: String,
    },
    /// A single file that did not match the strict grammar, keyed by its stem.
    Single {
        prefix: String,
        action: String,
        key: String,
        archive_name: String,
    },
}

impl GroupKey {
    /// Group key for a file path, derived from its stem.
    pub fn for_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from(parse_artifact_name(&stem))
    }

    pub fn prefix(&self) -> &str {
        match self {
            Self::Category { prefix, .. } | Self::Single { prefix, .. } => prefix,
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Self::Category { action, .. } | Self::Single { action, .. } => action,
        }
    }

    /// Archive file name, without extension.
    pub fn archive_stem(&self) -> String {
        match self {
            Self::Category {
                action, rotation, ..
            } => format!("{action}_{rotation}"),
            Self::Single { archive_name, .. } => archive_name.clone(),
        }
    }

    /// `root/prefix/action/<archive_stem>.zip`
    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(self.prefix())
            .join(self.action())
            .join(format!("{}.zip", self.archive_stem()))
    }
}

impl From<ParsedName> for GroupKey {
    fn from(p: ParsedName) -> Self {
        match p {
            ParsedName::Parsed {
                prefix,
                action,
                rotation,
            } => Self::Category {
                prefix,
                action,
                rotation,
            },
            ParsedName::Fallback {
                prefix,
                action,
                key,
                archive_name,
            } => Self::Single {
                prefix,
                action,
                key,
                archive_name,
            },
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category {
                prefix,
                action,
                rotation,
            } => write!(f, "{prefix}/{action}/{rotation}"),
            Self::Single { key, .. } => write!(f, "{key}"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/archive/naming.rs"]
mod tests;
