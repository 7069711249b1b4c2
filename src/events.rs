use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
    /// Anything the event source reports that is not a content change, such as an access.
    Other(String),
}

impl ChangeKind {
    /// The kinds that are allowed to trigger a command.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            ChangeKind::Created | ChangeKind::Modified | ChangeKind::Deleted | ChangeKind::Moved
        )
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => f.write_str("created"),
            ChangeKind::Modified => f.write_str("modified"),
            ChangeKind::Deleted => f.write_str("deleted"),
            ChangeKind::Moved => f.write_str("moved"),
            ChangeKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// A single filesystem change, as handed to the filter and carried unchanged to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_directory: bool,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_directory: false,
        }
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = true;
        self
    }

    /// Lossy string form of the path, used for glob matching and substitution.
    pub fn path_str(&self) -> std::borrow::Cow<'_, str> {
        self.path.to_string_lossy()
    }

    /// Split a raw notify event into one change per affected path.
    ///
    /// A rename carrying both ends reports only its source path.
    pub fn from_notify(event: &notify::Event) -> Vec<ChangeEvent> {
        let (kind, folder_hint) = match &event.kind {
            EventKind::Create(create) => (
                ChangeKind::Created,
                match create {
                    CreateKind::Folder => Some(true),
                    CreateKind::File => Some(false),
                    _ => None,
                },
            ),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                return event
                    .paths
                    .first()
                    .map(|from| vec![Self::probe(from, ChangeKind::Moved, None)])
                    .unwrap_or_default();
            }
            EventKind::Modify(ModifyKind::Name(_)) => (ChangeKind::Moved, None),
            EventKind::Modify(_) => (ChangeKind::Modified, None),
            EventKind::Remove(remove) => (
                ChangeKind::Deleted,
                match remove {
                    RemoveKind::Folder => Some(true),
                    RemoveKind::File => Some(false),
                    _ => None,
                },
            ),
            EventKind::Access(_) => (ChangeKind::Other("accessed".to_string()), None),
            EventKind::Any => (ChangeKind::Other("any".to_string()), None),
            EventKind::Other => (ChangeKind::Other("other".to_string()), None),
        };

        event
            .paths
            .iter()
            .map(|path| Self::probe(path, kind.clone(), folder_hint))
            .collect()
    }

    fn probe(path: &Path, kind: ChangeKind, folder_hint: Option<bool>) -> ChangeEvent {
        ChangeEvent {
            path: path.to_path_buf(),
            kind,
            is_directory: folder_hint.unwrap_or_else(|| path.is_dir()),
        }
    }
}
