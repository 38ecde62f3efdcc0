use serde::{Serialize, Serializer};

/// File change status as announced by the `diff --git` metadata block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl FileStatus {
    pub fn as_char(&self) -> char {
        match self {
            FileStatus::Added => 'A',
            FileStatus::Modified => 'M',
            FileStatus::Deleted => 'D',
            FileStatus::Renamed => 'R',
        }
    }

    /// Classify a metadata line between `diff --git` and the first hunk.
    /// Returns None for lines that say nothing about the status (index, ---, +++, mode changes).
    pub fn from_metadata(line: &str) -> Option<Self> {
        if line.starts_with("new file mode") {
            Some(FileStatus::Added)
        } else if line.starts_with("deleted file mode") {
            Some(FileStatus::Deleted)
        } else if line.starts_with("rename from") || line.starts_with("similarity index") {
            Some(FileStatus::Renamed)
        } else {
            None
        }
    }
}

impl Serialize for FileStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}
