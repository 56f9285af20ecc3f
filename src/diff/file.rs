use super::patch::FilePatch;

/// Identifies one file's diff within a diff revision (or an interdiff
/// between two revisions). Fixed for the lifetime of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFile {
    pub filediff_id: u64,
    pub interfilediff_id: Option<u64>,
    pub revision: u32,
    pub interdiff_revision: Option<u32>,
    /// Position of the file in the diff; also the file anchor name
    pub index: usize,
    /// Display path only, never used for addressing
    pub path: String,
}

impl DiffFile {
    /// Name of the anchor on this file's header row
    pub fn anchor_name(&self) -> String {
        self.index.to_string()
    }

    /// `<revision>[-<interdiff>]`, the revision segment of fragment URLs
    pub fn revision_segment(&self) -> String {
        match self.interdiff_revision {
            Some(interdiff) => format!("{}-{}", self.revision, interdiff),
            None => self.revision.to_string(),
        }
    }

    /// `<filediff>[-<interfilediff>]`, the file segment of fragment URLs
    pub fn file_segment(&self) -> String {
        match self.interfilediff_id {
            Some(inter) => format!("{}-{}", self.filediff_id, inter),
            None => self.filediff_id.to_string(),
        }
    }

    /// Descriptors for a local patch, where every file is already rendered.
    /// Filediff ids are synthesized from the file position.
    pub fn from_local_patches(patches: &[FilePatch]) -> Vec<DiffFile> {
        patches
            .iter()
            .enumerate()
            .map(|(index, patch)| DiffFile {
                filediff_id: index as u64 + 1,
                interfilediff_id: None,
                revision: 1,
                interdiff_revision: None,
                index,
                path: patch.path.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(interdiff: Option<u32>, inter: Option<u64>) -> DiffFile {
        DiffFile {
            filediff_id: 42,
            interfilediff_id: inter,
            revision: 3,
            interdiff_revision: interdiff,
            index: 1,
            path: "a.rs".into(),
        }
    }

    #[test]
    fn plain_revision_segments() {
        let f = file(None, None);
        assert_eq!(f.revision_segment(), "3");
        assert_eq!(f.file_segment(), "42");
        assert_eq!(f.anchor_name(), "1");
    }

    #[test]
    fn interdiff_segments_join_with_dash() {
        let f = file(Some(5), Some(77));
        assert_eq!(f.revision_segment(), "3-5");
        assert_eq!(f.file_segment(), "42-77");
    }
}
