use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::metadata::{DocumentMetadata, MetadataExtractor};
use crate::naming::{self, NamingTemplate};
use crate::{PaperwatchError, Result};

/// Result of processing one document that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Renamed {
        original: PathBuf,
        target: PathBuf,
        new_name: String,
    },
    /// The generated name equals the current one; nothing was touched.
    AlreadyNamed { name: String },
}

/// What a document would be renamed to, computed without touching the disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamePlan {
    pub source: PathBuf,
    pub target: PathBuf,
    pub new_name: String,
    pub metadata: DocumentMetadata,
}

impl RenamePlan {
    /// The generated name equals the current one.
    pub fn is_noop(&self) -> bool {
        self.source.file_name() == Some(OsStr::new(&self.new_name))
    }
}

/// Extract, name and move a single document.
#[derive(Clone)]
pub struct FileProcessor {
    extractor: Arc<dyn MetadataExtractor>,
    template: Option<NamingTemplate>,
}

impl fmt::Debug for FileProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileProcessor")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

impl FileProcessor {
    pub fn new(extractor: Arc<dyn MetadataExtractor>, template: Option<NamingTemplate>) -> Self {
        Self {
            extractor,
            template,
        }
    }

    /// Work out the target name for `path` without renaming anything.
    pub fn plan(&self, path: &Path) -> Result<RenamePlan> {
        let template = self
            .template
            .ok_or_else(|| PaperwatchError::NoTemplateConfigured {
                path: path.to_path_buf(),
            })?;

        let metadata = self.extractor.extract(path)?;
        let extension = path.extension().and_then(OsStr::to_str).unwrap_or_default();
        let new_name = naming::generate(&metadata, template, extension);
        let target = path
            .parent()
            .map(|dir| dir.join(&new_name))
            .unwrap_or_else(|| PathBuf::from(&new_name));

        Ok(RenamePlan {
            source: path.to_path_buf(),
            target,
            new_name,
            metadata,
        })
    }

    /// Rename `path` after its metadata. Never overwrites and never deletes:
    /// an occupied target yields [`PaperwatchError::NameCollision`] and leaves
    /// the source untouched.
    pub fn process(&self, path: &Path) -> Result<ProcessOutcome> {
        let plan = self.plan(path)?;
        self.commit(plan)
    }

    /// Carry out a plan produced by [`FileProcessor::plan`].
    pub fn commit(&self, plan: RenamePlan) -> Result<ProcessOutcome> {
        if plan.is_noop() {
            debug!(path = %plan.source.display(), "document already carries its generated name");
            return Ok(ProcessOutcome::AlreadyNamed {
                name: plan.new_name,
            });
        }

        move_if_absent(&plan.source, &plan.target)?;
        info!(
            from = %plan.source.display(),
            new_name = %plan.new_name,
            "renamed document"
        );

        Ok(ProcessOutcome::Renamed {
            original: plan.source,
            target: plan.target,
            new_name: plan.new_name,
        })
    }
}

/// Move `source` to `target` only if nothing exists at `target`.
///
/// Linking fails atomically when the target exists, so the link-then-unlink
/// path closes the race with other writers. Filesystems without hard links
/// fall back to a check immediately followed by a rename.
pub(crate) fn move_if_absent(source: &Path, target: &Path) -> Result<()> {
    if occupied(target) {
        return Err(collision(target));
    }

    match fs::hard_link(source, target) {
        Ok(()) => {
            if let Err(err) = fs::remove_file(source) {
                discard_link(source, target);
                return Err(PaperwatchError::Io(err));
            }
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(collision(target)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(PaperwatchError::Io(err)),
        Err(err) => {
            debug!(
                target = %target.display(),
                "hard link unavailable ({}), falling back to rename",
                err
            );
            if occupied(target) {
                return Err(collision(target));
            }
            fs::rename(source, target)?;
            Ok(())
        }
    }
}

/// Undo a link made by [`move_if_absent`] so the document keeps a single
/// name. Returns whether the link is gone.
fn discard_link(source: &Path, target: &Path) -> bool {
    match fs::remove_file(target) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                source = %source.display(),
                target = %target.display(),
                "document left under two names, removing the new link failed: {}",
                err
            );
            false
        }
    }
}

fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn collision(target: &Path) -> PaperwatchError {
    PaperwatchError::NameCollision {
        target: target.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn moves_into_free_slot() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.pdf");
        let target = dir.path().join("b.pdf");
        fs::write(&source, b"payload").unwrap();

        move_if_absent(&source, &target).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"payload");
    }

    #[test]
    fn refuses_occupied_target() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.pdf");
        let target = dir.path().join("b.pdf");
        fs::write(&source, b"source").unwrap();
        fs::write(&target, b"target").unwrap();

        let err = move_if_absent(&source, &target).unwrap_err();

        assert!(matches!(err, PaperwatchError::NameCollision { .. }));
        assert_eq!(fs::read(&source).unwrap(), b"source");
        assert_eq!(fs::read(&target).unwrap(), b"target");
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = move_if_absent(&dir.path().join("gone.pdf"), &dir.path().join("new.pdf"))
            .unwrap_err();
        assert!(matches!(err, PaperwatchError::Io(_)));
    }

    #[test]
    fn discarding_a_link_keeps_the_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.pdf");
        let target = dir.path().join("b.pdf");
        fs::write(&source, b"payload").unwrap();
        fs::hard_link(&source, &target).unwrap();

        assert!(discard_link(&source, &target));
        assert!(!target.exists());
        assert_eq!(fs::read(&source).unwrap(), b"payload");
    }

    #[test]
    fn failed_discard_is_reported() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.pdf");
        fs::write(&source, b"payload").unwrap();

        assert!(!discard_link(&source, &dir.path().join("never-linked.pdf")));
        assert!(source.exists());
    }

    #[test]
    fn commit_of_a_noop_plan_touches_nothing() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("Smith_2020_Results.pdf");
        fs::write(&source, b"payload").unwrap();
        let processor = FileProcessor::new(Arc::new(NoMetadata), Some(NamingTemplate::default()));
        let plan = RenamePlan {
            source: source.clone(),
            target: source.clone(),
            new_name: "Smith_2020_Results.pdf".into(),
            metadata: DocumentMetadata::default(),
        };

        let outcome = processor.commit(plan).unwrap();

        assert_eq!(
            outcome,
            ProcessOutcome::AlreadyNamed {
                name: "Smith_2020_Results.pdf".into()
            }
        );
        assert!(source.exists());
    }

    struct NoMetadata;

    impl MetadataExtractor for NoMetadata {
        fn extract(&self, _path: &Path) -> Result<DocumentMetadata> {
            Ok(DocumentMetadata::default())
        }
    }
}
