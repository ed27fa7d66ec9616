use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{WorkflowError, WorkflowResult};

pub const ARTIFACT_FILE_NAME: &str = "download.mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Missing,
    Empty,
    Present { size: u64 },
}

/// Temporary download location owned by a single run.
#[derive(Debug)]
pub struct DownloadArtifact {
    dir: TempDir,
    path: PathBuf,
}

impl DownloadArtifact {
    pub fn create(temp_root: &Path, run_id: Uuid) -> WorkflowResult<Self> {
        std::fs::create_dir_all(temp_root).map_err(|source| WorkflowError::Io {
            source,
            path: temp_root.to_path_buf(),
        })?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("gifgrab-{run_id}-"))
            .tempdir_in(temp_root)
            .map_err(|source| WorkflowError::Io {
                source,
                path: temp_root.to_path_buf(),
            })?;
        let path = dir.path().join(ARTIFACT_FILE_NAME);
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub async fn inspect(&self) -> WorkflowResult<ArtifactState> {
        inspect_file(&self.path).await
    }

    /// Removes the run directory. Failures are logged and never reported to the user.
    pub fn cleanup(self) {
        let dir = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %dir.display(), "temporary download removed"),
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "failed to remove temporary download")
            }
        }
    }
}

pub async fn inspect_file(path: &Path) -> WorkflowResult<ArtifactState> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() == 0 => Ok(ArtifactState::Empty),
        Ok(meta) => Ok(ArtifactState::Present { size: meta.len() }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ArtifactState::Missing),
        Err(source) => Err(WorkflowError::Io {
            source,
            path: path.to_path_buf(),
        }),
    }
}

/// A downloaded file must exist and hold at least one byte before anything reads it.
pub async fn ensure_downloaded(path: &Path) -> WorkflowResult<u64> {
    match inspect_file(path).await? {
        ArtifactState::Present { size } => Ok(size),
        ArtifactState::Missing => Err(WorkflowError::ArtifactMissing {
            path: path.to_path_buf(),
        }),
        ArtifactState::Empty => Err(WorkflowError::ArtifactEmpty {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inspects_each_artifact_state() {
        let root = tempfile::tempdir().unwrap();
        let artifact = DownloadArtifact::create(root.path(), Uuid::new_v4()).unwrap();
        assert_eq!(artifact.inspect().await.unwrap(), ArtifactState::Missing);

        std::fs::write(artifact.path(), b"").unwrap();
        assert_eq!(artifact.inspect().await.unwrap(), ArtifactState::Empty);

        std::fs::write(artifact.path(), b"mp4 bytes").unwrap();
        assert_eq!(
            artifact.inspect().await.unwrap(),
            ArtifactState::Present { size: 9 }
        );
    }

    #[tokio::test]
    async fn ensure_downloaded_maps_states_to_errors() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("clip.mp4");
        assert!(matches!(
            ensure_downloaded(&path).await,
            Err(WorkflowError::ArtifactMissing { .. })
        ));
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            ensure_downloaded(&path).await,
            Err(WorkflowError::ArtifactEmpty { .. })
        ));
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(ensure_downloaded(&path).await.unwrap(), 3);
    }

    #[test]
    fn runs_get_separate_directories() {
        let root = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let first = DownloadArtifact::create(root.path(), run_id).unwrap();
        let second = DownloadArtifact::create(root.path(), Uuid::new_v4()).unwrap();
        assert_ne!(first.path(), second.path());
        let name = first.dir().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("gifgrab-{run_id}-")));
        assert_eq!(first.path().file_name().unwrap(), ARTIFACT_FILE_NAME);
    }

    #[test]
    fn cleanup_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let artifact = DownloadArtifact::create(&root.path().join("nested"), Uuid::new_v4()).unwrap();
        std::fs::write(artifact.path(), b"data").unwrap();
        let dir = artifact.dir().to_path_buf();
        artifact.cleanup();
        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path().join("nested")).unwrap().count(), 0);
    }

    #[test]
    fn cleanup_of_vanished_directory_is_swallowed() {
        let root = tempfile::tempdir().unwrap();
        let artifact = DownloadArtifact::create(root.path(), Uuid::new_v4()).unwrap();
        std::fs::remove_dir_all(artifact.dir()).unwrap();
        artifact.cleanup();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
