//! On-disk plan directories, laid out as `<root>/<org_id>/<plan_id>`.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PlanDirs {
    root: PathBuf,
}

impl PlanDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plan_dir(&self, org_id: Uuid, plan_id: Uuid) -> PathBuf {
        self.root.join(org_id.to_string()).join(plan_id.to_string())
    }

    /// Create the plan's directory, including missing parents.
    pub async fn create(&self, org_id: Uuid, plan_id: Uuid) -> io::Result<PathBuf> {
        let dir = self.plan_dir(org_id, plan_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove the plan's directory and everything in it.
    ///
    /// Returns `Ok(false)` if the directory did not exist, so repeated
    /// removal is safe.
    pub async fn remove(&self, org_id: Uuid, plan_id: Uuid) -> io::Result<bool> {
        match tokio::fs::remove_dir_all(self.plan_dir(org_id, plan_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlanDirs::new(tmp.path());
        let (org_id, plan_id) = (Uuid::new_v4(), Uuid::new_v4());

        let dir = dirs.create(org_id, plan_id).await.unwrap();
        assert_eq!(dir, tmp.path().join(org_id.to_string()).join(plan_id.to_string()));
        assert!(dir.is_dir());

        tokio::fs::write(dir.join("notes.md"), "hello").await.unwrap();

        assert!(dirs.remove(org_id, plan_id).await.unwrap());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn remove_missing_dir_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = PlanDirs::new(tmp.path());
        let removed = dirs.remove(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn create_fails_when_root_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let dirs = PlanDirs::new(&file);
        assert!(dirs.create(Uuid::new_v4(), Uuid::new_v4()).await.is_err());
    }
}
