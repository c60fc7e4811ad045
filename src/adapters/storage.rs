use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::{Result, RiskError};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Dataset files in a plain directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        if !full_path.is_file() {
            return Err(RiskError::missing_file(&full_path));
        }
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn exists(&self, path: &str) -> bool {
        self.base_path.join(path).is_file()
    }

    fn describe(&self) -> String {
        format!("directory {}", self.base_path.display())
    }
}

/// Dataset files inside a zip archive, as downloaded from Kaggle.
/// Entries are matched by file name, so a top-level folder inside the archive is fine.
#[derive(Debug, Clone)]
pub struct ZipStorage {
    archive_path: PathBuf,
}

impl ZipStorage {
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
        }
    }

    fn open(&self) -> Result<zip::ZipArchive<File>> {
        let file = File::open(&self.archive_path)?;
        Ok(zip::ZipArchive::new(file)?)
    }

    fn entry_name(&self, archive: &zip::ZipArchive<File>, name: &str) -> Option<String> {
        let suffix = format!("/{}", name);
        archive
            .file_names()
            .find(|entry| *entry == name || entry.ends_with(&suffix))
            .map(str::to_string)
    }
}

impl Storage for ZipStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut archive = self.open()?;
        let entry = self.entry_name(&archive, path).ok_or_else(|| {
            RiskError::missing_file(format!("{}:{}", self.archive_path.display(), path))
        })?;

        let mut file = archive.by_name(&entry)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    async fn exists(&self, path: &str) -> bool {
        match self.open() {
            Ok(archive) => self.entry_name(&archive, path).is_some(),
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!("archive {}", self.archive_path.display())
    }
}

/// Either storage backend, chosen from the data location.
#[derive(Debug, Clone)]
pub enum DataSource {
    Directory(LocalStorage),
    Archive(ZipStorage),
}

impl DataSource {
    /// A `.zip` path selects the archive backend, anything else must be a directory.
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        let is_zip = location
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        if is_zip {
            if !location.is_file() {
                return Err(RiskError::missing_file(location));
            }
            Ok(DataSource::Archive(ZipStorage::new(location)))
        } else {
            if !location.is_dir() {
                return Err(RiskError::missing_file(location));
            }
            Ok(DataSource::Directory(LocalStorage::new(location)))
        }
    }

    pub fn from_config(config: &impl ConfigProvider) -> Result<Self> {
        Self::open(config.data_dir())
    }
}

impl Storage for DataSource {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            DataSource::Directory(s) => s.read_file(path).await,
            DataSource::Archive(s) => s.read_file(path).await,
        }
    }

    async fn exists(&self, path: &str) -> bool {
        match self {
            DataSource::Directory(s) => s.exists(path).await,
            DataSource::Archive(s) => s.exists(path).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            DataSource::Directory(s) => s.describe(),
            DataSource::Archive(s) => s.describe(),
        }
    }
}
