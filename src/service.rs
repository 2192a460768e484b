//! Async entry points for packaging and analysis.
//!
//! Compression and digest work run on the blocking pool; file I/O goes
//! through `tokio::fs`. Each operation reports a `TaskStatus` the caller can
//! poll. There is no cancellation: a failed operation settles in `Error`.

use crate::archive::{create_archive, ArchiveError, ARCHIVE_EXTENSION};
use crate::capture::types::BiometricMetadata;
use crate::config::Config;
use crate::verify::{analyze_archive, AnalysisResult};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Progress of a download or analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Processing,
    Success,
    /// Carries the user-facing message.
    Error(String),
}

/// Service errors.
#[derive(Debug)]
pub enum ServiceError {
    Archive(ArchiveError),
    Io(String),
    Task(String),
}

impl ServiceError {
    /// Message safe to show to users.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Archive(e) => e.user_message().to_string(),
            ServiceError::Io(e) => format!("File error: {e}"),
            ServiceError::Task(_) => "Operation failed unexpectedly".to_string(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Archive(e) => write!(f, "{e}"),
            ServiceError::Io(e) => write!(f, "IO error: {e}"),
            ServiceError::Task(e) => write!(f, "Background task failed: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<ArchiveError> for ServiceError {
    fn from(e: ArchiveError) -> Self {
        ServiceError::Archive(e)
    }
}

/// Download and analysis service.
pub struct ArchiveService {
    config: Config,
    download_status: RwLock<TaskStatus>,
    analysis_status: RwLock<TaskStatus>,
}

impl ArchiveService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            download_status: RwLock::new(TaskStatus::Idle),
            analysis_status: RwLock::new(TaskStatus::Idle),
        }
    }

    pub async fn download_status(&self) -> TaskStatus {
        self.download_status.read().await.clone()
    }

    pub async fn analysis_status(&self) -> TaskStatus {
        self.analysis_status.read().await.clone()
    }

    /// Package `text` and `metadata` and write the archive to the export
    /// directory. Returns the written path.
    pub async fn download_archive(
        &self,
        text: String,
        metadata: BiometricMetadata,
    ) -> Result<PathBuf, ServiceError> {
        *self.download_status.write().await = TaskStatus::Processing;
        let result = self.write_archive(text, metadata).await;
        settle(&self.download_status, &result).await;
        result
    }

    async fn write_archive(
        &self,
        text: String,
        metadata: BiometricMetadata,
    ) -> Result<PathBuf, ServiceError> {
        let file_name = archive_file_name(&metadata.session_id, Utc::now().timestamp_millis());
        let key = self.config.signing_key.clone();

        let bytes = tokio::task::spawn_blocking(move || create_archive(&text, &metadata, &key))
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))??;

        tokio::fs::create_dir_all(&self.config.export_path)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;
        let path = self.config.export_path.join(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;

        tracing::info!(path = %path.display(), size = bytes.len(), "archive written");
        Ok(path)
    }

    /// Analyze an archive on disk.
    pub async fn analyze_file(&self, path: &Path) -> Result<AnalysisResult, ServiceError> {
        *self.analysis_status.write().await = TaskStatus::Processing;
        let result = self.read_and_analyze(path).await;
        settle(&self.analysis_status, &result).await;
        result
    }

    async fn read_and_analyze(&self, path: &Path) -> Result<AnalysisResult, ServiceError> {
        // Check the size before reading anything into memory.
        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?
            .len() as usize;
        if size > self.config.max_archive_bytes {
            let err = ArchiveError::TooLarge {
                size,
                max: self.config.max_archive_bytes,
            };
            tracing::warn!(path = %path.display(), "archive rejected: {err}");
            return Err(err.into());
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?;
        self.analyze(bytes).await
    }

    /// Analyze archive bytes already in memory.
    pub async fn analyze_bytes(&self, bytes: Vec<u8>) -> Result<AnalysisResult, ServiceError> {
        *self.analysis_status.write().await = TaskStatus::Processing;
        let result = self.analyze(bytes).await;
        settle(&self.analysis_status, &result).await;
        result
    }

    async fn analyze(&self, bytes: Vec<u8>) -> Result<AnalysisResult, ServiceError> {
        let policy = self.config.read_policy();
        let key = self.config.signing_key.clone();
        let now_ms = Utc::now().timestamp_millis();

        let result =
            tokio::task::spawn_blocking(move || analyze_archive(&bytes, &policy, &key, now_ms))
                .await
                .map_err(|e| ServiceError::Task(e.to_string()))??;
        Ok(result)
    }
}

async fn settle<T>(status: &RwLock<TaskStatus>, result: &Result<T, ServiceError>) {
    *status.write().await = match result {
        Ok(_) => TaskStatus::Success,
        Err(e) => TaskStatus::Error(e.user_message()),
    };
}

/// `humansign_<session prefix>_<millis>.humansign`
pub fn archive_file_name(session_id: &str, timestamp_ms: i64) -> String {
    let prefix: String = session_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();
    format!("humansign_{prefix}_{timestamp_ms}.{ARCHIVE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::USER_FACING_ERROR;
    use crate::capture::session::{CaptureSession, KeyInput, ManualClock};
    use crate::verify::FinalVerdict;

    fn test_config() -> Config {
        Config {
            export_path: std::env::temp_dir()
                .join(format!("humansign-service-{}", uuid::Uuid::new_v4())),
            ..Config::default()
        }
    }

    fn typed_session(text: &str) -> (String, BiometricMetadata) {
        let clock = ManualClock::starting_at(Utc::now().timestamp_millis() - 30_000);
        let mut session = CaptureSession::with_clock(Box::new(clock.clone()));
        session.start();
        for (i, c) in text.chars().enumerate() {
            session.handle_key_down(KeyInput::from_char(c));
            clock.advance(40.0);
            session.handle_key_up(KeyInput::from_char(c));
            clock.advance(60.0 + ((i * 97) % 300) as f64);
        }
        session.set_text(text);
        session.stop();
        (text.to_string(), session.finalize_metadata())
    }

    #[test]
    fn test_archive_file_name() {
        let name = archive_file_name("1b4e28ba-2fa1-11d2", 1_700_000_000_000);
        assert_eq!(name, "humansign_1b4e28ba_1700000000000.humansign");
    }

    #[tokio::test]
    async fn test_download_then_analyze() {
        let config = test_config();
        let export = config.export_path.clone();
        let service = ArchiveService::new(config);
        assert_eq!(service.download_status().await, TaskStatus::Idle);

        let (text, metadata) = typed_session("a small note");
        let path = service.download_archive(text, metadata).await.unwrap();
        assert_eq!(service.download_status().await, TaskStatus::Success);
        assert!(path.starts_with(&export));

        let result = service.analyze_file(&path).await.unwrap();
        assert_eq!(service.analysis_status().await, TaskStatus::Success);
        assert!(result.is_valid, "anomalies: {:?}", result.anomalies);
        assert!(!result.is_tampered, "anomalies: {:?}", result.anomalies);
        assert_ne!(result.verdict, FinalVerdict::Invalid);

        let _ = tokio::fs::remove_dir_all(export).await;
    }

    #[tokio::test]
    async fn test_garbage_bytes_set_error_status() {
        let service = ArchiveService::new(test_config());
        let err = service.analyze_bytes(b"not a zip".to_vec()).await.unwrap_err();

        assert!(matches!(err, ServiceError::Archive(ArchiveError::Container(_))));
        assert_eq!(
            service.analysis_status().await,
            TaskStatus::Error(USER_FACING_ERROR.to_string())
        );
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_before_read() {
        let config = Config {
            max_archive_bytes: 16,
            ..test_config()
        };
        let dir = config.export_path.clone();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("big.humansign");
        tokio::fs::write(&path, vec![0u8; 64]).await.unwrap();

        let service = ArchiveService::new(config);
        let err = service.analyze_file(&path).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Archive(ArchiveError::TooLarge { size: 64, max: 16 })
        ));

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let service = ArchiveService::new(test_config());
        let err = service
            .analyze_file(Path::new("/nonexistent/humansign/file.humansign"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
        assert!(matches!(service.analysis_status().await, TaskStatus::Error(_)));
    }
}
