pub mod config;
pub mod extractor;
pub mod job;
pub mod library;
pub mod lyrics;
pub mod manager;
pub mod metrics;
pub mod postprocess;
pub mod progress;
pub mod testing;
pub mod worker;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, SanitizedConfig, Settings, SettingsHandle, SettingsUpdate,
};
pub use extractor::{Extractor, ExtractorConfig, ExtractorError, YtDlpExtractor};
pub use job::{
    AudioFormat, FailureKind, Job, JobError, JobKind, JobPhase, JobStatus, JobStore,
    MemoryJobStore,
};
pub use library::{LibraryError, LibraryIndexer, LibrarySnapshot};
pub use lyrics::{LrclibClient, LyricsConfig, LyricsError, LyricsProvider};
pub use manager::{BatchItem, JobManager, ManagerError, RetryPolicy, SubmitRequest};
pub use postprocess::{LoftyTagger, PostProcessor, Tagger};
pub use progress::{ProgressEvent, ProgressReporter};
pub use worker::{FolderLocks, JobQueue, PoolError, PoolStatus, WorkerConfig, WorkerPool};
