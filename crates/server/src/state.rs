use std::sync::Arc;

use snowsky_core::{
    Config, Extractor, FolderLocks, JobManager, JobQueue, JobStore, LibraryIndexer,
    LyricsProvider, MemoryJobStore, PostProcessor, ProgressReporter, SanitizedConfig,
    SettingsHandle, Tagger, WorkerPool,
};

/// Worker pool over the boxed tagger and lyrics provider.
pub type DynWorkerPool = WorkerPool<dyn Tagger, dyn LyricsProvider>;

/// Shared application state
pub struct AppState {
    config: Config,
    settings: Arc<SettingsHandle>,
    extractor: Arc<dyn Extractor>,
    reporter: ProgressReporter,
    manager: JobManager,
    pool: DynWorkerPool,
    library: LibraryIndexer,
}

impl AppState {
    /// Wire the job manager, worker pool and library around the given adapters.
    /// The pool is created stopped.
    pub fn new(
        config: Config,
        settings: Arc<SettingsHandle>,
        extractor: Arc<dyn Extractor>,
        tagger: Arc<dyn Tagger>,
        lyrics: Arc<dyn LyricsProvider>,
    ) -> Self {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let queue = JobQueue::new();
        let reporter = ProgressReporter::new(config.worker.reporter_capacity);
        let folder_locks = FolderLocks::new();

        let manager = JobManager::new(
            Arc::clone(&store),
            Arc::clone(&settings),
            Arc::clone(&extractor),
            queue.clone(),
            reporter.clone(),
            config.retry.clone(),
        );

        let pool = WorkerPool::new(
            config.worker.clone(),
            store,
            Arc::clone(&settings),
            Arc::clone(&extractor),
            PostProcessor::new(Arc::clone(&tagger), Arc::clone(&lyrics)),
            queue,
            reporter.clone(),
            folder_locks.clone(),
            config.retry.clone(),
        );

        let library = LibraryIndexer::new(Arc::clone(&settings), folder_locks, tagger, lyrics);

        Self {
            config,
            settings,
            extractor,
            reporter,
            manager,
            pool,
            library,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Config view with the current (possibly updated) settings.
    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::new(&self.config, self.settings.snapshot())
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn extractor(&self) -> &dyn Extractor {
        self.extractor.as_ref()
    }

    pub fn reporter(&self) -> &ProgressReporter {
        &self.reporter
    }

    pub fn manager(&self) -> &JobManager {
        &self.manager
    }

    pub fn pool(&self) -> &DynWorkerPool {
        &self.pool
    }

    pub fn library(&self) -> &LibraryIndexer {
        &self.library
    }
}
