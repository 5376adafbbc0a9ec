use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::data::{ProjectRecord, ThumbnailState};
use super::store::ProjectStore;
use crate::config::Config;
use crate::error::Result;
use crate::media::preview;
use crate::media::thumbnail::ThumbnailExtractor;

/// A finished thumbnail load, sent from a worker back to the directory
#[derive(Debug)]
pub struct ThumbnailUpdate {
    pub path: PathBuf,
    pub state: ThumbnailState,
}

/// Collection change notifications for whatever renders the shelf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// The collection was rebuilt from the project list
    Reloaded { count: usize },
    /// A project was added by the user
    Added { path: PathBuf },
    /// A record's thumbnail reached a settled state
    ThumbnailChanged { path: PathBuf },
}

/// The in-memory project collection.
///
/// Owns the records and is their only writer. Thumbnail decoding happens
/// on background workers that report back through a channel; the owner
/// applies those reports with [`apply_thumbnail_updates`] or
/// [`settle_thumbnails`].
///
/// [`apply_thumbnail_updates`]: ProjectDirectory::apply_thumbnail_updates
/// [`settle_thumbnails`]: ProjectDirectory::settle_thumbnails
pub struct ProjectDirectory {
    records: Vec<ProjectRecord>,
    store: ProjectStore,
    extractor: ThumbnailExtractor,
    placeholder: PathBuf,
    updates_tx: UnboundedSender<ThumbnailUpdate>,
    updates_rx: UnboundedReceiver<ThumbnailUpdate>,
    /// Thumbnail requests whose update has not been applied yet
    pending: usize,
    subscribers: Vec<UnboundedSender<DirectoryEvent>>,
}

impl ProjectDirectory {
    pub fn new(store: ProjectStore, extractor: ThumbnailExtractor, placeholder: PathBuf) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            records: Vec::new(),
            store,
            extractor,
            placeholder,
            updates_tx,
            updates_rx,
            pending: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ProjectStore::new(config.project_list_path()),
            ThumbnailExtractor::new(&config.decoder_path, config.image_dir()),
            config.placeholder_path(),
        )
    }

    /// Records, newest first
    pub fn records(&self) -> &[ProjectRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, path: &Path) -> Option<&ProjectRecord> {
        self.records.iter().find(|r| r.matches_path(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn extractor(&self) -> &ThumbnailExtractor {
        &self.extractor
    }

    /// Receive change notifications from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<DirectoryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, event: DirectoryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Rebuild the collection from the project list.
    ///
    /// Entries whose file is gone are skipped. A malformed list aborts the
    /// load and leaves the collection empty. Returns the number of records.
    pub async fn load_all(&mut self) -> Result<usize> {
        self.records.clear();

        let paths = self.store.load().await?;

        for path in paths {
            if path.as_os_str().is_empty() || !path.exists() {
                log::warn!("project file does not exist: {}", path.display());
                continue;
            }
            if self.contains(&path) {
                log::warn!("duplicate entry in project list: {}", path.display());
                continue;
            }

            let record = self.build_record(path).await;
            log::info!("project loaded: {}", record.path.display());
            let path = record.path.clone();
            self.records.push(record);
            self.request_thumbnail(&path);
        }

        self.resort();

        let count = self.records.len();
        self.notify(DirectoryEvent::Reloaded { count });
        Ok(count)
    }

    /// Add a project.
    ///
    /// Returns false for an empty path, a path already on the shelf
    /// (case-insensitive) or a file that does not exist. Otherwise the
    /// record is inserted, the collection re-sorted and the list saved
    /// before the thumbnail is requested.
    pub async fn add(&mut self, path: &Path) -> bool {
        if path.as_os_str().is_empty() || self.contains(path) {
            log::info!("add ignored (empty or duplicate): {}", path.display());
            return false;
        }
        if !path.exists() {
            log::warn!("add ignored, project file does not exist: {}", path.display());
            return false;
        }

        let record = self.build_record(path.to_path_buf()).await;
        self.records.push(record);
        self.resort();
        self.persist().await;

        self.request_thumbnail(path);
        log::info!("project added: {}", path.display());
        self.notify(DirectoryEvent::Added {
            path: path.to_path_buf(),
        });
        true
    }

    /// Stable sort by modification time, newest first; unknown times last
    pub fn resort(&mut self) {
        self.records
            .sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    }

    /// Start loading the thumbnail for the record at `path` in the background.
    ///
    /// The result arrives through the update channel; nothing happens if the
    /// record is not on the shelf.
    pub fn request_thumbnail(&mut self, path: &Path) {
        let Some(record) = self.records.iter_mut().find(|r| r.matches_path(path)) else {
            return;
        };
        record.thumbnail = ThumbnailState::Loading;

        let path = record.path.clone();
        let thumbnail_path = record.thumbnail_path.clone();
        let placeholder = self.placeholder.clone();
        let tx = self.updates_tx.clone();
        self.pending += 1;

        tokio::spawn(async move {
            let state = preview::load_thumbnail(thumbnail_path, placeholder).await;
            let _ = tx.send(ThumbnailUpdate { path, state });
        });
    }

    /// Apply every thumbnail update that has arrived so far, without waiting.
    /// Returns how many were applied.
    pub fn apply_thumbnail_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply_update(update);
            applied += 1;
        }
        applied
    }

    /// Wait until every requested thumbnail has been applied
    pub async fn settle_thumbnails(&mut self) {
        self.apply_thumbnail_updates();
        while self.pending > 0 {
            match self.updates_rx.recv().await {
                Some(update) => self.apply_update(update),
                None => break,
            }
        }
    }

    fn apply_update(&mut self, update: ThumbnailUpdate) {
        self.pending = self.pending.saturating_sub(1);

        // The record may have been dropped by a reload since the request.
        let Some(record) = self.records.iter_mut().find(|r| r.matches_path(&update.path)) else {
            log::debug!("late thumbnail ignored: {}", update.path.display());
            return;
        };
        record.thumbnail = update.state;
        self.notify(DirectoryEvent::ThumbnailChanged { path: update.path });
    }

    /// Generate the thumbnail and read the metadata for a new record.
    /// Thumbnail problems degrade the record instead of rejecting it.
    async fn build_record(&self, path: PathBuf) -> ProjectRecord {
        let thumbnail_path = match self.extractor.generate(&path).await {
            Ok(thumb) => Some(thumb),
            Err(e) if e.is_precondition() => {
                log::warn!("thumbnail skipped for {}: {}", path.display(), e);
                None
            }
            Err(e) => {
                log::error!("thumbnail failed for {}: {}", path.display(), e);
                None
            }
        };

        let modified = modified_time(&path).await;
        ProjectRecord::new(path, thumbnail_path, modified)
    }

    /// Write the list; failures are logged and the session carries on
    async fn persist(&self) {
        let paths: Vec<PathBuf> = self.records.iter().map(|r| r.path.clone()).collect();
        match self.store.save(&paths).await {
            Ok(()) => log::info!("{} saved", self.store.path().display()),
            Err(e) => log::error!("failed to save {}: {}", self.store.path().display(), e),
        }
    }
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(t) => Some(t),
        Err(e) => {
            log::warn!("no modification time for {}: {}", path.display(), e);
            None
        }
    }
}

impl std::fmt::Debug for ProjectDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectDirectory")
            .field("store", &self.store.path())
            .field("records", &self.records.len())
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::collections::HashSet;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;
    #[cfg(unix)]
    use crate::media::testing::FakeDecoder;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn config(&self) -> Config {
            // ffmpeg is never present in tests; thumbnails degrade to the placeholder.
            Config::new(self.dir.path().join("data"), self.dir.path().join("no-ffmpeg"))
        }

        fn directory(&self) -> ProjectDirectory {
            ProjectDirectory::from_config(&self.config())
        }

        /// Write a project file whose mtime is `secs` after the epoch
        fn project(&self, name: &str, secs: u64) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, r#"{"Timelines":[{"Items":[]}]}"#).unwrap();
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
                .unwrap();
            path
        }

        fn write_list(&self, paths: &[&PathBuf]) {
            let list = self.config().project_list_path();
            std::fs::create_dir_all(list.parent().unwrap()).unwrap();
            std::fs::write(list, serde_json::to_string(paths).unwrap()).unwrap();
        }

        fn saved_list(&self) -> HashSet<PathBuf> {
            let text = std::fs::read_to_string(self.config().project_list_path()).unwrap();
            serde_json::from_str::<Vec<PathBuf>>(&text)
                .unwrap()
                .into_iter()
                .collect()
        }

        fn write_placeholder(&self) -> PathBuf {
            let placeholder = self.config().placeholder_path();
            std::fs::create_dir_all(placeholder.parent().unwrap()).unwrap();
            RgbaImage::new(32, 18).save(&placeholder).unwrap();
            placeholder
        }
    }

    fn names(directory: &ProjectDirectory) -> Vec<&str> {
        directory.records().iter().map(|r| r.name.as_str()).collect()
    }

    fn assert_sorted(directory: &ProjectDirectory) {
        for pair in directory.records().windows(2) {
            assert!(pair[0].last_modified >= pair[1].last_modified);
        }
    }

    #[tokio::test]
    async fn test_load_without_list_is_empty() {
        let fixture = Fixture::new();
        let mut directory = fixture.directory();

        assert_eq!(directory.load_all().await.unwrap(), 0);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_load_sorts_newest_first() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        let b = fixture.project("B.ymmp", 2_000);
        fixture.write_list(&[&a, &b]);

        let mut directory = fixture.directory();
        directory.load_all().await.unwrap();

        assert_eq!(names(&directory), vec!["B.ymmp", "A.ymmp"]);
    }

    #[tokio::test]
    async fn test_load_skips_missing_files() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        let gone = fixture.dir.path().join("gone.ymmp");
        let b = fixture.project("B.ymmp", 2_000);
        fixture.write_list(&[&a, &gone, &b]);

        let mut directory = fixture.directory();
        assert_eq!(directory.load_all().await.unwrap(), 2);
        assert!(!directory.contains(&gone));
    }

    #[tokio::test]
    async fn test_load_collapses_duplicate_entries() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        fixture.write_list(&[&a, &a]);

        let mut directory = fixture.directory();
        assert_eq!(directory.load_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_malformed_list_fails() {
        let fixture = Fixture::new();
        let list = fixture.config().project_list_path();
        std::fs::create_dir_all(list.parent().unwrap()).unwrap();
        std::fs::write(&list, "[\"unterminated").unwrap();

        let mut directory = fixture.directory();
        assert!(directory.load_all().await.is_err());
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_add_newest_goes_first_and_is_persisted() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        let b = fixture.project("B.ymmp", 2_000);
        let c = fixture.project("C.ymmp", 3_000);
        fixture.write_list(&[&a, &b]);

        let mut directory = fixture.directory();
        directory.load_all().await.unwrap();
        assert!(directory.add(&c).await);

        assert_eq!(names(&directory), vec!["C.ymmp", "B.ymmp", "A.ymmp"]);
        assert_eq!(fixture.saved_list(), [a, b, c].into_iter().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_add_keeps_order_for_any_insertion_order() {
        let fixture = Fixture::new();
        let mut directory = fixture.directory();

        for (name, secs) in [("m.ymmp", 500), ("x.ymmp", 900), ("k.ymmp", 100), ("z.ymmp", 700)] {
            let path = fixture.project(name, secs);
            assert!(directory.add(&path).await);
            assert_sorted(&directory);
        }
        assert_eq!(names(&directory), vec!["x.ymmp", "z.ymmp", "m.ymmp", "k.ymmp"]);
    }

    #[tokio::test]
    async fn test_add_duplicate_is_noop() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        let mut directory = fixture.directory();

        assert!(directory.add(&a).await);
        assert!(!directory.add(&a).await);

        let shouted = PathBuf::from(a.to_string_lossy().to_uppercase());
        assert!(!directory.add(&shouted).await);

        assert_eq!(directory.len(), 1);
        assert_eq!(fixture.saved_list().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_empty_and_missing() {
        let fixture = Fixture::new();
        let mut directory = fixture.directory();

        assert!(!directory.add(Path::new("")).await);
        assert!(!directory.add(&fixture.dir.path().join("gone.ymmp")).await);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn test_equal_times_keep_insertion_order() {
        let fixture = Fixture::new();
        let first = fixture.project("first.ymmp", 1_000);
        let second = fixture.project("second.ymmp", 1_000);
        let mut directory = fixture.directory();

        directory.add(&first).await;
        directory.add(&second).await;

        assert_eq!(names(&directory), vec!["first.ymmp", "second.ymmp"]);
    }

    #[tokio::test]
    async fn test_unset_times_sort_last() {
        let fixture = Fixture::new();
        let mut directory = fixture.directory();
        directory.records = vec![
            ProjectRecord::new(PathBuf::from("/p/unknown.ymmp"), None, None),
            ProjectRecord::new(
                PathBuf::from("/p/known.ymmp"),
                None,
                Some(SystemTime::UNIX_EPOCH + Duration::from_secs(10)),
            ),
        ];

        directory.resort();
        assert_eq!(names(&directory), vec!["known.ymmp", "unknown.ymmp"]);
    }

    #[tokio::test]
    async fn test_missing_decoder_degrades_to_placeholder() {
        let fixture = Fixture::new();
        let placeholder = fixture.write_placeholder();
        let a = fixture.project("A.ymmp", 1_000);
        let mut directory = fixture.directory();

        assert!(directory.add(&a).await);
        assert_eq!(directory.records()[0].thumbnail_path, None);

        directory.settle_thumbnails().await;
        match &directory.records()[0].thumbnail {
            ThumbnailState::PlaceholderLoaded(t) => assert_eq!(t.source, placeholder),
            other => panic!("unexpected state: {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_thumbnail_without_placeholder_fails_quietly() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        let mut directory = fixture.directory();

        directory.add(&a).await;
        directory.settle_thumbnails().await;

        assert_eq!(directory.records()[0].thumbnail, ThumbnailState::Failed);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        fixture.write_list(&[&a]);
        let b = fixture.project("B.ymmp", 2_000);

        let mut directory = fixture.directory();
        let mut events = directory.subscribe();

        directory.load_all().await.unwrap();
        directory.add(&b).await;
        directory.settle_thumbnails().await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }

        assert_eq!(received[0], DirectoryEvent::Reloaded { count: 1 });
        assert_eq!(received[1], DirectoryEvent::Added { path: b.clone() });
        let thumbnails: HashSet<PathBuf> = received[2..]
            .iter()
            .filter_map(|e| match e {
                DirectoryEvent::ThumbnailChanged { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(thumbnails, [a, b].into_iter().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn test_late_update_for_dropped_record_is_ignored() {
        let fixture = Fixture::new();
        let mut directory = fixture.directory();
        directory.pending = 1;
        directory
            .updates_tx
            .send(ThumbnailUpdate {
                path: PathBuf::from("/p/removed.ymmp"),
                state: ThumbnailState::Failed,
            })
            .unwrap();

        assert_eq!(directory.apply_thumbnail_updates(), 1);
        assert!(directory.is_empty());
        assert_eq!(directory.pending, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_add_with_working_decoder_loads_generated_thumbnail() {
        let fixture = Fixture::new();
        fixture.write_placeholder();
        let tools = fixture.dir.path().join("tools");
        std::fs::create_dir_all(&tools).unwrap();
        let decoder = FakeDecoder::install(&tools);

        let a = fixture.dir.path().join("A.ymmp");
        std::fs::write(&a, r#"{"Timelines":[{"Items":[{"FilePath":"/footage/a.mp4"}]}]}"#).unwrap();

        let config = Config::new(fixture.dir.path().join("data"), &decoder.path);
        let mut directory = ProjectDirectory::from_config(&config);
        assert!(directory.add(&a).await);

        let expected = config.image_dir().join("A.png");
        assert_eq!(directory.records()[0].thumbnail_path, Some(expected.clone()));
        assert_eq!(decoder.recorded_args()[1], "/footage/a.mp4");

        directory.settle_thumbnails().await;
        match &directory.records()[0].thumbnail {
            ThumbnailState::Loaded(t) => {
                assert_eq!(t.source, expected);
                assert_eq!((t.width(), t.height()), (320, 180));
            }
            other => panic!("unexpected state: {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_memory_state() {
        let fixture = Fixture::new();
        let a = fixture.project("A.ymmp", 1_000);
        // A directory where the list file should be makes every save fail.
        std::fs::create_dir_all(fixture.config().project_list_path()).unwrap();

        let mut directory = fixture.directory();
        assert!(directory.add(&a).await);
        assert!(directory.contains(&a));
    }
}
