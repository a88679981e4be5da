//! The synchronization engine.
//!
//! Owns the canonical in-memory [`Snapshot`]. Every mutation is applied to
//! the snapshot first and then offered to the remote store; a remote failure
//! is reported but never rolls the local change back. The snapshot is
//! written to the local cache after every change while a user is logged in.
//!
//! The snapshot lock is a synchronous `parking_lot::RwLock` and is never
//! held across an `.await`. Bulk administrative flows serialize on an async
//! gate instead, so two resets cannot interleave their remote steps.

use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use super::audit::{compute_orphans, OrphanReport};
use super::backup::{parse_backup, BackupContents, BackupDocument};
use super::confirm::{ConfirmOptions, ConfirmationGate};
use super::session::{authenticate, Session};
use super::{EngineEvent, MutationOutcome, SyncError, SyncResult};
use crate::model::ids::normalize_record;
use crate::model::*;
use crate::remote::{
    ImageFolder, PostgrestTransport, RemoteConfig, RemoteError, RemoteResult, RemoteStore,
    RemoteTransport,
};
use crate::storage::LocalCache;

/// Row ids removed by a bulk deletion, per collection.
pub type DeletedIds = BTreeMap<CollectionName, Vec<String>>;

const EVENT_CAPACITY: usize = 256;

const RESET_MESSAGE: &str = "PERINGATAN BAHAYA!\n\nAnda akan menghapus SELURUH DATA untuk memulai Tahun Ajaran Baru. Lanjutkan?";

/// Result of the orphan cleanup flow.
#[derive(Debug, Clone, PartialEq)]
pub enum CleanupOutcome {
    /// Nothing to delete; no confirmation was asked.
    Clean,
    /// The operator declined; nothing was deleted.
    Declined,
    /// The listed orphans were deleted.
    Removed(OrphanReport),
}

/// Which branding logo an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoKind {
    App,
    Report,
}

impl LogoKind {
    fn file_name(&self) -> String {
        let prefix = match self {
            LogoKind::App => "app_logo",
            LogoKind::Report => "report_logo",
        };
        format!("{}_{}.jpg", prefix, chrono::Utc::now().timestamp_millis())
    }
}

/// Decodes a JSON record into an entity, normalizing identifiers first.
pub fn decode_record<T: Entity>(value: Value) -> SyncResult<T> {
    Ok(serde_json::from_value(normalize_record(value))?)
}

/// Runs `$body` with `$t` bound to the entity type of `$collection`.
macro_rules! with_entity {
    ($collection:expr, $t:ident => $body:expr) => {
        match $collection {
            CollectionName::Classes => {
                type $t = ClassRecord;
                $body
            }
            CollectionName::Students => {
                type $t = Student;
                $body
            }
            CollectionName::LearningObjectives => {
                type $t = LearningObjective;
                $body
            }
            CollectionName::Assessments => {
                type $t = Assessment;
                $body
            }
            CollectionName::CategoryResults => {
                type $t = CategoryResult;
                $body
            }
            CollectionName::P5Criteria => {
                type $t = P5Criteria;
                $body
            }
            CollectionName::P5Assessments => {
                type $t = P5Assessment;
                $body
            }
            CollectionName::Reflections => {
                type $t = Reflection;
                $body
            }
            CollectionName::ReflectionQuestions => {
                type $t = ReflectionQuestion;
                $body
            }
            CollectionName::ReflectionAnswers => {
                type $t = ReflectionAnswer;
                $body
            }
            CollectionName::Notes => {
                type $t = StudentNote;
                $body
            }
            CollectionName::Attendance => {
                type $t = AttendanceData;
                $body
            }
            CollectionName::Settings => Err(SyncError::BadRequest(
                "settings are saved through the settings operation".to_string(),
            )),
        }
    };
}

pub struct SyncEngine {
    state: RwLock<Snapshot>,
    session: RwLock<Option<Session>>,
    cache: LocalCache,
    remote: RemoteStore,
    confirm: ConfirmationGate,
    events: broadcast::Sender<EngineEvent>,
    admin_gate: Mutex<()>,
    loading: AtomicUsize,
}

/// Marks the engine busy until dropped.
struct LoadingGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.engine.loading.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.engine.emit(EngineEvent::Loading { active: false });
        }
    }
}

impl SyncEngine {
    pub fn new(cache: LocalCache, remote: RemoteStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(Snapshot::default()),
            session: RwLock::new(None),
            cache,
            remote,
            confirm: ConfirmationGate::new(events.clone()),
            events,
            admin_gate: Mutex::new(()),
            loading: AtomicUsize::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.state.read().clone()
    }

    /// Runs `f` against the current snapshot without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.state.read())
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub fn is_online(&self) -> bool {
        self.remote.is_connected()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn confirmation(&self) -> &ConfirmationGate {
        &self.confirm
    }

    pub fn remote(&self) -> &RemoteStore {
        &self.remote
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Opens a confirmation prompt and waits for the operator.
    pub async fn confirm_action(&self, options: ConfirmOptions) -> bool {
        self.confirm.confirm_action(options).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        if self.loading.fetch_add(1, Ordering::SeqCst) == 0 {
            self.emit(EngineEvent::Loading { active: true });
        }
        LoadingGuard { engine: self }
    }

    /// Writes the snapshot to the cache while a user is logged in. A cache
    /// failure is logged and otherwise ignored.
    fn persist(&self) {
        let snapshot = {
            let state = self.state.read();
            if state.user.is_none() {
                return;
            }
            state.clone()
        };
        if let Err(e) = self.cache.save_snapshot(&snapshot) {
            warn!("Failed to cache snapshot: {}", e);
        }
    }

    fn record_changed(&self, collection: CollectionName, id: &str) {
        self.persist();
        self.emit(EngineEvent::RecordChanged {
            collection,
            id: id.to_string(),
        });
    }

    fn replace_snapshot(&self, mut snapshot: Snapshot) {
        {
            let mut state = self.state.write();
            snapshot.user = state.user.clone();
            *state = snapshot;
        }
        self.persist();
        self.emit(EngineEvent::SnapshotReplaced);
    }

    fn require_user(&self) -> SyncResult<User> {
        self.current_user().ok_or(SyncError::Unauthenticated)
    }

    fn authorize(&self, collection: CollectionName) -> SyncResult<()> {
        let user = self.require_user()?;
        if user.role.can_write(collection) {
            Ok(())
        } else {
            Err(SyncError::Forbidden(format!(
                "{} may not modify {}",
                user.username, collection
            )))
        }
    }

    fn require_admin(&self) -> SyncResult<()> {
        let user = self.require_user()?;
        if user.role.is_admin() {
            Ok(())
        } else {
            Err(SyncError::Forbidden(format!(
                "{} may not run administrative operations",
                user.username
            )))
        }
    }

    /// Maps a remote result onto the mutation state machine, surfacing
    /// failures as an error notice.
    fn settle(&self, op: &str, collection: CollectionName, result: RemoteResult<()>) -> MutationOutcome {
        match result {
            Ok(()) => MutationOutcome::Confirmed,
            Err(RemoteError::NotConfigured) => MutationOutcome::LocalOnly,
            Err(e) => {
                warn!("{} on {} kept locally, remote failed: {}", op, collection, e);
                self.emit(EngineEvent::error(format!("Error: {}", e)));
                MutationOutcome::Failed(e.to_string())
            }
        }
    }

    fn fail(&self, prefix: &str, err: SyncError) -> SyncError {
        error!("{}{}", prefix, err);
        self.emit(EngineEvent::error(format!("{}{}", prefix, err)));
        err
    }

    // ------------------------------------------------------------------
    // Record mutations
    // ------------------------------------------------------------------

    /// Appends a record. An empty id gets a timestamp id; a record whose key
    /// is already present replaces that row.
    pub async fn add<T: Entity>(&self, mut record: T) -> SyncResult<MutationOutcome> {
        self.authorize(T::COLLECTION)?;
        {
            let mut state = self.state.write();
            let table = T::table_mut(&mut state);
            if record.id().is_empty() {
                record.set_id(table.fresh_id());
            }
            table.upsert(record.clone());
        }
        self.record_changed(T::COLLECTION, record.id());

        let value = serde_json::to_value(&record)?;
        let result = self.remote.create(T::COLLECTION, &value).await;
        Ok(self.settle("add", T::COLLECTION, result))
    }

    /// Replaces the row with the record's id.
    pub async fn update<T: Entity>(&self, record: T) -> SyncResult<MutationOutcome> {
        self.authorize(T::COLLECTION)?;
        if T::table_mut(&mut self.state.write())
            .replace_by_id(record.clone())
            .is_none()
        {
            debug!("Update of unknown {} row {}", T::COLLECTION, record.id());
        }
        self.record_changed(T::COLLECTION, record.id());

        let value = serde_json::to_value(&record)?;
        let result = self.remote.update(T::COLLECTION, &value).await;
        Ok(self.settle("update", T::COLLECTION, result))
    }

    pub async fn delete<T: Entity>(&self, id: &str) -> SyncResult<MutationOutcome> {
        self.authorize(T::COLLECTION)?;
        T::table_mut(&mut self.state.write()).remove_by_id(id);
        self.record_changed(T::COLLECTION, id);

        let result = self.remote.delete(T::COLLECTION, id).await;
        Ok(self.settle("delete", T::COLLECTION, result))
    }

    /// Inserts or replaces by natural key. A replacing upsert keeps the
    /// stored row's id and becomes a remote update; a new record without an
    /// id gets its composite natural id and becomes a remote create.
    pub async fn upsert<T: Entity>(&self, mut record: T) -> SyncResult<MutationOutcome> {
        self.authorize(T::COLLECTION)?;
        let existed = {
            let mut state = self.state.write();
            let table = T::table_mut(&mut state);
            let existing_id = table.get(&record.key()).map(|row| row.id().to_string());
            match existing_id {
                Some(ref id) => record.set_id(id.clone()),
                None if record.id().is_empty() => {
                    let id = record.natural_id().unwrap_or_else(|| table.fresh_id());
                    record.set_id(id);
                }
                None => {}
            }
            table.upsert(record.clone());
            existing_id.is_some()
        };
        self.record_changed(T::COLLECTION, record.id());

        let value = serde_json::to_value(&record)?;
        let result = if existed {
            self.remote.update(T::COLLECTION, &value).await
        } else {
            self.remote.create(T::COLLECTION, &value).await
        };
        Ok(self.settle("upsert", T::COLLECTION, result))
    }

    pub async fn add_json(&self, collection: CollectionName, value: Value) -> SyncResult<MutationOutcome> {
        with_entity!(collection, T => self.add(decode_record::<T>(value)?).await)
    }

    pub async fn update_json(&self, collection: CollectionName, value: Value) -> SyncResult<MutationOutcome> {
        with_entity!(collection, T => self.update(decode_record::<T>(value)?).await)
    }

    pub async fn upsert_json(&self, collection: CollectionName, value: Value) -> SyncResult<MutationOutcome> {
        with_entity!(collection, T => self.upsert(decode_record::<T>(value)?).await)
    }

    pub async fn delete_in(&self, collection: CollectionName, id: &str) -> SyncResult<MutationOutcome> {
        with_entity!(collection, T => self.delete::<T>(id).await)
    }

    /// Replaces the settings singleton and saves the packed row.
    pub async fn set_settings(&self, settings: SchoolSettings) -> SyncResult<MutationOutcome> {
        self.authorize(CollectionName::Settings)?;
        self.state.write().settings = settings.clone();
        self.persist();
        self.emit(EngineEvent::SettingsChanged);

        let result = self.remote.save_settings(&settings).await;
        Ok(self.settle("save", CollectionName::Settings, result))
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Replaces the snapshot with a fresh remote fetch, keeping the session
    /// user. Returns false when offline or when the fetch failed, leaving
    /// the snapshot as it was.
    pub async fn refresh_data(&self) -> bool {
        if !self.remote.is_connected() {
            return false;
        }
        let _loading = self.begin_loading();
        match self.remote.fetch_all_data().await {
            Some(data) => {
                let mut snapshot = data.snapshot;
                snapshot.settings = match data.settings {
                    Some(settings) => settings,
                    None => self.state.read().settings.clone(),
                };
                if !data.skipped.is_empty() {
                    self.emit(EngineEvent::error(format!(
                        "{} baris data tidak dapat dibaca dan dilewati",
                        data.skipped.len()
                    )));
                }
                self.replace_snapshot(snapshot);
                info!("Snapshot refreshed from remote");
                true
            }
            None => {
                warn!("Remote fetch failed; keeping current snapshot");
                false
            }
        }
    }

    /// Replaces the snapshot with the cached one, keeping the session user.
    fn load_cached(&self) -> bool {
        match self.cache.load_snapshot() {
            Ok(Some(snapshot)) => {
                self.replace_snapshot(snapshot);
                info!("Snapshot loaded from local cache");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read cached snapshot: {}", e);
                false
            }
        }
    }

    /// Remote fetch when online, falling back to the cache; cache when
    /// offline.
    async fn load_data(&self) {
        if self.remote.is_connected() && self.refresh_data().await {
            return;
        }
        self.load_cached();
    }

    /// Start-up: restore the session, fetch settings, load data.
    pub async fn start(&self) -> SyncResult<()> {
        match self.cache.load_user() {
            Ok(Some(user)) => {
                info!("Restored session for {}", user.username);
                *self.session.write() = Some(Session::start(user.clone()));
                self.state.write().user = Some(user.clone());
                self.emit(EngineEvent::SessionChanged { user: Some(user) });
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read session user: {}", e),
        }

        if let Some(settings) = self.remote.fetch_settings().await {
            self.state.write().settings = settings;
            self.emit(EngineEvent::SettingsChanged);
        }

        if self.current_user().is_some() {
            self.load_data().await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Logs in with one of the fixed accounts and loads data. `None` on bad
    /// credentials.
    pub async fn login(&self, username: &str, password: &str) -> SyncResult<Option<Session>> {
        let Some(user) = authenticate(username, password) else {
            warn!("Failed login for {}", username);
            return Ok(None);
        };

        let session = Session::start(user.clone());
        self.cache.save_user(&user)?;
        *self.session.write() = Some(session.clone());
        self.state.write().user = Some(user.clone());
        info!("{} logged in as {:?}", user.username, user.role);
        self.emit(EngineEvent::SessionChanged { user: Some(user) });

        self.load_data().await;
        Ok(Some(session))
    }

    /// Ends the session. Cached data stays.
    pub fn logout(&self) -> SyncResult<()> {
        let previous = self.state.write().user.take();
        *self.session.write() = None;
        self.cache.clear_user()?;
        if let Some(user) = previous {
            info!("{} logged out", user.username);
        }
        self.emit(EngineEvent::SessionChanged { user: None });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bulk administrative flows
    // ------------------------------------------------------------------

    /// Deletes rows remotely in one call, then locally.
    async fn delete_batch(
        &self,
        collection: CollectionName,
        ids: Vec<String>,
        deleted: &mut DeletedIds,
    ) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.remote.batch_delete(collection, &ids).await?;
        let set: HashSet<String> = ids.iter().cloned().collect();
        let removed = self.state.write().remove_ids(collection, &set);
        self.persist();
        debug!("Removed {} {} rows locally", removed, collection);
        deleted.insert(collection, ids);
        Ok(())
    }

    /// Deletes the scores and category narratives of one category for every
    /// student of a class.
    pub async fn clear_class_intra_data(&self, class_id: &str, category: &str) -> SyncResult<DeletedIds> {
        self.authorize(CollectionName::Assessments)?;
        self.authorize(CollectionName::CategoryResults)?;
        let _gate = self.admin_gate.lock().await;
        let _loading = self.begin_loading();

        let (assessments, results) = {
            let state = self.state.read();
            let students: HashSet<&str> = state
                .students
                .iter()
                .filter(|s| s.class_id == class_id)
                .map(|s| s.id.as_str())
                .collect();
            let tps: HashSet<&str> = state
                .learning_objectives
                .iter()
                .filter(|t| t.category == category)
                .map(|t| t.id.as_str())
                .collect();
            let assessments: Vec<String> = state
                .assessments
                .iter()
                .filter(|a| students.contains(a.student_id.as_str()) && tps.contains(a.tp_id.as_str()))
                .map(|a| a.id.clone())
                .collect();
            let results: Vec<String> = state
                .category_results
                .iter()
                .filter(|r| students.contains(r.student_id.as_str()) && r.category == category)
                .map(|r| r.id.clone())
                .collect();
            (assessments, results)
        };

        let mut deleted = DeletedIds::new();
        self.delete_batch(CollectionName::Assessments, assessments, &mut deleted)
            .await
            .map_err(|e| self.fail("Gagal reset data: ", e))?;
        self.delete_batch(CollectionName::CategoryResults, results, &mut deleted)
            .await
            .map_err(|e| self.fail("Gagal reset data: ", e))?;
        self.emit(EngineEvent::SnapshotReplaced);
        info!("Cleared {} data for class {}: {:?}", category, class_id, deleted);

        self.refresh_data().await;
        Ok(deleted)
    }

    /// Deletes every P5 assessment of the students of a class.
    pub async fn clear_class_p5_data(&self, class_id: &str) -> SyncResult<DeletedIds> {
        self.authorize(CollectionName::P5Assessments)?;
        let _gate = self.admin_gate.lock().await;
        let _loading = self.begin_loading();

        let ids: Vec<String> = {
            let state = self.state.read();
            let students: HashSet<&str> = state
                .students
                .iter()
                .filter(|s| s.class_id == class_id)
                .map(|s| s.id.as_str())
                .collect();
            state
                .p5_assessments
                .iter()
                .filter(|a| students.contains(a.student_id.as_str()))
                .map(|a| a.id.clone())
                .collect()
        };

        let mut deleted = DeletedIds::new();
        self.delete_batch(CollectionName::P5Assessments, ids, &mut deleted)
            .await
            .map_err(|e| self.fail("Gagal reset data: ", e))?;
        self.emit(EngineEvent::SnapshotReplaced);
        info!("Cleared P5 data for class {}", class_id);

        self.refresh_data().await;
        Ok(deleted)
    }

    /// Wipes every operational collection after confirmation, keeping the
    /// user, the settings and optionally the learning objectives.
    pub async fn reset_system(&self, keep_learning_objectives: bool) -> SyncResult<()> {
        self.require_admin()?;
        let _gate = self.admin_gate.lock().await;
        if !self.confirm.confirm_action(ConfirmOptions::new(RESET_MESSAGE)).await {
            return Err(SyncError::Cancelled);
        }
        let _loading = self.begin_loading();

        if self.remote.is_connected() {
            self.remote
                .clear_database(keep_learning_objectives)
                .await
                .map_err(|e| self.fail("Reset Error: ", e.into()))?;
        }

        {
            let mut state = self.state.write();
            let kept = if keep_learning_objectives {
                std::mem::take(&mut state.learning_objectives)
            } else {
                Table::new()
            };
            let mut fresh = Snapshot::empty_with(state.user.clone(), state.settings.clone());
            fresh.learning_objectives = kept;
            *state = fresh;
        }
        self.persist();
        self.emit(EngineEvent::SnapshotReplaced);
        self.emit(EngineEvent::info("Sistem direset!"));
        info!("System reset (kept learning objectives: {})", keep_learning_objectives);

        self.refresh_data().await;
        Ok(())
    }

    /// Orphans in the current snapshot.
    pub fn compute_orphans(&self) -> OrphanReport {
        self.read(compute_orphans)
    }

    /// Finds orphans and, after confirmation, deletes them collection by
    /// collection. The first failing collection aborts the rest.
    pub async fn cleanup(&self) -> SyncResult<CleanupOutcome> {
        self.require_admin()?;
        let _gate = self.admin_gate.lock().await;

        let report = self.compute_orphans();
        if report.is_clean() {
            self.emit(EngineEvent::info("Database sudah bersih. Tidak ditemukan data yatim."));
            return Ok(CleanupOutcome::Clean);
        }

        let message = format!(
            "Ditemukan {} data yatim (tidak memiliki referensi yang valid). Apakah Anda ingin menghapusnya untuk membersihkan database?",
            report.total()
        );
        let confirmed = self
            .confirm
            .confirm_action(
                ConfirmOptions::new(message)
                    .with_title("Pembersihan Database")
                    .with_confirm_label("Ya, Bersihkan"),
            )
            .await;
        if !confirmed {
            info!("Orphan cleanup declined");
            return Ok(CleanupOutcome::Declined);
        }

        let _loading = self.begin_loading();
        let mut deleted = DeletedIds::new();
        for (collection, ids) in &report.by_collection {
            self.delete_batch(*collection, ids.clone(), &mut deleted)
                .await
                .map_err(|e| self.fail("Gagal melakukan pembersihan: ", e))?;
        }
        self.emit(EngineEvent::SnapshotReplaced);
        self.emit(EngineEvent::info("Pembersihan selesai!"));
        info!("Removed {} orphaned rows", report.total());

        self.refresh_data().await;
        Ok(CleanupOutcome::Removed(report))
    }

    // ------------------------------------------------------------------
    // Backup / restore
    // ------------------------------------------------------------------

    /// Exports the current snapshot. No remote interaction.
    pub fn backup(&self) -> SyncResult<BackupDocument> {
        self.require_user()?;
        Ok(self.read(BackupDocument::export))
    }

    /// Validates a backup document, then restores it.
    pub async fn restore(&self, document: &str) -> SyncResult<()> {
        self.require_admin()?;
        let contents = parse_backup(document).map_err(|e| self.fail("Restore Error: ", e.into()))?;
        self.restore_snapshot(contents).await
    }

    /// Full remote clear and rewrite (when online), then local replacement
    /// keeping the session user, then a reconciling refresh. A backup
    /// without settings keeps the current ones, locally and remotely.
    pub async fn restore_snapshot(&self, contents: BackupContents) -> SyncResult<()> {
        self.require_admin()?;
        let _gate = self.admin_gate.lock().await;
        let _loading = self.begin_loading();

        let BackupContents {
            mut snapshot,
            has_settings,
        } = contents;
        if !has_settings {
            snapshot.settings = self.state.read().settings.clone();
        }

        if self.remote.is_connected() {
            self.remote
                .restore_database(&snapshot, has_settings)
                .await
                .map_err(|e| self.fail("Restore Error: ", e.into()))?;
        }

        self.replace_snapshot(snapshot);
        self.emit(EngineEvent::info("Restored!"));
        info!("Snapshot restored from backup");

        self.refresh_data().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Remote configuration and assets
    // ------------------------------------------------------------------

    /// Points the engine at another remote store, remembers the choice in
    /// the cache and reloads. Returns whether the reload succeeded.
    pub async fn configure_remote(&self, config: RemoteConfig) -> SyncResult<bool> {
        self.require_admin()?;
        if !config.is_valid() {
            return Err(SyncError::BadRequest("URL dan key database wajib diisi".to_string()));
        }
        let transport = PostgrestTransport::new(config.clone())?;
        self.cache.save_remote_config(&config)?;
        self.remote
            .reconfigure(Some(Arc::new(transport) as Arc<dyn RemoteTransport>));
        info!("Remote store set to {}", config.url);

        if let Some(settings) = self.remote.fetch_settings().await {
            self.state.write().settings = settings;
            self.emit(EngineEvent::SettingsChanged);
        }
        Ok(self.refresh_data().await)
    }

    /// Uploads an image into the bucket folder and returns its public URL.
    pub async fn upload_image(
        &self,
        folder: ImageFolder,
        body: Bytes,
        content_type: &str,
        name: Option<String>,
    ) -> SyncResult<Option<String>> {
        match folder {
            ImageFolder::School => self.require_admin()?,
            ImageFolder::Students => self.authorize(CollectionName::Students)?,
        }
        Ok(self.remote.upload_image(body, content_type, folder, name).await)
    }

    /// Uploads a branding logo under `school/`.
    pub async fn upload_logo(&self, kind: LogoKind, body: Bytes, content_type: &str) -> SyncResult<Option<String>> {
        self.upload_image(ImageFolder::School, body, content_type, Some(kind.file_name()))
            .await
    }
}
