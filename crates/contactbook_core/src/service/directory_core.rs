//! Directory use-case service.
//!
//! # Responsibility
//! - Own the cache, criteria, debouncer and refresh scheduler as one unit.
//! - Turn renderer intents (search, tag toggles, writes) into core updates.
//! - Route every failure through classification before it reaches the
//!   renderer or the log.
//!
//! # Invariants
//! - Validation runs before any write request is sent.
//! - A failed write never touches the cache.
//! - A successful write is followed by a full refetch-and-replace.
//! - `shutdown` leaves no timer or pending debounced event behind.

use crate::cache::{CacheLookupError, DirectoryCache, DirectorySnapshot};
use crate::classify::FailureOrigin;
use crate::client::{run_abortable, ContactsApi, HttpContactsClient};
use crate::config::DirectoryConfig;
use crate::debounce::InputDebouncer;
use crate::error::{DirectoryError, DirectoryResult, RemoteOperation};
use crate::model::contact::{Contact, ContactId, RawContact};
use crate::model::draft::ContactDraft;
use crate::observer::{report_failure, DirectoryObserver};
use crate::query::{FilterCriteria, QueryEngine};
use crate::refresh::{RefreshHandle, RefreshScheduler, RefreshState};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Explicitly owned directory core handed to the renderer.
pub struct DirectoryCore {
    api: Arc<dyn ContactsApi>,
    engine: Arc<QueryEngine>,
    scheduler: Arc<RefreshScheduler>,
    observer: Arc<dyn DirectoryObserver>,
    search: InputDebouncer<String>,
    refresh_handle: Mutex<Option<RefreshHandle>>,
    write_cancel: Mutex<CancellationToken>,
}

impl DirectoryCore {
    /// Builds a core talking to the HTTP service named in `config`.
    pub fn from_config(config: &DirectoryConfig, observer: Arc<dyn DirectoryObserver>) -> Self {
        let api = Arc::new(HttpContactsClient::new(
            config.base_url.clone(),
            config.request_timeout(),
        ));
        Self::new(api, observer, config)
    }

    /// Builds a core over any `ContactsApi` implementation.
    pub fn new(
        api: Arc<dyn ContactsApi>,
        observer: Arc<dyn DirectoryObserver>,
        config: &DirectoryConfig,
    ) -> Self {
        let cache = Arc::new(DirectoryCache::new());
        let engine = Arc::new(QueryEngine::new(cache));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&api),
            Arc::clone(&engine),
            Arc::clone(&observer),
            config.refresh_interval(),
        ));

        let search_engine = Arc::clone(&engine);
        let search_observer = Arc::clone(&observer);
        let search = InputDebouncer::new(config.search_debounce(), move |text: String| {
            apply_name_filter(&search_engine, search_observer.as_ref(), text);
        });

        Self {
            api,
            engine,
            scheduler,
            observer,
            search,
            refresh_handle: Mutex::new(None),
            write_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Loads the directory for the first time.
    ///
    /// Failures are reported as fatal to the renderer and returned.
    pub async fn load(&self) -> DirectoryResult<usize> {
        match self.scheduler.refresh_now().await {
            Ok(snapshot) => {
                info!(
                    "event=initial_load module=service status=ok contacts={}",
                    snapshot.contacts().len()
                );
                Ok(snapshot.contacts().len())
            }
            Err(err) => {
                report_failure(self.observer.as_ref(), &err, FailureOrigin::InitialLoad);
                Err(err)
            }
        }
    }

    /// Starts periodic refresh. Returns `false` when already running.
    pub fn start_refresh(&self) -> bool {
        let mut handle = lock(&self.refresh_handle);
        if handle.as_ref().is_some_and(RefreshHandle::is_running) {
            return false;
        }
        *handle = Some(self.scheduler.start());
        true
    }

    /// Stops periodic refresh and waits for the timer task to finish.
    pub async fn stop_refresh(&self) {
        let handle = lock(&self.refresh_handle).take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.scheduler.state()
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    /// Tears down timers, pending searches and in-flight writes.
    pub async fn shutdown(&self) {
        self.search.cancel();
        self.cancel_pending_write();
        self.stop_refresh().await;
        info!("event=core_shutdown module=service status=ok");
    }

    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.engine.cache().snapshot()
    }

    pub fn visible_contacts(&self) -> Arc<[Contact]> {
        self.engine.visible_contacts()
    }

    pub fn tag_vocabulary(&self) -> Arc<[String]> {
        self.engine.cache().tag_vocabulary()
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.engine.criteria()
    }

    /// Forwards raw search input through the debouncer.
    pub fn search_text_changed(&self, text: &str) {
        self.search.schedule(text.trim().to_string());
    }

    /// Applies a name filter immediately, dropping any debounced input.
    pub fn set_name_filter(&self, text: &str) {
        self.search.cancel();
        apply_name_filter(&self.engine, self.observer.as_ref(), text.trim().to_string());
    }

    /// Replaces the selected tag set (all checked boxes at once).
    pub fn set_selected_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.engine.set_selected_tags(tags) {
            self.notify_criteria();
        }
    }

    /// Applies one tag checkbox change.
    pub fn toggle_tag(&self, tag: &str, checked: bool) {
        if self.engine.toggle_tag(tag, checked) {
            self.notify_criteria();
        }
    }

    /// Resets criteria when the renderer returns to the list view.
    pub fn return_to_list(&self) {
        self.search.cancel();
        self.engine.reset();
        self.notify_criteria();
    }

    /// Looks up a cached contact to pre-fill the edit form.
    pub fn contact_for_edit(&self, id: &ContactId) -> Result<Contact, CacheLookupError> {
        self.engine.cache().find_by_id(id)
    }

    /// Validates and creates a contact, then refetches the directory.
    pub async fn create_contact(&self, draft: &ContactDraft) -> DirectoryResult<Option<Contact>> {
        self.validate_draft(draft)?;
        let payload = draft.to_payload(None);
        let token = self.write_token();
        let result =
            run_abortable(&token, RemoteOperation::Create, self.api.create(&payload)).await;
        let created = self.settle_write(result)?;

        let name = display_name(created.as_ref(), &draft.full_name);
        self.observer.user_message(&format!("New contact added: {name}"));
        self.refresh_after_write().await;
        Ok(created.map(Contact::from_raw))
    }

    /// Validates and replaces one contact, then refetches the directory.
    pub async fn update_contact(
        &self,
        id: &ContactId,
        draft: &ContactDraft,
    ) -> DirectoryResult<Option<Contact>> {
        self.validate_draft(draft)?;
        let payload = draft.to_payload(Some(id));
        let token = self.write_token();
        let result =
            run_abortable(&token, RemoteOperation::Update, self.api.update(id, &payload)).await;
        let updated = self.settle_write(result)?;

        let name = display_name(updated.as_ref(), &draft.full_name);
        self.observer.user_message(&format!("Contact updated: {name}"));
        self.refresh_after_write().await;
        Ok(updated.map(Contact::from_raw))
    }

    /// Deletes one contact, then refetches the directory.
    pub async fn delete_contact(&self, id: &ContactId) -> DirectoryResult<()> {
        let label = self
            .engine
            .cache()
            .find_by_id(id)
            .map(|contact| contact.full_name().to_string())
            .unwrap_or_else(|_| id.to_string());
        let token = self.write_token();
        let result = run_abortable(&token, RemoteOperation::Delete, self.api.delete(id)).await;
        self.settle_write(result)?;

        self.observer.user_message(&format!("Contact deleted: {label}"));
        self.refresh_after_write().await;
        Ok(())
    }

    /// Aborts the in-flight write, if any; it resolves with `Aborted`.
    pub fn cancel_pending_write(&self) {
        let mut token = lock(&self.write_cancel);
        token.cancel();
        *token = CancellationToken::new();
    }

    fn validate_draft(&self, draft: &ContactDraft) -> DirectoryResult<()> {
        if let Err(validation) = draft.validate() {
            let err = DirectoryError::Validation(validation);
            report_failure(self.observer.as_ref(), &err, FailureOrigin::Write);
            return Err(err);
        }
        Ok(())
    }

    fn settle_write<T>(&self, result: DirectoryResult<T>) -> DirectoryResult<T> {
        if let Err(err) = &result {
            report_failure(self.observer.as_ref(), err, FailureOrigin::Write);
        }
        result
    }

    // The write already succeeded remotely; a failed refetch is reported
    // inline but does not turn the write into a failure.
    async fn refresh_after_write(&self) {
        match self.scheduler.refresh_now().await {
            Ok(snapshot) => debug!(
                "event=refresh_after_write module=service status=ok generation={}",
                snapshot.generation()
            ),
            Err(err) => {
                report_failure(self.observer.as_ref(), &err, FailureOrigin::Write);
            }
        }
    }

    fn write_token(&self) -> CancellationToken {
        lock(&self.write_cancel).clone()
    }

    fn notify_criteria(&self) {
        let (criteria, visible) = self.engine.view();
        self.observer.criteria_changed(&criteria, &visible);
    }
}

fn apply_name_filter(engine: &QueryEngine, observer: &dyn DirectoryObserver, text: String) {
    if engine.set_name_substring(text) {
        let (criteria, visible) = engine.view();
        observer.criteria_changed(&criteria, &visible);
    }
}

fn display_name<'a>(record: Option<&'a RawContact>, fallback: &'a str) -> &'a str {
    record
        .and_then(|raw| raw.full_name.as_deref())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(fallback)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
