use std::{collections::HashSet, future::Future, panic::AssertUnwindSafe, sync::Arc};

use anyhow::Result;
use futures::FutureExt;
use shared::domain::{Comment, PostId};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    name_cache::{MemoryNameCache, COMMENTER_NAME_KEY},
    validation::{validate_draft, Draft, ValidationError},
    CommentStoreClient, NameCache,
};

pub const UNEXPECTED_STORE_FAILURE: &str = "comment store failed unexpectedly";
const LIST_FAILURE_FALLBACK: &str = "failed to load comments";
const CREATE_FAILURE_FALLBACK: &str = "failed to post comment";
const CACHE_FAILURE_FALLBACK: &str = "name cache unavailable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListState {
    Idle,
    Loading,
    Loaded(Vec<Comment>),
    LoadFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Ready,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub post_id: Option<PostId>,
    pub list: ListState,
    pub submit: SubmitState,
    pub draft: Draft,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    ListStateChanged(ListState),
    SubmitStateChanged(SubmitState),
    ValidationFailed(ValidationError),
    SubmissionSucceeded,
    SubmissionFailed { message: String },
    /// `after_write` marks the re-list that follows a successful create.
    ListLoadFailed { message: String, after_write: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    /// The comment was stored but the follow-up list failed.
    CreatedRefreshFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("not attached to a post")]
    NotAttached,
    #[error("a comment is already being submitted")]
    AlreadySubmitting,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    StoreWrite(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("not attached to a post")]
    NotAttached,
    #[error("comment list request was superseded")]
    Superseded,
    #[error("{0}")]
    Store(String),
}

struct ControllerState {
    post_id: Option<PostId>,
    /// Bumped on every attach and detach.
    session: u64,
    /// Bumped on every list request; only the newest result is applied.
    load_generation: u64,
    list: ListState,
    /// Posts with a create in flight. Outlives attachments so a re-attach to
    /// the same post stays single-flight.
    submitting: HashSet<PostId>,
    draft: Draft,
}

impl ControllerState {
    fn submit_state(&self) -> SubmitState {
        match &self.post_id {
            Some(post_id) if self.submitting.contains(post_id) => SubmitState::Submitting,
            _ => SubmitState::Ready,
        }
    }
}

#[derive(Clone, Copy)]
struct LoadTicket {
    session: u64,
    generation: u64,
}

pub struct CommentController {
    store: Arc<dyn CommentStoreClient>,
    name_cache: Arc<dyn NameCache>,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl CommentController {
    pub fn new(store: Arc<dyn CommentStoreClient>) -> Arc<Self> {
        Self::new_with_dependencies(store, Arc::new(MemoryNameCache::default()))
    }

    pub fn new_with_dependencies(
        store: Arc<dyn CommentStoreClient>,
        name_cache: Arc<dyn NameCache>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            store,
            name_cache,
            inner: Mutex::new(ControllerState {
                post_id: None,
                session: 0,
                load_generation: 0,
                list: ListState::Idle,
                submitting: HashSet::new(),
                draft: Draft::default(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let guard = self.inner.lock().await;
        ControllerSnapshot {
            post_id: guard.post_id.clone(),
            list: guard.list.clone(),
            submit: guard.submit_state(),
            draft: guard.draft.clone(),
        }
    }

    /// Starts a fresh attachment to `post_id` and loads its comments.
    ///
    /// Draft content is cleared and the commenter name is re-read from the
    /// name cache. A result that lands after a newer attach, refresh or
    /// detach is dropped and reported as [`LoadError::Superseded`].
    pub async fn attach(&self, post_id: PostId) -> Result<(), LoadError> {
        let cached_name = self.load_cached_name().await;

        let (ticket, submit_changed) = {
            let mut guard = self.inner.lock().await;
            let previous_submit = guard.submit_state();
            guard.session += 1;
            guard.load_generation += 1;
            guard.post_id = Some(post_id.clone());
            guard.list = ListState::Loading;
            guard.draft = Draft {
                commenter_name: cached_name.unwrap_or_default(),
                content: String::new(),
            };
            let submit = guard.submit_state();
            (
                LoadTicket {
                    session: guard.session,
                    generation: guard.load_generation,
                },
                (submit != previous_submit).then_some(submit),
            )
        };

        info!(%post_id, generation = ticket.generation, "comments: attaching");
        if let Some(submit) = submit_changed {
            self.emit(ControllerEvent::SubmitStateChanged(submit));
        }
        self.emit(ControllerEvent::ListStateChanged(ListState::Loading));

        self.load(post_id, ticket, false).await
    }

    /// Re-requests the list for the current post. The draft is untouched.
    pub async fn refresh(&self) -> Result<(), LoadError> {
        let (post_id, ticket) = {
            let mut guard = self.inner.lock().await;
            let Some(post_id) = guard.post_id.clone() else {
                return Err(LoadError::NotAttached);
            };
            guard.load_generation += 1;
            guard.list = ListState::Loading;
            (
                post_id,
                LoadTicket {
                    session: guard.session,
                    generation: guard.load_generation,
                },
            )
        };

        debug!(%post_id, generation = ticket.generation, "comments: refreshing");
        self.emit(ControllerEvent::ListStateChanged(ListState::Loading));
        self.load(post_id, ticket, false).await
    }

    pub async fn detach(&self) {
        let (previous, was_submitting) = {
            let mut guard = self.inner.lock().await;
            let was_submitting = guard.submit_state() == SubmitState::Submitting;
            guard.session += 1;
            guard.load_generation += 1;
            guard.list = ListState::Idle;
            guard.draft.content.clear();
            (guard.post_id.take(), was_submitting)
        };

        if let Some(post_id) = previous {
            info!(%post_id, "comments: detached");
            self.emit(ControllerEvent::ListStateChanged(ListState::Idle));
            if was_submitting {
                self.emit(ControllerEvent::SubmitStateChanged(SubmitState::Ready));
            }
        }
    }

    pub async fn set_commenter_name(&self, name: impl Into<String>) {
        self.inner.lock().await.draft.commenter_name = name.into();
    }

    pub async fn set_content(&self, content: impl Into<String>) {
        self.inner.lock().await.draft.content = content.into();
    }

    /// Validates the draft and creates the comment, then re-lists the post.
    ///
    /// Only one submission runs at a time; a second call while the first is
    /// in flight returns [`SubmitError::AlreadySubmitting`] without touching
    /// the store. A failed re-list after a successful create is reported as
    /// [`SubmitOutcome::CreatedRefreshFailed`], never as an error.
    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        let (comment, session) = {
            let mut guard = self.inner.lock().await;
            let Some(post_id) = guard.post_id.clone() else {
                return Err(SubmitError::NotAttached);
            };
            if guard.submitting.contains(&post_id) {
                debug!(%post_id, "comments: submit ignored, already submitting");
                return Err(SubmitError::AlreadySubmitting);
            }
            let validated = validate_draft(&post_id, &guard.draft);
            match validated {
                Ok(comment) => {
                    guard.submitting.insert(post_id);
                    (comment, guard.session)
                }
                Err(err) => {
                    drop(guard);
                    debug!(%post_id, error = %err, "comments: draft rejected");
                    self.emit(ControllerEvent::ValidationFailed(err));
                    return Err(err.into());
                }
            }
        };

        let post_id = comment.post_id.clone();
        let author = comment.author.clone();
        self.emit(ControllerEvent::SubmitStateChanged(SubmitState::Submitting));

        if let Err(message) = guarded(self.store.create(comment), CREATE_FAILURE_FALLBACK).await {
            warn!(%post_id, error = %message, "comments: create failed");
            if self.finish_submit(&post_id).await {
                self.emit(ControllerEvent::SubmissionFailed {
                    message: message.clone(),
                });
            }
            return Err(SubmitError::StoreWrite(message));
        }

        info!(%post_id, "comments: comment created");
        self.store_cached_name(&author).await;

        let ticket = {
            let mut guard = self.inner.lock().await;
            if guard.post_id.as_ref() == Some(&post_id) {
                // A re-attach already swapped in a new draft; leave it alone.
                if guard.session == session {
                    guard.draft.content.clear();
                }
                guard.load_generation += 1;
                guard.list = ListState::Loading;
                Some(LoadTicket {
                    session: guard.session,
                    generation: guard.load_generation,
                })
            } else {
                None
            }
        };

        let Some(ticket) = ticket else {
            debug!(%post_id, "comments: attachment moved off post during submit, skipping re-list");
            self.finish_submit(&post_id).await;
            return Ok(SubmitOutcome::Created);
        };
        self.emit(ControllerEvent::ListStateChanged(ListState::Loading));

        let refreshed = self.load(post_id.clone(), ticket, true).await;
        if self.finish_submit(&post_id).await {
            self.emit(ControllerEvent::SubmissionSucceeded);
        }

        match refreshed {
            Err(LoadError::Store(message)) => Ok(SubmitOutcome::CreatedRefreshFailed(message)),
            _ => Ok(SubmitOutcome::Created),
        }
    }

    /// Clears the in-flight mark for `post_id`. Returns whether that post is
    /// still the attached one.
    async fn finish_submit(&self, post_id: &PostId) -> bool {
        let still_attached = {
            let mut guard = self.inner.lock().await;
            guard.submitting.remove(post_id);
            guard.post_id.as_ref() == Some(post_id)
        };
        if still_attached {
            self.emit(ControllerEvent::SubmitStateChanged(SubmitState::Ready));
        }
        still_attached
    }

    async fn load(
        &self,
        post_id: PostId,
        ticket: LoadTicket,
        after_write: bool,
    ) -> Result<(), LoadError> {
        let result = guarded(self.store.list(&post_id), LIST_FAILURE_FALLBACK).await;

        let next = {
            let mut guard = self.inner.lock().await;
            if guard.session != ticket.session || guard.load_generation != ticket.generation {
                debug!(
                    %post_id,
                    generation = ticket.generation,
                    current = guard.load_generation,
                    "comments: discarding stale list result"
                );
                return Err(LoadError::Superseded);
            }
            guard.list = match &result {
                Ok(comments) => ListState::Loaded(comments.clone()),
                Err(message) => ListState::LoadFailed(message.clone()),
            };
            guard.list.clone()
        };

        self.emit(ControllerEvent::ListStateChanged(next));
        match result {
            Ok(comments) => {
                debug!(%post_id, count = comments.len(), "comments: list loaded");
                Ok(())
            }
            Err(message) => {
                warn!(%post_id, error = %message, after_write, "comments: list failed");
                self.emit(ControllerEvent::ListLoadFailed {
                    message: message.clone(),
                    after_write,
                });
                Err(LoadError::Store(message))
            }
        }
    }

    async fn load_cached_name(&self) -> Option<String> {
        match guarded(self.name_cache.get(COMMENTER_NAME_KEY), CACHE_FAILURE_FALLBACK).await {
            Ok(name) => name,
            Err(error) => {
                warn!(%error, "comments: could not read cached commenter name");
                None
            }
        }
    }

    async fn store_cached_name(&self, name: &str) {
        if let Err(error) = guarded(
            self.name_cache.set(COMMENTER_NAME_KEY, name),
            CACHE_FAILURE_FALLBACK,
        )
        .await
        {
            warn!(%error, "comments: could not cache commenter name");
        }
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

/// Runs a port call, turning panics and blank error messages into
/// caller-presentable text.
async fn guarded<T, F>(call: F, fallback: &str) -> Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            let message = err.to_string();
            if message.trim().is_empty() {
                Err(fallback.to_string())
            } else {
                Err(message)
            }
        }
        Err(_) => Err(UNEXPECTED_STORE_FAILURE.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
