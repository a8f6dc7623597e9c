//! Orchestration of loads, background sync, sends and scroll anchoring
//!
//! The coordinator owns every store and is driven by the host: user actions
//! call the matching method, and [`SyncCoordinator::advance`] is called
//! whenever [`SyncCoordinator::next_deadline`] passes. Network calls are
//! blocking and happen inline, so a flow runs to completion before the next
//! one starts.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::poller::PollHandle;
use super::retry::{RetryOp, RetryQueue};
use super::timing::earliest;
use crate::backend::api::{CurrentUser, InstanceRecord};
use crate::backend::{ChatClient, ConversationQuery};
use crate::clock::Clock;
use crate::config::ChatConfig;
use crate::error::{ChatError, ChatResult, ValidationError};
use crate::gateway::{Gateway, RateLimiter, Transport, LOGIN_REDIRECT};
use crate::models::{
    AgentState, Conversation, ConversationId, ConversationPatch, Message, MessageId, Role,
};
use crate::notices::{NoticeLevel, Notices};
use crate::scroll::{AnchorOptions, AnchorPosition, ScrollAnchorController, Viewport};
use crate::send::{
    validate_message, validate_phone, Reconciliation, SendDraft, SendPipeline, SendRejection,
};
use crate::storage::{ConversationStore, LoadKind, LoadSummary, MessageStore};

const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please sign in again.";

/// Statistics from a background sync tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Conversations in the leading page
    pub conversations_fetched: usize,
    /// Conversations whose preview or timestamp moved
    pub conversations_changed: usize,
    /// Previews refreshed from a last-message lookup
    pub last_messages_refreshed: usize,
    /// Messages added to the open conversation
    pub messages_merged: usize,
    pub duration_ms: u64,
}

/// What became of a submitted draft
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Same token resubmitted inside the dedupe window
    Dropped,
    /// Refused locally; nothing reached the network
    Rejected(ChatError),
    Confirmed(MessageId),
    /// Stored by the server but not delivered yet
    Pending(MessageId),
    /// The optimistic message was rolled back
    Failed(ChatError),
}

struct Settings {
    sync_page_size: usize,
    sync_last_message_lookups: usize,
    max_message_length: usize,
    warning_ttl: chrono::Duration,
    narrow_viewport_width: u32,
}

pub struct SyncCoordinator {
    client: ChatClient,
    clock: Arc<dyn Clock>,
    settings: Settings,
    limiter: RateLimiter,
    conversations: ConversationStore,
    messages: MessageStore,
    pipeline: SendPipeline,
    scroll: ScrollAnchorController,
    notices: Notices,
    retry: RetryQueue,
    poller: PollHandle,
    selected: Option<ConversationId>,
    current_user: Option<CurrentUser>,
    instances: Vec<InstanceRecord>,
    conversation_total: Option<u64>,
    narrow: bool,
    /// Auto-selection only ever runs after the first successful reset load
    first_reset_done: bool,
    last_sync_at: Option<DateTime<Utc>>,
}

impl SyncCoordinator {
    pub fn new(config: &ChatConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Result<Self> {
        let gateway = Gateway::new(
            transport,
            config.base_url()?,
            config.auth_token.clone(),
            config.metadata_cache_ttl(),
            clock.clone(),
        );

        Ok(Self {
            client: ChatClient::new(gateway),
            limiter: RateLimiter::new(config.rate_limit(), clock.clone()),
            pipeline: SendPipeline::new(
                clock.clone(),
                config.send_dedupe_window(),
                config.max_message_length,
            ),
            conversations: ConversationStore::new(config.contacts_page_size.max(1)),
            messages: MessageStore::new(config.messages_page_size.max(1)),
            scroll: ScrollAnchorController::new(config.anchor()),
            notices: Notices::new(),
            retry: RetryQueue::new(),
            poller: PollHandle::new(
                config.poll_interval(),
                config.poll_max_interval(),
                config.poll_backoff_multiplier,
            ),
            settings: Settings {
                sync_page_size: config.sync_page_size.max(1),
                sync_last_message_lookups: config.sync_last_message_lookups,
                max_message_length: config.max_message_length,
                warning_ttl: config.warning_ttl(),
                narrow_viewport_width: config.narrow_viewport_width,
            },
            clock,
            selected: None,
            current_user: None,
            instances: Vec::new(),
            conversation_total: None,
            narrow: false,
            first_reset_done: false,
            last_sync_at: None,
        })
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn selected(&self) -> Option<&ConversationId> {
        self.selected.as_ref()
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.selected.as_ref().and_then(|id| self.conversations.get(id))
    }

    pub fn scroll(&self) -> &ScrollAnchorController {
        &self.scroll
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    pub fn poller(&self) -> &PollHandle {
        &self.poller
    }

    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.current_user.as_ref()
    }

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn conversation_total(&self) -> Option<u64> {
        self.conversation_total
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    pub fn is_narrow(&self) -> bool {
        self.narrow
    }

    pub fn is_session_suspended(&self) -> bool {
        self.client.gateway().session().is_suspended()
    }

    /// First load after the session becomes available
    ///
    /// Operator, instance metadata, then conversation page 1, which cascades
    /// into auto-selection and the first message page. Starts polling.
    pub fn initial_load(&mut self, viewport: &mut dyn Viewport) {
        if self.is_session_suspended() {
            debug!("Initial load skipped, session suspended");
            return;
        }
        info!("Initial load");
        self.load_current_user();
        self.load_metadata();
        self.load_conversations(true, viewport);
        if !self.is_session_suspended() {
            self.poller.start(self.clock.now());
        }
    }

    /// Operator-triggered refresh
    ///
    /// Re-fetches the operator and conversation page 1, merges the leading
    /// message page of the open conversation without dropping history, then
    /// forces the pane to the bottom once it has height.
    pub fn refresh(&mut self, viewport: &mut dyn Viewport) {
        if self.is_session_suspended() {
            return;
        }
        info!("Manual refresh");
        self.client.invalidate_current_user();
        self.load_current_user();
        self.load_conversations(true, viewport);

        let Some(id) = self.selected.clone() else {
            return;
        };
        if self.messages.conversation_id() != Some(&id) || self.messages.is_empty() {
            self.load_initial_messages(viewport);
            return;
        }
        if self.merge_leading_messages(&id, viewport).is_some() {
            let now = self.clock.now();
            self.scroll.schedule_bottom_retry(now, false);
            self.scroll.run_bottom_retry(viewport, now);
        }
    }

    /// Next conversation page (infinite scroll of the list)
    pub fn load_more_conversations(&mut self, viewport: &mut dyn Viewport) -> Option<LoadSummary> {
        self.load_conversations(false, viewport)
    }

    /// Open a conversation: clear the pane and load its newest page
    pub fn select_conversation(&mut self, id: &ConversationId, viewport: &mut dyn Viewport) -> bool {
        if self.selected.as_ref() == Some(id) && self.messages.conversation_id() == Some(id) {
            debug!("Conversation {} already open", id);
            return false;
        }
        if !self.conversations.contains(id) {
            warn!("Cannot select unknown conversation {}", id);
            return false;
        }

        info!("Opening conversation {}", id);
        self.selected = Some(id.clone());
        self.conversations.set_open(Some(id.clone()));
        self.conversations.patch(id, &ConversationPatch::unread(0));
        self.load_initial_messages(viewport);
        true
    }

    /// Fetch the next older page if every history condition holds
    pub fn load_older_messages(&mut self, viewport: &mut dyn Viewport) -> bool {
        let Some(id) = self.messages.conversation_id().cloned() else {
            return false;
        };
        let gate = self.scroll.history_gate(self.clock.now());
        let Some(request) = self.messages.begin_load_more(gate) else {
            return false;
        };

        self.scroll.begin_prepend(viewport);
        let user = self.current_user_id();
        let result = self.client.list_messages(
            &id,
            request.page,
            request.limit,
            user.as_deref(),
            self.clock.now(),
        );

        match result {
            Ok(page) => match self.messages.complete_load(&request, Ok(page)) {
                Some(summary) if summary.added > 0 => {
                    viewport.content_updated(self.messages.messages());
                    self.scroll.finish_prepend(viewport);
                }
                _ => self.scroll.abandon_prepend(),
            },
            Err(e) => {
                self.messages.complete_load(&request, Err(e.to_string()));
                self.scroll.abandon_prepend();
                self.handle_error(e, None, "Failed to load older messages");
            }
        }
        true
    }

    /// Immediate branch of a user scroll; returns whether the pane is at bottom
    pub fn on_scroll(&mut self, viewport: &dyn Viewport) -> bool {
        self.scroll.on_user_scroll(viewport, self.clock.now())
    }

    /// The host measured new content height (asynchronous layout)
    pub fn on_content_resized(&mut self, viewport: &mut dyn Viewport) {
        if self.scroll.has_pending_prepend() {
            self.scroll.finish_prepend(viewport);
        }
        self.scroll.run_bottom_retry(viewport, self.clock.now());
    }

    /// Run whatever timers are due; returns sync stats when a poll ran
    pub fn advance(&mut self, viewport: &mut dyn Viewport) -> Option<SyncStats> {
        let now = self.clock.now();
        self.notices.expire(now);
        self.scroll.history_gate(now);
        self.scroll.run_bottom_retry(viewport, now);

        if self.scroll.take_history_check(viewport, now) {
            self.load_older_messages(viewport);
        }

        if self.poller.is_due(now) {
            return self.tick(viewport).ok();
        }
        None
    }

    /// When the host should call [`advance`](Self::advance) next
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        earliest([
            self.scroll.next_deadline(),
            self.poller.next_due(),
            self.notices.next_expiry(),
        ])
    }

    /// One background incremental sync
    ///
    /// Fetches the leading conversation page, refreshes the previews of the
    /// first few from their last message, and merges only what moved. If the
    /// open conversation moved, its newest messages are merged in without
    /// touching history or the scroll position.
    pub fn tick(&mut self, viewport: &mut dyn Viewport) -> ChatResult<SyncStats> {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();
        let now = self.clock.now();

        if self.is_session_suspended() {
            self.poller.stop();
            return Err(ChatError::SessionSuspended);
        }

        let query = ConversationQuery {
            page: 1,
            limit: self.settings.sync_page_size,
            instance: self.conversations.instance_filter().map(str::to_string),
            search: self.conversations.search().map(str::to_string),
        };
        let mut fresh = match self.client.list_conversations(&query) {
            Ok(page) => page.items,
            Err(e) => {
                self.poller.record_failure(now);
                self.handle_error(e.clone(), Some(RetryOp::BackgroundSync), "Background sync failed");
                return Err(e);
            }
        };
        stats.conversations_fetched = fresh.len();

        let user = self.current_user_id();
        for conversation in fresh.iter_mut().take(self.settings.sync_last_message_lookups) {
            match self
                .client
                .last_message(&conversation.id, user.as_deref(), now)
            {
                Ok(Some(last)) => {
                    if conversation
                        .last_message_at
                        .is_none_or(|at| last.created_at > at)
                    {
                        conversation.last_message = last.content;
                        conversation.last_message_at = Some(last.created_at);
                        stats.last_messages_refreshed += 1;
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_session() => {
                    self.handle_error(e.clone(), None, "Background sync failed");
                    return Err(e);
                }
                Err(e) => debug!("Last message lookup for {} failed: {}", conversation.id, e),
            }
        }

        let open = self.selected.clone();
        let changed = self.conversations.merge_sync(fresh, open.as_ref());
        stats.conversations_changed = changed.len();

        if let Some(open) = open
            && changed.contains(&open)
            && self.messages.conversation_id() == Some(&open)
            && !self.messages.state().is_loading()
        {
            stats.messages_merged = self.merge_leading_messages(&open, viewport).unwrap_or(0);
        }

        self.poller.record_success(self.clock.now());
        self.last_sync_at = Some(now);
        stats.duration_ms = start.elapsed().as_millis() as u64;

        if stats.conversations_changed > 0 {
            info!(
                "Background sync: {} changed, {} new message(s) in the open conversation",
                stats.conversations_changed, stats.messages_merged
            );
        }
        Ok(stats)
    }

    /// Submit a draft to the open conversation
    pub fn send(&mut self, draft: SendDraft, viewport: &mut dyn Viewport) -> SendOutcome {
        let Some(conversation) = self.selected_conversation().cloned() else {
            let e = ChatError::from(ValidationError::NoConversation);
            self.notices.error(e.to_string());
            return SendOutcome::Rejected(e);
        };
        if self.is_session_suspended() {
            return SendOutcome::Rejected(ChatError::SessionSuspended);
        }

        let user = self.current_user_id();
        let prepared = match self.pipeline.prepare(
            &draft,
            &conversation,
            user.as_deref(),
            &mut self.limiter,
        ) {
            Ok(prepared) => prepared,
            Err(SendRejection::Duplicate) => return SendOutcome::Dropped,
            Err(SendRejection::Invalid(e)) => {
                let e = ChatError::from(e);
                self.notices.error(e.to_string());
                return SendOutcome::Rejected(e);
            }
            Err(SendRejection::RateLimited(e)) => {
                let e = ChatError::from(e);
                self.notices.transient(
                    NoticeLevel::Warning,
                    e.to_string(),
                    self.clock.now(),
                    self.settings.warning_ttl,
                );
                return SendOutcome::Rejected(e);
            }
        };

        self.messages.append(prepared.temp.clone());
        viewport.content_updated(self.messages.messages());
        self.scroll
            .anchor(viewport, AnchorPosition::Bottom, AnchorOptions::immediate());

        let result = self
            .client
            .send_message(&prepared.request, user.as_deref(), self.clock.now());

        match self.pipeline.reconcile(&prepared, result) {
            Reconciliation::Confirmed(message) => {
                let id = message.id.clone();
                self.settle_sent(prepared.temp_id(), message, viewport);
                SendOutcome::Confirmed(id)
            }
            Reconciliation::Degraded { message, warning } => {
                let id = message.id.clone();
                self.settle_sent(prepared.temp_id(), message, viewport);
                self.notices.transient(
                    NoticeLevel::Warning,
                    warning,
                    self.clock.now(),
                    self.settings.warning_ttl,
                );
                SendOutcome::Pending(id)
            }
            Reconciliation::RolledBack(e) => {
                self.messages.remove(prepared.temp_id());
                viewport.content_updated(self.messages.messages());
                self.handle_error(e.clone(), None, "Failed to send message");
                SendOutcome::Failed(e)
            }
        }
    }

    /// Flip who answers a contact, rolling back if the server refuses
    pub fn toggle_agent_state(&mut self, id: &ConversationId) -> ChatResult<AgentState> {
        let Some(current) = self.conversations.get(id).map(|c| c.agent_state) else {
            return Err(ValidationError::NoConversation.into());
        };
        if let Err(e) = self.limiter.try_request() {
            let e = ChatError::from(e);
            self.notices.transient(
                NoticeLevel::Warning,
                e.to_string(),
                self.clock.now(),
                self.settings.warning_ttl,
            );
            return Err(e);
        }

        let next = current.toggled();
        self.conversations
            .patch(id, &ConversationPatch::agent_state(next));

        match self.client.set_agent_state(id, next) {
            Ok(()) => {
                info!("Conversation {} now answered by {}", id, next.as_str());
                Ok(next)
            }
            Err(e) => {
                warn!("Reverting agent state of {} to {}", id, current.as_str());
                self.conversations
                    .patch(id, &ConversationPatch::agent_state(current));
                self.handle_error(e.clone(), None, "Failed to update agent state");
                Err(e)
            }
        }
    }

    /// Create a contact, insert it and open it
    pub fn create_conversation(
        &mut self,
        name: &str,
        phone: &str,
        viewport: &mut dyn Viewport,
    ) -> ChatResult<ConversationId> {
        let validated = validate_message(name, self.settings.max_message_length)
            .map_err(|e| match e {
                ValidationError::Empty => ValidationError::MissingName,
                other => other,
            })
            .and_then(|name| validate_phone(phone).map(|phone| (name, phone)));
        let (name, phone) = match validated {
            Ok(pair) => pair,
            Err(e) => {
                let e = ChatError::from(e);
                self.notices.error(e.to_string());
                return Err(e);
            }
        };
        if let Err(e) = self.limiter.try_request() {
            let e = ChatError::from(e);
            self.notices.error(e.to_string());
            return Err(e);
        }

        let created = match self.client.create_conversation(&name, &phone) {
            Ok(created) => created,
            Err(e) => {
                self.handle_error(e.clone(), None, "Failed to create conversation");
                return Err(e);
            }
        };

        let conversation = created.unwrap_or_else(|| {
            let owner = self.current_user_id().unwrap_or_else(|| "local".to_string());
            debug!("Server returned no contact, using a local placeholder");
            Conversation::new(format!("{}_{}", owner, phone), name.clone())
                .with_phone(phone.clone())
                .with_created_at(self.clock.now())
        });
        let id = conversation.id.clone();
        info!("Created conversation {}", id);

        self.conversations.upsert(conversation);
        self.client.gateway_mut().invalidate("/contacts/count");
        self.select_conversation(&id, viewport);
        Ok(id)
    }

    /// Server-side instance filter; reloads the list when it changes
    pub fn set_instance_filter(&mut self, instance: Option<&str>, viewport: &mut dyn Viewport) -> bool {
        if !self.conversations.set_instance_filter(instance) {
            return false;
        }
        self.load_conversation_total();
        self.load_conversations(true, viewport);
        true
    }

    /// Server-side search; reloads the list when it changes
    pub fn set_search(&mut self, term: Option<&str>, viewport: &mut dyn Viewport) -> bool {
        if !self.conversations.set_search(term) {
            return false;
        }
        self.load_conversations(true, viewport);
        true
    }

    pub fn set_narrow(&mut self, narrow: bool) {
        self.narrow = narrow;
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.narrow = width < self.settings.narrow_viewport_width;
    }

    /// Replay operations that failed while offline
    pub fn on_connectivity_restored(&mut self, viewport: &mut dyn Viewport) {
        if self.is_session_suspended() {
            return;
        }
        let ops = self.retry.drain();
        if ops.is_empty() {
            return;
        }
        info!("Connectivity restored, replaying {} operation(s)", ops.len());

        for op in ops {
            match op {
                RetryOp::LoadConversations => {
                    self.load_conversations(true, viewport);
                }
                RetryOp::LoadMessages(id) => {
                    if self.selected.as_ref() == Some(&id) {
                        self.load_initial_messages(viewport);
                    }
                }
                RetryOp::BackgroundSync => {
                    let _ = self.tick(viewport);
                }
                RetryOp::Metadata => {
                    self.load_current_user();
                    self.load_metadata();
                }
            }
        }
    }

    /// Login page path, once, after the backend rejected the session
    pub fn take_login_redirect(&mut self) -> Option<&'static str> {
        self.client
            .gateway_mut()
            .take_login_required()
            .then_some(LOGIN_REDIRECT)
    }

    /// Resume after re-authentication
    pub fn rearm_session(&mut self, auth_token: Option<String>) {
        self.client.gateway_mut().rearm(auth_token);
        self.notices.clear();
        self.poller.start(self.clock.now());
        info!("Session re-armed, polling resumed");
    }

    /// Stop timers and drop the open conversation
    pub fn teardown(&mut self) {
        self.poller.stop();
        self.scroll.cancel_timers();
        self.retry.clear();
        self.messages.close();
        self.selected = None;
        self.conversations.set_open(None);
        debug!("Coordinator torn down");
    }

    fn current_user_id(&self) -> Option<String> {
        self.current_user.as_ref().and_then(CurrentUser::id_string)
    }

    fn load_current_user(&mut self) {
        match self.client.current_user() {
            Ok(user) => {
                debug!("Signed in as {}", user.display_name().unwrap_or("unknown"));
                self.current_user = Some(user);
            }
            Err(e) => self.handle_error(e, Some(RetryOp::Metadata), "Failed to load user"),
        }
    }

    fn load_metadata(&mut self) {
        match self.client.instances() {
            Ok(instances) => {
                debug!("Loaded {} instance(s)", instances.len());
                self.instances = instances;
            }
            Err(e) => {
                self.handle_error(e, Some(RetryOp::Metadata), "Failed to load instances");
                return;
            }
        }
        self.load_conversation_total();
    }

    fn load_conversation_total(&mut self) {
        let instance = self.conversations.instance_filter().map(str::to_string);
        match self.client.conversation_count(instance.as_deref()) {
            Ok(total) => self.conversation_total = total,
            Err(e) if e.is_session() => self.handle_error(e, None, "Failed to count conversations"),
            Err(e) => debug!("Conversation count unavailable: {}", e),
        }
    }

    fn load_conversations(&mut self, reset: bool, viewport: &mut dyn Viewport) -> Option<LoadSummary> {
        let request = self.conversations.begin_load(reset)?;
        let query = ConversationQuery {
            page: request.page,
            limit: request.limit,
            instance: self.conversations.instance_filter().map(str::to_string),
            search: self.conversations.search().map(str::to_string),
        };

        let summary = match self.client.list_conversations(&query) {
            Ok(page) => self.conversations.complete_load(&request, Ok(page))?,
            Err(e) => {
                self.conversations.complete_load(&request, Err(e.to_string()));
                self.handle_error(e, Some(RetryOp::LoadConversations), "Failed to load conversations");
                return None;
            }
        };

        if summary.kind == LoadKind::Reset {
            self.auto_select(viewport);
        }
        Some(summary)
    }

    fn auto_select(&mut self, viewport: &mut dyn Viewport) {
        if self.first_reset_done {
            return;
        }
        self.first_reset_done = true;

        if self.selected.is_some() || self.narrow || self.scroll.is_initial_load() {
            return;
        }
        if let Some(first) = self.conversations.first().map(|c| c.id.clone()) {
            info!("Auto-selecting conversation {}", first);
            self.select_conversation(&first, viewport);
        }
    }

    fn load_initial_messages(&mut self, viewport: &mut dyn Viewport) {
        let Some(id) = self.selected.clone() else {
            return;
        };
        let Some(request) = self.messages.begin_reset(id.clone()) else {
            return;
        };
        self.scroll.begin_initial_load();
        viewport.content_updated(self.messages.messages());

        let user = self.current_user_id();
        let result = self.client.list_messages(
            &id,
            request.page,
            request.limit,
            user.as_deref(),
            self.clock.now(),
        );

        match result {
            Ok(page) => {
                if self.messages.complete_load(&request, Ok(page)).is_some() {
                    viewport.content_updated(self.messages.messages());
                    self.scroll.finish_initial_load(viewport, self.clock.now());
                }
            }
            Err(e) => {
                self.messages.complete_load(&request, Err(e.to_string()));
                self.scroll.abort_initial_load();
                self.handle_error(e, Some(RetryOp::LoadMessages(id)), "Failed to load messages");
            }
        }
    }

    /// Merge the newest message page into the open buffer; `None` on failure
    fn merge_leading_messages(&mut self, id: &ConversationId, viewport: &mut dyn Viewport) -> Option<usize> {
        let user = self.current_user_id();
        let limit = self.messages.cursor().page_size;
        match self
            .client
            .list_messages(id, 1, limit, user.as_deref(), self.clock.now())
        {
            Ok(page) => {
                let added = self.messages.merge_latest(id, page);
                if !added.is_empty() {
                    let incoming = added.iter().filter(|m| m.role != Role::Me).count() as u32;
                    self.scroll.note_incoming(viewport, incoming);
                    viewport.content_updated(self.messages.messages());
                }
                Some(added.len())
            }
            Err(e) => {
                self.handle_error(e, None, "Failed to refresh messages");
                None
            }
        }
    }

    fn settle_sent(&mut self, temp_id: &MessageId, message: Message, viewport: &mut dyn Viewport) {
        let conversation_id = message.conversation_id.clone();
        let preview = ConversationPatch::activity(message.content.clone(), message.created_at);
        self.messages.replace(temp_id, message);
        self.conversations.patch(&conversation_id, &preview);
        viewport.content_updated(self.messages.messages());
        self.scroll
            .anchor(viewport, AnchorPosition::Bottom, AnchorOptions::immediate());
    }

    fn handle_error(&mut self, e: ChatError, retry: Option<RetryOp>, context: &str) {
        match &e {
            ChatError::SessionExpired { status } => {
                error!("{}: session expired (HTTP {})", context, status);
                self.poller.stop();
                self.retry.clear();
                self.notices.error(SESSION_EXPIRED_NOTICE);
            }
            ChatError::SessionSuspended => {
                debug!("{}: session suspended", context);
            }
            e if e.is_transient() => {
                warn!("{}: {}", context, e);
                self.notices.error(format!("{}: {}", context, e));
                if let Some(op) = retry {
                    self.retry.push(op);
                }
            }
            e => {
                warn!("{}: {}", context, e);
                self.notices.error(format!("{}: {}", context, e));
            }
        }
    }
}
