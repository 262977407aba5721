//! One operator session: the API client, the store and the bulk-email working set.
//!
//! Each operation issues its request, reduces the outcome into the store and
//! queues a notification before handing the result back.

use log::info;

use crate::api::ApiClient;
use crate::api::bulk_email::NewRecipient;
use crate::api::models::{
    BulkSendRequest, BulkSendResult, EmailTemplate, Group, Id, ListQuery, NewGroup, NewTemplate, NewUser,
    Recipient, RecipientStatus, SupportStatus,
};
use crate::app::AppConfig;
use crate::error::{AdminError, Result};
use crate::notify::Notification;
use crate::recipients::{LoadOutcome, RecipientLoader, RecipientSource};
use crate::selection::{Completeness, EmailList, SelectionManager, SelectionSet, group_recipient_emails, merge_into_group};
use crate::store::{Action, RequestToken, Resource, Store};
use crate::template::{self, RenderedEmail};

pub struct Session {
    pub config: AppConfig,
    pub client: ApiClient,
    pub store: Store,
    pub selection: SelectionManager,
    loader: RecipientLoader,
}

/// What the operator composed for a bulk send.
#[derive(Debug, Clone, Default)]
pub struct Campaign {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub is_html: bool,
    pub template_id: Option<Id>,
    pub group_ids: Vec<Id>,
    pub recipient_ids: Vec<Id>,
    pub all_active: bool,
}

impl Session {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = ApiClient::new(&config)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: AppConfig, client: ApiClient) -> Self {
        let loader = RecipientLoader::new(client.clone(), config.recipient_threshold);
        Self { config, client, store: Store::new(), selection: SelectionManager::default(), loader }
    }

    /// Records a failed fetch unless a newer request for the resource has started.
    fn fail(&mut self, token: &RequestToken, resource: Resource, context: &str, e: &AdminError) {
        if self.store.dispatch_if_current(token, Action::FetchFailed(resource, e.user_message())) {
            self.store.notify(Notification::error(format!("{context}: {}", e.user_message())));
        }
    }

    pub async fn load_users(&mut self, query: &ListQuery) -> Result<()> {
        let token = self.store.begin_request(Resource::Users.key());
        self.store.dispatch(Action::FetchStarted(Resource::Users));
        match self.client.users(query).await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::UsersLoaded(page));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::Users, "Failed to load users", &e);
                Err(e)
            }
        }
    }

    pub async fn create_user(&mut self, user: NewUser) -> Result<()> {
        match self.client.create_user(&user).await {
            Ok(created) => {
                self.store.notify(Notification::success(format!("User {} created", created.display_name())));
                self.store.dispatch(Action::UserCreated(created));
                Ok(())
            }
            Err(e) => {
                self.store.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    pub async fn load_chats(&mut self, query: &ListQuery) -> Result<()> {
        let token = self.store.begin_request(Resource::Chats.key());
        self.store.dispatch(Action::FetchStarted(Resource::Chats));
        match self.client.chats(query).await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::ChatsLoaded(page));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::Chats, "Failed to load chats", &e);
                Err(e)
            }
        }
    }

    pub async fn load_messages(&mut self, chat_id: &str, query: &ListQuery) -> Result<()> {
        let token = self.store.begin_request(&format!("{}/{chat_id}", Resource::Messages.key()));
        match self.client.chat_messages(chat_id, query).await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::MessagesLoaded(chat_id.to_string(), page.items));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::Messages, "Failed to load messages", &e);
                Err(e)
            }
        }
    }

    pub async fn load_support_chats(&mut self, query: &ListQuery) -> Result<()> {
        let token = self.store.begin_request(Resource::SupportChats.key());
        self.store.dispatch(Action::FetchStarted(Resource::SupportChats));
        match self.client.support_chats(query).await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::SupportChatsLoaded(page));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::SupportChats, "Failed to load support chats", &e);
                Err(e)
            }
        }
    }

    /// The reply shows up as pending right away and is reconciled with the server's answer.
    pub async fn reply_support(&mut self, chat_id: &str, content: &str) -> Result<()> {
        let temp_id = self.store.next_temp_id();
        self.store.dispatch(Action::SupportReplyPending {
            chat_id: chat_id.to_string(),
            temp_id: temp_id.clone(),
            content: content.to_string(),
        });
        match self.client.reply_support_chat(chat_id, content).await {
            Ok(message) => {
                self.store.dispatch(Action::SupportReplyConfirmed { chat_id: chat_id.to_string(), temp_id, message });
                self.store.notify(Notification::success("Reply sent"));
                Ok(())
            }
            Err(e) => {
                self.store.dispatch(Action::SupportReplyFailed { chat_id: chat_id.to_string(), temp_id });
                self.store.notify(Notification::error(format!("Reply not sent: {}", e.user_message())));
                Err(e)
            }
        }
    }

    pub async fn set_support_status(&mut self, chat_id: &str, status: SupportStatus) -> Result<()> {
        match self.client.set_support_status(chat_id, status).await {
            Ok(chat) => {
                self.store.notify(Notification::success(format!("Support chat {chat_id} is now {status}")));
                self.store.dispatch(Action::SupportChatUpdated(chat));
                Ok(())
            }
            Err(e) => {
                self.store.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    /// Loads the recipient working set. A total failure leaves an empty set and
    /// an error notification rather than an error result.
    pub async fn load_recipients(&mut self, search: Option<String>, status: Option<String>) -> LoadOutcome {
        let client = self.client.clone();
        self.loader = RecipientLoader::new(client, self.config.recipient_threshold).with_filter(search, status);
        let outcome = self.loader.load(&mut self.selection).await;
        self.report_load(&outcome);
        outcome
    }

    pub async fn load_all_recipients(&mut self) -> Result<LoadOutcome> {
        match self.loader.load_all_remaining(&mut self.selection).await {
            Ok(outcome) => {
                self.report_load(&outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.store.notify(Notification::error(format!("Failed to load recipients: {}", e.user_message())));
                Err(e)
            }
        }
    }

    fn report_load(&mut self, outcome: &LoadOutcome) {
        if let Some(e) = &outcome.error {
            self.store.notify(Notification::error(format!("Failed to load recipients: {}", e.user_message())));
        } else if outcome.source == Some(RecipientSource::Users) {
            self.store.notify(Notification::warning("Recipients service unavailable; showing platform users"));
        }
        if !outcome.has_loaded_all && outcome.error.is_none() {
            self.store.notify(Notification::info(format!(
                "Showing the first {} of {} recipients",
                outcome.loaded,
                outcome.total.map(|t| t.to_string()).unwrap_or_else(|| "many".into())
            )));
        }
    }

    /// Applies explicit ids and/or "all active" to the working set's selection.
    ///
    /// Fails without touching the selection when an id is not in the working set.
    /// Fails when "all active" cannot be computed over the full recipient set.
    pub async fn select_recipients(&mut self, ids: &[Id], all_active: bool) -> Result<SelectionSet> {
        let unknown: Vec<&str> = ids
            .iter()
            .filter(|id| !self.selection.recipients.iter().any(|r| &r.id == *id))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            let e = AdminError::validation(format!("Recipient(s) {} not found", unknown.join(", ")));
            self.store.notify(Notification::error(e.user_message()));
            return Err(e);
        }

        if all_active {
            let notes = &mut self.store;
            let completeness = self
                .loader
                .select_all_active(&mut self.selection, |n| {
                    notes.notify(Notification::info(format!("Selected {n} loaded recipients, fetching the rest...")));
                })
                .await;
            if completeness == Completeness::Provisional {
                let total = self.selection.total_count.map(|t| t.to_string()).unwrap_or_else(|| "all".into());
                let e = AdminError::validation(format!(
                    "Only {} of {total} recipients could be loaded; the active selection is incomplete",
                    self.selection.recipients.len()
                ));
                self.store.notify(Notification::error(e.user_message()));
                return Err(e);
            }
        }
        for id in ids {
            if !self.selection.selection.contains(id) {
                self.selection.toggle(id);
            }
        }
        Ok(self.selection.selection.clone())
    }

    /// Loads the working set if needed, fetching the remainder when an explicit
    /// id is not among the loaded recipients, then selects.
    pub async fn prepare_selection(&mut self, ids: &[Id], all_active: bool) -> Result<SelectionSet> {
        if self.selection.recipients.is_empty() {
            self.load_recipients(None, None).await;
        }
        let unknown = ids.iter().any(|id| !self.selection.recipients.iter().any(|r| &r.id == id));
        if unknown && !self.selection.has_loaded_all {
            self.load_all_recipients().await?;
        }
        self.select_recipients(ids, all_active).await
    }

    pub async fn add_recipient(&mut self, recipient: NewRecipient) -> Result<Recipient> {
        match self.client.create_recipient(&recipient).await {
            Ok(created) => {
                self.store.notify(Notification::success(format!("Recipient {} added", created.email)));
                Ok(created)
            }
            Err(e) => {
                self.store.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    pub async fn load_groups(&mut self) -> Result<()> {
        let token = self.store.begin_request(Resource::Groups.key());
        self.store.dispatch(Action::FetchStarted(Resource::Groups));
        match self.client.all_groups().await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::GroupsLoaded(page));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::Groups, "Failed to load groups", &e);
                Err(e)
            }
        }
    }

    pub async fn create_group(&mut self, name: String, description: Option<String>) -> Result<Group> {
        let group = NewGroup { name, description, recipient_ids: self.selection.selection.ids().to_vec() };
        match self.client.create_group(&group).await {
            Ok(created) => {
                self.store.notify(Notification::success(format!(
                    "Group '{}' created with {} recipients",
                    created.name,
                    group.recipient_ids.len()
                )));
                self.store.dispatch(Action::GroupSaved(created.clone()));
                Ok(created)
            }
            Err(e) => {
                self.store.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    /// Selects `ids` (and every active recipient when asked), then creates the group from that selection.
    pub async fn create_group_with(
        &mut self,
        name: String,
        description: Option<String>,
        ids: &[Id],
        all_active: bool,
    ) -> Result<Group> {
        if !ids.is_empty() || all_active {
            self.prepare_selection(ids, all_active).await?;
        }
        self.create_group(name, description).await
    }

    pub async fn add_to_group_with(&mut self, group_id: &str, ids: &[Id], all_active: bool) -> Result<Group> {
        if ids.is_empty() && !all_active {
            let e = AdminError::validation("Select at least one recipient");
            self.store.notify(Notification::error(e.user_message()));
            return Err(e);
        }
        self.prepare_selection(ids, all_active).await?;
        self.add_to_group(group_id).await
    }

    /// Adds the selected recipients to an existing group without duplicating members.
    pub async fn add_to_group(&mut self, group_id: &str) -> Result<Group> {
        if self.store.state().groups.items.is_empty() {
            self.load_groups().await?;
        }
        let Some(group) = self.store.state().groups.items.iter().find(|g| g.id == group_id).cloned() else {
            let e = AdminError::validation(format!("Group {group_id} not found"));
            self.store.notify(Notification::error(e.user_message()));
            return Err(e);
        };
        let incoming: Vec<Recipient> = self.selection.selected().into_iter().cloned().collect();
        let merged = merge_into_group(&group.recipients, &incoming);
        let added = merged.len() - group.recipients.len();
        if added == 0 {
            self.store.notify(Notification::info("Selected recipients are already in this group"));
            return Ok(group);
        }
        let ids: Vec<Id> = merged.iter().map(|r| r.id.clone()).collect();
        match self.client.update_group_recipients(group_id, &ids).await {
            Ok(mut updated) => {
                if updated.recipients.is_empty() {
                    updated.recipients = merged;
                }
                self.store.notify(Notification::success(format!("Added {added} recipients to '{}'", updated.name)));
                self.store.dispatch(Action::GroupSaved(updated.clone()));
                Ok(updated)
            }
            Err(e) => {
                self.store.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    pub async fn load_templates(&mut self) -> Result<()> {
        let token = self.store.begin_request(Resource::Templates.key());
        self.store.dispatch(Action::FetchStarted(Resource::Templates));
        match self.client.all_templates().await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::TemplatesLoaded(page));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::Templates, "Failed to load templates", &e);
                Err(e)
            }
        }
    }

    pub async fn create_template(&mut self, template: NewTemplate) -> Result<EmailTemplate> {
        match self.client.create_template(&template).await {
            Ok(created) => {
                self.store.notify(Notification::success(format!("Template '{}' saved", created.name)));
                self.store.dispatch(Action::TemplateCreated(created.clone()));
                Ok(created)
            }
            Err(e) => {
                self.store.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn find_template(&mut self, id: &str) -> Result<EmailTemplate> {
        if self.store.state().templates.items.is_empty() {
            self.load_templates().await?;
        }
        let found = self.store.state().templates.items.iter().find(|t| t.id == id).cloned();
        found.ok_or_else(|| AdminError::validation(format!("Template {id} not found")))
    }

    /// Renders a template for one recipient, or for a sample recipient when none is given.
    pub async fn preview(&mut self, template_id: &str, recipient_id: Option<&str>) -> Result<RenderedEmail> {
        let template = self.find_template(template_id).await?;
        let recipient = match recipient_id {
            Some(id) => {
                let id = id.to_string();
                self.prepare_selection(std::slice::from_ref(&id), false).await?;
                self.selection
                    .recipients
                    .iter()
                    .find(|r| r.id == id)
                    .cloned()
                    .ok_or_else(|| AdminError::validation(format!("Recipient {id} not found")))?
            }
            None => Recipient {
                id: "preview".into(),
                name: "Jane Doe".into(),
                email: "jane.doe@example.com".into(),
                status: RecipientStatus::Active,
            },
        };
        Ok(template::preview(&template, &recipient, &self.config))
    }

    /// Resolves a campaign into one send request: template text unless overridden,
    /// and the deduplicated union of group members and directly selected recipients.
    pub async fn compose(&mut self, campaign: &Campaign) -> Result<BulkSendRequest> {
        let template = match &campaign.template_id {
            Some(id) => Some(self.find_template(id).await?),
            None => None,
        };

        let mut emails = EmailList::default();
        if !campaign.group_ids.is_empty() {
            if self.store.state().groups.items.is_empty() {
                self.load_groups().await?;
            }
            let selected = SelectionSet::from_ids(campaign.group_ids.iter().cloned());
            for email in group_recipient_emails(&self.store.state().groups.items, &selected) {
                emails.push(&email);
            }
        }
        if campaign.all_active || !campaign.recipient_ids.is_empty() {
            self.prepare_selection(&campaign.recipient_ids, campaign.all_active).await?;
            for r in self.selection.selected() {
                emails.push(&r.email);
            }
        }

        let subject = campaign
            .subject
            .clone()
            .or_else(|| template.as_ref().map(|t| t.subject.clone()))
            .unwrap_or_default();
        let body = campaign
            .body
            .clone()
            .or_else(|| template.as_ref().map(|t| t.body.clone()))
            .unwrap_or_default();
        Ok(BulkSendRequest {
            subject,
            body,
            is_html: campaign.is_html || template.as_ref().is_some_and(|t| t.is_html),
            template_id: template.map(|t| t.id),
            recipients: emails.into_vec(),
        })
    }

    pub async fn send(&mut self, request: &BulkSendRequest) -> Result<BulkSendResult> {
        self.store.dispatch(Action::SendStarted);
        let result = self.client.send_bulk_email(request).await;
        self.store.dispatch(Action::SendFinished);
        match result {
            Ok(res) => {
                info!("Bulk send finished: {} ok, {} failed", res.success_count, res.failure_count);
                self.store.notify(Notification::success(format!(
                    "Email sent to {} recipient{}",
                    res.success_count,
                    if res.success_count == 1 { "" } else { "s" }
                )));
                Ok(res)
            }
            Err(e) => {
                self.store.notify(Notification::error(format!("Failed to send email: {}", e.user_message())));
                Err(e)
            }
        }
    }

    pub async fn load_history(&mut self, query: &ListQuery) -> Result<()> {
        let token = self.store.begin_request(Resource::History.key());
        self.store.dispatch(Action::FetchStarted(Resource::History));
        match self.client.email_history(query).await {
            Ok(page) => {
                self.store.dispatch_if_current(&token, Action::HistoryLoaded(page));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::History, "Failed to load email history", &e);
                Err(e)
            }
        }
    }

    pub async fn load_stats(&mut self) -> Result<()> {
        let token = self.store.begin_request(Resource::Stats.key());
        match self.client.email_stats().await {
            Ok(stats) => {
                self.store.dispatch_if_current(&token, Action::StatsLoaded(stats));
                Ok(())
            }
            Err(e) => {
                self.fail(&token, Resource::Stats, "Failed to load email stats", &e);
                Err(e)
            }
        }
    }
}
