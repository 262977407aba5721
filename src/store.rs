//! Application state. The only way to change it is [`reduce`], driven by [`Action`]s.

use std::collections::HashMap;

use crate::api::models::{
    Chat, EmailHistoryEntry, EmailStats, EmailTemplate, Group, Id, Message, Page, Pagination, SupportChat,
    SupportMessage, User,
};
use crate::notify::Notification;

#[derive(Debug, Clone)]
pub struct Slice<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for Slice<T> {
    fn default() -> Self {
        Self { items: Vec::new(), pagination: None, loading: false, error: None }
    }
}

impl<T> Slice<T> {
    fn loaded(&mut self, page: Page<T>) {
        self.items = page.items;
        self.pagination = page.pagination;
        self.loading = false;
        self.error = None;
    }

    fn failed(&mut self, message: String) {
        self.loading = false;
        self.error = Some(message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Chats,
    Messages,
    SupportChats,
    Groups,
    Templates,
    History,
    Stats,
}

impl Resource {
    /// Request-tracking key. Filters are not part of it: a newer search on the
    /// same resource supersedes an older one still in flight.
    pub fn key(&self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Chats => "chats",
            Resource::Messages => "messages",
            Resource::SupportChats => "support-chats",
            Resource::Groups => "groups",
            Resource::Templates => "templates",
            Resource::History => "history",
            Resource::Stats => "stats",
        }
    }
}

#[derive(Debug, Default)]
pub struct AdminState {
    pub users: Slice<User>,
    pub chats: Slice<Chat>,
    pub messages: HashMap<Id, Vec<Message>>,
    pub support_chats: Slice<SupportChat>,
    pub groups: Slice<Group>,
    pub templates: Slice<EmailTemplate>,
    pub history: Slice<EmailHistoryEntry>,
    pub stats: Option<EmailStats>,
    pub sending: bool,
    pub notifications: Vec<Notification>,
}

#[derive(Debug)]
pub enum Action {
    FetchStarted(Resource),
    FetchFailed(Resource, String),
    UsersLoaded(Page<User>),
    UserCreated(User),
    ChatsLoaded(Page<Chat>),
    MessagesLoaded(Id, Vec<Message>),
    SupportChatsLoaded(Page<SupportChat>),
    /// Reply shown immediately under a temporary id while the request is in flight.
    SupportReplyPending { chat_id: Id, temp_id: Id, content: String },
    SupportReplyConfirmed { chat_id: Id, temp_id: Id, message: SupportMessage },
    SupportReplyFailed { chat_id: Id, temp_id: Id },
    SupportChatUpdated(SupportChat),
    GroupsLoaded(Page<Group>),
    GroupSaved(Group),
    TemplatesLoaded(Page<EmailTemplate>),
    TemplateCreated(EmailTemplate),
    HistoryLoaded(Page<EmailHistoryEntry>),
    StatsLoaded(EmailStats),
    SendStarted,
    SendFinished,
    Notify(Notification),
}

fn upsert<T, F>(items: &mut Vec<T>, item: T, same: F)
where
    F: Fn(&T, &T) -> bool,
{
    match items.iter().position(|i| same(i, &item)) {
        Some(pos) => items[pos] = item,
        None => items.insert(0, item),
    }
}

pub fn reduce(state: &mut AdminState, action: Action) {
    match action {
        Action::FetchStarted(resource) => match resource {
            Resource::Users => state.users.loading = true,
            Resource::Chats => state.chats.loading = true,
            Resource::SupportChats => state.support_chats.loading = true,
            Resource::Groups => state.groups.loading = true,
            Resource::Templates => state.templates.loading = true,
            Resource::History => state.history.loading = true,
            Resource::Messages | Resource::Stats => {}
        },
        Action::FetchFailed(resource, message) => match resource {
            Resource::Users => state.users.failed(message),
            Resource::Chats => state.chats.failed(message),
            Resource::SupportChats => state.support_chats.failed(message),
            Resource::Groups => state.groups.failed(message),
            Resource::Templates => state.templates.failed(message),
            Resource::History => state.history.failed(message),
            Resource::Messages | Resource::Stats => {}
        },
        Action::UsersLoaded(page) => state.users.loaded(page),
        Action::UserCreated(user) => upsert(&mut state.users.items, user, |a, b| a.id == b.id),
        Action::ChatsLoaded(page) => state.chats.loaded(page),
        Action::MessagesLoaded(chat_id, messages) => {
            state.messages.insert(chat_id, messages);
        }
        Action::SupportChatsLoaded(page) => state.support_chats.loaded(page),
        Action::SupportReplyPending { chat_id, temp_id, content } => {
            if let Some(chat) = state.support_chats.items.iter_mut().find(|c| c.id == chat_id) {
                chat.messages.push(SupportMessage {
                    id: temp_id,
                    content,
                    from_admin: true,
                    created_at: Some(chrono::Utc::now().to_rfc3339()),
                    pending: true,
                });
            }
        }
        Action::SupportReplyConfirmed { chat_id, temp_id, message } => {
            if let Some(chat) = state.support_chats.items.iter_mut().find(|c| c.id == chat_id) {
                match chat.messages.iter_mut().find(|m| m.id == temp_id) {
                    Some(slot) => *slot = SupportMessage { pending: false, ..message },
                    None => chat.messages.push(message),
                }
            }
        }
        Action::SupportReplyFailed { chat_id, temp_id } => {
            if let Some(chat) = state.support_chats.items.iter_mut().find(|c| c.id == chat_id) {
                chat.messages.retain(|m| m.id != temp_id);
            }
        }
        Action::SupportChatUpdated(updated) => {
            if let Some(chat) = state.support_chats.items.iter_mut().find(|c| c.id == updated.id) {
                let messages = std::mem::take(&mut chat.messages);
                *chat = updated;
                if chat.messages.is_empty() {
                    chat.messages = messages;
                }
            } else {
                state.support_chats.items.insert(0, updated);
            }
        }
        Action::GroupsLoaded(page) => state.groups.loaded(page),
        Action::GroupSaved(group) => upsert(&mut state.groups.items, group, |a, b| a.id == b.id),
        Action::TemplatesLoaded(page) => state.templates.loaded(page),
        Action::TemplateCreated(t) => upsert(&mut state.templates.items, t, |a, b| a.id == b.id),
        Action::HistoryLoaded(page) => state.history.loaded(page),
        Action::StatsLoaded(stats) => state.stats = Some(stats),
        Action::SendStarted => state.sending = true,
        Action::SendFinished => state.sending = false,
        Action::Notify(n) => state.notifications.push(n),
    }
}

/// Ticket for one in-flight request against a query key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    key: String,
    generation: u64,
}

/// Hands out increasing generations per key so that only the latest response
/// for a key may touch the state.
#[derive(Debug, Default)]
pub struct RequestTracker {
    generations: HashMap<String, u64>,
}

impl RequestTracker {
    pub fn begin(&mut self, key: &str) -> RequestToken {
        let generation = self.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        RequestToken { key: key.to_string(), generation: *generation }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.generations.get(&token.key) == Some(&token.generation)
    }
}

#[derive(Debug, Default)]
pub struct Store {
    state: AdminState,
    requests: RequestTracker,
    temp_ids: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AdminState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        reduce(&mut self.state, action);
    }

    pub fn begin_request(&mut self, key: &str) -> RequestToken {
        self.requests.begin(key)
    }

    /// Applies `action` only if no newer request for the same key has started.
    pub fn dispatch_if_current(&mut self, token: &RequestToken, action: Action) -> bool {
        if !self.requests.is_current(token) {
            log::debug!("Dropping stale response for {}", token.key);
            return false;
        }
        self.dispatch(action);
        true
    }

    pub fn next_temp_id(&mut self) -> Id {
        self.temp_ids += 1;
        format!("temp-{}", self.temp_ids)
    }

    pub fn notify(&mut self, n: Notification) {
        self.dispatch(Action::Notify(n));
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.state.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::SupportStatus;

    fn support_chat(id: &str) -> SupportChat {
        SupportChat {
            id: id.into(),
            user_id: None,
            subject: Some("help".into()),
            status: SupportStatus::Open,
            messages: vec![],
            updated_at: None,
        }
    }

    fn store_with_chat() -> Store {
        let mut store = Store::new();
        store.dispatch(Action::SupportChatsLoaded(Page { items: vec![support_chat("s1")], pagination: None }));
        store
    }

    #[test]
    fn loading_flags_follow_fetch_lifecycle() {
        let mut store = Store::new();
        store.dispatch(Action::FetchStarted(Resource::Users));
        assert!(store.state().users.loading);
        store.dispatch(Action::FetchFailed(Resource::Users, "down".into()));
        assert!(!store.state().users.loading);
        assert_eq!(store.state().users.error.as_deref(), Some("down"));
        store.dispatch(Action::UsersLoaded(Page { items: vec![], pagination: None }));
        assert!(store.state().users.error.is_none());
    }

    #[test]
    fn optimistic_reply_is_replaced_on_success() {
        let mut store = store_with_chat();
        let temp_id = store.next_temp_id();
        store.dispatch(Action::SupportReplyPending { chat_id: "s1".into(), temp_id: temp_id.clone(), content: "on it".into() });
        let pending = &store.state().support_chats.items[0].messages;
        assert_eq!(pending.len(), 1);
        assert!(pending[0].pending);

        let confirmed = SupportMessage {
            id: "m-77".into(),
            content: "on it".into(),
            from_admin: true,
            created_at: None,
            pending: false,
        };
        store.dispatch(Action::SupportReplyConfirmed { chat_id: "s1".into(), temp_id, message: confirmed.clone() });
        assert_eq!(store.state().support_chats.items[0].messages, vec![confirmed]);
    }

    #[test]
    fn optimistic_reply_is_removed_on_failure() {
        let mut store = store_with_chat();
        let temp_id = store.next_temp_id();
        store.dispatch(Action::SupportReplyPending { chat_id: "s1".into(), temp_id: temp_id.clone(), content: "x".into() });
        store.dispatch(Action::SupportReplyFailed { chat_id: "s1".into(), temp_id });
        assert!(store.state().support_chats.items[0].messages.is_empty());
    }

    fn users_page(name: &str) -> Page<User> {
        Page {
            items: vec![User {
                id: name.into(),
                name: Some(name.into()),
                username: None,
                email: None,
                status: None,
                role: None,
                created_at: None,
            }],
            pagination: None,
        }
    }

    #[test]
    fn older_search_cannot_overwrite_newer_one() {
        let mut store = Store::new();
        // "a" is issued first, then "ab"; "ab" answers first.
        let search_a = store.begin_request(Resource::Users.key());
        let search_ab = store.begin_request(Resource::Users.key());

        assert!(store.dispatch_if_current(&search_ab, Action::UsersLoaded(users_page("ab"))));
        assert!(!store.dispatch_if_current(&search_a, Action::UsersLoaded(users_page("a"))));
        assert_eq!(store.state().users.items[0].id, "ab");
    }

    #[test]
    fn stale_failure_does_not_clobber_newer_result() {
        let mut store = Store::new();
        let first = store.begin_request(Resource::Users.key());
        let second = store.begin_request(Resource::Users.key());
        assert!(store.dispatch_if_current(&second, Action::UsersLoaded(users_page("fresh"))));
        assert!(!store.dispatch_if_current(&first, Action::FetchFailed(Resource::Users, "timeout".into())));
        assert!(store.state().users.error.is_none());
        assert_eq!(store.state().users.items.len(), 1);
    }

    #[test]
    fn keys_are_tracked_independently() {
        let mut store = Store::new();
        let users = store.begin_request(Resource::Users.key());
        let _chats = store.begin_request(Resource::Chats.key());
        assert!(store.dispatch_if_current(&users, Action::UsersLoaded(users_page("u"))));
    }

    #[test]
    fn status_update_keeps_loaded_messages() {
        let mut store = store_with_chat();
        let temp_id = store.next_temp_id();
        store.dispatch(Action::SupportReplyPending { chat_id: "s1".into(), temp_id, content: "hi".into() });
        let mut closed = support_chat("s1");
        closed.status = SupportStatus::Closed;
        store.dispatch(Action::SupportChatUpdated(closed));
        let chat = &store.state().support_chats.items[0];
        assert_eq!(chat.status, SupportStatus::Closed);
        assert_eq!(chat.messages.len(), 1);
    }

    #[test]
    fn notifications_drain() {
        let mut store = Store::new();
        store.notify(Notification::success("Sent to 3 recipients"));
        assert_eq!(store.take_notifications().len(), 1);
        assert!(store.take_notifications().is_empty());
    }
}
