use crate::api::client::{ApiClient, extract_list, extract_pagination};
use crate::api::models::{Chat, ListQuery, Message, Page};
use crate::error::Result;

impl ApiClient {
    /// Chats are decoded field by field since their shape varies between backend versions.
    pub async fn chats(&self, query: &ListQuery) -> Result<Page<Chat>> {
        let json = self.get_json("/admin/chats", query).await?;
        let items = extract_list(&json, "chats").iter().filter_map(Chat::from_value).collect();
        Ok(Page { items, pagination: extract_pagination(&json) })
    }

    pub async fn chat_messages(&self, chat_id: &str, query: &ListQuery) -> Result<Page<Message>> {
        let json = self.get_json(&format!("/admin/chats/{chat_id}/messages"), query).await?;
        let items = extract_list(&json, "messages").iter().filter_map(Message::from_value).collect();
        Ok(Page { items, pagination: extract_pagination(&json) })
    }
}
