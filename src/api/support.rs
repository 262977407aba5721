use serde_json::json;

use crate::api::client::{ApiClient, decode_item};
use crate::api::models::{ListQuery, Page, SupportChat, SupportMessage, SupportStatus};
use crate::error::Result;
use crate::validation::require;

impl ApiClient {
    pub async fn support_chats(&self, query: &ListQuery) -> Result<Page<SupportChat>> {
        self.list("/support-chats", "supportChats", query).await
    }

    pub async fn reply_support_chat(&self, chat_id: &str, content: &str) -> Result<SupportMessage> {
        require("Reply", content)?;
        let json = self
            .post_json(&format!("/support-chats/{chat_id}/messages"), &json!({ "content": content, "fromAdmin": true }))
            .await?;
        decode_item(&json, "message")
    }

    pub async fn set_support_status(&self, chat_id: &str, status: SupportStatus) -> Result<SupportChat> {
        let json = self
            .patch_json(&format!("/support-chats/{chat_id}"), &json!({ "status": status }))
            .await?;
        decode_item(&json, "supportChat")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::PATCH;

    #[tokio::test]
    async fn support_list_reads_camel_case_resource() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/support-chats").query_param("status", "OPEN");
                then.status(200).json_body(json!({
                    "data": {
                        "supportChats": [
                            {"id": 1, "userId": 44, "subject": "Can't log in", "status": "OPEN",
                             "messages": [{"id": 9, "content": "help", "fromAdmin": false}]}
                        ],
                        "pagination": {"page": 1, "totalPages": 1, "totalCount": 1}
                    }
                }));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let query = ListQuery { status: Some("OPEN".into()), ..Default::default() };
        let page = client.support_chats(&query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].user_id.as_deref(), Some("44"));
        assert!(!page.items[0].messages[0].pending);
    }

    #[tokio::test]
    async fn close_sends_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PATCH).path("/support-chats/3").json_body(json!({"status": "CLOSED"}));
                then.status(200).json_body(json!({"data": {"id": 3, "status": "CLOSED"}}));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let chat = client.set_support_status("3", SupportStatus::Closed).await.unwrap();
        mock.assert_async().await;
        assert_eq!(chat.status, SupportStatus::Closed);
    }
}
