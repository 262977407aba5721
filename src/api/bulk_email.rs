use log::info;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Value, json};

use crate::api::client::{ApiClient, decode_item};
use crate::api::models::{
    BulkSendRequest, BulkSendResult, EmailHistoryEntry, EmailStats, EmailTemplate, Group, Id, ListQuery,
    NewGroup, NewTemplate, Page, Recipient, RecipientStatus,
};
use crate::error::{AdminError, Result};
use crate::validation::{require, require_email};

pub const RECIPIENTS_PATH: &str = "/bulk-email/recipients";
/// Rows per request when a whole collection is needed.
const COLLECTION_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Serialize)]
pub struct NewRecipient {
    pub name: String,
    pub email: String,
    pub status: RecipientStatus,
}

impl ApiClient {
    pub async fn recipients(&self, query: &ListQuery) -> Result<Page<Recipient>> {
        self.list(RECIPIENTS_PATH, "recipients", query).await
    }

    pub async fn create_recipient(&self, recipient: &NewRecipient) -> Result<Recipient> {
        require("Name", &recipient.name)?;
        require_email(&recipient.email)?;
        let json = self.post_json(RECIPIENTS_PATH, recipient).await?;
        decode_item(&json, "recipient")
    }

    /// Single multipart request; the backend imports every row atomically.
    pub async fn upload_recipients_csv(&self, file_name: &str, contents: Vec<u8>) -> Result<Value> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new().part("file", part);
        let req = self.request(Method::POST, &format!("{RECIPIENTS_PATH}/import"))?.multipart(form);
        self.send(req).await
    }

    pub async fn all_groups(&self) -> Result<Page<Group>> {
        self.list_all("/bulk-email/groups", "groups", COLLECTION_PAGE_SIZE).await
    }

    pub async fn create_group(&self, group: &NewGroup) -> Result<Group> {
        require("Group name", &group.name)?;
        let json = self.post_json("/bulk-email/groups", group).await?;
        decode_item(&json, "group")
    }

    pub async fn update_group_recipients(&self, group_id: &str, recipient_ids: &[Id]) -> Result<Group> {
        let json = self
            .put_json(&format!("/bulk-email/groups/{group_id}"), &json!({ "recipientIds": recipient_ids }))
            .await?;
        decode_item(&json, "group")
    }

    pub async fn all_templates(&self) -> Result<Page<EmailTemplate>> {
        self.list_all("/bulk-email/templates", "templates", COLLECTION_PAGE_SIZE).await
    }

    pub async fn create_template(&self, template: &NewTemplate) -> Result<EmailTemplate> {
        require("Template name", &template.name)?;
        require("Subject", &template.subject)?;
        require("Body", &template.body)?;
        let json = self.post_json("/bulk-email/templates", template).await?;
        decode_item(&json, "template")
    }

    pub async fn email_history(&self, query: &ListQuery) -> Result<Page<EmailHistoryEntry>> {
        self.list("/bulk-email/history", "history", query).await
    }

    pub async fn email_stats(&self) -> Result<EmailStats> {
        let json = self.get_json("/bulk-email/stats", &[] as &[(&str, &str)]).await?;
        decode_item(&json, "stats")
    }

    pub async fn send_bulk_email(&self, request: &BulkSendRequest) -> Result<BulkSendResult> {
        require("Subject", &request.subject)?;
        require("Body", &request.body)?;
        if request.recipients.is_empty() {
            return Err(AdminError::validation("Select at least one recipient"));
        }
        info!("Sending bulk email to {} recipients", request.recipients.len());
        let json = self.post_json("/bulk-email/send", request).await?;
        decode_item(&json, "result")
    }
}
