use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Backend ids show up as numbers on some resources and strings on others.
pub type Id = String;

fn de_id<'de, D>(deserializer: D) -> Result<Id, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unsupported id: {other}"))),
    }
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<Id>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("unsupported id: {other}"))),
    }
}

pub(crate) fn value_id(v: &Value) -> Option<Id> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientStatus {
    #[default]
    Active,
    Suspended,
    Unsubscribed,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Active => "ACTIVE",
            RecipientStatus::Suspended => "SUSPENDED",
            RecipientStatus::Unsubscribed => "UNSUBSCRIBED",
        }
    }

    /// Lenient mapping used for user records, whose status vocabulary is wider.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUSPENDED" | "BANNED" | "BLOCKED" | "INACTIVE" => RecipientStatus::Suspended,
            "UNSUBSCRIBED" => RecipientStatus::Unsubscribed,
            _ => RecipientStatus::Active,
        }
    }
}

impl std::str::FromStr for RecipientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(RecipientStatus::Active),
            "SUSPENDED" => Ok(RecipientStatus::Suspended),
            "UNSUBSCRIBED" => Ok(RecipientStatus::Unsubscribed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub status: RecipientStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.username.as_deref())
            .unwrap_or("")
    }

    /// Users without an email address cannot receive bulk email.
    pub fn into_recipient(self) -> Option<Recipient> {
        let email = self.email.clone().filter(|e| !e.is_empty())?;
        Some(Recipient {
            name: self.display_name().to_string(),
            status: self
                .status
                .as_deref()
                .map(RecipientStatus::from_loose)
                .unwrap_or_default(),
            id: self.id,
            email,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Id,
    pub name: String,
    pub participants: Vec<String>,
    pub last_message: Option<String>,
    pub updated_at: Option<String>,
}

impl Chat {
    /// Chats come back in several shapes; pick the first populated field of each kind.
    pub fn from_value(item: &Value) -> Option<Self> {
        let id = item.get("id").or_else(|| item.get("_id")).and_then(value_id)?;
        let participants: Vec<String> = item
            .get("participants")
            .or_else(|| item.get("members"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(participant_label).collect())
            .unwrap_or_default();
        let name = item
            .get("name")
            .or_else(|| item.get("title"))
            .or_else(|| item.get("displayName"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| {
                if participants.is_empty() { "Chat".to_string() } else { participants.join(", ") }
            });
        let last_message = item
            .get("lastMessage")
            .and_then(|m| m.get("content").or_else(|| m.get("text")).or(Some(m)))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let updated_at = item
            .get("updatedAt")
            .or_else(|| item.get("lastMessageAt"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Some(Chat { id, name, participants, last_message, updated_at })
    }
}

fn participant_label(p: &Value) -> Option<String> {
    if let Some(s) = p.as_str() {
        return Some(s.to_string());
    }
    p.get("username")
        .or_else(|| p.get("name"))
        .or_else(|| p.get("email"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| p.get("id").and_then(value_id))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub chat_id: Option<Id>,
    pub sender: String,
    pub content: String,
    pub created_at: Option<String>,
}

impl Message {
    pub fn from_value(item: &Value) -> Option<Self> {
        let id = item.get("id").or_else(|| item.get("_id")).and_then(value_id)?;
        let sender = item
            .get("sender")
            .and_then(participant_label)
            .or_else(|| item.get("senderId").and_then(value_id))
            .unwrap_or_else(|| "unknown".to_string());
        let content = item
            .get("content")
            .or_else(|| item.get("text"))
            .or_else(|| item.get("body"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Some(Message {
            id,
            chat_id: item.get("chatId").and_then(value_id),
            sender,
            content,
            created_at: item.get("createdAt").and_then(|v| v.as_str()).map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportStatus {
    #[default]
    Open,
    Pending,
    Closed,
}

impl std::fmt::Display for SupportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SupportStatus::Open => "OPEN",
            SupportStatus::Pending => "PENDING",
            SupportStatus::Closed => "CLOSED",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportMessage {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(default, alias = "isAdmin")]
    pub from_admin: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Set on locally-synthesized replies until the server confirms them.
    #[serde(default, skip_serializing)]
    pub pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportChat {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: SupportStatus,
    #[serde(default)]
    pub messages: Vec<SupportMessage>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    pub name: String,
    pub subject: String,
    #[serde(alias = "content", alias = "htmlContent")]
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub recipient_ids: Vec<Id>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendRequest {
    pub subject: String,
    pub body: String,
    pub is_html: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Id>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendResult {
    #[serde(default, alias = "sent", alias = "sentCount")]
    pub success_count: usize,
    #[serde(default, alias = "failed", alias = "failedCount")]
    pub failure_count: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailHistoryEntry {
    #[serde(deserialize_with = "de_id")]
    pub id: Id,
    #[serde(default)]
    pub subject: String,
    #[serde(default, alias = "totalRecipients")]
    pub recipient_count: usize,
    #[serde(default)]
    pub success_count: usize,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailStats {
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub total_failed: u64,
    #[serde(default)]
    pub total_recipients: u64,
    #[serde(default)]
    pub total_groups: u64,
    #[serde(default)]
    pub total_templates: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default, alias = "total")]
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { page: 1, limit: 20, search: None, status: None }
    }
}

impl ListQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit, ..Default::default() }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    pub fn total_count(&self) -> Option<u64> {
        self.pagination.map(|p| p.total_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recipient_ids_accept_numbers_and_strings() {
        let a: Recipient = serde_json::from_value(json!({"id": 7, "name": "A", "email": "a@x.io"})).unwrap();
        let b: Recipient =
            serde_json::from_value(json!({"id": "7", "email": "a@x.io", "status": "SUSPENDED"})).unwrap();
        assert_eq!(a.id, "7");
        assert_eq!(a.status, RecipientStatus::Active);
        assert_eq!(b.id, a.id);
        assert_eq!(b.status, RecipientStatus::Suspended);
    }

    #[test]
    fn user_maps_to_recipient() {
        let user: User = serde_json::from_value(json!({
            "id": 3, "username": "kim", "email": "kim@x.io", "status": "banned"
        }))
        .unwrap();
        let r = user.into_recipient().unwrap();
        assert_eq!(r.name, "kim");
        assert_eq!(r.status, RecipientStatus::Suspended);

        let no_mail: User = serde_json::from_value(json!({"id": 4, "name": "x"})).unwrap();
        assert!(no_mail.into_recipient().is_none());
    }

    #[test]
    fn chat_falls_back_to_participants_for_name() {
        let chat = Chat::from_value(&json!({
            "_id": "c1",
            "participants": [{"username": "ann"}, {"name": "bob"}],
            "lastMessage": {"content": "hi"}
        }))
        .unwrap();
        assert_eq!(chat.id, "c1");
        assert_eq!(chat.name, "ann, bob");
        assert_eq!(chat.last_message.as_deref(), Some("hi"));
        assert!(Chat::from_value(&json!({"name": "no id"})).is_none());
    }

    #[test]
    fn message_reads_alternate_fields() {
        let m = Message::from_value(&json!({"id": 1, "text": "yo", "senderId": 9})).unwrap();
        assert_eq!(m.content, "yo");
        assert_eq!(m.sender, "9");
    }

    #[test]
    fn list_query_skips_empty_filters() {
        let q = ListQuery::new(2, 50);
        let encoded = serde_json::to_value(&q).unwrap();
        assert_eq!(encoded, json!({"page": 2, "limit": 50}));
    }
}
