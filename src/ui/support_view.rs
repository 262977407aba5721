use crate::api::models::SupportChat;
use crate::utils::{format_timestamp, truncate};

pub fn print_support_chats(chats: &[SupportChat]) {
    if chats.is_empty() {
        println!("No support chats.");
        return;
    }
    println!("{:<12} {:<8} {:<12} {:<40} {}", "ID", "STATUS", "USER", "SUBJECT", "MESSAGES");
    for c in chats {
        println!(
            "{:<12} {:<8} {:<12} {:<40} {}",
            truncate(&c.id, 12),
            c.status.to_string(),
            truncate(c.user_id.as_deref().unwrap_or("-"), 12),
            truncate(c.subject.as_deref().unwrap_or("(no subject)"), 40),
            c.messages.len()
        );
    }
}

pub fn print_conversation(chat: &SupportChat) {
    println!("Support chat {} [{}] {}", chat.id, chat.status, chat.subject.as_deref().unwrap_or(""));
    for m in &chat.messages {
        let who = if m.from_admin { "admin" } else { "user" };
        let marker = if m.pending { " (sending…)" } else { "" };
        println!("  [{}] {who}: {}{marker}", format_timestamp(m.created_at.as_deref()), m.content);
    }
}
