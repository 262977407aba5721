use crate::api::models::{Chat, Message};
use crate::utils::{format_timestamp, truncate};

pub fn print_chats(chats: &[Chat]) {
    if chats.is_empty() {
        println!("No chats found.");
        return;
    }
    println!("{:<26} {:<32} {:<17} {}", "ID", "NAME", "UPDATED", "LAST MESSAGE");
    for chat in chats {
        println!(
            "{:<26} {:<32} {:<17} {}",
            truncate(&chat.id, 26),
            truncate(&chat.name, 32),
            format_timestamp(chat.updated_at.as_deref()),
            truncate(chat.last_message.as_deref().unwrap_or(""), 60)
        );
    }
}

pub fn print_messages(messages: &[Message]) {
    if messages.is_empty() {
        println!("No messages in this chat.");
        return;
    }
    for m in messages {
        println!("[{}] {}: {}", format_timestamp(m.created_at.as_deref()), m.sender, m.content);
    }
}
