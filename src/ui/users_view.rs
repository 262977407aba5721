use crate::api::models::{Pagination, User};
use crate::utils::{format_timestamp, truncate};

pub fn print_users(users: &[User], pagination: Option<&Pagination>) {
    if users.is_empty() {
        println!("No users found.");
        return;
    }
    println!("{:<26} {:<24} {:<32} {:<10} {}", "ID", "NAME", "EMAIL", "STATUS", "JOINED");
    for u in users {
        println!(
            "{:<26} {:<24} {:<32} {:<10} {}",
            truncate(&u.id, 26),
            truncate(u.display_name(), 24),
            truncate(u.email.as_deref().unwrap_or("-"), 32),
            u.status.as_deref().unwrap_or("-"),
            format_timestamp(u.created_at.as_deref())
        );
    }
    super::print_pagination(pagination);
}
