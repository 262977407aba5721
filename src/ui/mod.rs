pub mod chat_view;
pub mod email_view;
pub mod login;
pub mod progress;
pub mod support_view;
pub mod users_view;

use crate::api::models::Pagination;

pub fn print_pagination(pagination: Option<&Pagination>) {
    if let Some(p) = pagination {
        println!("Page {} of {} ({} total)", p.page.max(1), p.total_pages.max(1), p.total_count);
    }
}
