use crate::api::models::{BulkSendRequest, EmailHistoryEntry, EmailStats, EmailTemplate, Group, Pagination};
use crate::selection::SelectionManager;
use crate::utils::{format_timestamp, truncate};

pub fn print_recipient_page(manager: &SelectionManager) {
    let visible = manager.visible();
    if visible.is_empty() {
        println!("No recipients.");
        return;
    }
    println!("    {:<12} {:<28} {:<36} {}", "ID", "NAME", "EMAIL", "STATUS");
    for r in visible {
        let mark = if manager.selection.contains(&r.id) { "[x]" } else { "[ ]" };
        println!(
            "{mark} {:<12} {:<28} {:<36} {}",
            truncate(&r.id, 12),
            truncate(&r.name, 28),
            truncate(&r.email, 36),
            r.status.as_str()
        );
    }
    let loaded = manager.recipients.len();
    let total = match (manager.has_loaded_all, manager.total_count) {
        (false, Some(total)) => format!("{loaded} of {total} loaded"),
        (false, None) => format!("{loaded} loaded, more available"),
        (true, _) => format!("{loaded} total"),
    };
    println!(
        "Page {} of {} ({total}), {} selected",
        manager.page,
        manager.page_count(),
        manager.selection.len()
    );
}

pub fn print_groups(groups: &[Group]) {
    if groups.is_empty() {
        println!("No groups yet.");
        return;
    }
    println!("{:<12} {:<28} {:<10} {}", "ID", "NAME", "MEMBERS", "DESCRIPTION");
    for g in groups {
        println!(
            "{:<12} {:<28} {:<10} {}",
            truncate(&g.id, 12),
            truncate(&g.name, 28),
            g.recipients.len(),
            truncate(g.description.as_deref().unwrap_or(""), 50)
        );
    }
}

pub fn print_templates(templates: &[EmailTemplate]) {
    if templates.is_empty() {
        println!("No templates yet.");
        return;
    }
    println!("{:<12} {:<24} {:<6} {}", "ID", "NAME", "HTML", "SUBJECT");
    for t in templates {
        println!(
            "{:<12} {:<24} {:<6} {}",
            truncate(&t.id, 12),
            truncate(&t.name, 24),
            if t.is_html { "yes" } else { "no" },
            truncate(&t.subject, 60)
        );
    }
}

pub fn print_history(entries: &[EmailHistoryEntry], pagination: Option<&Pagination>) {
    if entries.is_empty() {
        println!("No emails sent yet.");
        return;
    }
    println!("{:<17} {:<40} {:>10} {:>10} {}", "SENT", "SUBJECT", "RECIPIENTS", "DELIVERED", "STATUS");
    for e in entries {
        println!(
            "{:<17} {:<40} {:>10} {:>10} {}",
            format_timestamp(e.sent_at.as_deref()),
            truncate(&e.subject, 40),
            e.recipient_count,
            e.success_count,
            e.status.as_deref().unwrap_or("-")
        );
    }
    super::print_pagination(pagination);
}

pub fn print_stats(stats: &EmailStats) {
    let attempted = stats.total_sent + stats.total_failed;
    let rate = if attempted == 0 { 0.0 } else { stats.total_sent as f64 * 100.0 / attempted as f64 };
    println!("Emails sent:      {}", stats.total_sent);
    println!("Emails failed:    {}", stats.total_failed);
    println!("Delivery rate:    {rate:.1}%");
    println!("Recipients:       {}", stats.total_recipients);
    println!("Groups:           {}", stats.total_groups);
    println!("Templates:        {}", stats.total_templates);
}

pub fn print_send_summary(request: &BulkSendRequest) {
    println!("Subject:    {}", request.subject);
    println!("Format:     {}", if request.is_html { "HTML" } else { "plain text" });
    println!("Recipients: {}", request.recipients.len());
    for email in request.recipients.iter().take(10) {
        println!("  {email}");
    }
    if request.recipients.len() > 10 {
        println!("  … and {} more", request.recipients.len() - 10);
    }
}
