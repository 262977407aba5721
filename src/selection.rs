//! Recipient and group selection for bulk-email sends and group membership.
//!
//! Everything here is plain in-memory bookkeeping over data that has already
//! been fetched; [`crate::recipients::RecipientLoader`] is responsible for
//! getting it into memory.

use std::collections::HashSet;

use crate::api::models::{Group, Id, Recipient, RecipientStatus};

pub const DEFAULT_PAGE_SIZE: usize = 25;

pub trait Identified {
    fn id(&self) -> &Id;
}

impl Identified for Recipient {
    fn id(&self) -> &Id {
        &self.id
    }
}

impl Identified for Group {
    fn id(&self) -> &Id {
        &self.id
    }
}

/// Items shown on a 1-based page. A page size of zero means "All".
pub fn load_page<T>(all: &[T], page: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return all;
    }
    let start = page.max(1).saturating_sub(1).saturating_mul(page_size).min(all.len());
    let end = start.saturating_add(page_size).min(all.len());
    &all[start..end]
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 || total == 0 {
        return 1;
    }
    total.div_ceil(page_size)
}

/// Ordered set of ids. Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: Vec<Id>,
}

impl PartialEq for SelectionSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.ids.iter().all(|id| other.contains(id))
    }
}

impl Eq for SelectionSet {}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Id>,
    {
        let mut set = Self::new();
        for id in ids {
            set.insert(id.into());
        }
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Id> {
        self.ids.iter()
    }

    /// Returns false if the id was already selected.
    pub fn insert(&mut self, id: Id) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn toggle(&mut self, id: &str) {
        match self.ids.iter().position(|i| i == id) {
            Some(pos) => {
                self.ids.remove(pos);
            }
            None => self.ids.push(id.to_string()),
        }
    }

    /// Adds every visible id; ids selected on other pages stay selected.
    pub fn select_all_visible<T: Identified>(&mut self, visible: &[T]) {
        for item in visible {
            self.insert(item.id().clone());
        }
    }

    /// Replaces the selection with every item matching `predicate`.
    pub fn select_matching<T, F>(&mut self, all: &[T], predicate: F)
    where
        T: Identified,
        F: Fn(&T) -> bool,
    {
        self.ids.clear();
        for item in all.iter().filter(|i| predicate(i)) {
            self.insert(item.id().clone());
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// The selected items of `all`, in `all`'s order.
    pub fn pick<'a, T: Identified>(&self, all: &'a [T]) -> Vec<&'a T> {
        all.iter().filter(|i| self.contains(i.id())).collect()
    }
}

pub fn is_active(r: &Recipient) -> bool {
    r.status == RecipientStatus::Active
}

/// Union keyed by recipient id. Existing entries are kept as they are.
pub fn merge_into_group(existing: &[Recipient], incoming: &[Recipient]) -> Vec<Recipient> {
    let mut seen: HashSet<&str> = existing.iter().map(|r| r.id.as_str()).collect();
    let mut merged = existing.to_vec();
    for r in incoming {
        if seen.insert(r.id.as_str()) {
            merged.push(r.clone());
        }
    }
    merged
}

/// Email addresses of every recipient in the selected groups, each address once.
pub fn group_recipient_emails(groups: &[Group], selected: &SelectionSet) -> Vec<String> {
    let mut emails = EmailList::default();
    for group in groups.iter().filter(|g| selected.contains(&g.id)) {
        for r in &group.recipients {
            emails.push(&r.email);
        }
    }
    emails.into_vec()
}

/// Insertion-ordered, case-insensitively deduplicated email addresses.
#[derive(Debug, Default)]
pub struct EmailList {
    seen: HashSet<String>,
    emails: Vec<String>,
}

impl EmailList {
    pub fn push(&mut self, email: &str) -> bool {
        let email = email.trim();
        if email.is_empty() || !self.seen.insert(email.to_ascii_lowercase()) {
            return false;
        }
        self.emails.push(email.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.emails
    }
}

/// Whether a computed selection covers the whole backend dataset yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    /// Only a prefix of the recipients is in memory; the set may grow once the rest is fetched.
    Provisional,
}

/// Paginated recipient view plus the operator's current selection.
#[derive(Debug, Clone)]
pub struct SelectionManager {
    pub recipients: Vec<Recipient>,
    pub has_loaded_all: bool,
    pub total_count: Option<u64>,
    pub page: usize,
    pub page_size: usize,
    pub selection: SelectionSet,
}

impl Default for SelectionManager {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            has_loaded_all: false,
            total_count: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            selection: SelectionSet::new(),
        }
    }
}

impl SelectionManager {
    pub fn new(page_size: usize) -> Self {
        Self { page_size, ..Default::default() }
    }

    pub fn visible(&self) -> &[Recipient] {
        load_page(&self.recipients, self.page, self.page_size)
    }

    pub fn page_count(&self) -> usize {
        page_count(self.recipients.len(), self.page_size)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count());
    }

    pub fn toggle(&mut self, id: &str) {
        self.selection.toggle(id);
    }

    pub fn select_all_visible(&mut self) {
        let visible = load_page(&self.recipients, self.page, self.page_size);
        self.selection.select_all_visible(visible);
    }

    /// Selects every recipient matching `predicate` across all loaded pages.
    pub fn select_all_where<F>(&mut self, predicate: F) -> Completeness
    where
        F: Fn(&Recipient) -> bool,
    {
        self.selection.select_matching(&self.recipients, predicate);
        if self.has_loaded_all { Completeness::Complete } else { Completeness::Provisional }
    }

    pub fn select_all_active(&mut self) -> Completeness {
        self.select_all_where(is_active)
    }

    pub fn clear(&mut self) {
        self.selection.clear();
    }

    pub fn selected(&self) -> Vec<&Recipient> {
        self.selection.pick(&self.recipients)
    }

    /// Replace the working set, dropping selected ids that no longer exist.
    pub fn replace_recipients(&mut self, recipients: Vec<Recipient>, has_loaded_all: bool) {
        self.recipients = recipients;
        self.has_loaded_all = has_loaded_all;
        let known: HashSet<&str> = self.recipients.iter().map(|r| r.id.as_str()).collect();
        let kept: Vec<Id> = self.selection.iter().filter(|id| known.contains(id.as_str())).cloned().collect();
        self.selection = SelectionSet::from_ids(kept);
        self.set_page(self.page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rcpt(id: &str, status: RecipientStatus) -> Recipient {
        Recipient { id: id.into(), name: format!("R{id}"), email: format!("r{id}@mail.io"), status }
    }

    fn many(n: usize) -> Vec<Recipient> {
        (1..=n).map(|i| rcpt(&i.to_string(), RecipientStatus::Active)).collect()
    }

    #[test]
    fn pages_reconstruct_the_full_list() {
        for n in [0usize, 1, 7, 25, 26, 100] {
            let all = many(n);
            for size in [1usize, 3, 10, 25] {
                let mut rebuilt = Vec::new();
                for page in 1..=page_count(n, size) {
                    let slice = load_page(&all, page, size);
                    let expected = size.min(n.saturating_sub((page - 1) * size));
                    assert_eq!(slice.len(), expected, "n={n} size={size} page={page}");
                    rebuilt.extend_from_slice(slice);
                }
                assert_eq!(rebuilt, all);
            }
        }
    }

    #[test]
    fn page_size_zero_shows_everything() {
        let all = many(12);
        assert_eq!(load_page(&all, 3, 0).len(), 12);
        assert!(load_page(&all, 99, 5).is_empty());
        assert_eq!(load_page(&all, 0, 5), load_page(&all, 1, 5));
    }

    #[test]
    fn toggle_twice_is_identity() {
        let original = SelectionSet::from_ids(["1", "2", "3"]);
        for id in ["2", "9"] {
            let mut s = original.clone();
            s.toggle(id);
            assert_ne!(s, original);
            s.toggle(id);
            assert_eq!(s, original);
        }
    }

    #[test]
    fn select_all_visible_keeps_other_pages() {
        let mut m = SelectionManager::new(10);
        m.replace_recipients(many(30), true);
        m.toggle("25");
        m.toggle("3");
        m.set_page(1);
        m.select_all_visible();

        assert!(m.selection.contains("25"));
        for r in load_page(&m.recipients, 1, 10) {
            assert!(m.selection.contains(&r.id));
        }
        assert_eq!(m.selection.len(), 11);
    }

    #[test]
    fn select_all_active_ignores_pagination_and_reports_completeness() {
        let mut all = many(40);
        all[5].status = RecipientStatus::Suspended;
        all[30].status = RecipientStatus::Unsubscribed;
        let mut m = SelectionManager::new(10);
        m.replace_recipients(all.clone(), false);
        m.toggle("6");

        assert_eq!(m.select_all_active(), Completeness::Provisional);
        assert_eq!(m.selection.len(), 38);
        assert!(!m.selection.contains("6"));
        assert!(!m.selection.contains("31"));

        m.replace_recipients(all, true);
        assert_eq!(m.select_all_active(), Completeness::Complete);

        m.clear();
        assert!(m.selection.is_empty());
    }

    #[test]
    fn merge_dedupes_by_id() {
        let existing = vec![rcpt("1", RecipientStatus::Active), rcpt("2", RecipientStatus::Active)];
        let mut renamed = rcpt("2", RecipientStatus::Suspended);
        renamed.name = "changed".into();
        let incoming = vec![renamed, rcpt("3", RecipientStatus::Active), rcpt("1", RecipientStatus::Active)];

        let merged = merge_into_group(&existing, &incoming);
        assert_eq!(merged.len(), existing.len() + incoming.len() - 2);
        let ids: Vec<&str> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(merged[1].name, "R2");
    }

    #[test]
    fn overlapping_groups_yield_unique_emails() {
        let (r1, r2, r3) = (
            rcpt("1", RecipientStatus::Active),
            rcpt("2", RecipientStatus::Active),
            rcpt("3", RecipientStatus::Active),
        );
        let group = |id: &str, recipients: Vec<Recipient>| Group {
            id: id.into(),
            name: format!("G{id}"),
            description: None,
            recipients,
            created_at: None,
            updated_at: None,
        };
        let groups = vec![
            group("1", vec![r1.clone(), r2.clone()]),
            group("2", vec![r2.clone(), r3.clone()]),
            group("3", vec![]),
        ];

        let emails = group_recipient_emails(&groups, &SelectionSet::from_ids(["1", "2"]));
        assert_eq!(emails, vec![r1.email, r2.email, r3.email]);
    }

    #[test]
    fn email_list_ignores_case_and_blanks() {
        let mut list = EmailList::default();
        assert!(list.push("Ann@Mail.io"));
        assert!(!list.push("ann@mail.io "));
        assert!(!list.push("  "));
        assert_eq!(list.into_vec(), vec!["Ann@Mail.io"]);
    }

    #[test]
    fn replacing_recipients_prunes_stale_selection() {
        let mut m = SelectionManager::new(5);
        m.replace_recipients(many(10), true);
        m.set_page(2);
        m.toggle("9");
        m.toggle("10");
        m.replace_recipients(many(9), true);
        assert_eq!(m.selection, SelectionSet::from_ids(["9"]));
        assert_eq!(m.page, 2);
        m.replace_recipients(many(3), true);
        assert_eq!(m.page, 1);
    }
}
