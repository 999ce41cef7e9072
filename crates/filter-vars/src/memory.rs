//! In-memory implementations of the collaborator traits.
//!
//! Useful for tests and for evaluating snapshots offline. Every store call and
//! every parse is counted so callers can assert on memoization.

use std::{cell::Cell, rc::Rc, sync::LazyLock};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex_lite::Regex;
use rustc_hash::FxHashMap;

use crate::{
    cache::MemoryObjectCache,
    services::{
        LookupError, PageRef, PageStore, ParserOutput, RevisionRecord, RevisionStore, Services,
        UserRef, UserStore, WikitextParser,
    },
};

static EXTERNAL_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s\[\]<>"|]+"#).expect("Failed to compile external link pattern")
});

#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub edit_count: u64,
    pub email_confirmed: Option<DateTime<Utc>>,
    pub groups: Vec<String>,
    pub rights: Vec<String>,
    pub blocked: bool,
    pub registration: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MemoryWiki {
    revisions: Vec<RevisionRecord>,
    restrictions: FxHashMap<(u64, String), Vec<String>>,
    links: FxHashMap<u64, Vec<String>>,
    users: FxHashMap<String, UserRecord>,
    lookups: Cell<usize>,
    parses: Cell<usize>,
}

impl MemoryWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_revision(&mut self, revision: RevisionRecord) -> &mut Self {
        self.revisions.push(revision);
        self
    }

    pub fn set_restrictions(
        &mut self,
        page_id: u64,
        action: &str,
        groups: Vec<String>,
    ) -> &mut Self {
        self.restrictions.insert((page_id, action.to_string()), groups);
        self
    }

    pub fn set_external_links(&mut self, page_id: u64, links: Vec<String>) -> &mut Self {
        self.links.insert(page_id, links);
        self
    }

    pub fn add_user(&mut self, name: &str, record: UserRecord) -> &mut Self {
        self.users.insert(name.to_string(), record);
        self
    }

    /// Number of store queries answered so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.get()
    }

    pub fn parse_count(&self) -> usize {
        self.parses.get()
    }

    /// Wires `wiki` as every store and the parser, with a fresh object cache.
    pub fn services(wiki: &Rc<MemoryWiki>) -> Services {
        Services {
            revisions: Rc::clone(wiki) as Rc<dyn RevisionStore>,
            pages: Rc::clone(wiki) as Rc<dyn PageStore>,
            users: Rc::clone(wiki) as Rc<dyn UserStore>,
            parser: Some(Rc::clone(wiki) as Rc<dyn WikitextParser>),
            cache: Rc::new(MemoryObjectCache::new()),
        }
    }

    fn count(&self) {
        self.lookups.set(self.lookups.get() + 1);
    }

    fn page_revisions(&self, page: &PageRef) -> impl Iterator<Item = &RevisionRecord> {
        self.revisions.iter().filter(move |r| r.page_id == page.id)
    }

    fn user(&self, user: &UserRef) -> Option<&UserRecord> {
        self.users.get(&user.name)
    }
}

impl RevisionStore for MemoryWiki {
    fn revision_by_id(&self, id: u64) -> Result<Option<RevisionRecord>, LookupError> {
        self.count();
        Ok(self.revisions.iter().find(|r| r.id == id).cloned())
    }

    fn first_revision(&self, page: &PageRef) -> Result<Option<RevisionRecord>, LookupError> {
        self.count();
        Ok(self.page_revisions(page).min_by_key(|r| r.id).cloned())
    }

    fn latest_revision(&self, page: &PageRef) -> Result<Option<RevisionRecord>, LookupError> {
        self.count();
        Ok(self.page_revisions(page).max_by_key(|r| r.id).cloned())
    }

    fn previous_revision(
        &self,
        revision: &RevisionRecord,
    ) -> Result<Option<RevisionRecord>, LookupError> {
        self.count();
        Ok(revision
            .parent_id
            .and_then(|parent| self.revisions.iter().find(|r| r.id == parent))
            .cloned())
    }

    fn recent_authors(&self, page: &PageRef, limit: usize) -> Result<Vec<String>, LookupError> {
        self.count();
        Ok(self
            .page_revisions(page)
            .sorted_by(|a, b| b.id.cmp(&a.id))
            .map(|r| r.author.clone())
            .unique()
            .take(limit)
            .collect())
    }
}

impl PageStore for MemoryWiki {
    fn restrictions(&self, page: &PageRef, action: &str) -> Result<Vec<String>, LookupError> {
        self.count();
        Ok(self
            .restrictions
            .get(&(page.id, action.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn external_links(&self, page: &PageRef) -> Result<Vec<String>, LookupError> {
        self.count();
        Ok(self.links.get(&page.id).cloned().unwrap_or_default())
    }
}

impl UserStore for MemoryWiki {
    fn edit_count(&self, user: &UserRef) -> Result<Option<u64>, LookupError> {
        self.count();
        if !user.is_registered() {
            return Ok(None);
        }
        Ok(Some(self.user(user).map(|u| u.edit_count).unwrap_or_default()))
    }

    fn email_confirmed(&self, user: &UserRef) -> Result<Option<DateTime<Utc>>, LookupError> {
        self.count();
        Ok(self.user(user).and_then(|u| u.email_confirmed))
    }

    fn effective_groups(&self, user: &UserRef) -> Result<Vec<String>, LookupError> {
        self.count();
        let mut groups = vec!["*".to_string()];
        if user.is_registered() {
            groups.push("user".to_string());
        }
        if let Some(record) = self.user(user) {
            groups.extend(record.groups.iter().cloned());
        }
        Ok(groups)
    }

    fn effective_rights(&self, user: &UserRef) -> Result<Vec<String>, LookupError> {
        self.count();
        Ok(self.user(user).map(|u| u.rights.clone()).unwrap_or_default())
    }

    fn is_blocked(&self, user: &UserRef) -> Result<bool, LookupError> {
        self.count();
        Ok(self.user(user).is_some_and(|u| u.blocked))
    }

    fn registration(&self, user: &UserRef) -> Result<Option<DateTime<Utc>>, LookupError> {
        self.count();
        Ok(self.user(user).and_then(|u| u.registration))
    }
}

impl WikitextParser for MemoryWiki {
    fn parse(
        &self,
        text: &str,
        _page: &PageRef,
        _user: &UserRef,
    ) -> Result<ParserOutput, LookupError> {
        self.parses.set(self.parses.get() + 1);

        let html = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| format!("<p>{}</p>", escape_html(line)))
            .join("\n");
        let external_links = EXTERNAL_LINK
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .unique()
            .collect();

        Ok(ParserOutput {
            html,
            external_links,
        })
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
