//! Read-only collaborators consumed by the computer.
//!
//! Implementations live outside this crate (database-backed stores, the
//! wikitext renderer); [`crate::memory`] provides an in-memory backend.

use std::{fmt, net::IpAddr, rc::Rc};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::cache::ObjectCache;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Failed to parse wikitext: {0}")]
    Parse(String),
}

/// A page reference. An `id` of `0` denotes a page that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub id: u64,
    pub namespace: i32,
    pub title: String,
    pub namespace_prefix: String,
}

impl PageRef {
    pub fn new(id: u64, namespace: i32, title: impl Into<String>) -> Self {
        Self {
            id,
            namespace,
            title: title.into(),
            namespace_prefix: String::new(),
        }
    }

    pub fn with_namespace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.namespace_prefix = prefix.into();
        self
    }

    pub fn exists(&self) -> bool {
        self.id != 0
    }

    pub fn prefixed_title(&self) -> String {
        if self.namespace_prefix.is_empty() {
            self.title.clone()
        } else {
            format!("{}:{}", self.namespace_prefix, self.title)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserKind {
    Named,
    Temp,
    Ip,
    External,
    Unknown,
}

impl UserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserKind::Named => "named",
            UserKind::Temp => "temp",
            UserKind::Ip => "ip",
            UserKind::External => "external",
            UserKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The performer of an action. An `id` of `0` denotes an unregistered identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserRef {
    pub id: u64,
    pub name: String,
    pub temp: bool,
}

impl UserRef {
    pub fn named(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            temp: false,
        }
    }

    pub fn temp(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            temp: true,
        }
    }

    pub fn anonymous(ip: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: ip.into(),
            temp: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.id != 0
    }

    pub fn is_ip(&self) -> bool {
        self.name.parse::<IpAddr>().is_ok()
    }

    /// Imported users are written as `prefix>Name`.
    pub fn is_external(&self) -> bool {
        self.name.contains('>')
    }

    pub fn kind(&self) -> UserKind {
        if self.temp {
            UserKind::Temp
        } else if !self.is_registered() && self.is_ip() {
            UserKind::Ip
        } else if self.is_external() {
            UserKind::External
        } else if self.is_registered() {
            UserKind::Named
        } else {
            UserKind::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionRecord {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub page_id: u64,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub content_model: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserOutput {
    pub html: String,
    pub external_links: Vec<String>,
}

/// Render results of an in-flight save, supplied by the caller so edit-time
/// variables never trigger a second parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedUpdate {
    pub output: ParserOutput,
}

impl PreparedUpdate {
    pub fn new(output: ParserOutput) -> Self {
        Self { output }
    }
}

pub trait RevisionStore {
    fn revision_by_id(&self, id: u64) -> Result<Option<RevisionRecord>, LookupError>;
    fn first_revision(&self, page: &PageRef) -> Result<Option<RevisionRecord>, LookupError>;
    fn latest_revision(&self, page: &PageRef) -> Result<Option<RevisionRecord>, LookupError>;
    fn previous_revision(
        &self,
        revision: &RevisionRecord,
    ) -> Result<Option<RevisionRecord>, LookupError>;
    /// Distinct authors of the most recent revisions, newest first.
    fn recent_authors(&self, page: &PageRef, limit: usize) -> Result<Vec<String>, LookupError>;
}

pub trait PageStore {
    fn restrictions(&self, page: &PageRef, action: &str) -> Result<Vec<String>, LookupError>;
    fn external_links(&self, page: &PageRef) -> Result<Vec<String>, LookupError>;
}

pub trait UserStore {
    fn edit_count(&self, user: &UserRef) -> Result<Option<u64>, LookupError>;
    fn email_confirmed(&self, user: &UserRef) -> Result<Option<DateTime<Utc>>, LookupError>;
    fn effective_groups(&self, user: &UserRef) -> Result<Vec<String>, LookupError>;
    fn effective_rights(&self, user: &UserRef) -> Result<Vec<String>, LookupError>;
    fn is_blocked(&self, user: &UserRef) -> Result<bool, LookupError>;
    fn registration(&self, user: &UserRef) -> Result<Option<DateTime<Utc>>, LookupError>;
}

/// Renders historical (non-edit) wikitext.
pub trait WikitextParser {
    fn parse(&self, text: &str, page: &PageRef, user: &UserRef)
    -> Result<ParserOutput, LookupError>;
}

#[derive(Clone)]
pub struct Services {
    pub revisions: Rc<dyn RevisionStore>,
    pub pages: Rc<dyn PageStore>,
    pub users: Rc<dyn UserStore>,
    pub parser: Option<Rc<dyn WikitextParser>>,
    pub cache: Rc<dyn ObjectCache>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("parser", &self.parser.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::named(UserRef::named(3, "Alice"), UserKind::Named)]
    #[case::temp(UserRef::temp(4, "~2024-1"), UserKind::Temp)]
    #[case::ipv4(UserRef::anonymous("192.0.2.1"), UserKind::Ip)]
    #[case::ipv6(UserRef::anonymous("2001:db8::1"), UserKind::Ip)]
    #[case::external(UserRef::named(5, "imported>Bob"), UserKind::External)]
    #[case::external_unregistered(UserRef::anonymous("imported>Bob"), UserKind::External)]
    #[case::unknown(UserRef::anonymous("Maintenance script"), UserKind::Unknown)]
    fn test_user_kind(#[case] user: UserRef, #[case] expected: UserKind) {
        assert_eq!(user.kind(), expected);
    }

    #[test]
    fn test_prefixed_title() {
        assert_eq!(PageRef::new(1, 0, "Main Page").prefixed_title(), "Main Page");
        assert_eq!(
            PageRef::new(2, 2, "Alice")
                .with_namespace_prefix("User")
                .prefixed_title(),
            "User:Alice"
        );
        assert!(!PageRef::new(0, 0, "Missing").exists());
    }
}
