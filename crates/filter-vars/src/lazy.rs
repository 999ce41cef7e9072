//! Deferred variable descriptors.

use std::{fmt, rc::Rc};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::{
    error::Error,
    services::{PageRef, PreparedUpdate, UserRef},
    value::Value,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComputationKind {
    Diff,
    DiffSplit,
    ArrayDiff,
    LinksFromUpdate,
    LinksFromWikitext,
    LinksFromDatabase,
    LinksFromWikitextOrDatabase,
    ParseWikitext,
    StripHtml,
    LoadRecentAuthors,
    PageFirstAuthor,
    GetPageRestrictions,
    UserUnnamedIp,
    UserType,
    UserEditCount,
    UserEmailConfirm,
    UserGroups,
    UserRights,
    UserBlock,
    UserAge,
    PageAge,
    RevisionAgeById,
    RevisionAgeByTitle,
    PreviousRevisionAge,
    Length,
    SubtractInt,
    ContentModelById,
    RevisionTextById,
    GetWikiName,
    GetWikiLanguage,
    /// A kind with no builtin handler; only interceptors can compute it.
    Custom(SmolStr),
}

const BUILTIN_KINDS: &[ComputationKind] = &[
    ComputationKind::Diff,
    ComputationKind::DiffSplit,
    ComputationKind::ArrayDiff,
    ComputationKind::LinksFromUpdate,
    ComputationKind::LinksFromWikitext,
    ComputationKind::LinksFromDatabase,
    ComputationKind::LinksFromWikitextOrDatabase,
    ComputationKind::ParseWikitext,
    ComputationKind::StripHtml,
    ComputationKind::LoadRecentAuthors,
    ComputationKind::PageFirstAuthor,
    ComputationKind::GetPageRestrictions,
    ComputationKind::UserUnnamedIp,
    ComputationKind::UserType,
    ComputationKind::UserEditCount,
    ComputationKind::UserEmailConfirm,
    ComputationKind::UserGroups,
    ComputationKind::UserRights,
    ComputationKind::UserBlock,
    ComputationKind::UserAge,
    ComputationKind::PageAge,
    ComputationKind::RevisionAgeById,
    ComputationKind::RevisionAgeByTitle,
    ComputationKind::PreviousRevisionAge,
    ComputationKind::Length,
    ComputationKind::SubtractInt,
    ComputationKind::ContentModelById,
    ComputationKind::RevisionTextById,
    ComputationKind::GetWikiName,
    ComputationKind::GetWikiLanguage,
];

impl ComputationKind {
    pub fn name(&self) -> &str {
        match self {
            ComputationKind::Diff => "diff",
            ComputationKind::DiffSplit => "diff-split",
            ComputationKind::ArrayDiff => "array-diff",
            ComputationKind::LinksFromUpdate => "links-from-update",
            ComputationKind::LinksFromWikitext => "links-from-wikitext",
            ComputationKind::LinksFromDatabase => "links-from-database",
            ComputationKind::LinksFromWikitextOrDatabase => "links-from-wikitext-or-database",
            ComputationKind::ParseWikitext => "parse-wikitext",
            ComputationKind::StripHtml => "strip-html",
            ComputationKind::LoadRecentAuthors => "load-recent-authors",
            ComputationKind::PageFirstAuthor => "page-first-author",
            ComputationKind::GetPageRestrictions => "get-page-restrictions",
            ComputationKind::UserUnnamedIp => "user-unnamed-ip",
            ComputationKind::UserType => "user-type",
            ComputationKind::UserEditCount => "user-editcount",
            ComputationKind::UserEmailConfirm => "user-emailconfirm",
            ComputationKind::UserGroups => "user-groups",
            ComputationKind::UserRights => "user-rights",
            ComputationKind::UserBlock => "user-block",
            ComputationKind::UserAge => "user-age",
            ComputationKind::PageAge => "page-age",
            ComputationKind::RevisionAgeById => "revision-age-by-id",
            ComputationKind::RevisionAgeByTitle => "revision-age-by-title",
            ComputationKind::PreviousRevisionAge => "previous-revision-age",
            ComputationKind::Length => "length",
            ComputationKind::SubtractInt => "subtract-int",
            ComputationKind::ContentModelById => "content-model-by-id",
            ComputationKind::RevisionTextById => "revision-text-by-id",
            ComputationKind::GetWikiName => "get-wiki-name",
            ComputationKind::GetWikiLanguage => "get-wiki-language",
            ComputationKind::Custom(name) => name.as_str(),
        }
    }

    /// Maps a kind name to its builtin variant, or to [`ComputationKind::Custom`].
    pub fn from_name(name: &str) -> Self {
        BUILTIN_KINDS
            .iter()
            .find(|kind| kind.name() == name)
            .cloned()
            .unwrap_or_else(|| ComputationKind::Custom(SmolStr::new(name)))
    }

    /// Kinds that query the database or another network service. These must be
    /// computed before a snapshot crosses a process or wiki boundary.
    pub fn touches_database(&self) -> bool {
        matches!(
            self,
            ComputationKind::LinksFromDatabase
                | ComputationKind::LinksFromWikitextOrDatabase
                | ComputationKind::LoadRecentAuthors
                | ComputationKind::PageFirstAuthor
                | ComputationKind::GetPageRestrictions
                | ComputationKind::UserEditCount
                | ComputationKind::UserEmailConfirm
                | ComputationKind::UserGroups
                | ComputationKind::UserRights
                | ComputationKind::UserBlock
                | ComputationKind::UserAge
                | ComputationKind::PageAge
                | ComputationKind::RevisionAgeById
                | ComputationKind::RevisionAgeByTitle
                | ComputationKind::PreviousRevisionAge
                | ComputationKind::ContentModelById
                | ComputationKind::RevisionTextById
        )
    }
}

impl fmt::Display for ComputationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(Value),
    /// Name of another variable, resolved through the manager on demand.
    Var(SmolStr),
    Page(PageRef),
    User(UserRef),
    Timestamp(DateTime<Utc>),
    Update(Rc<PreparedUpdate>),
}

impl Param {
    pub fn var(name: &str) -> Self {
        Param::Var(SmolStr::new(name.to_lowercase()))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Param::Literal(value.into())
    }
}

impl From<PageRef> for Param {
    fn from(page: PageRef) -> Self {
        Param::Page(page)
    }
}

impl From<UserRef> for Param {
    fn from(user: UserRef) -> Self {
        Param::User(user)
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(ts: DateTime<Utc>) -> Self {
        Param::Timestamp(ts)
    }
}

impl From<Rc<PreparedUpdate>> for Param {
    fn from(update: Rc<PreparedUpdate>) -> Self {
        Param::Update(update)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LazyDescriptor {
    pub kind: ComputationKind,
    pub params: FxHashMap<SmolStr, Param>,
}

impl LazyDescriptor {
    pub fn new<K, I>(kind: ComputationKind, params: I) -> Self
    where
        K: Into<SmolStr>,
        I: IntoIterator<Item = (K, Param)>,
    {
        Self {
            kind,
            params: params.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn bare(kind: ComputationKind) -> Self {
        Self {
            kind,
            params: FxHashMap::default(),
        }
    }

    pub fn optional(&self, name: &str) -> Option<&Param> {
        self.params.get(name)
    }

    pub fn param(&self, name: &str) -> Result<&Param, Error> {
        self.params.get(name).ok_or_else(|| Error::MissingParameter {
            kind: self.kind.name().to_string(),
            param: name.to_string(),
        })
    }

    pub fn var_param(&self, name: &str) -> Result<&str, Error> {
        match self.param(name)? {
            Param::Var(var) => Ok(var.as_str()),
            _ => Err(self.invalid(name, "a variable name")),
        }
    }

    pub fn page_param(&self, name: &str) -> Result<&PageRef, Error> {
        match self.param(name)? {
            Param::Page(page) => Ok(page),
            _ => Err(self.invalid(name, "a page")),
        }
    }

    pub fn user_param(&self, name: &str) -> Result<&UserRef, Error> {
        match self.param(name)? {
            Param::User(user) => Ok(user),
            _ => Err(self.invalid(name, "a user")),
        }
    }

    pub fn timestamp_param(&self, name: &str) -> Result<DateTime<Utc>, Error> {
        match self.param(name)? {
            Param::Timestamp(ts) => Ok(*ts),
            _ => Err(self.invalid(name, "a timestamp")),
        }
    }

    pub fn int_param(&self, name: &str) -> Result<i64, Error> {
        match self.param(name)? {
            Param::Literal(Value::Int(n)) => Ok(*n),
            _ => Err(self.invalid(name, "an integer literal")),
        }
    }

    pub fn str_param(&self, name: &str) -> Result<&str, Error> {
        match self.param(name)? {
            Param::Literal(Value::String(s)) => Ok(s.as_str()),
            _ => Err(self.invalid(name, "a string literal")),
        }
    }

    pub fn bool_param(&self, name: &str) -> Result<bool, Error> {
        match self.param(name)? {
            Param::Literal(Value::Bool(b)) => Ok(*b),
            _ => Err(self.invalid(name, "a boolean literal")),
        }
    }

    pub fn update_param(&self, name: &str) -> Result<Option<&PreparedUpdate>, Error> {
        match self.optional(name) {
            None => Ok(None),
            Some(Param::Update(update)) => Ok(Some(update.as_ref())),
            Some(_) => Err(self.invalid(name, "a prepared update")),
        }
    }

    fn invalid(&self, name: &str, expected: &'static str) -> Error {
        Error::InvalidParameter {
            kind: self.kind.name().to_string(),
            param: name.to_string(),
            expected,
        }
    }
}
