//! Computation of deferred variables.
//!
//! [`LazyVariableComputer`] first offers a descriptor to every registered
//! [`ComputeInterceptor`] in order, then falls back to the builtin kinds. The
//! `resolve` callback passed to `compute` lets a kind read other variables
//! (through the manager, so they are memoized too).

use std::{fmt, fmt::Write as _, ops::Range, rc::Rc};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use scraper::Html;
use similar::{ChangeTag, TextDiff};

use crate::{
    cache::ParseCache,
    config::Config,
    error::Error,
    lazy::{ComputationKind, LazyDescriptor, Param},
    profiling::ExcludedProfilingTime,
    services::{
        LookupError, PageRef, ParserOutput, PreparedUpdate, RevisionRecord, Services, UserKind,
    },
    value::Value,
};

const DIFF_CONTEXT_LINES: usize = 2;
const RECENT_AUTHORS_CACHE_PREFIX: &str = "filter-vars:last-authors";

pub type Resolver<'a> = dyn FnMut(&str) -> Result<Value, Error> + 'a;

pub trait VariableComputer {
    fn compute(
        &self,
        descriptor: &LazyDescriptor,
        resolve: &mut Resolver<'_>,
    ) -> Result<Value, Error>;

    /// Drops state that must not outlive one evaluation pass.
    fn begin_pass(&self) {}
}

/// An externally registered handler that may supply a value before builtin
/// dispatch runs. Returning `Ok(None)` passes the descriptor on.
pub trait ComputeInterceptor {
    fn on_compute(
        &self,
        kind: &str,
        descriptor: &LazyDescriptor,
        resolve: &mut Resolver<'_>,
    ) -> Result<Option<Value>, Error>;
}

pub struct LazyVariableComputer {
    services: Services,
    config: Config,
    interceptors: Vec<Box<dyn ComputeInterceptor>>,
    parse_cache: Rc<ParseCache>,
    excluded_time: ExcludedProfilingTime,
}

impl fmt::Debug for LazyVariableComputer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyVariableComputer")
            .field("services", &self.services)
            .field("config", &self.config)
            .field("interceptors", &self.interceptors.len())
            .field("parse_cache", &self.parse_cache)
            .field("excluded_time", &self.excluded_time)
            .finish()
    }
}

impl LazyVariableComputer {
    pub fn new(services: Services, config: Config) -> Self {
        Self {
            services,
            config,
            interceptors: Vec::new(),
            parse_cache: Rc::new(ParseCache::new()),
            excluded_time: ExcludedProfilingTime::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: impl ComputeInterceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn with_parse_cache(mut self, parse_cache: Rc<ParseCache>) -> Self {
        self.parse_cache = parse_cache;
        self
    }

    pub fn with_excluded_time(mut self, excluded_time: ExcludedProfilingTime) -> Self {
        self.excluded_time = excluded_time;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parse_cache(&self) -> &ParseCache {
        &self.parse_cache
    }

    pub fn excluded_time(&self) -> &ExcludedProfilingTime {
        &self.excluded_time
    }

    fn compute_builtin(
        &self,
        d: &LazyDescriptor,
        resolve: &mut Resolver<'_>,
    ) -> Result<Value, Error> {
        match &d.kind {
            ComputationKind::Diff => {
                let old = resolve(d.var_param("oldtext-var")?)?;
                let new = resolve(d.var_param("newtext-var")?)?;
                Ok(unified_diff(&old.string(), &new.string()).into())
            }
            ComputationKind::DiffSplit => {
                let diff = resolve(d.var_param("diff-var")?)?;
                Ok(split_diff(&diff.string(), d.str_param("line-prefix")?).into())
            }
            ComputationKind::ArrayDiff => {
                let base = resolve(d.var_param("base-var")?)?;
                let minus = resolve(d.var_param("minus-var")?)?;
                Ok(array_diff(&base, &minus).into())
            }
            ComputationKind::LinksFromUpdate => {
                let update = required_update(d)?;
                Ok(self.links_from_update(update).into())
            }
            ComputationKind::LinksFromWikitext => match d.update_param("update")? {
                Some(update) => Ok(self.links_from_update(update).into()),
                None => Ok(self
                    .parse_non_edit(d, "text-var", resolve)?
                    .external_links
                    .clone()
                    .into()),
            },
            ComputationKind::LinksFromDatabase => {
                Ok(self.services.pages.external_links(d.page_param("page")?)?.into())
            }
            ComputationKind::LinksFromWikitextOrDatabase => {
                if let Some(update) = d.update_param("update")? {
                    Ok(self.links_from_update(update).into())
                } else if self.services.parser.is_some() && d.optional("text-var").is_some() {
                    Ok(self
                        .parse_non_edit(d, "text-var", resolve)?
                        .external_links
                        .clone()
                        .into())
                } else {
                    Ok(self.services.pages.external_links(d.page_param("page")?)?.into())
                }
            }
            ComputationKind::ParseWikitext => match d.update_param("update")? {
                Some(update) => Ok(self
                    .excluded_time
                    .measure(|| update.output.html.clone())
                    .into()),
                None => Ok(self
                    .parse_non_edit(d, "wikitext-var", resolve)?
                    .html
                    .clone()
                    .into()),
            },
            ComputationKind::StripHtml => {
                let html = resolve(d.var_param("html-var")?)?;
                Ok(strip_html(&html.string()).into())
            }
            ComputationKind::LoadRecentAuthors => self.recent_authors(d.page_param("page")?),
            ComputationKind::PageFirstAuthor => Ok(self
                .services
                .revisions
                .first_revision(d.page_param("page")?)?
                .map(|r| r.author)
                .unwrap_or_default()
                .into()),
            ComputationKind::GetPageRestrictions => Ok(self
                .services
                .pages
                .restrictions(d.page_param("page")?, d.str_param("action")?)?
                .into()),
            ComputationKind::UserUnnamedIp => unnamed_ip(d),
            ComputationKind::UserType => Ok(d.user_param("user")?.kind().as_str().into()),
            ComputationKind::UserEditCount => {
                Ok(self.services.users.edit_count(d.user_param("user")?)?.into())
            }
            ComputationKind::UserEmailConfirm => Ok(self
                .services
                .users
                .email_confirmed(d.user_param("user")?)?
                .map(mw_timestamp)
                .into()),
            ComputationKind::UserGroups => {
                Ok(self.services.users.effective_groups(d.user_param("user")?)?.into())
            }
            ComputationKind::UserRights => {
                Ok(self.services.users.effective_rights(d.user_param("user")?)?.into())
            }
            ComputationKind::UserBlock => {
                Ok(self.services.users.is_blocked(d.user_param("user")?)?.into())
            }
            ComputationKind::UserAge => self.user_age(d),
            ComputationKind::PageAge => {
                let page = d.page_param("page")?;
                let asof = d.timestamp_param("asof")?;
                if !page.exists() {
                    return Ok(Value::Int(0));
                }
                Ok(self
                    .services
                    .revisions
                    .first_revision(page)?
                    .map(|r| age(&r, asof))
                    .unwrap_or_default()
                    .into())
            }
            ComputationKind::RevisionAgeById => {
                let asof = d.timestamp_param("asof")?;
                Ok(self
                    .revision_by_id(d)?
                    .map(|r| age(&r, asof))
                    .into())
            }
            ComputationKind::RevisionAgeByTitle => {
                let asof = d.timestamp_param("asof")?;
                Ok(self
                    .services
                    .revisions
                    .latest_revision(d.page_param("page")?)?
                    .map(|r| age(&r, asof))
                    .into())
            }
            ComputationKind::PreviousRevisionAge => {
                let asof = d.timestamp_param("asof")?;
                let previous = match self.revision_by_id(d)? {
                    Some(revision) => self.services.revisions.previous_revision(&revision)?,
                    None => None,
                };
                Ok(previous.map(|r| age(&r, asof)).into())
            }
            ComputationKind::Length => {
                let value = resolve(d.var_param("length-var")?)?;
                Ok(value.string().chars().count().into())
            }
            ComputationKind::SubtractInt => {
                let left = resolve(d.var_param("val1-var")?)?;
                let right = resolve(d.var_param("val2-var")?)?;
                Ok(left.to_int().saturating_sub(right.to_int()).into())
            }
            ComputationKind::ContentModelById => Ok(self
                .revision_by_id(d)?
                .map(|r| r.content_model)
                .unwrap_or_default()
                .into()),
            ComputationKind::RevisionTextById => Ok(self
                .revision_by_id(d)?
                .map(|r| r.text)
                .unwrap_or_default()
                .into()),
            ComputationKind::GetWikiName => Ok(self.config.wiki_id.clone().into()),
            ComputationKind::GetWikiLanguage => Ok(self.config.wiki_language.clone().into()),
            ComputationKind::Custom(name) => Err(Error::UnknownComputationKind(name.to_string())),
        }
    }

    fn links_from_update(&self, update: &PreparedUpdate) -> Vec<String> {
        self.excluded_time
            .measure(|| update.output.external_links.clone())
    }

    /// Parses historical wikitext through the parse memo.
    fn parse_non_edit(
        &self,
        d: &LazyDescriptor,
        text_param: &str,
        resolve: &mut Resolver<'_>,
    ) -> Result<Rc<ParserOutput>, Error> {
        let text = resolve(d.var_param(text_param)?)?;
        let text = text.string();
        let page = d.page_param("page")?;
        let user = d.user_param("user")?;
        let Some(parser) = &self.services.parser else {
            return Err(LookupError::Parse("no wikitext parser configured".to_string()).into());
        };

        self.parse_cache
            .get_or_parse(&text, page.id, || Ok(parser.parse(&text, page, user)?))
    }

    fn recent_authors(&self, page: &PageRef) -> Result<Value, Error> {
        if !page.exists() {
            return Ok(Value::Array(Vec::new()));
        }
        let Some(latest) = self.services.revisions.latest_revision(page)? else {
            return Ok(Value::Array(Vec::new()));
        };

        let key = format!("{}:{}:{}", RECENT_AUTHORS_CACHE_PREFIX, page.id, latest.id);
        let limit = self.config.recent_authors_limit;
        let revisions = &self.services.revisions;
        let mut load = || -> Result<serde_json::Value, Error> {
            Ok(revisions.recent_authors(page, limit)?.into())
        };
        let authors = self.services.cache.get_with_set_callback(
            &key,
            self.config.recent_authors_ttl,
            &mut load,
        )?;

        Ok(authors.into())
    }

    fn user_age(&self, d: &LazyDescriptor) -> Result<Value, Error> {
        let user = d.user_param("user")?;
        let asof = d.timestamp_param("asof")?;
        if !user.is_registered() {
            return Ok(Value::Int(0));
        }

        let registration = self
            .services
            .users
            .registration(user)?
            .unwrap_or(self.config.default_registration);
        Ok((asof - registration).num_seconds().into())
    }

    fn revision_by_id(&self, d: &LazyDescriptor) -> Result<Option<RevisionRecord>, Error> {
        let Ok(id) = u64::try_from(d.int_param("revid")?) else {
            return Ok(None);
        };
        Ok(self.services.revisions.revision_by_id(id)?)
    }
}

impl VariableComputer for LazyVariableComputer {
    fn compute(
        &self,
        descriptor: &LazyDescriptor,
        resolve: &mut Resolver<'_>,
    ) -> Result<Value, Error> {
        let kind = descriptor.kind.name();
        for interceptor in &self.interceptors {
            if let Some(value) = interceptor.on_compute(kind, descriptor, resolve)? {
                tracing::trace!("Interceptor supplied value for kind {}", kind);
                return Ok(value);
            }
        }

        self.compute_builtin(descriptor, resolve).inspect_err(|e| {
            if let Error::Lookup(err) = e {
                tracing::warn!("Lookup for kind {} failed: {}", kind, err);
            }
        })
    }

    fn begin_pass(&self) {
        tracing::trace!("Dropping {} memoized parses", self.parse_cache.len());
        self.parse_cache.clear();
    }
}

fn required_update(d: &LazyDescriptor) -> Result<&PreparedUpdate, Error> {
    d.update_param("update")?.ok_or_else(|| Error::MissingParameter {
        kind: d.kind.name().to_string(),
        param: "update".to_string(),
    })
}

/// Exposes an IP only for temporary or anonymous identities acting live.
fn unnamed_ip(d: &LazyDescriptor) -> Result<Value, Error> {
    let user = d.user_param("user")?;
    let live = match d.optional("live") {
        Some(_) => d.bool_param("live")?,
        None => false,
    };
    if !live {
        return Ok(Value::NULL);
    }

    match user.kind() {
        UserKind::Ip => Ok(user.name.clone().into()),
        UserKind::Temp => match d.optional("request-ip") {
            Some(Param::Literal(Value::String(ip))) => Ok(ip.clone().into()),
            _ => Ok(Value::NULL),
        },
        UserKind::Named | UserKind::External | UserKind::Unknown => Ok(Value::NULL),
    }
}

fn age(revision: &RevisionRecord, asof: DateTime<Utc>) -> i64 {
    (asof - revision.timestamp).num_seconds()
}

fn mw_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%d%H%M%S").to_string()
}

fn with_trailing_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

fn hunk_range(range: Range<usize>) -> String {
    let start = if range.is_empty() {
        range.start
    } else {
        range.start + 1
    };
    format!("{},{}", start, range.len())
}

/// Line-based unified diff without file headers.
fn unified_diff(old: &str, new: &str) -> String {
    let old = with_trailing_newline(old);
    let new = with_trailing_newline(new);
    let diff = TextDiff::from_lines(old.as_str(), new.as_str());
    let mut out = String::new();

    for group in diff.grouped_ops(DIFF_CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            hunk_range(first.old_range().start..last.old_range().end),
            hunk_range(first.new_range().start..last.new_range().end)
        );

        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                };
                let line = change.value().trim_end_matches(|c| c == '\n' || c == '\r');
                let _ = writeln!(out, "{}{}", sign, line);
            }
        }
    }

    out
}

fn split_diff(diff: &str, prefix: &str) -> Vec<String> {
    diff.lines()
        .filter(|line| !line.starts_with("@@"))
        .filter_map(|line| line.strip_prefix(prefix))
        .map(str::to_string)
        .collect()
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null | Value::Undefined => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Elements of `base` whose string form does not occur in `minus`.
fn array_diff(base: &Value, minus: &Value) -> Vec<Value> {
    let minus = as_list(minus)
        .iter()
        .map(|v| v.string().into_owned())
        .collect::<FxHashSet<_>>();

    as_list(base)
        .into_iter()
        .filter(|v| !minus.contains(&*v.string()))
        .collect()
}

fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<String>();
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim_end()
        .to_string()
}
