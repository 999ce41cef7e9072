//! Populates a [`VariableHolder`] with the builtin variables of an action.
//!
//! Cheap facts are stored resolved; anything needing a lookup, a parse or a
//! diff is stored deferred so that filters only pay for what they read.

use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::{
    holder::VariableHolder,
    lazy::{ComputationKind, LazyDescriptor, Param},
    services::{PageRef, PreparedUpdate, UserRef},
};

const RESTRICTION_ACTIONS: &[&str] = &["edit", "move", "create", "upload"];

/// Everything known about an edit before it is saved.
#[derive(Debug, Clone)]
pub struct EditContext {
    pub page: PageRef,
    pub user: UserRef,
    pub old_text: String,
    pub new_text: String,
    pub old_content_model: String,
    pub new_content_model: String,
    pub summary: String,
    /// Render results of the save in progress, when the caller has them.
    pub update: Option<Rc<PreparedUpdate>>,
}

#[derive(Debug, Default)]
pub struct VariableGenerator {
    holder: VariableHolder,
    live: bool,
    request_ip: Option<String>,
}

impl VariableGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator for an action happening now, where the performer's IP may
    /// be exposed.
    pub fn for_live_action(request_ip: Option<&str>) -> Self {
        Self {
            holder: VariableHolder::new(),
            live: true,
            request_ip: request_ip.map(str::to_string),
        }
    }

    pub fn from_holder(holder: VariableHolder) -> Self {
        Self {
            holder,
            ..Self::default()
        }
    }

    pub fn holder(&self) -> &VariableHolder {
        &self.holder
    }

    pub fn into_holder(self) -> VariableHolder {
        self.holder
    }

    pub fn add_action(&mut self, action: &str) -> &mut Self {
        self.holder.set_value("action", action);
        self
    }

    pub fn add_timestamp(&mut self, ts: DateTime<Utc>) -> &mut Self {
        self.holder.set_value("timestamp", ts.timestamp().to_string());
        self
    }

    pub fn add_generic_vars(&mut self) -> &mut Self {
        self.holder
            .set_lazy_descriptor("wiki_name", LazyDescriptor::bare(ComputationKind::GetWikiName));
        self.holder.set_lazy_descriptor(
            "wiki_language",
            LazyDescriptor::bare(ComputationKind::GetWikiLanguage),
        );
        self
    }

    pub fn add_user_vars(&mut self, user: &UserRef, asof: DateTime<Utc>) -> &mut Self {
        let by_user = |kind: ComputationKind| {
            LazyDescriptor::new(kind, [("user", Param::from(user.clone()))])
        };

        self.holder.set_value("user_name", user.name.as_str());

        let mut unnamed_ip = by_user(ComputationKind::UserUnnamedIp);
        unnamed_ip.params.insert("live".into(), Param::literal(self.live));
        if let Some(ip) = &self.request_ip {
            unnamed_ip.params.insert("request-ip".into(), Param::literal(ip.as_str()));
        }
        self.holder.set_lazy_descriptor("user_unnamed_ip", unnamed_ip);

        self.holder.set_lazy_descriptor("user_type", by_user(ComputationKind::UserType));
        self.holder
            .set_lazy_descriptor("user_editcount", by_user(ComputationKind::UserEditCount));
        self.holder
            .set_lazy_descriptor("user_emailconfirm", by_user(ComputationKind::UserEmailConfirm));
        self.holder.set_lazy_descriptor("user_groups", by_user(ComputationKind::UserGroups));
        self.holder.set_lazy_descriptor("user_rights", by_user(ComputationKind::UserRights));
        self.holder.set_lazy_descriptor("user_blocked", by_user(ComputationKind::UserBlock));
        self.holder.set_lazy(
            "user_age",
            ComputationKind::UserAge,
            [("user", Param::from(user.clone())), ("asof", Param::from(asof))],
        );
        self
    }

    /// Adds the `{prefix}_*` variables describing `page`.
    pub fn add_title_vars(
        &mut self,
        page: &PageRef,
        prefix: &str,
        asof: DateTime<Utc>,
    ) -> &mut Self {
        let name = |suffix: &str| format!("{prefix}_{suffix}");
        let page_param = || ("page", Param::from(page.clone()));

        self.holder.set_value(&name("id"), page.id);
        self.holder.set_value(&name("namespace"), i64::from(page.namespace));
        self.holder.set_value(&name("title"), page.title.as_str());
        self.holder.set_value(&name("prefixedtitle"), page.prefixed_title());

        for action in RESTRICTION_ACTIONS {
            self.holder.set_lazy(
                &name(&format!("restrictions_{action}")),
                ComputationKind::GetPageRestrictions,
                [page_param(), ("action", Param::literal(*action))],
            );
        }

        self.holder.set_lazy(
            &name("recent_contributors"),
            ComputationKind::LoadRecentAuthors,
            [page_param()],
        );
        self.holder.set_lazy(
            &name("first_contributor"),
            ComputationKind::PageFirstAuthor,
            [page_param()],
        );
        self.holder.set_lazy(
            &name("age"),
            ComputationKind::PageAge,
            [page_param(), ("asof", Param::from(asof))],
        );
        self.holder.set_lazy(
            &name("last_edit_age"),
            ComputationKind::RevisionAgeByTitle,
            [page_param(), ("asof", Param::from(asof))],
        );
        self
    }

    /// Adds the text, size, diff and link variables of an edit.
    pub fn add_edit_vars(&mut self, edit: &EditContext) -> &mut Self {
        let holder = &mut self.holder;
        let page = || ("page", Param::from(edit.page.clone()));
        let user = || ("user", Param::from(edit.user.clone()));
        let with_update = |mut descriptor: LazyDescriptor| {
            if let Some(update) = &edit.update {
                descriptor
                    .params
                    .insert("update".into(), Param::from(Rc::clone(update)));
            }
            descriptor
        };

        holder.set_value("summary", edit.summary.as_str());
        holder.set_value("old_content_model", edit.old_content_model.as_str());
        holder.set_value("new_content_model", edit.new_content_model.as_str());
        holder.set_value("old_wikitext", edit.old_text.as_str());
        holder.set_value("new_wikitext", edit.new_text.as_str());

        holder.set_lazy(
            "new_size",
            ComputationKind::Length,
            [("length-var", Param::var("new_wikitext"))],
        );
        holder.set_lazy(
            "old_size",
            ComputationKind::Length,
            [("length-var", Param::var("old_wikitext"))],
        );
        holder.set_lazy(
            "edit_delta",
            ComputationKind::SubtractInt,
            [("val1-var", Param::var("new_size")), ("val2-var", Param::var("old_size"))],
        );
        holder.set_lazy(
            "edit_diff",
            ComputationKind::Diff,
            [
                ("oldtext-var", Param::var("old_wikitext")),
                ("newtext-var", Param::var("new_wikitext")),
            ],
        );
        holder.set_lazy(
            "added_lines",
            ComputationKind::DiffSplit,
            [("diff-var", Param::var("edit_diff")), ("line-prefix", Param::literal("+"))],
        );
        holder.set_lazy(
            "removed_lines",
            ComputationKind::DiffSplit,
            [("diff-var", Param::var("edit_diff")), ("line-prefix", Param::literal("-"))],
        );

        holder.set_lazy_descriptor(
            "new_html",
            with_update(LazyDescriptor::new(
                ComputationKind::ParseWikitext,
                [("wikitext-var", Param::var("new_wikitext")), page(), user()],
            )),
        );
        holder.set_lazy(
            "new_text",
            ComputationKind::StripHtml,
            [("html-var", Param::var("new_html"))],
        );

        let all_links = match &edit.update {
            Some(update) => LazyDescriptor::new(
                ComputationKind::LinksFromUpdate,
                [("update", Param::from(Rc::clone(update)))],
            ),
            None => LazyDescriptor::new(
                ComputationKind::LinksFromWikitext,
                [("text-var", Param::var("new_wikitext")), page(), user()],
            ),
        };
        holder.set_lazy_descriptor("all_links", all_links);
        holder.set_lazy(
            "old_links",
            ComputationKind::LinksFromWikitextOrDatabase,
            [("text-var", Param::var("old_wikitext")), page(), user()],
        );
        holder.set_lazy(
            "added_links",
            ComputationKind::ArrayDiff,
            [("base-var", Param::var("all_links")), ("minus-var", Param::var("old_links"))],
        );
        holder.set_lazy(
            "removed_links",
            ComputationKind::ArrayDiff,
            [("base-var", Param::var("old_links")), ("minus-var", Param::var("all_links"))],
        );
        self
    }
}
