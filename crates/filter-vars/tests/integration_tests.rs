use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use filter_vars::{
    ComputeSelection, Config, EditContext, ExcludedProfilingTime, LazyVariableComputer, PageRef,
    ParserOutput, PreparedUpdate, RetrievalMode, RevisionRecord, Slot, UserRef, Value,
    VariableGenerator, VariableHolder, VariablesManager,
    memory::{MemoryWiki, UserRecord},
};
use rstest::{fixture, rstest};
use serde_json::json;

fn ts(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

fn sandbox() -> PageRef {
    PageRef::new(10, 0, "Sandbox")
}

fn alice() -> UserRef {
    UserRef::named(1, "Alice")
}

#[fixture]
fn wiki() -> Rc<MemoryWiki> {
    let mut wiki = MemoryWiki::new();
    for (id, author) in [(1, "Alice"), (2, "Bob"), (3, "Carol")] {
        wiki.add_revision(RevisionRecord {
            id,
            parent_id: (id > 1).then(|| id - 1),
            page_id: 10,
            timestamp: ts(id as u32),
            author: author.to_string(),
            content_model: "wikitext".to_string(),
            text: format!("Revision {id}\nhttps://old.example"),
        });
    }
    wiki.set_restrictions(10, "edit", vec!["autoconfirmed".to_string()])
        .set_external_links(10, vec!["https://old.example".to_string()])
        .add_user(
            "Alice",
            UserRecord {
                edit_count: 12,
                registration: Some(ts(1)),
                ..Default::default()
            },
        );
    Rc::new(wiki)
}

fn edit(update: Option<Rc<PreparedUpdate>>) -> EditContext {
    EditContext {
        page: sandbox(),
        user: alice(),
        old_text: "Revision 3\nhttps://old.example".to_string(),
        new_text: "Revision 3\nSee https://new.example".to_string(),
        old_content_model: "wikitext".to_string(),
        new_content_model: "wikitext".to_string(),
        summary: "links".to_string(),
        update,
    }
}

fn edit_holder(update: Option<Rc<PreparedUpdate>>) -> VariableHolder {
    let mut generator = VariableGenerator::new();
    generator
        .add_action("edit")
        .add_timestamp(ts(10))
        .add_user_vars(&alice(), ts(10))
        .add_title_vars(&sandbox(), "page", ts(10))
        .add_edit_vars(&edit(update))
        .add_generic_vars();
    generator.into_holder()
}

fn manager(wiki: &Rc<MemoryWiki>) -> VariablesManager {
    VariablesManager::new(LazyVariableComputer::new(
        MemoryWiki::services(wiki),
        Config {
            wiki_id: "testwiki".to_string(),
            ..Default::default()
        },
    ))
}

#[rstest]
#[case::edit_delta("edit_delta", Value::Int(4))]
#[case::added_lines("added_lines", Value::from(vec!["See https://new.example".to_string()]))]
#[case::removed_lines("removed_lines", Value::from(vec!["https://old.example".to_string()]))]
#[case::added_links("added_links", Value::from(vec!["https://new.example".to_string()]))]
#[case::removed_links("removed_links", Value::from(vec!["https://old.example".to_string()]))]
#[case::new_text("new_text", Value::from("Revision 3\nSee https://new.example"))]
#[case::user_editcount("user_editcount", Value::Int(12))]
#[case::user_age("user_age", Value::Int(9 * 86_400))]
#[case::page_age("page_age", Value::Int(9 * 86_400))]
#[case::last_edit_age("page_last_edit_age", Value::Int(7 * 86_400))]
#[case::recent_contributors(
    "page_recent_contributors",
    Value::from(vec!["Carol".to_string(), "Bob".to_string(), "Alice".to_string()])
)]
#[case::first_contributor("page_first_contributor", Value::from("Alice"))]
#[case::restrictions("page_restrictions_edit", Value::from(vec!["autoconfirmed".to_string()]))]
#[case::wiki_name("wiki_name", Value::from("testwiki"))]
fn test_edit_variables(wiki: Rc<MemoryWiki>, #[case] name: &str, #[case] expected: Value) {
    let manager = manager(&wiki);
    let mut holder = edit_holder(None);

    assert_eq!(manager.get_var(&mut holder, name, RetrievalMode::Strict), Ok(expected));
}

#[rstest]
fn test_edit_with_prepared_update_skips_parser(wiki: Rc<MemoryWiki>) {
    let excluded = ExcludedProfilingTime::new();
    let manager = VariablesManager::new(
        LazyVariableComputer::new(MemoryWiki::services(&wiki), Config::default())
            .with_excluded_time(excluded.clone()),
    );
    let update = Rc::new(PreparedUpdate::new(ParserOutput {
        html: "<p>Revision 3</p>\n<p>See <a href=\"https://new.example\">https://new.example</a></p>"
            .to_string(),
        external_links: vec!["https://new.example".to_string()],
    }));
    let mut holder = edit_holder(Some(update));

    assert_eq!(
        manager.get_var(&mut holder, "added_links", RetrievalMode::Strict),
        Ok(Value::from(vec!["https://new.example".to_string()]))
    );
    assert_eq!(
        manager.get_var(&mut holder, "new_text", RetrievalMode::Strict),
        Ok(Value::from("Revision 3\nSee https://new.example"))
    );
    // Only the old revision text was re-parsed.
    assert_eq!(wiki.parse_count(), 1);
    // all_links and new_html reuse the update; old_links does not.
    assert_eq!(excluded.measurements(), 2);
}

#[rstest]
fn test_parse_memo_is_scoped_to_a_pass(wiki: Rc<MemoryWiki>) {
    let manager = manager(&wiki);

    for pass in 1..=3 {
        manager.begin_pass();
        assert!(manager.computer().parse_cache().is_empty());

        let mut holder = edit_holder(None);
        manager
            .get_var(&mut holder, "added_links", RetrievalMode::Strict)
            .unwrap();
        manager
            .get_var(&mut holder, "new_html", RetrievalMode::Strict)
            .unwrap();

        // Old and new text, with new_html served from the memo.
        assert_eq!(manager.computer().parse_cache().len(), 2);
        assert_eq!(wiki.parse_count(), pass * 2);
    }
}

#[rstest]
fn test_dependencies_are_memoized(wiki: Rc<MemoryWiki>) {
    let manager = manager(&wiki);
    let mut holder = edit_holder(None);

    manager
        .get_var(&mut holder, "added_lines", RetrievalMode::Strict)
        .unwrap();

    assert!(matches!(holder.get("edit_diff"), Ok(Slot::Resolved(_))));
    assert!(matches!(holder.get("removed_lines"), Ok(Slot::Lazy(_))));
    assert_eq!(
        manager.get_var(&mut holder, "edit_diff", RetrievalMode::Strict),
        Ok(Value::from(
            "@@ -1,2 +1,2 @@\n Revision 3\n-https://old.example\n+See https://new.example\n"
        ))
    );
}

#[rstest]
fn test_compute_db_vars_then_dump(wiki: Rc<MemoryWiki>) {
    let manager = manager(&wiki);
    let mut holder = edit_holder(None);

    manager.compute_db_vars(&mut holder).unwrap();
    let lookups = wiki.lookup_count();

    let dump = manager
        .dump_all_vars(&mut holder, &ComputeSelection::Nothing, false)
        .unwrap();

    assert_eq!(wiki.lookup_count(), lookups);
    assert_eq!(dump.get("user_editcount"), Some(&json!(12)));
    assert_eq!(dump.get("page_first_contributor"), Some(&json!("Alice")));
    assert_eq!(dump.get("summary"), Some(&json!("links")));
    assert!(!dump.contains_key("edit_diff"));
    assert!(!dump.contains_key("user_type"));
}

#[rstest]
fn test_merged_holders_are_independent(wiki: Rc<MemoryWiki>) {
    let manager = manager(&wiki);
    let base = edit_holder(None);
    let mut extra = VariableHolder::new();
    extra.set_value("summary", "overridden");

    let mut merged = VariableHolder::new_from([&base, &extra]);
    manager
        .get_var(&mut merged, "edit_delta", RetrievalMode::Strict)
        .unwrap();

    assert_eq!(merged.get("summary"), Ok(&Slot::Resolved(Value::from("overridden"))));
    assert!(matches!(base.get("edit_delta"), Ok(Slot::Lazy(_))));
}

#[rstest]
fn test_export_all_vars(wiki: Rc<MemoryWiki>) {
    let manager = manager(&wiki);
    let mut holder = edit_holder(None);

    let exported = manager.export_all_vars(&mut holder).unwrap();

    assert_eq!(exported.len(), holder.len());
    assert_eq!(exported.get("user_type"), Some(&json!("named")));
    assert_eq!(exported.get("user_unnamed_ip"), Some(&json!(null)));
    assert_eq!(exported.get("user_emailconfirm"), Some(&json!(null)));
    assert!(holder.iter().all(|(_, slot)| !slot.is_lazy()));
}
