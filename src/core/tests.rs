#[cfg(test)]
mod tests_impl {
    use crate::core::blocklist::parse_block_list;
    use crate::core::policy::PairOutcome;
    use crate::core::reconcile::{self, ChangeKind};
    use crate::core::rule::{DEFAULT_DESCRIPTION, Direction, ManagedRule, rule_name};
    use crate::core::store::MemoryRuleStore;
    use crate::core::test_helpers::{InstallTree, foreign_rule, memory_policy, native, request};
    use crate::core::policy::FirewallPolicy;

    #[test]
    fn test_first_run_blocks_everything_requested() {
        let mut policy = memory_policy();
        let mut changes = Vec::new();

        let report = reconcile::reconcile(
            &mut policy,
            request(&[("/g/Foo/foo.exe", "Foo/foo.exe"), ("/t/Bar/bar.exe", "Bar/bar.exe")]),
            |kind, app| changes.push((kind, app.to_string())),
        )
        .unwrap();

        assert_eq!(report.blocked_count(), 2);
        assert_eq!(report.unblocked_count(), 0);
        assert!(report.is_complete());
        assert_eq!(policy.store().len(), 4);
        assert!(changes.iter().all(|(kind, _)| *kind == ChangeKind::Blocked));
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut policy = memory_policy();
        let wanted = request(&[("/g/Foo/foo.exe", "Foo/foo.exe"), ("/t/Bar/bar.exe", "Bar/bar.exe")]);

        reconcile::reconcile(&mut policy, wanted.clone(), |_, _| {}).unwrap();
        let before = policy.store().specs().to_vec();

        let mut changes = 0;
        let report = reconcile::reconcile(&mut policy, wanted, |_, _| changes += 1).unwrap();

        assert_eq!(report.blocked_count(), 0);
        assert_eq!(report.unblocked_count(), 0);
        assert_eq!(report.kept, 2);
        assert_eq!(changes, 0);
        assert_eq!(policy.store().specs(), before.as_slice());
    }

    #[test]
    fn test_dropped_entries_are_unblocked_and_kept_entries_untouched() {
        let mut policy = memory_policy();
        reconcile::reconcile(
            &mut policy,
            request(&[("/a.exe", "a.exe"), ("/b.exe", "b.exe")]),
            |_, _| {},
        )
        .unwrap();

        let mut changes = Vec::new();
        let report = reconcile::reconcile(
            &mut policy,
            request(&[("/b.exe", "b.exe"), ("/c.exe", "c.exe")]),
            |kind, app| changes.push((kind, app.to_string())),
        )
        .unwrap();

        assert_eq!(report.blocked, vec!["/c.exe".to_string()]);
        assert_eq!(report.unblocked, vec!["/a.exe".to_string()]);
        assert_eq!(report.kept, 1);
        assert_eq!(
            changes,
            vec![
                (ChangeKind::Blocked, "/c.exe".to_string()),
                (ChangeKind::Unblocked, "/a.exe".to_string()),
            ]
        );
        assert!(!policy.store().contains(&rule_name(Direction::In, "a.exe")));
        assert!(policy.store().contains(&rule_name(Direction::In, "b.exe")));
        assert!(policy.store().contains(&rule_name(Direction::Out, "c.exe")));
    }

    #[test]
    fn test_foreign_rules_are_never_touched() {
        let store = MemoryRuleStore::with_rules([
            foreign_rule("Core Networking - DNS (UDP-Out)", "/system/svchost.exe"),
            // Shares an application path with a requested entry, but not our prefix
            foreign_rule("Allow browser", "/a.exe"),
        ]);
        let mut policy = FirewallPolicy::new(store);

        reconcile::reconcile(&mut policy, request(&[("/a.exe", "a.exe")]), |_, _| {}).unwrap();
        reconcile::reconcile(&mut policy, request(&[]), |_, _| {}).unwrap();

        let names: Vec<&str> = policy.store().specs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Core Networking - DNS (UDP-Out)", "Allow browser"]);
    }

    #[test]
    fn test_comment_only_block_list_removes_all_managed_rules() {
        let mut policy = memory_policy();
        reconcile::reconcile(
            &mut policy,
            request(&[("/a.exe", "a.exe"), ("/b.exe", "b.exe")]),
            |_, _| {},
        )
        .unwrap();

        let requested = parse_block_list("# nothing to block\n\n   \n#/a.exe\n", ".exe").unwrap();
        let report = reconcile::reconcile(&mut policy, requested, |_, _| {}).unwrap();

        assert_eq!(report.unblocked_count(), 2);
        assert!(policy.store().is_empty());
    }

    #[test]
    fn test_partial_add_is_not_reported_as_blocked() {
        let mut store = MemoryRuleStore::new();
        store.fail_add(rule_name(Direction::Out, "Foo/foo.exe"));
        let mut policy = FirewallPolicy::new(store);

        let mut blocked = Vec::new();
        let report = reconcile::reconcile(
            &mut policy,
            request(&[("/g/Foo/foo.exe", "Foo/foo.exe"), ("/ok.exe", "ok.exe")]),
            |_, app| blocked.push(app.to_string()),
        )
        .unwrap();

        assert_eq!(blocked, vec!["/ok.exe".to_string()]);
        assert_eq!(report.blocked_count(), 1);
        assert_eq!(report.failures.len(), 1);
        let (kind, failure) = &report.failures[0];
        assert_eq!(*kind, ChangeKind::Blocked);
        assert_eq!(failure.application, "/g/Foo/foo.exe");
        assert!(matches!(failure.outcome, PairOutcome::Failed { .. }));
        // Compensation leaves no half-pair behind
        assert!(!policy.store().contains(&rule_name(Direction::In, "Foo/foo.exe")));
    }

    #[test]
    fn test_orphaned_inbound_rule_is_not_mistaken_for_managed_entry() {
        let mut store = MemoryRuleStore::new();
        store.fail_add(rule_name(Direction::Out, "a.exe"));
        store.fail_remove(rule_name(Direction::In, "a.exe"));
        let mut policy = FirewallPolicy::new(store);

        let report = reconcile::reconcile(&mut policy, request(&[("/a.exe", "a.exe")]), |_, _| {}).unwrap();

        assert!(matches!(
            report.failures[0].1.outcome,
            PairOutcome::FailedOrphaned { .. }
        ));
        // Only the OUT half identifies a managed entry
        assert!(policy.managed_entries().unwrap().is_empty());
    }

    #[test]
    fn test_outbound_only_entry_gets_inbound_rule_back() {
        let half = ManagedRule::new("/a.exe", "a.exe").spec(Direction::Out, DEFAULT_DESCRIPTION);
        let mut policy = FirewallPolicy::new(MemoryRuleStore::with_rules([half]));

        let mut blocked = Vec::new();
        let report = reconcile::reconcile(&mut policy, request(&[("/a.exe", "a.exe")]), |_, app| {
            blocked.push(app.to_string());
        })
        .unwrap();

        assert_eq!(blocked, vec!["/a.exe".to_string()]);
        assert_eq!(report.kept, 0);
        assert!(report.is_complete());
        assert!(policy.store().contains(&rule_name(Direction::In, "a.exe")));
        assert_eq!(policy.store().len(), 2);

        let again = reconcile::reconcile(&mut policy, request(&[("/a.exe", "a.exe")]), |_, _| {}).unwrap();
        assert_eq!(again.blocked_count(), 0);
        assert_eq!(again.kept, 1);
    }

    #[test]
    fn test_outbound_only_entry_is_unblocked_without_orphan() {
        let half = ManagedRule::new("/a.exe", "a.exe").spec(Direction::Out, DEFAULT_DESCRIPTION);
        let mut policy = FirewallPolicy::new(MemoryRuleStore::with_rules([half]));

        let report = reconcile::reconcile(&mut policy, request(&[]), |_, _| {}).unwrap();

        assert_eq!(report.unblocked, vec!["/a.exe".to_string()]);
        assert!(report.is_complete());
        assert!(policy.store().is_empty());
    }

    #[test]
    fn test_failed_repair_keeps_outbound_rule_and_reports_failure() {
        let half = ManagedRule::new("/a.exe", "a.exe").spec(Direction::Out, DEFAULT_DESCRIPTION);
        let mut store = MemoryRuleStore::with_rules([half]);
        store.fail_add(rule_name(Direction::In, "a.exe"));
        let mut policy = FirewallPolicy::new(store);

        let report = reconcile::reconcile(&mut policy, request(&[("/a.exe", "a.exe")]), |_, _| {}).unwrap();

        assert_eq!(report.blocked_count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, ChangeKind::Blocked);
        assert!(policy.store().contains(&rule_name(Direction::Out, "a.exe")));
    }

    #[test]
    fn test_display_key_survives_store_round_trip() {
        let tree = InstallTree::new();
        let listed = tree.path(&["Tools", "Bar"]);
        let requested = parse_block_list(&listed, ".exe").unwrap();
        let mut policy = memory_policy();

        reconcile::reconcile(&mut policy, requested.clone(), |_, _| {}).unwrap();

        assert_eq!(policy.managed_entries().unwrap(), requested);
        assert_eq!(
            requested[&tree.path(&["Tools", "Bar", "sub", "x.exe"])],
            native(&["Bar", "sub", "x.exe"])
        );
    }

    #[test]
    fn test_install_tree_block_list() {
        let tree = InstallTree::new();
        let content = format!(
            "# games\n{}\n{}\n{}\n",
            tree.path(&["Games", "Foo", "foo.exe"]),
            tree.path(&["Games", "Foo", "notes.txt"]),
            tree.path(&["Tools", "Bar"]),
        );

        let requested = parse_block_list(&content, ".exe").unwrap();

        let keys: Vec<&str> = requested.values().map(String::as_str).collect();
        assert_eq!(requested.len(), 3);
        assert!(keys.contains(&native(&["Foo", "foo.exe"]).as_str()));
        assert!(keys.contains(&native(&["Bar", "bar.exe"]).as_str()));
        assert!(keys.contains(&native(&["Bar", "sub", "x.exe"]).as_str()));
    }
}

#[cfg(test)]
mod property_tests {
    use crate::core::reconcile;
    use crate::core::rule::{Direction, display_key, rule_name};
    use crate::core::test_helpers::memory_policy;
    use crate::utils::trim_chars;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    prop_compose! {
        fn arb_entries()(paths in proptest::collection::btree_set("[a-e]{1,3}", 0..8)) -> BTreeMap<String, String> {
            paths
                .into_iter()
                .map(|p| (format!("/apps/{p}.exe"), format!("apps/{p}.exe")))
                .collect()
        }
    }

    proptest! {
        #[test]
        fn test_plan_set_algebra(requested in arb_entries(), existing in arb_entries()) {
            let r: BTreeSet<String> = requested.keys().cloned().collect();
            let e: BTreeSet<String> = existing.keys().cloned().collect();

            let plan = reconcile::plan(requested, existing);

            let to_add: BTreeSet<String> = plan.to_add.keys().cloned().collect();
            let to_remove: BTreeSet<String> = plan.to_remove.keys().cloned().collect();
            prop_assert_eq!(to_add, r.difference(&e).cloned().collect::<BTreeSet<_>>());
            prop_assert_eq!(to_remove, e.difference(&r).cloned().collect::<BTreeSet<_>>());
            prop_assert_eq!(plan.kept, r.intersection(&e).cloned().collect::<BTreeSet<_>>());
        }

        #[test]
        fn test_reconcile_converges_in_one_pass(first in arb_entries(), second in arb_entries()) {
            let mut policy = memory_policy();
            reconcile::reconcile(&mut policy, first, |_, _| {}).unwrap();
            reconcile::reconcile(&mut policy, second.clone(), |_, _| {}).unwrap();

            prop_assert_eq!(policy.managed_entries().unwrap(), second.clone());
            prop_assert_eq!(policy.store().len(), second.len() * 2);

            let again = reconcile::reconcile(&mut policy, second, |_, _| {}).unwrap();
            prop_assert_eq!(again.blocked_count() + again.unblocked_count(), 0);
        }

        #[test]
        fn test_rule_name_round_trip(key in "\\PC{1,40}") {
            for direction in Direction::BOTH {
                let name = rule_name(direction, &key);
                prop_assert_eq!(display_key(direction, &name), Some(key.as_str()));
            }
        }

        #[test]
        fn test_trim_chars_never_leaves_matching_edges(input in "[ xa]{0,20}") {
            let trimmed = trim_chars(&input, |c| c == 'x' || c == ' ');
            prop_assert!(!trimmed.starts_with(['x', ' ']));
            prop_assert!(!trimmed.ends_with(['x', ' ']));
        }
    }
}
