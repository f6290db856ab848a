use std::cell::RefCell;

use syntables::error::SynResult;
use syntables::resolve;
use syntables::rule::{AttrValue, RuleAction, RuleTarget, SynRule};
use syntables::schema::Attr;
use syntables::{RuleExecutor, SynTables};

/// Stand-in for the live rule table: serves a fixed dump and records every
/// command it is asked to run.
struct MockExecutor {
  dump_text: &'static str,
  calls: RefCell<Vec<Vec<String>>>,
}

impl MockExecutor {
  fn new(dump_text: &'static str) -> MockExecutor {
    MockExecutor { dump_text, calls: RefCell::new(vec![]) }
  }
}

impl RuleExecutor for MockExecutor {
  fn dump(&self, _table: &str) -> SynResult<String> {
    Ok(self.dump_text.to_string())
  }

  fn run(&self, args: &[String]) -> SynResult<(i32, String)> {
    self.calls.borrow_mut().push(args.to_vec());
    Ok((0, String::new()))
  }
}

const FILTER_DUMP: &str = "\
*filter\n\
:INPUT ACCEPT [0:0]\n\
:FORWARD ACCEPT [0:0]\n\
:OUTPUT ACCEPT [0:0]\n\
-A INPUT -p tcp -m comment --comment \"20 x\" -j ACCEPT\n\
-A INPUT -p udp -m comment --comment \"40 z\" -j ACCEPT\n\
COMMIT\n";

#[test]
fn test_empty_chain_gets_slot_one() {
  assert_eq!(resolve::chain_slot::<&str>(&[], "10 allow-ssh"), 1);
}

#[test]
fn test_candidate_ranks_between_neighbors() {
  assert_eq!(resolve::chain_slot(&["20 x", "40 z"], "30 y"), 2);
  assert_eq!(resolve::chain_slot(&["20 x", "40 z"], "10 w"), 1);
  assert_eq!(resolve::chain_slot(&["20 x", "40 z"], "50 v"), 3);
}

#[test]
fn test_slots_stable_across_reruns() {
  let converged = ["10 a", "20 b", "30 c"];
  for _ in 0..2 {
    for (index, name) in converged.iter().enumerate() {
      assert_eq!(resolve::chain_slot(&converged, *name), index + 1);
    }
  }
}

#[test]
fn test_duplicate_name_ranks_first_occurrence() {
  assert_eq!(resolve::chain_slot(&["20 x", "40 z"], "20 x"), 1);
}

#[test]
fn test_insert_plans_slot_and_canonical_args() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  let mut rule = SynRule::new("filter", "INPUT", "30 y");
  rule.attrs.insert(Attr::Proto, AttrValue::scalar("tcp"));
  rule.target = Some(RuleTarget::Action(RuleAction::Accept));

  assert_eq!(tables.insert(&rule).unwrap(), true);

  let calls = tables.executor.calls.borrow();
  assert_eq!(calls.len(), 1);
  assert_eq!(
    calls[0],
    vec![
      "-t", "filter", "-I", "INPUT", "2", "-p", "tcp", "-m", "comment", "--comment", "30 y",
      "-j", "ACCEPT"
    ]
  );
}

#[test]
fn test_replace_lands_on_existing_slot() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  let mut rule = SynRule::new("filter", "INPUT", "20 x");
  rule.attrs.insert(Attr::Proto, AttrValue::scalar("tcp"));
  rule.target = Some(RuleTarget::Action(RuleAction::Drop));

  assert_eq!(tables.replace(&rule).unwrap(), true);

  let calls = tables.executor.calls.borrow();
  assert_eq!(calls[0][..5], ["-t", "filter", "-R", "INPUT", "1"]);
}

#[test]
fn test_delete_reuses_verbatim_line() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  let live = tables.records("filter").unwrap();
  let target = live.iter().find(|rule| rule.name == "20 x").unwrap();

  assert_eq!(tables.delete(target).unwrap(), true);

  let calls = tables.executor.calls.borrow();
  assert_eq!(
    calls[0],
    vec![
      "-t", "filter", "-D", "INPUT", "-p", "tcp", "-m", "comment", "--comment", "20 x", "-j",
      "ACCEPT"
    ]
  );
}

#[test]
fn test_delete_declared_record_matches_by_args() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  let mut rule = SynRule::new("filter", "INPUT", "60 web");
  rule.attrs.insert(Attr::Proto, AttrValue::scalar("tcp"));
  rule.attrs.insert(Attr::Dport, AttrValue::list(vec!["80-90", "443"]));
  rule.target = Some(RuleTarget::Action(RuleAction::Accept));

  assert_eq!(tables.delete(&rule).unwrap(), true);

  let calls = tables.executor.calls.borrow();
  assert_eq!(calls[0][..4], ["-t", "filter", "-D", "INPUT"]);
  // Ranges go back to colon form at the command boundary.
  assert!(calls[0].iter().any(|arg| arg == "80:90,443"));
}

#[test]
fn test_chain_names_come_from_declarations() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  assert_eq!(tables.chain_names("filter").unwrap(), vec!["INPUT", "FORWARD", "OUTPUT"]);
}

#[test]
fn test_policy_reads_builtin_chain_declaration() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  assert_eq!(tables.policy("filter", "INPUT").unwrap(), Some("ACCEPT".to_string()));
  assert!(tables.policy("filter", "NOT_BUILTIN").is_err());
}

#[test]
fn test_set_policy_builds_policy_command() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  assert_eq!(tables.set_policy("filter", "INPUT", "DROP").unwrap(), true);

  let calls = tables.executor.calls.borrow();
  assert_eq!(calls[0], vec!["-t", "filter", "-P", "INPUT", "DROP"]);
}

#[test]
fn test_insert_slot_reflects_live_records() {
  let tables = SynTables::with_executor(MockExecutor::new(FILTER_DUMP));
  let rule = SynRule::new("filter", "INPUT", "30 y");
  assert_eq!(tables.insert_slot(&rule).unwrap(), 2);

  // An unknown chain is treated as empty.
  let orphan = SynRule::new("filter", "NEWCHAIN", "10 first");
  assert_eq!(tables.insert_slot(&orphan).unwrap(), 1);
}
