use std::collections::BTreeMap;

use crate::schema::Attr;

/// A single attribute value on a rule record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
  Scalar(String),
  List(Vec<String>),
  Flag,
}

impl AttrValue {
  pub fn scalar<S>(value: S) -> AttrValue where S: Into<String> {
    AttrValue::Scalar(value.into())
  }

  pub fn list<I, S>(items: I) -> AttrValue where I: IntoIterator<Item = S>, S: Into<String> {
    AttrValue::List(items.into_iter().map(|item| item.into()).collect())
  }

  pub fn as_scalar(&self) -> Option<&str> {
    match self {
      AttrValue::Scalar(value) => Some(value),
      _ => None,
    }
  }
}

/// Terminal verdicts that are stored apart from generic jump targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
  Accept,
  Reject,
  Drop,
}

impl RuleAction {
  pub fn from_target(target: &str) -> Option<RuleAction> {
    match target {
      "ACCEPT" => Some(RuleAction::Accept),
      "REJECT" => Some(RuleAction::Reject),
      "DROP" => Some(RuleAction::Drop),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      RuleAction::Accept => "accept",
      RuleAction::Reject => "reject",
      RuleAction::Drop => "drop",
    }
  }

  /// Upper-case form used on the command line.
  pub fn as_target(self) -> &'static str {
    match self {
      RuleAction::Accept => "ACCEPT",
      RuleAction::Reject => "REJECT",
      RuleAction::Drop => "DROP",
    }
  }
}

/// What a rule does with a matched packet: a terminal action or a jump to a
/// chain or target extension. One record holds at most one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
  Action(RuleAction),
  Jump(String),
}

/// The recent-module command a rule runs against its tracked list. The four
/// variants are mutually exclusive on the wire, so the record holds one
/// enumeration rather than four flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentCommand {
  Set,
  Update,
  Remove,
  Rcheck,
}

impl RecentCommand {
  pub fn attr(self) -> Attr {
    match self {
      RecentCommand::Set => Attr::RecentSet,
      RecentCommand::Update => Attr::RecentUpdate,
      RecentCommand::Remove => Attr::RecentRemove,
      RecentCommand::Rcheck => Attr::RecentRcheck,
    }
  }
}

/// The structured form of one firewall rule.
///
/// Records are built fresh on every dump-and-parse cycle and never mutated in
/// place; convergence replaces a record by deleting its stored line and
/// inserting a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct SynRule {
  /// Table the rule lives in; supplied by the enclosing dump section, not
  /// parsed from the rule line.
  pub table: String,
  /// Chain the rule is attached to.
  pub chain: String,
  /// Free-text identifier carried as the rule comment. Synthesized from a
  /// content digest when the dumped rule has none.
  pub name: String,
  pub target: Option<RuleTarget>,
  pub recent: Option<RecentCommand>,
  pub attrs: BTreeMap<Attr, AttrValue>,
  /// Verbatim dumped text, retained for exact deletion. Empty on records
  /// that were declared rather than parsed.
  pub origin: String,
  /// Parse-order counter within one dump; a tiebreaker only, never the
  /// convergence order.
  pub sequence: u32,
}

impl SynRule {
  /// A desired-state record with no attributes yet; callers fill `attrs`,
  /// `target` and `recent` directly.
  pub fn new<S>(table: S, chain: S, name: S) -> SynRule where S: Into<String> {
    SynRule {
      table: table.into(),
      chain: chain.into(),
      name: name.into(),
      target: None,
      recent: None,
      attrs: BTreeMap::new(),
      origin: String::new(),
      sequence: 0,
    }
  }

  /// True when `other` matches this rule in everything that drives
  /// convergence; the stored origin line and parse sequence are incidental.
  pub fn same_rule(&self, other: &SynRule) -> bool {
    self.table == other.table
      && self.chain == other.chain
      && self.name == other.name
      && self.target == other.target
      && self.recent == other.recent
      && self.attrs == other.attrs
  }
}

/// One `:NAME POLICY [packets:bytes]` declaration from a dump section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDecl {
  pub table: String,
  pub chain: String,
  pub policy: String,
}
