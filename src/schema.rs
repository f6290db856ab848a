//! Attribute table for dump-format rules.
//!
//! The declaration order of [`Attr`] is the order the filter engine registers
//! and prints options. It is an external contract: the dump emits flags in
//! this order, and commands built by this crate emit them in the same order
//! so parsing and diffing stay symmetric. Treat it as fixed data.

/// A recognized rule attribute.
///
/// `Ord` follows declaration order, so a `BTreeMap` keyed by `Attr` iterates
/// in canonical emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attr {
  Source,
  Destination,
  Iniface,
  Outiface,
  Proto,
  TcpFlags,
  Sport,
  Dport,
  Port,
  State,
  Icmp,
  Limit,
  Burst,
  RecentSet,
  RecentUpdate,
  RecentRcheck,
  RecentRemove,
  Rseconds,
  Rhits,
  Rttl,
  Rname,
  Rsource,
  Rdest,
  Name,
  Jump,
  Todest,
  Tosource,
  Toports,
  Reject,
  LogPrefix,
  LogLevel,
}

pub const CANONICAL_ORDER: &[Attr] = &[
  Attr::Source,
  Attr::Destination,
  Attr::Iniface,
  Attr::Outiface,
  Attr::Proto,
  Attr::TcpFlags,
  Attr::Sport,
  Attr::Dport,
  Attr::Port,
  Attr::State,
  Attr::Icmp,
  Attr::Limit,
  Attr::Burst,
  Attr::RecentSet,
  Attr::RecentUpdate,
  Attr::RecentRcheck,
  Attr::RecentRemove,
  Attr::Rseconds,
  Attr::Rhits,
  Attr::Rttl,
  Attr::Rname,
  Attr::Rsource,
  Attr::Rdest,
  Attr::Name,
  Attr::Jump,
  Attr::Todest,
  Attr::Tosource,
  Attr::Toports,
  Attr::Reject,
  Attr::LogPrefix,
  Attr::LogLevel,
];

impl Attr {
  /// The command-line token(s) standing for this attribute. Module-backed
  /// flags carry their `-m <module>` prefix so a token is self-contained.
  pub fn token(self) -> &'static str {
    match self {
      Attr::Source => "-s",
      Attr::Destination => "-d",
      Attr::Iniface => "-i",
      Attr::Outiface => "-o",
      Attr::Proto => "-p",
      Attr::TcpFlags => "-m tcp --tcp-flags",
      Attr::Sport => "-m multiport --sports",
      Attr::Dport => "-m multiport --dports",
      Attr::Port => "-m multiport --ports",
      Attr::State => "-m state --state",
      Attr::Icmp => "-m icmp --icmp-type",
      Attr::Limit => "-m limit --limit",
      Attr::Burst => "--limit-burst",
      Attr::RecentSet => "-m recent --set",
      Attr::RecentUpdate => "-m recent --update",
      Attr::RecentRcheck => "-m recent --rcheck",
      Attr::RecentRemove => "-m recent --remove",
      Attr::Rseconds => "--seconds",
      Attr::Rhits => "--hitcount",
      Attr::Rttl => "--rttl",
      Attr::Rname => "--name",
      Attr::Rsource => "--rsource",
      Attr::Rdest => "--rdest",
      Attr::Name => "-m comment --comment",
      Attr::Jump => "-j",
      Attr::Todest => "--to-destination",
      Attr::Tosource => "--to-source",
      Attr::Toports => "--to-ports",
      Attr::Reject => "--reject-with",
      Attr::LogPrefix => "--log-prefix",
      Attr::LogLevel => "--log-level",
    }
  }

  /// Boolean switches: the token stands alone, no value follows.
  pub fn no_argument(self) -> bool {
    matches!(
      self,
      Attr::RecentSet
        | Attr::RecentUpdate
        | Attr::RecentRcheck
        | Attr::RecentRemove
        | Attr::Rttl
        | Attr::Rsource
        | Attr::Rdest
    )
  }

  /// Comma-joined multi-value fields, kept as ordered lists on the record.
  pub fn list_valued(self) -> bool {
    matches!(self, Attr::Sport | Attr::Dport | Attr::Port | Attr::State)
  }

  /// Port lists write ranges with a colon in text and a hyphen on the record.
  pub fn port_valued(self) -> bool {
    matches!(self, Attr::Sport | Attr::Dport | Attr::Port)
  }

  /// Normalized to lexicographic order at parse time, so the order the
  /// engine reports the values never changes the record.
  pub fn sorted(self) -> bool {
    matches!(self, Attr::State)
  }

  /// Qualifiers that only mean something next to a recent-module command.
  pub fn recent_qualifier(self) -> bool {
    matches!(
      self,
      Attr::Rseconds | Attr::Rhits | Attr::Rttl | Attr::Rname | Attr::Rsource | Attr::Rdest
    )
  }
}
