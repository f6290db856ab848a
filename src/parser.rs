//! Dump-format text parsing.
//!
//! A dumped rule is a flat token stream with no delimiter between a flag and
//! its value; meaning comes from position and adjacency. Recovery exploits
//! the canonical ordering: attributes are peeled off the line from the end of
//! the canonical order backward, each peel removing the matched flag token
//! and recording the attribute. What survives the peel is the `-A <chain>`
//! marker followed by the bare values, which are scanned and re-aligned with
//! the peeled attributes back-to-front.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use string_builder::Builder;
use text_reader::TextReader;

use crate::error::{AnalysisError, AnalysisResult, SynResult};
use crate::rule::{AttrValue, ChainDecl, RecentCommand, RuleAction, RuleTarget, SynRule};
use crate::schema::{Attr, CANONICAL_ORDER};

/// Prefix of names synthesized for comment-less rules; sorts after any name
/// following the numeric `NNN description` convention.
pub const SYNTHETIC_PREFIX: &str = "9999 ";

/// Level the filter engine logs at when a LOG jump does not name one.
const DEFAULT_LOG_LEVEL: &str = "4";

/// Comment, chain-declaration and commit-marker lines, recognizable without
/// parsing.
static SKIP_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#|:|COMMIT)").unwrap());

static TABLE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*(\S+)").unwrap());

static TABLE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)-t\s+\S+").unwrap());

/// The flag-mask value of a two-token attribute, pre-quoted so the value scan
/// sees a single token, same as a quoted comment.
static TCP_FLAGS_SPAN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"(--tcp-flags)\s+([^"\s]\S*)\s+(\S+)"#).unwrap());

/// One peel pattern per attribute, in reverse canonical order.
static PEEL_PATTERNS: Lazy<Vec<(Attr, Regex)>> = Lazy::new(|| {
  CANONICAL_ORDER
    .iter()
    .rev()
    .map(|&attr| {
      let pattern = format!(r"(?:^|\s){}(?:\s|$)", regex::escape(attr.token()));
      (attr, Regex::new(&pattern).unwrap())
    })
    .collect()
});

/// A quoted span or a bare word.
static VALUE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*"|\S+"#).unwrap());

static CHAIN_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)-A\s+(\S+)").unwrap());

static CHAIN_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:(\S+)\s+(\S+)").unwrap());

static VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"v?(\d+)\.(\d+)\.(\d+)").unwrap());

/// Parses a complete dump into rule records, table by table.
///
/// Section headers (`*filter`) set the active table for the lines that
/// follow; comment, chain-declaration and COMMIT lines are skipped by lexical
/// pattern alone. Every remaining line yields a record, however little of it
/// is recognized. A rule line seen before any section header carries an
/// empty table, which callers must treat as invalid.
pub fn parse_dump(text: &str) -> Vec<SynRule> {
  let mut rules = vec![];
  let mut table = String::new();
  let mut sequence = 0;
  for line in text.lines() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    if let Some(caps) = TABLE_HEADER.captures(line) {
      table = caps[1].to_string();
      continue;
    }
    if SKIP_LINE.is_match(line) {
      log::trace!("skipping non-rule line: {}", line);
      continue;
    }
    rules.push(rule_to_record(line, &table, sequence));
    sequence += 1;
  }
  rules
}

/// Parses one dumped rule line into a record.
///
/// The table is supplied out-of-band from the section header; an inline
/// table clause is dropped before the ordering scan so its tokens cannot
/// collide with it. Never fails: a line matching no schema token still
/// yields a degenerate record carrying only its chain, a synthesized name
/// and the default protocol.
pub fn rule_to_record(line: &str, table: &str, sequence: u32) -> SynRule {
  let mut work = TCP_FLAGS_SPAN.replace(line, "${1} \"${2} ${3}\"").into_owned();
  if let Some(span) = TABLE_CLAUSE.find(&work).map(|m| m.range()) {
    work.replace_range(span, " ");
  }

  let mut fields = vec![];
  for (attr, pattern) in PEEL_PATTERNS.iter() {
    let span = pattern.find(&work).map(|m| m.range());
    if let Some(span) = span {
      // A bare switch leaves an empty quoted placeholder behind so the
      // key-to-value alignment below stays 1:1.
      let filler = if attr.no_argument() { " \"\" " } else { " " };
      work.replace_range(span, filler);
      fields.push(*attr);
    }
  }

  let values: Vec<String> = VALUE_TOKEN
    .find_iter(&work)
    .map(|token| token.as_str().replace('"', ""))
    .collect();

  // Fields were collected back-to-front, values front-to-back; zipping the
  // reversed values re-aligns them. The `-A <chain>` marker is the leftover
  // head of the scan and is read off the original line instead.
  let pairs: Vec<(Attr, String)> = fields
    .into_iter()
    .zip(values.into_iter().rev())
    .collect();

  let chain = CHAIN_MARK
    .captures(line)
    .map(|caps| caps[1].to_string())
    .unwrap_or_default();

  build_record(line, table, chain, sequence, pairs)
}

fn build_record(
  line: &str,
  table: &str,
  chain: String,
  sequence: u32,
  pairs: Vec<(Attr, String)>,
) -> SynRule {
  let mut rule = SynRule {
    table: table.to_string(),
    chain,
    name: String::new(),
    target: None,
    recent: None,
    attrs: Default::default(),
    origin: line.to_string(),
    sequence,
  };

  for (attr, raw) in pairs {
    match attr {
      Attr::Name => rule.name = raw,
      Attr::Jump => {
        rule.target = Some(match RuleAction::from_target(&raw) {
          Some(action) => RuleTarget::Action(action),
          None => RuleTarget::Jump(raw),
        });
      }
      Attr::RecentSet => rule.recent = Some(RecentCommand::Set),
      Attr::RecentUpdate => rule.recent = Some(RecentCommand::Update),
      Attr::RecentRcheck => rule.recent = Some(RecentCommand::Rcheck),
      Attr::RecentRemove => rule.recent = Some(RecentCommand::Remove),
      _ if attr.no_argument() => {
        rule.attrs.insert(attr, AttrValue::Flag);
      }
      _ if attr.list_valued() => {
        let mut items: Vec<String> = raw.split(',').map(|item| item.to_string()).collect();
        if attr.port_valued() {
          items = items.iter().map(|item| item.replace(':', "-")).collect();
        }
        if attr.sorted() {
          items.sort();
        }
        rule.attrs.insert(attr, AttrValue::List(items));
      }
      _ => {
        rule.attrs.insert(attr, AttrValue::Scalar(raw));
      }
    }
  }

  // The recent module tracks sources unless the rule names the destination.
  if rule.recent.is_some() && !rule.attrs.contains_key(&Attr::Rdest) {
    rule.attrs.insert(Attr::Rsource, AttrValue::Flag);
  }
  // A LOG jump without a level logs at the engine default; pinning it here
  // keeps re-serialization observably identical.
  if let Some(RuleTarget::Jump(target)) = &rule.target {
    if target == "LOG" && !rule.attrs.contains_key(&Attr::LogLevel) {
      rule
        .attrs
        .insert(Attr::LogLevel, AttrValue::Scalar(DEFAULT_LOG_LEVEL.to_string()));
    }
  }
  if !rule.attrs.contains_key(&Attr::Proto) {
    rule.attrs.insert(Attr::Proto, AttrValue::Scalar("all".to_string()));
  }
  if rule.name.is_empty() {
    rule.name = synthetic_name(line);
  }

  rule
}

/// Deterministic low-priority name for a rule dumped without a comment, so
/// nameless legacy rules sort to the bottom instead of being dropped.
fn synthetic_name(line: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(line.as_bytes());
  let digest = hasher.finalize();
  let mut name = String::from(SYNTHETIC_PREFIX);
  for byte in digest.iter() {
    name.push_str(&format!("{:02x}", byte));
  }
  name
}

/// Lexically scans a dump for chain declarations; rule parsing never touches
/// these lines.
pub fn scan_chains(text: &str) -> Vec<ChainDecl> {
  let mut decls = vec![];
  let mut table = String::new();
  for line in text.lines() {
    let line = line.trim();
    if let Some(caps) = TABLE_HEADER.captures(line) {
      table = caps[1].to_string();
      continue;
    }
    if let Some(caps) = CHAIN_DECL.captures(line) {
      decls.push(ChainDecl {
        table: table.clone(),
        chain: caps[1].to_string(),
        policy: caps[2].to_string(),
      });
    }
  }
  decls
}

/// Splits a rule line into argv elements. A quoted free-text span, such as a
/// multi-word comment, stays one element with its quotes dropped.
pub fn split_quoted(text: &str) -> AnalysisResult<Vec<String>> {
  let mut reader = TextReader::new(text.to_string());
  let mut builder = Builder::default();
  let mut parts = vec![];
  let mut quoted = false;
  let mut pending = false;
  while reader.has_next() {
    match reader.next() {
      Some('"') => quoted = !quoted,
      Some(' ') if !quoted => {
        if pending {
          parts.push(builder.string()?);
          builder = Builder::default();
          pending = false;
        }
      }
      Some(ch) => {
        builder.append(ch);
        pending = true;
      }
      None => break,
    }
  }
  if pending {
    parts.push(builder.string()?);
  }
  Ok(parts)
}

/// Extracts (major, minor, patch) from the utility's version banner.
pub fn tool_version(text: &str) -> SynResult<(u32, u32, u32)> {
  let caps = VERSION
    .captures(text)
    .ok_or_else(|| AnalysisError::UnexpectedOutput(text.to_string()))?;
  Ok((caps[1].parse()?, caps[2].parse()?, caps[3].parse()?))
}
