//! Canonical-order argument assembly for insert and replace commands.

use crate::rule::{AttrValue, RuleTarget, SynRule};
use crate::schema::{Attr, CANONICAL_ORDER};

/// Emits the command tokens for `rule` in canonical order, ready for an
/// insert or replace invocation. The table flag is not included; table
/// selection is a separate top-level flag on the final command.
///
/// Attributes absent from the record are skipped. The jump slot falls back
/// to the record's terminal action, upper-cased. Recent-module sub-flags
/// emit only for the one command the record carries.
pub fn build_args(rule: &SynRule) -> Vec<String> {
  let mut args = vec![];
  for &attr in CANONICAL_ORDER {
    match attr {
      Attr::Name => {
        if !rule.name.is_empty() {
          push_token(&mut args, attr);
          args.push(rule.name.clone());
        }
      }
      Attr::Jump => match &rule.target {
        Some(RuleTarget::Action(action)) => {
          push_token(&mut args, attr);
          args.push(action.as_target().to_string());
        }
        Some(RuleTarget::Jump(target)) => {
          push_token(&mut args, attr);
          args.push(target.clone());
        }
        None => {}
      },
      Attr::RecentSet | Attr::RecentUpdate | Attr::RecentRcheck | Attr::RecentRemove => {
        if rule.recent.map(|command| command.attr()) == Some(attr) {
          push_token(&mut args, attr);
        }
      }
      _ if attr.recent_qualifier() && rule.recent.is_none() => {}
      _ => match rule.attrs.get(&attr) {
        Some(AttrValue::Flag) => push_token(&mut args, attr),
        Some(AttrValue::Scalar(value)) => {
          push_token(&mut args, attr);
          if attr == Attr::TcpFlags {
            // Mask and comparison flags travel as two separate tokens.
            for word in value.split_whitespace() {
              args.push(word.to_string());
            }
          } else {
            args.push(value.clone());
          }
        }
        Some(AttrValue::List(items)) => {
          push_token(&mut args, attr);
          let rendered: Vec<String> = if attr.port_valued() {
            items.iter().map(|item| item.replace('-', ":")).collect()
          } else {
            items.clone()
          };
          args.push(rendered.join(","));
        }
        None => {}
      },
    }
  }
  args
}

fn push_token(args: &mut Vec<String>, attr: Attr) {
  for word in attr.token().split_whitespace() {
    args.push(word.to_string());
  }
}

/// Renders `rule` back to one dump-format line. Comments and any other value
/// with interior whitespace are quoted the way the engine writes them.
pub fn save_line(rule: &SynRule) -> String {
  let mut line = format!("-A {}", rule.chain);
  let mut quote_next = false;
  for arg in build_args(rule) {
    line.push(' ');
    if quote_next || arg.contains(' ') || arg.is_empty() {
      line.push('"');
      line.push_str(&arg);
      line.push('"');
    } else {
      line.push_str(&arg);
    }
    quote_next = arg == "--comment";
  }
  line
}
