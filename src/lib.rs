//! Declarative packet-filter rule convergence over the iptables save format.
//!
//! The crate translates between structured rule records and the linear,
//! position-significant text the filter engine dumps and accepts, and it
//! plans the insert, replace and delete commands that move a chain toward a
//! declared desired state one rule at a time. Rules converge toward
//! alphabetical-by-name order within their chain, so applying the same
//! desired set twice is a no-op.
//!
//! Dumping and running commands go through the [`RuleExecutor`] boundary;
//! [`SystemExecutor`] is the production implementation over the system
//! binaries, and tests substitute their own.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::process::Command;

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};

use error::{SynError, SynResult};
use rule::SynRule;

pub mod args;
pub mod error;
pub mod parser;
pub mod resolve;
pub mod rule;
pub mod schema;

// List of built-in chains taken from: man 8 iptables
const BUILTIN_CHAINS_FILTER: &[&str] = &["INPUT", "FORWARD", "OUTPUT"];
const BUILTIN_CHAINS_MANGLE: &[&str] = &["PREROUTING", "OUTPUT", "INPUT", "FORWARD", "POSTROUTING"];
const BUILTIN_CHAINS_NAT: &[&str] = &["PREROUTING", "POSTROUTING", "OUTPUT"];
const BUILTIN_CHAINS_RAW: &[&str] = &["PREROUTING", "OUTPUT"];
const BUILTIN_CHAINS_SECURITY: &[&str] = &["INPUT", "OUTPUT", "FORWARD"];

const LOCK_FILE: &str = "/var/run/xtables_old.lock";

/// Boundary to the live rule table: one way to dump the current rules and
/// one way to run a mutating command. The host guarantees serialized access;
/// nothing here locks beyond what [`SystemExecutor`] needs for old binaries.
pub trait RuleExecutor {
  /// The complete current rule text for `table`, in save format.
  fn dump(&self, table: &str) -> SynResult<String>;

  /// Runs one command against the rule table, returning its exit code and
  /// captured output. Exit codes are not interpreted beyond zero/non-zero.
  fn run(&self, args: &[String]) -> SynResult<(i32, String)>;
}

/// Handle over one rule table universe (IPv4 or IPv6).
pub struct SynTables<E> where E: RuleExecutor {
  pub executor: E,
}

/// Opens a handle over the system binaries.
///
/// # Example
///
/// ```rust
/// let tables = syntables::new(false).unwrap();
/// let rules = tables.records("filter").unwrap();
/// ```
#[cfg(target_os = "linux")]
pub fn new(ipv6: bool) -> SynResult<SynTables<SystemExecutor>> {
  Ok(SynTables { executor: SystemExecutor::new(ipv6)? })
}

impl<E> SynTables<E> where E: RuleExecutor {
  /// Wraps an explicit executor; hosts use this to supply their own dump and
  /// command collaborators.
  pub fn with_executor(executor: E) -> SynTables<E> {
    SynTables { executor }
  }

  /// Parsed records for every rule currently in `table`.
  pub fn records<S>(&self, table: S) -> SynResult<Vec<SynRule>> where S: AsRef<str> {
    let output = self.executor.dump(table.as_ref())?;
    Ok(parser::parse_dump(&output))
  }

  /// Parsed records for the rules of one chain.
  pub fn chain_records<S>(&self, table: S, chain: S) -> SynResult<Vec<SynRule>> where S: AsRef<str> {
    Ok(
      self
        .records(table.as_ref())?
        .into_iter()
        .filter(|rule| rule.chain == chain.as_ref())
        .collect(),
    )
  }

  /// Names of the chains declared in `table`.
  ///
  /// # Example
  ///
  /// ```rust
  /// let tables = syntables::new(false).unwrap();
  /// let names = tables.chain_names("nat").unwrap();
  /// ```
  pub fn chain_names<S>(&self, table: S) -> SynResult<Vec<String>> where S: AsRef<str> {
    let output = self.executor.dump(table.as_ref())?;
    Ok(
      parser::scan_chains(&output)
        .into_iter()
        .map(|decl| decl.chain)
        .collect(),
    )
  }

  /// The default policy of a built-in chain.
  ///
  /// # Example
  ///
  /// ```rust
  /// let tables = syntables::new(false).unwrap();
  /// assert!(tables.policy("filter", "INPUT").is_ok());
  /// ```
  pub fn policy<S>(&self, table: S, chain: S) -> SynResult<Option<String>> where S: AsRef<str> {
    let bchs = self::builtin_chains(table.as_ref())?;
    if !bchs.contains(&chain.as_ref()) {
      return Err(SynError::Other("given chain is not a built-in chain in the given table, can't get policy"));
    }
    let output = self.executor.dump(table.as_ref())?;
    Ok(
      parser::scan_chains(&output)
        .into_iter()
        .find(|decl| decl.chain == chain.as_ref())
        .map(|decl| decl.policy),
    )
  }

  /// Sets the default policy of a built-in chain.
  /// Returns `true` if the policy is applied.
  pub fn set_policy<S>(&self, table: S, chain: S, policy: S) -> SynResult<bool> where S: AsRef<str> {
    let bchs = self::builtin_chains(table.as_ref())?;
    if !bchs.contains(&chain.as_ref()) {
      return Err(SynError::Other("given chain is not a built-in chain in the given table, can't set policy"));
    }
    let invocation = to_args(&["-t", table.as_ref(), "-P", chain.as_ref(), policy.as_ref()]);
    let (code, _output) = self.executor.run(&invocation)?;
    Ok(code == 0)
  }

  /// The 1-based slot `rule` belongs at in its chain right now.
  ///
  /// Computed against a fresh dump, so the slot is only valid for the
  /// current convergence pass; when several rules target one chain, plan
  /// and apply them one at a time.
  pub fn insert_slot(&self, rule: &SynRule) -> SynResult<usize> {
    let live = self.chain_records(rule.table.as_str(), rule.chain.as_str())?;
    let names: Vec<&str> = live.iter().map(|item| item.name.as_str()).collect();
    Ok(resolve::chain_slot(&names, &rule.name))
  }

  /// Inserts `rule` at its computed slot.
  /// Returns `true` if the rule is applied.
  ///
  /// # Example
  ///
  /// ```rust
  /// use syntables::rule::{RuleAction, RuleTarget, SynRule};
  ///
  /// let tables = syntables::new(false).unwrap();
  /// let mut rule = SynRule::new("filter", "INPUT", "010 accept lo");
  /// rule.target = Some(RuleTarget::Action(RuleAction::Accept));
  /// assert_eq!(tables.insert(&rule).unwrap(), true);
  /// ```
  pub fn insert(&self, rule: &SynRule) -> SynResult<bool> {
    let slot = self.insert_slot(rule)?;
    let mut invocation = to_args(&["-t", &rule.table, "-I", &rule.chain, &slot.to_string()]);
    invocation.extend(args::build_args(rule));
    let (code, _output) = self.executor.run(&invocation)?;
    Ok(code == 0)
  }

  /// Replaces the rule at `rule`'s computed slot.
  /// Returns `true` if the rule is applied.
  pub fn replace(&self, rule: &SynRule) -> SynResult<bool> {
    let slot = self.insert_slot(rule)?;
    let mut invocation = to_args(&["-t", &rule.table, "-R", &rule.chain, &slot.to_string()]);
    invocation.extend(args::build_args(rule));
    let (code, _output) = self.executor.run(&invocation)?;
    Ok(code == 0)
  }

  /// Deletes `rule`. A record parsed from a dump is deleted by its verbatim
  /// stored line; a declared record falls back to a full argument match.
  /// Returns `true` if the rule is deleted.
  pub fn delete(&self, rule: &SynRule) -> SynResult<bool> {
    let mut invocation = to_args(&["-t", &rule.table]);
    if rule.origin.is_empty() {
      invocation.push("-D".to_string());
      invocation.push(rule.chain.clone());
      invocation.extend(args::build_args(rule));
    } else {
      let line = match rule.origin.strip_prefix("-A") {
        Some(rest) => format!("-D{}", rest),
        None => rule.origin.clone(),
      };
      invocation.extend(parser::split_quoted(&line)?);
    }
    let (code, _output) = self.executor.run(&invocation)?;
    Ok(code == 0)
  }
}

/// Executes commands with the system binaries. Serializes against other
/// writers with `--wait` when the binary has it, falling back to an
/// exclusive lock on the legacy lock file for older versions.
pub struct SystemExecutor {
  /// The utility command, 'iptables' or 'ip6tables'.
  pub cmd: &'static str,

  /// The dump command, 'iptables-save' or 'ip6tables-save'.
  pub save_cmd: &'static str,

  /// Indicates if the binary has the -w (--wait) option.
  pub has_wait: bool,
}

impl SystemExecutor {
  pub fn new(ipv6: bool) -> SynResult<SystemExecutor> {
    let (cmd, save_cmd) = if ipv6 {
      ("ip6tables", "ip6tables-save")
    } else {
      ("iptables", "iptables-save")
    };
    let version_output = Command::new(cmd).arg("--version").output()?;
    let version_string = String::from_utf8_lossy(&version_output.stdout).into_owned();
    let (v_major, v_minor, v_patch) = parser::tool_version(&version_string)?;

    Ok(SystemExecutor {
      cmd,
      save_cmd,
      has_wait: (v_major > 1) || (v_major == 1 && v_minor > 4) || (v_major == 1 && v_minor == 4 && v_patch > 19),
    })
  }

  fn output(&self, command: &mut Command) -> SynResult<(i32, String)> {
    log::debug!("{:?}", command);
    let output = command.output()?;
    match output.status.code() {
      Some(0) => Ok((0, String::from_utf8_lossy(&output.stdout).into_owned())),
      Some(code) => Ok((code, String::from_utf8_lossy(&output.stderr).into_owned())),
      None => Err(SynError::Other("no exit code from command")),
    }
  }
}

impl RuleExecutor for SystemExecutor {
  fn dump(&self, table: &str) -> SynResult<String> {
    let (code, output) = self.output(Command::new(self.save_cmd).arg("-t").arg(table))?;
    if code != 0 {
      return Err(SynError::Stderr(output));
    }
    Ok(output)
  }

  fn run(&self, args: &[String]) -> SynResult<(i32, String)> {
    let mut command = Command::new(self.cmd);
    command.args(args);
    if self.has_wait {
      command.arg("--wait");
      return self.output(&mut command);
    }

    // Binaries without --wait race on the shared table; hold the legacy
    // lock for the duration of the call.
    let file_lock = File::create(LOCK_FILE)?;
    loop {
      match flock(file_lock.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => break,
        Err(Errno::EAGAIN) => continue,
        Err(err) => return Err(SynError::Nix(err)),
      }
    }
    let result = self.output(&mut command);
    drop(file_lock);
    result
  }
}

fn builtin_chains(table: &str) -> SynResult<&'static [&'static str]> {
  match table {
    "filter" => Ok(BUILTIN_CHAINS_FILTER),
    "mangle" => Ok(BUILTIN_CHAINS_MANGLE),
    "nat" => Ok(BUILTIN_CHAINS_NAT),
    "raw" => Ok(BUILTIN_CHAINS_RAW),
    "security" => Ok(BUILTIN_CHAINS_SECURITY),
    _ => Err(SynError::Other("given table is not supported by iptables")),
  }
}

fn to_args(parts: &[&str]) -> Vec<String> {
  parts.iter().map(|part| part.to_string()).collect()
}
