use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::Index;
use crate::object::{object_read, Object};
use crate::repo::Repo;

/// ignore file name recognized inside the worktree
pub const IGNORE_FILE: &str = ".twigignore";

/// one ignore rule: a glob pattern and whether a match ignores or
/// re-includes the path
#[derive(Clone, Debug)]
struct Rule {
    pattern: glob::Pattern,
    ignore: bool,
}

/// ignore rules gathered from the repository and the user environment
///
/// scoped rules come from staged ignore files and apply below their
/// directory; absolute rule sets come from info/exclude and the user
/// config directory.
#[derive(Clone, Debug, Default)]
pub struct IgnoreRules {
    absolute: Vec<Vec<Rule>>,
    scoped: HashMap<String, Vec<Rule>>,
}

impl IgnoreRules {
    /// load every rule source for a repository
    pub fn load(repo: &Repo) -> Result<Self> {
        let mut rules = Self::default();

        let exclude = repo.gitdir().join("info/exclude");
        if exclude.is_file() {
            let content = std::fs::read_to_string(&exclude).map_err(|e| Error::Io {
                path: exclude.clone(),
                source: e,
            })?;
            rules.absolute.push(parse_rules(&content)?);
        }

        if let Some(global) = global_ignore_path() {
            if global.is_file() {
                let content = std::fs::read_to_string(&global).map_err(|e| Error::Io {
                    path: global.clone(),
                    source: e,
                })?;
                rules.absolute.push(parse_rules(&content)?);
            }
        }

        // staged ignore files scope their rules to their directory
        let index = Index::read(repo)?;
        for entry in &index.entries {
            if entry.name == IGNORE_FILE || entry.name.ends_with(&format!("/{IGNORE_FILE}")) {
                let dir = dirname(&entry.name).to_string();
                if let Object::Blob(data) = object_read(repo, &entry.hash)? {
                    let content = String::from_utf8_lossy(&data).into_owned();
                    rules.scoped.insert(dir, parse_rules(&content)?);
                }
            }
        }

        Ok(rules)
    }

    /// is a worktree-relative path excluded by the rules
    ///
    /// scoped rules are consulted from the path's own directory upward and
    /// take precedence over absolute sets, so a subdirectory can override
    /// its parents.
    pub fn is_ignored(&self, path: &str) -> bool {
        debug_assert!(!path.starts_with('/'), "path must be worktree-relative");

        let mut dir = dirname(path);
        loop {
            if let Some(rules) = self.scoped.get(dir) {
                if let Some(verdict) = check_rules(rules, path) {
                    return verdict;
                }
            }
            if dir.is_empty() {
                break;
            }
            dir = dirname(dir);
        }

        for rules in &self.absolute {
            if let Some(verdict) = check_rules(rules, path) {
                return verdict;
            }
        }

        false
    }
}

/// evaluate one rule set; the last matching pattern wins
fn check_rules(rules: &[Rule], path: &str) -> Option<bool> {
    let mut verdict = None;
    for rule in rules {
        if rule.pattern.matches(path) {
            verdict = Some(rule.ignore);
        }
    }
    verdict
}

/// parse the lines of one ignore file
fn parse_rules(content: &str) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (raw, ignore) = match line.strip_prefix('!') {
            Some(rest) => (rest, false),
            None => (line.strip_prefix('\\').unwrap_or(line), true),
        };
        let pattern = glob::Pattern::new(raw)
            .map_err(|e| Error::InvalidPattern(format!("{raw}: {e}")))?;
        rules.push(Rule { pattern, ignore });
    }
    Ok(rules)
}

/// user-wide ignore file location
fn global_ignore_path() -> Option<std::path::PathBuf> {
    let config_home = std::env::var_os("XDG_CONFIG_HOME")
        .map(std::path::PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| Path::new(&h).join(".config")))?;
    Some(config_home.join("twig/ignore"))
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}
