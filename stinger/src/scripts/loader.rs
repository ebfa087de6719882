//! Assembles executable scripts from modular source fragments.
//!
//! A command is a top-level `.lua` file; fragments live under `includes/`
//! and are referenced with `@include` directives. Expansion is purely
//! textual and deterministic: the same input tree always yields the same
//! bytes, because the SHA of the expanded script is its identity.
//!
//! Missing includes are hard errors. The directive is replaced by the
//! fragment body on first visit and by nothing on later visits within the
//! same command (include-once). Cycles are detected on a visitation stack
//! keyed by canonicalized absolute path.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ScriptLoaderError;

lazy_static! {
    static ref INCLUDE_REGEX: Regex =
        Regex::new(r#"(?m)^-{2,4}[ \t]*@include[ \t]+["']([^"'\n]+)["'][; \t]*$"#).unwrap();
    static ref COMMAND_NAME_REGEX: Regex = Regex::new(r"^(.*?)(?:-(\d+))?\.lua$").unwrap();
    static ref BLANK_RUN_REGEX: Regex = Regex::new(r"\n([ \t]*\n){2,}").unwrap();
}

/// A fully expanded top-level command.
#[derive(Debug)]
pub struct Command {
    pub name: String,
    /// Key count when the filename encodes one (`name-<N>.lua`).
    pub num_keys: Option<usize>,
    pub lua: String,
}

/// Splits `moveToActive-11.lua` into `("moveToActive", Some(11))`.
pub fn parse_command_file_name(file_name: &str) -> Result<(String, Option<usize>), ScriptLoaderError> {
    let caps = COMMAND_NAME_REGEX
        .captures(file_name)
        .filter(|caps| !caps[1].is_empty())
        .ok_or_else(|| ScriptLoaderError::InvalidName(file_name.to_string()))?;
    let num_keys = caps.get(2).map(|m| {
        m.as_str()
            .parse::<usize>()
            .expect("regex only matches digits")
    });
    Ok((caps[1].to_string(), num_keys))
}

pub struct ScriptLoader {
    /// Root for `~/` references; sibling references ignore it.
    root: Option<PathBuf>,
    path_mappings: HashMap<String, PathBuf>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        ScriptLoader {
            root: None,
            path_mappings: HashMap::new(),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        ScriptLoader {
            root: Some(root.into()),
            path_mappings: HashMap::new(),
        }
    }

    /// Registers a `<alias>/...` mapping.
    pub fn add_path_mapping(&mut self, alias: &str, target: impl Into<PathBuf>) {
        self.path_mappings.insert(alias.to_string(), target.into());
    }

    pub fn load_command(&self, path: &Path) -> Result<Command, ScriptLoaderError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ScriptLoaderError::InvalidName(path.display().to_string()))?;
        let (name, num_keys) = parse_command_file_name(file_name)?;
        let lua = self.load_script_content(path)?;
        Ok(Command { name, num_keys, lua })
    }

    pub fn load_script_content(&self, path: &Path) -> Result<String, ScriptLoaderError> {
        let canonical = canonicalize(path)?;
        let mut stack = Vec::new();
        let mut visited = HashSet::new();
        let expanded = self.expand(&canonical, &mut stack, &mut visited)?;
        let collapsed = BLANK_RUN_REGEX.replace_all(&expanded, "\n\n");
        Ok(format!("{}\n", collapsed.trim_end()))
    }

    fn expand(
        &self,
        path: &Path,
        stack: &mut Vec<PathBuf>,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<String, ScriptLoaderError> {
        let content =
            fs::read_to_string(path).map_err(|err| ScriptLoaderError::IoError(err.to_string()))?;
        stack.push(path.to_path_buf());

        let mut out = String::with_capacity(content.len());
        let mut last = 0;

        for caps in INCLUDE_REGEX.captures_iter(&content) {
            let directive = caps.get(0).expect("capture 0 is the whole match");
            let reference = caps.get(1).expect("the reference group is not optional");
            out.push_str(&content[last..directive.start()]);
            last = directive.end();

            let resolved = self.resolve(reference.as_str(), path);
            let include = resolved
                .as_deref()
                .and_then(|p| canonicalize(p).ok())
                .ok_or_else(|| {
                    let (line, column) = position(&content, reference.start());
                    ScriptLoaderError::IncludeNotFound {
                        reference: reference.as_str().to_string(),
                        in_file: path.display().to_string(),
                        line,
                        column,
                    }
                })?;

            if stack.contains(&include) {
                return Err(ScriptLoaderError::CircularDependency {
                    reference: reference.as_str().to_string(),
                    stack: render_stack(stack),
                });
            }

            if visited.insert(include.clone()) {
                let body = self.expand(&include, stack, visited)?;
                out.push_str(&body);
            }
        }

        out.push_str(&content[last..]);
        stack.pop();
        Ok(out)
    }

    fn resolve(&self, reference: &str, including_file: &Path) -> Option<PathBuf> {
        let mut rel = reference.to_string();
        if !rel.ends_with(".lua") {
            rel.push_str(".lua");
        }

        if let Some(rest) = rel.strip_prefix("~/") {
            return Some(self.root.as_ref()?.join(rest));
        }
        if let Some(rest) = rel.strip_prefix('<') {
            let (alias, tail) = rest.split_once(">/")?;
            return Some(self.path_mappings.get(alias)?.join(tail));
        }
        Some(including_file.parent()?.join(rel))
    }
}

impl Default for ScriptLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, ScriptLoaderError> {
    path.canonicalize()
        .map_err(|err| ScriptLoaderError::IoError(format!("{}: {}", path.display(), err)))
}

fn render_stack(stack: &[PathBuf]) -> String {
    stack
        .iter()
        .map(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?")
                .to_string()
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// 1-based line and column of a byte offset.
fn position(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let column = offset - before.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    (line, column)
}
