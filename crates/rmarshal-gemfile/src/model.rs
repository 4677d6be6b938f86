//! The data model produced by evaluating a Gemfile.

use std::collections::HashSet;

use crate::lex::Span;

/// The runtime environment a Gemfile is evaluated against: which groups and
/// platforms are active, and the interpreter's own Ruby version (used to
/// satisfy a `ruby "x.y.z"` declaration and to auto-populate platforms).
#[derive(Debug, Clone)]
pub struct Environment {
    pub ruby_version: Option<String>,
    /// Groups explicitly turned on (default: `{default}`, spec §3).
    pub enabled_groups: HashSet<String>,
    /// Groups named in `--without`/Bundler.settings; a gem whose own
    /// group set intersects this set is ignored regardless of
    /// `enabled_groups`.
    pub disabled_groups: HashSet<String>,
    /// Platform names considered active (e.g. "ruby", "mri", "jruby",
    /// "mingw", "x64_mingw"); a gem/group restricted to platforms none of
    /// which appear here is ignored.
    pub active_platforms: HashSet<String>,
}

pub const DEFAULT_GROUP: &str = "default";

impl Default for Environment {
    fn default() -> Self {
        Self {
            ruby_version: None,
            enabled_groups: [DEFAULT_GROUP.to_string()].into_iter().collect(),
            disabled_groups: HashSet::new(),
            active_platforms: ["ruby".to_string(), "mri".to_string()].into_iter().collect(),
        }
    }
}

impl Environment {
    /// A fresh environment pinned to `ruby_version`, with `ruby`/`mri` and
    /// their `_XY`-suffixed variants auto-populated into the active
    /// platform set (spec §3: "auto-populated from the ruby version").
    pub fn new(ruby_version: impl Into<String>) -> Self {
        let ruby_version = ruby_version.into();
        let mut env = Self { ruby_version: Some(ruby_version.clone()), ..Self::default() };
        if let Some((major, minor)) = major_minor(&ruby_version) {
            env.active_platforms.insert(format!("ruby_{major}{minor}"));
            env.active_platforms.insert(format!("mri_{major}{minor}"));
        }
        env
    }

    /// Returns a copy with `name` added to the enabled-group set.
    pub fn with_group(mut self, name: impl Into<String>) -> Self {
        self.enabled_groups.insert(name.into());
        self
    }

    /// Returns a copy with `name` added to the disabled-group set.
    pub fn without_group(mut self, name: impl Into<String>) -> Self {
        self.disabled_groups.insert(name.into());
        self
    }

    /// Spec §4.10 group match rule: empty list behaves as `[default]`; a
    /// group matches iff at least one name is enabled and none is disabled.
    pub fn group_enabled(&self, groups: &[String]) -> bool {
        if groups.is_empty() {
            return self.enabled_groups.contains(DEFAULT_GROUP) && !self.disabled_groups.contains(DEFAULT_GROUP);
        }
        let any_enabled = groups.iter().any(|g| self.enabled_groups.contains(g));
        let any_disabled = groups.iter().any(|g| self.disabled_groups.contains(g));
        any_enabled && !any_disabled
    }

    /// Spec §4.10 platform match rule: empty list matches; otherwise match
    /// iff any named platform is in the active set.
    pub fn platform_enabled(&self, platforms: &[String]) -> bool {
        platforms.is_empty() || platforms.iter().any(|p| self.active_platforms.contains(p))
    }
}

/// Splits `"2.5.0"`-shaped strings into `("2", "5")` for the `ruby_XY`/
/// `mri_XY` platform names. Anything that doesn't parse that way yields
/// `None` rather than an error — the `ruby "..."` directive accepts
/// arbitrary version-constraint text, not just exact versions.
fn major_minor(version: &str) -> Option<(&str, &str)> {
    let mut parts = version.split('.');
    let major = parts.next()?;
    let minor = parts.next()?;
    if major.chars().all(|c| c.is_ascii_digit()) && minor.chars().all(|c| c.is_ascii_digit()) && !major.is_empty() && !minor.is_empty() {
        Some((major, minor))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value", rename_all = "snake_case"))]
pub enum GemValue {
    String(String),
    Symbol(String),
    Bool(bool),
    Array(Vec<GemValue>),
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Gem {
    pub name: String,
    pub requirements: Vec<String>,
    pub options: Vec<(String, GemValue)>,
    pub groups: Vec<String>,
    pub platforms: Vec<String>,
    pub ignored: bool,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GemspecDecl {
    pub path: Option<String>,
    pub name: Option<String>,
    pub development_group: Option<String>,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Gemfile {
    pub source: Vec<String>,
    pub ruby_version: Option<String>,
    pub gemspecs: Vec<GemspecDecl>,
    pub gems: Vec<Gem>,
    pub eval_gemfiles: Vec<String>,
}

impl Gemfile {
    /// Gems that are not ignored under the environment they were evaluated
    /// against.
    pub fn active_gems(&self) -> impl Iterator<Item = &Gem> {
        self.gems.iter().filter(|g| !g.ignored)
    }
}
