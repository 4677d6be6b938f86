//! Recursive-descent evaluator for the Gemfile mini-DSL (spec §4).
//!
//! Statements are evaluated top to bottom. `group`/`platforms` blocks push
//! onto a stack of active constraints and thread an `execute` flag down
//! through nested blocks; a `gem` declaration inside a disabled group or
//! platform is still parsed (so a syntax error downstream is still
//! reported) but is recorded with `ignored = true` rather than skipped
//! outright.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{GemfileError, Result};
use crate::lex::{Span, Token, TokenKind, TokenStream};
use crate::model::{Environment, Gem, GemValue, Gemfile, GemspecDecl};

/// Tunables for [`gemfile_parse`] (spec §6.2's "options").
#[derive(Debug, Clone)]
pub struct GemfileOptions {
    /// How many `eval_gemfile` levels deep a load may nest before it is
    /// reported as a diagnostic rather than silently overflowing the
    /// native stack.
    pub max_eval_depth: u32,
}

impl Default for GemfileOptions {
    fn default() -> Self {
        Self { max_eval_depth: 16 }
    }
}

/// Parses and evaluates the Gemfile at `path`, recursively following any
/// `eval_gemfile` statements it contains (spec §4.10). Relative
/// `eval_gemfile` paths resolve against the directory of the file that
/// names them.
pub fn gemfile_parse(path: impl AsRef<Path>, env: &Environment, opts: &GemfileOptions) -> Result<Gemfile> {
    gemfile_parse_at_depth(path.as_ref(), env, opts, 0)
}

fn gemfile_parse_at_depth(path: &Path, env: &Environment, opts: &GemfileOptions, depth: u32) -> Result<Gemfile> {
    if depth > opts.max_eval_depth {
        return Err(GemfileError::Other(format!(
            "eval_gemfile nesting exceeded {} levels at {}",
            opts.max_eval_depth,
            path.display()
        )));
    }
    let src = std::fs::read_to_string(path)
        .map_err(|source| GemfileError::Io { path: path.display().to_string(), source })?;
    let display = path.display().to_string();
    let mut doc = evaluate(&src, &display, env)?;

    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let nested_paths = std::mem::take(&mut doc.eval_gemfiles);
    for nested in nested_paths {
        let nested_path = resolve_relative(&base_dir, &nested);
        let nested_doc = gemfile_parse_at_depth(&nested_path, env, opts, depth + 1)?;
        merge_into(&mut doc, nested_doc, nested_path.display().to_string());
    }
    Ok(doc)
}

fn resolve_relative(base_dir: &Path, nested: &str) -> PathBuf {
    let nested_path = Path::new(nested);
    if nested_path.is_absolute() {
        nested_path.to_path_buf()
    } else {
        base_dir.join(nested_path)
    }
}

/// Folds a recursively-evaluated `eval_gemfile` target into its parent
/// document: the nested file's gems/gemspecs/sources are appended in
/// order, and its own (already-resolved) `eval_gemfile` targets are
/// recorded for diagnostics rather than re-exposed for a second resolution
/// pass.
fn merge_into(doc: &mut Gemfile, nested: Gemfile, nested_display: String) {
    doc.source.extend(nested.source);
    if doc.ruby_version.is_none() {
        doc.ruby_version = nested.ruby_version;
    }
    doc.gemspecs.extend(nested.gemspecs);
    doc.gems.extend(nested.gems);
    doc.eval_gemfiles.push(nested_display);
}

/// Parses and evaluates Gemfile source held in memory, with no filesystem
/// access — `eval_gemfile` targets are recorded in the returned
/// [`Gemfile::eval_gemfiles`] but not dereferenced. Callers that want
/// `eval_gemfile` followed for real should use [`gemfile_parse`].
pub fn evaluate(src: &str, file: &str, env: &Environment) -> Result<Gemfile> {
    let mut p = Parser {
        tokens: TokenStream::new(src, file),
        file: file.to_string(),
        buffered: std::collections::VecDeque::new(),
        env,
        group_stack: Vec::new(),
        platform_stack: Vec::new(),
        doc: Gemfile::default(),
    };
    p.run()?;
    Ok(p.doc)
}

struct Parser<'a> {
    tokens: TokenStream<'a>,
    file: String,
    buffered: std::collections::VecDeque<Token>,
    env: &'a Environment,
    group_stack: Vec<String>,
    platform_stack: Vec<String>,
    doc: Gemfile,
}

impl<'a> Parser<'a> {
    fn ensure(&mut self, n: usize) -> Result<()> {
        while self.buffered.len() < n {
            let t = self.tokens.next()?;
            self.buffered.push_back(t);
        }
        Ok(())
    }

    fn peek(&mut self) -> Result<&Token> {
        self.ensure(1)?;
        Ok(&self.buffered[0])
    }

    /// The token after the one `peek` returns, without consuming either.
    fn peek2(&mut self) -> Result<&TokenKind> {
        self.ensure(2)?;
        Ok(&self.buffered[1].kind)
    }

    fn bump(&mut self) -> Result<Token> {
        self.ensure(1)?;
        Ok(self.buffered.pop_front().unwrap())
    }

    fn err_at(&self, span: Span, message: impl Into<String>) -> GemfileError {
        GemfileError::Syntax { file: self.file.clone(), line: span.line, column: span.column, message: message.into() }
    }

    fn skip_statement_separators(&mut self) -> Result<()> {
        while matches!(self.peek()?.kind, TokenKind::Eol) {
            self.bump()?;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.block(true, u32::MAX)
    }

    /// Evaluates statements until `Eof` or a `block_keyword`-terminated
    /// `end` at the matching nesting depth. `execute` is `false` when this
    /// block (or an ancestor) is inside a disabled group/platform — parsing
    /// still proceeds so malformed Gemfiles still fail regardless of which
    /// branch they're in, but declarations made along the way are marked
    /// ignored instead of being dropped.
    fn block(&mut self, execute: bool, depth: u32) -> Result<()> {
        loop {
            self.skip_statement_separators()?;
            let tok = self.peek()?.clone();
            match &tok.kind {
                TokenKind::Eof => {
                    if depth != u32::MAX {
                        return Err(self.err_at(tok.span, "unexpected end of file: missing `end`"));
                    }
                    return Ok(());
                }
                TokenKind::Identifier(name) if name == "end" => {
                    if depth == u32::MAX {
                        return Err(self.err_at(tok.span, "unexpected `end` with no matching block"));
                    }
                    self.bump()?;
                    return Ok(());
                }
                TokenKind::Identifier(name) => {
                    let name = name.clone();
                    self.bump()?;
                    self.statement(&name, execute, tok.span)?;
                }
                other => return Err(self.err_at(tok.span, format!("expected a statement, found {other:?}"))),
            }
        }
    }

    fn statement(&mut self, name: &str, execute: bool, span: Span) -> Result<()> {
        match name {
            "source" => {
                let value = self.expect_string_arg()?;
                if execute {
                    self.doc.source.push(value);
                }
            }
            "ruby" => {
                let value = self.expect_string_arg()?;
                if execute {
                    self.doc.ruby_version = Some(value);
                }
            }
            "gemspec" => {
                let opts = self.parse_keyword_args()?;
                if execute {
                    let mut decl = GemspecDecl::default();
                    for (k, v) in opts {
                        match (k.as_str(), v) {
                            ("path", GemValue::String(s)) => decl.path = Some(s),
                            ("name", GemValue::String(s)) => decl.name = Some(s),
                            ("development_group", GemValue::Symbol(s)) | ("development_group", GemValue::String(s)) => {
                                decl.development_group = Some(s)
                            }
                            _ => {}
                        }
                    }
                    self.doc.gemspecs.push(decl);
                }
            }
            "gem" => {
                let gem_name = self.expect_string_arg_opt()?;
                let Some(gem_name) = gem_name else {
                    return Err(self.err_at(span, "`gem` requires a name"));
                };
                let mut requirements = Vec::new();
                while matches!(self.peek()?.kind, TokenKind::Comma) {
                    self.bump()?;
                    if self.looks_like_keyword_arg()? {
                        break;
                    }
                    requirements.push(self.expect_string()?);
                }
                let options = self.parse_trailing_keyword_args()?;
                // Always recorded, even under a disabled group/platform
                // ancestor (`execute == false`) — a caller inspecting the
                // evaluated Gemfile should be able to see every `gem` line
                // that exists, not just the ones currently active.
                let mut groups = self.group_stack.clone();
                for (k, v) in &options {
                    if k == "group" || k == "groups" {
                        collect_group_names(v, &mut groups);
                    }
                }
                let platforms = self.platform_stack.clone();
                let ignored = !execute || !self.env.group_enabled(&groups) || !self.env.platform_enabled(&platforms);
                debug!(gem = %gem_name, ignored, "evaluated gem declaration");
                self.doc.gems.push(Gem {
                    name: gem_name,
                    requirements,
                    options,
                    groups,
                    platforms,
                    ignored,
                    span,
                });
            }
            "group" => {
                let names = self.parse_bareword_list()?;
                self.expect_do_block_open()?;
                for n in &names {
                    self.group_stack.push(n.clone());
                }
                let child_execute = execute && self.env.group_enabled(&names);
                self.block(child_execute, self.group_stack.len() as u32)?;
                for _ in &names {
                    self.group_stack.pop();
                }
            }
            "platforms" | "platform" => {
                let names = self.parse_bareword_list()?;
                self.expect_do_block_open()?;
                for n in &names {
                    self.platform_stack.push(n.clone());
                }
                let child_execute = execute && self.env.platform_enabled(&names);
                self.block(child_execute, self.platform_stack.len() as u32)?;
                for _ in &names {
                    self.platform_stack.pop();
                }
            }
            "eval_gemfile" => {
                let value = self.expect_string_arg()?;
                if execute {
                    self.doc.eval_gemfiles.push(value);
                }
            }
            other => {
                return Err(self.err_at(span, format!("unknown directive `{other}`")));
            }
        }
        Ok(())
    }

    fn expect_do_block_open(&mut self) -> Result<()> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Identifier(ref s) if s == "do" => Ok(()),
            other => Err(self.err_at(tok.span, format!("expected `do`, found {other:?}"))),
        }
    }

    fn parse_bareword_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_bareword_or_symbol()?];
        while matches!(self.peek()?.kind, TokenKind::Comma) {
            self.bump()?;
            names.push(self.expect_bareword_or_symbol()?);
        }
        Ok(names)
    }

    fn expect_bareword_or_symbol(&mut self) -> Result<String> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Symbol(s) => Ok(s),
            TokenKind::Identifier(s) => Ok(s),
            TokenKind::StringLit(s) => Ok(s),
            other => Err(self.err_at(tok.span, format!("expected a group/platform name, found {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::StringLit(s) => Ok(s),
            other => Err(self.err_at(tok.span, format!("expected a string literal, found {other:?}"))),
        }
    }

    fn expect_string_arg(&mut self) -> Result<String> {
        self.expect_string()
    }

    fn expect_string_arg_opt(&mut self) -> Result<Option<String>> {
        if matches!(self.peek()?.kind, TokenKind::StringLit(_)) {
            Ok(Some(self.expect_string()?))
        } else {
            Ok(None)
        }
    }

    fn looks_like_keyword_arg(&mut self) -> Result<bool> {
        if matches!(self.peek()?.kind, TokenKind::Symbol(_)) {
            return Ok(true);
        }
        Ok(matches!(self.peek()?.kind, TokenKind::Identifier(_)) && matches!(self.peek2()?, TokenKind::Colon))
    }

    /// Accepts both the classic `:key => value` hash-rocket form and the
    /// modern `key: value` shorthand (an identifier directly followed by a
    /// bare `Colon`, with no `=>`).
    fn parse_keyword_args(&mut self) -> Result<Vec<(String, GemValue)>> {
        let mut out = Vec::new();
        loop {
            let key = if matches!(self.peek()?.kind, TokenKind::Symbol(_)) {
                let key = match self.bump()?.kind {
                    TokenKind::Symbol(s) => s,
                    _ => unreachable!(),
                };
                let arrow = self.bump()?;
                if !matches!(&arrow.kind, TokenKind::Operator(op) if op == "=>") {
                    return Err(self.err_at(arrow.span, format!("expected `=>`, found {:?}", arrow.kind)));
                }
                key
            } else if matches!(self.peek()?.kind, TokenKind::Identifier(_))
                && matches!(self.peek2()?, TokenKind::Colon)
            {
                let key = match self.bump()?.kind {
                    TokenKind::Identifier(s) => s,
                    _ => unreachable!(),
                };
                self.bump()?; // the Colon
                key
            } else {
                break;
            };
            let value = self.parse_value()?;
            out.push((key, value));
            if matches!(self.peek()?.kind, TokenKind::Comma) {
                self.bump()?;
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// Keyword args that follow a positional argument list, separated by a
    /// comma the caller has already consumed for the first requirement (or
    /// not, if there were none).
    fn parse_trailing_keyword_args(&mut self) -> Result<Vec<(String, GemValue)>> {
        self.parse_keyword_args()
    }

    fn parse_value(&mut self) -> Result<GemValue> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::StringLit(s) => Ok(GemValue::String(s)),
            TokenKind::Symbol(s) => Ok(GemValue::Symbol(s)),
            TokenKind::Identifier(ref s) if s == "true" => Ok(GemValue::Bool(true)),
            TokenKind::Identifier(ref s) if s == "false" => Ok(GemValue::Bool(false)),
            TokenKind::Identifier(ref s) if s == "RUBY_VERSION" => {
                Ok(GemValue::String(self.env.ruby_version.clone().unwrap_or_default()))
            }
            TokenKind::LBracket => {
                let mut items = Vec::new();
                loop {
                    if matches!(self.peek()?.kind, TokenKind::RBracket) {
                        self.bump()?;
                        break;
                    }
                    items.push(self.parse_value()?);
                    if matches!(self.peek()?.kind, TokenKind::Comma) {
                        self.bump()?;
                    }
                }
                Ok(GemValue::Array(items))
            }
            other => Err(self.err_at(tok.span, format!("expected a value, found {other:?}"))),
        }
    }
}

fn collect_group_names(value: &GemValue, out: &mut Vec<String>) {
    match value {
        GemValue::Symbol(s) | GemValue::String(s) => out.push(s.clone()),
        GemValue::Array(items) => {
            for item in items {
                collect_group_names(item, out);
            }
        }
        GemValue::Bool(_) => {}
    }
}
