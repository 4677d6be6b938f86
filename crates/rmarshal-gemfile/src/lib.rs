//! Tokenizer and recursive-descent evaluator for the Gemfile mini-DSL.

pub mod error;
pub mod eval;
pub mod lex;
pub mod model;

pub use error::{GemfileError, Result};
pub use eval::{evaluate, gemfile_parse, GemfileOptions};
pub use model::{Environment, Gem, GemValue, Gemfile, GemspecDecl};

/// Spec §6.2: `environment_new(ruby_version) -> Environment`.
pub fn environment_new(ruby_version: impl Into<String>) -> Environment {
    Environment::new(ruby_version)
}

/// Spec §6.2: `environment_with_group(env, name)`.
pub fn environment_with_group(env: Environment, name: impl Into<String>) -> Environment {
    env.with_group(name)
}

/// Spec §6.2: `environment_without_group(env, name)`.
pub fn environment_without_group(env: Environment, name: impl Into<String>) -> Environment {
    env.without_group(name)
}
