//! Black-box evaluator scenarios covering group/platform filtering and the
//! `%w[]` literal, `eval_gemfile`, and `gemspec` directives.

use rmarshal_gemfile::{environment_with_group, evaluate, gemfile_parse, Environment, GemValue, GemfileOptions};

#[test]
fn group_and_platform_filtering_scenario() {
    let src = r#"
source "https://rubygems.org"

gem "nokogiri"

group :test do
  gem "rspec"
  gem "capybara"
end

platforms :jruby do
  gem "jruby-openssl"
end

group :production do
  platforms :mri do
    gem "unicorn"
  end
end
"#;

    let mut env = Environment::default();
    env.disabled_groups.insert("test".to_string());
    env.enabled_groups.insert("production".to_string());

    let doc = evaluate(src, "Gemfile", &env).unwrap();
    let ignored = |name: &str| doc.gems.iter().find(|g| g.name == name).unwrap().ignored;

    assert!(!ignored("nokogiri"), "top-level gem outside any group must run");
    assert!(ignored("rspec"), "disabled group must be ignored");
    assert!(ignored("capybara"), "disabled group must be ignored");
    assert!(ignored("jruby-openssl"), "inactive platform must be ignored");
    assert!(!ignored("unicorn"), "active group + active platform must run");
}

#[test]
fn percent_w_literal_as_a_keyword_array_value() {
    let src = r#"gem "rails", require: %w[rails/all rails/test_unit]"#;
    let env = Environment::default();
    let doc = evaluate(src, "Gemfile", &env).unwrap();
    let gem = &doc.gems[0];
    let (_, value) = gem.options.iter().find(|(k, _)| k == "require").unwrap();
    match value {
        GemValue::Array(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0], GemValue::String("rails/all".into()));
        }
        other => panic!("expected an array, got {other:?}"),
    }
}

#[test]
fn gemspec_and_eval_gemfile_are_recorded() {
    let src = r#"
gemspec path: "..", development_group: :test
eval_gemfile "Gemfile.local"
"#;
    let env = Environment::default();
    let doc = evaluate(src, "Gemfile", &env).unwrap();
    assert_eq!(doc.gemspecs.len(), 1);
    assert_eq!(doc.gemspecs[0].path.as_deref(), Some(".."));
    assert_eq!(doc.gemspecs[0].development_group.as_deref(), Some("test"));
    assert_eq!(doc.eval_gemfiles, vec!["Gemfile.local".to_string()]);
}

#[test]
fn unterminated_block_is_a_syntax_error() {
    let env = Environment::default();
    let err = evaluate("group :test do\n  gem \"rspec\"\n", "Gemfile", &env).unwrap_err();
    assert!(matches!(err, rmarshal_gemfile::GemfileError::Syntax { .. }));
}

/// Spec §8 scenario 6: `gem "rspec", group: :test` is ignored unless
/// `:test` is one of the environment's enabled groups.
#[test]
fn scenario_gemfile_group_filtering_from_spec() {
    let src = r#"gem "rspec", group: :test"#;

    let env = Environment::default();
    let doc = evaluate(src, "Gemfile", &env).unwrap();
    assert!(doc.gems[0].ignored, "`test` is not in the default enabled-group set");

    let env = environment_with_group(Environment::default(), "test");
    let doc = evaluate(src, "Gemfile", &env).unwrap();
    assert!(!doc.gems[0].ignored, "enabling `test` must un-ignore the gem");
}

#[test]
fn ruby_version_pseudo_identifier_resolves_from_the_environment() {
    let src = r#"gem "rails", platforms: RUBY_VERSION"#;
    let env = Environment::new("3.2.0");
    let doc = evaluate(src, "Gemfile", &env).unwrap();
    let (_, value) = doc.gems[0].options.iter().find(|(k, _)| k == "platforms").unwrap();
    assert_eq!(value, &GemValue::String("3.2.0".to_string()));
}

#[test]
fn environment_new_auto_populates_versioned_platforms() {
    let env = Environment::new("3.2.0");
    assert!(env.active_platforms.contains("ruby"));
    assert!(env.active_platforms.contains("mri"));
    assert!(env.active_platforms.contains("ruby_32"));
    assert!(env.active_platforms.contains("mri_32"));
}

#[test]
fn gemfile_parse_follows_eval_gemfile_recursively() {
    let dir = std::env::temp_dir().join(format!("rmarshal-gemfile-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let root = dir.join("Gemfile");
    let child = dir.join("Gemfile.local");
    std::fs::write(&root, "gem \"nokogiri\"\neval_gemfile \"Gemfile.local\"\n").unwrap();
    std::fs::write(&child, "gem \"pg\"\n").unwrap();

    let env = Environment::default();
    let doc = gemfile_parse(&root, &env, &GemfileOptions::default()).unwrap();
    let names: Vec<&str> = doc.gems.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["nokogiri", "pg"]);

    std::fs::remove_dir_all(&dir).ok();
}
