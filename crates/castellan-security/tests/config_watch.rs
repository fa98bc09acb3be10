//! Integration tests for configuration loading and checker watching.
//!
//! Watch output is captured with a scoped `tracing` subscriber writing to
//! an in-memory buffer, so these tests never touch the global subscriber.

use castellan_security::{
    CheckerRegistry, ConfigLoader, Instance, NameChecker, ParanoidPolicy, Participation,
    PermissionRegistry, PolicyKind, SecurityContext, SecurityPolicy, Value, WatchLevel,
};
use castellan_types::{PermissionId, Principal};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory log sink.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with DEBUG-level logs captured and returns them.
fn captured(f: impl FnOnce()) -> String {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    capture.contents()
}

fn registry(level: WatchLevel) -> Arc<CheckerRegistry> {
    let registry = Arc::new(CheckerRegistry::with_defaults());
    registry
        .define_checker(
            "acme.Document",
            NameChecker::public(["title"])
                .with_getattr("body", "acme.View")
                .into_ref(),
        )
        .expect("first definition");
    registry.set_watch_level(level);
    registry
}

fn user_context(registry: Arc<CheckerRegistry>) -> SecurityContext {
    let ctx = SecurityContext::new()
        .with_registry(registry)
        .with_policy(Arc::new(ParanoidPolicy));
    ctx.new_interaction([Participation::new(Principal::user("acme.alice", "Alice"))])
        .expect("no interaction active");
    ctx
}

fn document() -> Value {
    Instance::new("acme.Document")
        .with_attr("title", Value::from("Minutes"))
        .with_attr("body", Value::from("..."))
        .into_value()
}

/// Reads title, body and an unmapped name through a fresh proxy.
fn touch_document(ctx: &SecurityContext) {
    let doc = ctx.proxy(document());
    assert!(doc.getattr(ctx, "title").is_ok());
    assert!(doc.getattr(ctx, "body").expect_err("alice").is_unauthorized());
    assert!(doc.getattr(ctx, "missing").expect_err("unmapped").is_forbidden());
    assert!(doc.repr(ctx).is_ok());
}

/// Test a config file applied to local registries.
#[test]
fn config_file_installs_into_local_registries() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("security.toml");
    std::fs::write(
        &path,
        r#"
watch_checkers = 1
policy = "paranoid"

[[permissions]]
id = "acme.View"
title = "View"
description = "Read published content"

[[permissions]]
id = "acme.Edit"
title = "Edit"
"#,
    )
    .expect("temp dir is writable");

    let config = ConfigLoader::new()
        .with_config_file(&path)
        .skip_env_vars()
        .load()
        .expect("valid file");
    assert_eq!(config.policy, PolicyKind::Paranoid);
    assert_eq!(config.policy.build().name(), "paranoid");

    let checkers = CheckerRegistry::with_defaults();
    let permissions = PermissionRegistry::new();
    config
        .install_into(&checkers, &permissions)
        .expect("fresh registries");

    assert_eq!(checkers.watch_level(), WatchLevel::Denials);
    let view = permissions
        .get(&PermissionId::new("acme.View"))
        .expect("defined by the file");
    assert_eq!(view.description, "Read published content");
    assert!(permissions.contains(&PermissionId::new("acme.Edit")));
}

/// Test that the denials level logs refusals but not grants.
#[test]
fn denials_level_logs_refusals() {
    let ctx = user_context(registry(WatchLevel::Denials));
    let logs = captured(|| touch_document(&ctx));

    assert!(logs.contains("castellan::watch"), "{logs}");
    assert!(logs.contains("unauthorized"), "{logs}");
    assert!(logs.contains("acme.View"), "{logs}");
    assert!(logs.contains("body"), "{logs}");
    assert!(logs.contains("forbidden"), "{logs}");
    assert!(logs.contains("missing"), "{logs}");
    assert!(!logs.contains("granted"), "{logs}");
    assert!(!logs.contains("always available"), "{logs}");
}

/// Test that the all level also logs grants.
#[test]
fn all_level_logs_grants() {
    let ctx = user_context(registry(WatchLevel::All));
    let logs = captured(|| touch_document(&ctx));

    assert!(logs.contains("granted"), "{logs}");
    assert!(logs.contains("title"), "{logs}");
    assert!(logs.contains("always available"), "{logs}");
    assert!(logs.contains("__repr__"), "{logs}");
    assert!(logs.contains("unauthorized"), "{logs}");
}

/// Test that nothing is logged while watching is off.
#[test]
fn off_level_is_silent() {
    let ctx = user_context(registry(WatchLevel::Off));
    let logs = captured(|| touch_document(&ctx));
    assert!(!logs.contains("castellan::watch"), "{logs}");
}

/// Test that the watch level applies when a checker is selected.
#[test]
fn watch_level_applies_at_selection() {
    let registry = registry(WatchLevel::Off);
    let ctx = user_context(Arc::clone(&registry));
    let before = ctx.proxy(document());

    registry.set_watch_level(WatchLevel::Denials);
    let after = ctx.proxy(document());

    let logs = captured(|| {
        assert!(before.getattr(&ctx, "body").is_err());
    });
    assert!(!logs.contains("castellan::watch"), "{logs}");

    let logs = captured(|| {
        assert!(after.getattr(&ctx, "body").is_err());
    });
    assert!(logs.contains("castellan::watch"), "{logs}");
}

/// Test that definitions and removals are logged at debug.
#[test]
fn registry_changes_are_logged() {
    let registry = CheckerRegistry::new();
    let logs = captured(|| {
        registry
            .define_checker("acme.Note", NameChecker::public(["text"]).into_ref())
            .expect("first definition");
        registry.undefine("acme.Note").expect("defined");
    });
    assert!(logs.contains("checker defined"), "{logs}");
    assert!(logs.contains("checker undefined"), "{logs}");
    assert!(logs.contains("acme.Note"), "{logs}");
}
