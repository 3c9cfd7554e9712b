//! End-to-end start-up scenarios against the public registry API.

use anyhow::Result;
use modreg::{ModuleDescriptor, ModuleRegistry, ModuleState, RegistryError, StartHook};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Timeline(Mutex<Vec<String>>);

impl Timeline {
    fn push(&self, event: String) {
        self.0.lock().push(event);
    }
    fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Start hook that records when it began and ended on a shared timeline.
struct Recorder {
    name: &'static str,
    timeline: Arc<Timeline>,
}

#[async_trait::async_trait]
impl StartHook for Recorder {
    async fn start(&self) -> Result<()> {
        self.timeline.push(format!("{}:begin", self.name));
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.timeline.push(format!("{}:end", self.name));
        Ok(())
    }
}

#[tokio::test]
async fn scenario_linear_chain_starts_in_order() {
    let reg = ModuleRegistry::new();
    assert!(reg.register("A", ModuleDescriptor::new()));
    assert!(reg.register("B", ModuleDescriptor::new().depends_on(["A"])));

    reg.start_all().await.unwrap();

    assert_eq!(reg.init_order(), vec!["A", "B"]);
    assert_eq!(reg.state("A"), Some(ModuleState::Initialized));
    assert_eq!(reg.state("B"), Some(ModuleState::Initialized));
    assert_eq!(reg.find_dependents("A"), vec!["B"]);
}

#[tokio::test]
async fn scenario_missing_dependency() {
    let reg = ModuleRegistry::new();
    reg.register("X", ModuleDescriptor::new().depends_on(["Y"]));

    match reg.start_all().await.unwrap_err() {
        RegistryError::MissingDependency { module, dependency } => {
            assert_eq!(module, "X");
            assert_eq!(dependency, "Y");
        }
        other => panic!("expected MissingDependency, got: {other:?}"),
    }
    assert_eq!(reg.state("X"), Some(ModuleState::Registered));
}

#[tokio::test]
async fn scenario_cycle_blocks_everything() {
    let reg = ModuleRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    reg.register("free", ModuleDescriptor::new().on_start(move || {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    }));
    reg.register("P", ModuleDescriptor::new().depends_on(["Q"]));
    reg.register("Q", ModuleDescriptor::new().depends_on(["P"]));

    let err = reg.start_all().await.unwrap_err();
    match &err {
        RegistryError::CircularDependency { module, path } => {
            assert!(module == "P" || module == "Q");
            assert!(path.contains(&"P".to_string()) && path.contains(&"Q".to_string()));
        }
        other => panic!("expected CircularDependency, got: {other:?}"),
    }

    // All-or-nothing: even the unrelated module was not started.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(reg.init_order().is_empty());
    assert_eq!(reg.health_report().initialized_modules, 0);
}

#[tokio::test]
async fn scenario_hook_failure_stops_the_sequence() {
    let reg = ModuleRegistry::new();
    reg.register("before", ModuleDescriptor::new());
    reg.register(
        "C",
        ModuleDescriptor::new()
            .depends_on(["before"])
            .on_start(|| async { anyhow::bail!("translation table unreadable") }),
    );
    reg.register("after", ModuleDescriptor::new().depends_on(["C"]));
    reg.register("unrelated", ModuleDescriptor::new());

    let err = reg.start_all().await.unwrap_err();
    match &err {
        RegistryError::HookFailure { module, source } => {
            assert_eq!(module, "C");
            assert_eq!(source.to_string(), "translation table unreadable");
        }
        other => panic!("expected HookFailure, got: {other:?}"),
    }

    let report = reg.health_report();
    assert_eq!(report.total_errors, 1);
    assert_eq!(reg.state("C"), Some(ModuleState::Registered));
    // Started before the failure: kept. Later in the order: never started.
    assert_eq!(reg.state("before"), Some(ModuleState::Initialized));
    assert_eq!(reg.state("after"), Some(ModuleState::Registered));
    assert_eq!(reg.state("unrelated"), Some(ModuleState::Registered));
    assert_eq!(reg.init_order(), vec!["before"]);
}

#[tokio::test]
async fn hooks_never_overlap_even_for_disjoint_subgraphs() {
    let reg = Arc::new(ModuleRegistry::new());
    let timeline = Arc::new(Timeline::default());
    for name in ["left", "right"] {
        reg.register(
            name,
            ModuleDescriptor::new().with_start_hook(Arc::new(Recorder {
                name,
                timeline: timeline.clone(),
            })),
        );
    }

    // Two concurrent callers still get strictly sequential hooks.
    let (a, b) = tokio::join!(reg.start_one("left"), reg.start_one("right"));
    a.unwrap();
    b.unwrap();

    let events = timeline.events();
    assert_eq!(events.len(), 4);
    assert!(events[0].ends_with(":begin"));
    assert!(events[1].ends_with(":end"));
    assert_eq!(events[0].split(':').next(), events[1].split(':').next());
}

#[tokio::test]
async fn start_all_is_safe_to_repeat() {
    let reg = ModuleRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    reg.register("only", ModuleDescriptor::new().on_start(move || {
        c.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    }));

    reg.start_all().await.unwrap();
    reg.start_all().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(reg.init_order(), vec!["only"]);
}

#[tokio::test]
async fn modules_registered_later_join_a_second_pass() {
    let reg = ModuleRegistry::new();
    reg.register("printer_database", ModuleDescriptor::new());
    reg.start_all().await.unwrap();

    reg.register(
        "autocomplete",
        ModuleDescriptor::new().depends_on(["printer_database"]),
    );
    reg.start_all().await.unwrap();

    assert_eq!(reg.init_order(), vec!["printer_database", "autocomplete"]);
}
