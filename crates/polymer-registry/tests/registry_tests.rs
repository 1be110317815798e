//! Tests for polymer-registry: class registration, module lifecycle and
//! chained resolver composition

use polymer_core::{Attrs, Error, LoaderKey, ModuleSpec, QualName, SpecOrigin};
use polymer_registry::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn map(entries: &[(&str, serde_json::Value)]) -> Arc<dyn Namespace> {
    let attrs: Attrs = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    Arc::new(attrs)
}

fn class_spec(qualname: &str) -> ModuleSpec {
    ModuleSpec::new(qualname.into(), LoaderKey::for_app("demo"), SpecOrigin::Class)
}

fn no_names(q: &QualName) -> polymer_core::Result<Arc<dyn Namespace>> {
    Err(Error::not_found(q.as_str()))
}

// ===========================================================================
// ChainedResolver — lookup order
// ===========================================================================

#[test]
fn maps_searched_in_declared_order() {
    let m1 = map(&[("a", json!(1))]);
    let m2 = map(&[("a", json!(2)), ("b", json!(3))]);
    let proxy = ChainedResolver::builder("P")
        .target(Target::source(m1))
        .target(Target::source(m2))
        .build()
        .unwrap();
    assert_eq!(proxy.get("a").unwrap(), json!(1));
    assert_eq!(proxy.get("b").unwrap(), json!(3));
}

#[test]
fn fallback_answers_total_miss() {
    let proxy = ChainedResolver::builder("P")
        .target(Target::source(map(&[("a", json!(1))])))
        .target(Target::fallback(|k| Some(json!(format!("NO:{k}")))))
        .build()
        .unwrap();
    assert_eq!(proxy.get("x").unwrap(), json!("NO:x"));
}

#[test]
fn first_non_failing_fallback_wins() {
    let proxy = ChainedResolver::builder("P")
        .target(Target::fallback(|k| (k != "x").then(|| json!("first"))))
        .target(Target::fallback(|k| Some(json!(format!("second:{k}")))))
        .build()
        .unwrap();
    assert_eq!(proxy.get("x").unwrap(), json!("second:x"));
    assert_eq!(proxy.get("y").unwrap(), json!("first"));
}

#[test]
fn lookup_order_is_stable_across_calls() {
    let proxy = ChainedResolver::builder("P")
        .target(Target::source(map(&[("k", json!("one"))])))
        .target(Target::source(map(&[("k", json!("two"))])))
        .build()
        .unwrap();
    for _ in 0..10 {
        assert_eq!(proxy.get("k").unwrap(), json!("one"));
    }
}

// ===========================================================================
// ChainedResolver — composition
// ===========================================================================

#[test]
fn nested_resolver_is_flattened() {
    let m1 = map(&[("a", json!(1))]);
    let m2 = map(&[("a", json!(2)), ("b", json!(3))]);
    let extra = map(&[("c", json!(4))]);
    let p1 = Arc::new(
        ChainedResolver::builder("P1")
            .target(Target::source(m1.clone()))
            .target(Target::source(m2.clone()))
            .build()
            .unwrap(),
    );
    let p2 = ChainedResolver::builder("P2")
        .target(p1)
        .target(Target::source(extra.clone()))
        .build()
        .unwrap();

    let sources = p2.sources();
    assert_eq!(sources.len(), 3);
    assert!(same_source(&sources[0], &m1));
    assert!(same_source(&sources[1], &m2));
    assert!(same_source(&sources[2], &extra));
    assert_eq!(p2.get("c").unwrap(), json!(4));
    assert_eq!(p2.members(), vec!["a", "b", "c"]);
}

#[test]
fn splice_deduplicates_by_reference() {
    let shared = map(&[("a", json!(1))]);
    let fallback = Fallback::new(|_| Some(json!(0)));
    let p1 = Arc::new(
        ChainedResolver::builder("P1")
            .target(Target::source(shared.clone()))
            .target(fallback.clone())
            .build()
            .unwrap(),
    );
    let p2 = ChainedResolver::builder("P2")
        .target(Target::source(shared.clone()))
        .target(p1)
        .target(fallback)
        .build()
        .unwrap();
    assert_eq!(p2.sources().len(), 1);
    assert_eq!(p2.fallbacks().len(), 1);
}

#[test]
fn equal_but_distinct_maps_are_both_kept() {
    let p = ChainedResolver::builder("P")
        .target(Target::map([("a", 1)]))
        .target(Target::map([("a", 1)]))
        .build()
        .unwrap();
    assert_eq!(p.sources().len(), 2);
}

#[test]
fn named_targets_use_resolver() {
    let backing = map(&[("z", json!(26))]);
    let proxy = ChainedResolver::builder("P")
        .target(Target::named("demo.app.Letters"))
        .build_with(|q| {
            assert_eq!(q.as_str(), "demo.app.Letters");
            Ok(backing.clone())
        })
        .unwrap();
    assert_eq!(proxy.get("z").unwrap(), json!(26));
}

#[test]
fn named_proxy_module_is_spliced_not_nested() {
    let inner_class = ModuleClass::builder("demo", "app", "Inner")
        .attr("own", "inner-own")
        .target(Target::map([("a", 1)]))
        .target(Target::fallback(|k| Some(json!(format!("inner-fallback:{k}")))))
        .build()
        .unwrap();
    let inner = Arc::new(Module::from_class(
        class_spec("demo.app.Inner"),
        inner_class,
        Arc::from(Vec::new()),
    ));
    inner.execute(no_names).unwrap();

    let outer = ChainedResolver::builder("Outer")
        .target(Target::named("demo.app.Inner"))
        .target(Target::map([("k", 2)]))
        .build_with(|_| Ok(inner.clone() as Arc<dyn Namespace>))
        .unwrap();

    // inner's own attributes, inner's map, then outer's map
    assert_eq!(outer.sources().len(), 3);
    assert_eq!(outer.fallbacks().len(), 1);
    assert_eq!(outer.get("k").unwrap(), json!(2));
    assert_eq!(outer.get("a").unwrap(), json!(1));
    assert_eq!(outer.get("own").unwrap(), json!("inner-own"));
    assert_eq!(outer.get("zz").unwrap(), json!("inner-fallback:zz"));
    assert_eq!(outer.members(), vec!["a", "k", "own"]);
}

#[test]
fn module_without_resolver_stays_one_source() {
    let class = ModuleClass::builder("demo", "app", "Plain")
        .attr("x", 1)
        .build()
        .unwrap();
    let plain = Arc::new(Module::from_class(
        class_spec("demo.app.Plain"),
        class,
        Arc::from(Vec::new()),
    ));
    plain.execute(no_names).unwrap();
    assert!(plain.layers().is_none());
    let outer = ChainedResolver::builder("Outer")
        .target(Target::source(plain))
        .build()
        .unwrap();
    assert_eq!(outer.sources().len(), 1);
    assert_eq!(outer.get("x").unwrap(), json!(1));
}

// ===========================================================================
// Module lifecycle
// ===========================================================================

#[test]
fn execute_runs_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let class = ModuleClass::builder("demo", "app", "Counted")
        .on_exec(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build()
        .unwrap();
    let module = Module::from_class(class_spec("demo.app.Counted"), class, Arc::from(Vec::new()));
    for _ in 0..5 {
        module.execute(no_names).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(module.state(), ModuleState::Executed);
}

#[test]
fn module_as_target_reads_through() {
    let inner_class = ModuleClass::builder("demo", "app", "Inner")
        .attr("x", "inner-x")
        .build()
        .unwrap();
    let inner = Arc::new(Module::from_class(
        class_spec("demo.app.Inner"),
        inner_class,
        Arc::from(Vec::new()),
    ));
    let outer_class = ModuleClass::builder("demo", "app", "Outer")
        .target(Target::source(inner))
        .build()
        .unwrap();
    let outer = Module::from_class(
        class_spec("demo.app.Outer"),
        outer_class,
        Arc::from(Vec::new()),
    );
    outer.execute(no_names).unwrap();
    assert_eq!(outer.get("x").unwrap(), json!("inner-x"));
    assert!(outer.dir().contains(&"x".to_string()));
}

#[test]
fn mutual_targets_terminate() {
    // Two modules that front each other must miss, not recurse forever.
    let a = Arc::new(Module::from_class(
        class_spec("demo.app.A"),
        ModuleClass::builder("demo", "app", "A")
            .target(Target::named("demo.app.B"))
            .build()
            .unwrap(),
        Arc::from(Vec::new()),
    ));
    let b = Arc::new(Module::from_class(
        class_spec("demo.app.B"),
        ModuleClass::builder("demo", "app", "B")
            .target(Target::named("demo.app.A"))
            .build()
            .unwrap(),
        Arc::from(Vec::new()),
    ));
    let (a2, b2) = (a.clone(), b.clone());
    a.execute(|_| Ok(b2.clone() as Arc<dyn Namespace>)).unwrap();
    b.execute(|_| Ok(a2.clone() as Arc<dyn Namespace>)).unwrap();
    assert!(matches!(a.get("missing"), Err(Error::AttributeMiss { .. })));
    assert!(matches!(b.get("missing"), Err(Error::AttributeMiss { .. })));
}

// ===========================================================================
// AppRegistry
// ===========================================================================

#[test]
fn builder_registers_into_bound_registry() {
    let registry = Arc::new(AppRegistry::new());
    let class = ModuleClass::builder("demo", "app", "Foo")
        .in_registry(registry.clone())
        .attr("bar", 1)
        .register()
        .unwrap();
    let found = registry.lookup("demo", class.qualname()).unwrap();
    assert!(Arc::ptr_eq(&found, &class));
}

#[test]
fn conflicting_builder_registration_fails() {
    let registry = Arc::new(AppRegistry::new());
    let _first = ModuleClass::builder("demo", "app", "Foo")
        .in_registry(registry.clone())
        .register()
        .unwrap();
    let err = ModuleClass::builder("demo", "app", "Foo")
        .in_registry(registry.clone())
        .register()
        .unwrap_err();
    assert!(matches!(err, Error::NameConflict { .. }));
}

#[test]
fn partitions_are_independent() {
    let registry = AppRegistry::new();
    let a = ModuleClass::builder("alpha", "app", "Foo").build().unwrap();
    let b = ModuleClass::builder("beta", "app", "Foo").build().unwrap();
    registry.register(&a).unwrap();
    registry.register(&b).unwrap();
    assert!(registry.lookup("alpha", b.qualname()).is_none());
    assert!(registry.lookup("beta", b.qualname()).is_some());
    registry.ensure_app("gamma");
    assert_eq!(registry.all_appnames(), vec!["alpha", "beta", "gamma"]);
}
