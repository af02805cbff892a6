use super::*;
use crate::classifiers::{ClassifierFlags, ClassifierStore};
use crate::graph::Tier;
use givens_common::diagnostics::DiagnosticCategory;

fn link(ty: TypeRef, origin: &str) -> ChainLink {
    ChainLink {
        type_ref: ty,
        origin: FqName::new(origin),
    }
}

#[test]
fn test_codes_are_stable() {
    let store = ClassifierStore::new();
    let foo = TypeRef::of(store.declare("app.Foo", ClassifierFlags::empty()));
    let missing = ResolutionError::Missing {
        type_ref: foo.clone(),
        scope: "AppComponent".into(),
        chain: Vec::new(),
    };
    let cycle = ResolutionError::Circular { cycle: Vec::new() };
    let module = ResolutionError::ModuleCycle {
        module: foo.classifier,
        path: Vec::new(),
    };
    assert_eq!(missing.code(), 1001);
    assert_eq!(cycle.code(), 1003);
    assert_eq!(module.code(), 1008);
}

#[test]
fn test_missing_message_uses_names() {
    let store = ClassifierStore::new();
    let foo = TypeRef::of(store.declare("app.Foo", ClassifierFlags::empty()));
    let error = ResolutionError::Missing {
        type_ref: foo,
        scope: "AppComponent".into(),
        chain: Vec::new(),
    };
    let formatter = TypeFormatter::new(&store);
    assert_eq!(error.message(&formatter), "No binding found for 'app.Foo' in 'AppComponent'.");
}

#[test]
fn test_display_without_store_prints_ids() {
    let error = ResolutionError::DepthExceeded {
        type_ref: TypeRef::of(ClassifierId(42)),
        depth: 200,
        chain: Vec::new(),
    };
    assert_eq!(
        error.to_string(),
        "Resolution of '#42' is excessively deep and possibly infinite."
    );
}

#[test]
fn test_step_budget_is_distinct_from_depth() {
    let store = ClassifierStore::new();
    let repo = TypeRef::of(store.declare("Repo", ClassifierFlags::empty()));
    let c = TypeRef::of(store.declare("C", ClassifierFlags::empty()));
    let error = ResolutionError::StepBudgetExceeded {
        type_ref: c.clone(),
        budget: 3,
        chain: vec![link(repo, "app.main"), link(c, "app.repo.c")],
    };
    assert_eq!(error.code(), 1009);
    let formatter = TypeFormatter::new(&store);
    assert_eq!(error.message(&formatter), "Resolution of 'C' made more than 3 requests.");
    let diagnostic = error.to_diagnostic(&formatter);
    assert_eq!(diagnostic.origin, "app.repo.c");
    assert_eq!(diagnostic.related_information.len(), 2);
}

#[test]
fn test_missing_diagnostic_lists_chain_innermost_first() {
    let store = ClassifierStore::new();
    let a = TypeRef::of(store.declare("A", ClassifierFlags::empty()));
    let b = TypeRef::of(store.declare("B", ClassifierFlags::empty()));
    let error = ResolutionError::Missing {
        type_ref: b.clone(),
        scope: "App".into(),
        chain: vec![link(a, "app.main"), link(b, "app.provideA.b")],
    };
    let diagnostic = error.to_diagnostic(&TypeFormatter::new(&store));

    assert_eq!(diagnostic.origin, "app.provideA.b");
    assert_eq!(diagnostic.category, DiagnosticCategory::Error);
    assert_eq!(diagnostic.related_information.len(), 2);
    assert_eq!(
        diagnostic.related_information[0].message_text,
        "'B' is required by 'app.provideA.b'"
    );
    assert_eq!(diagnostic.related_information[1].origin, "app.main");
}

#[test]
fn test_ambiguity_diagnostic_lists_every_candidate() {
    let store = ClassifierStore::new();
    let foo = TypeRef::of(store.declare("Foo", ClassifierFlags::empty()));
    let error = ResolutionError::Ambiguous {
        type_ref: foo,
        tier: Tier::Internal,
        candidates: vec![FqName::new("app.one"), FqName::new("app.two")],
    };
    let diagnostic = error.to_diagnostic(&TypeFormatter::new(&store));
    assert_eq!(diagnostic.message_text, "Multiple internal bindings found for 'Foo'.");
    let origins: Vec<&str> = diagnostic
        .related_information
        .iter()
        .map(|r| r.origin.as_str())
        .collect();
    assert_eq!(origins, vec!["app.one", "app.two"]);
}

#[test]
fn test_cycle_message_renders_path() {
    let store = ClassifierStore::new();
    let a = TypeRef::of(store.declare("A", ClassifierFlags::empty()));
    let b = TypeRef::of(store.declare("B", ClassifierFlags::empty()));
    let error = ResolutionError::Circular {
        cycle: vec![link(a.clone(), "app.a"), link(b, "app.b"), link(a, "app.a")],
    };
    let formatter = TypeFormatter::new(&store);
    assert_eq!(error.message(&formatter), "Circular dependency: A -> B -> A.");
    let rendered = error.to_diagnostic(&formatter).render();
    assert!(rendered.starts_with("error G1003: Circular dependency"));
    assert!(rendered.contains("'B' is part of the cycle (app.b)"));
}

#[test]
fn test_duplicate_map_key_message() {
    let store = ClassifierStore::new();
    let string = TypeRef::of(store.declare("String", ClassifierFlags::empty()));
    let plugin = TypeRef::of(store.declare("Plugin", ClassifierFlags::empty()));
    let error = ResolutionError::Duplicate {
        collection: TypeRef::map_of(string.clone(), plugin),
        key: DuplicateKey::Key(MapKey::new(string, "\"a\"")),
        scope: "App".into(),
        existing: FqName::new("app.first"),
        duplicate: FqName::new("app.second"),
    };
    let diagnostic = error.to_diagnostic(&TypeFormatter::new(&store));
    assert_eq!(
        diagnostic.message_text,
        "Already declared key '\"a\"' of Map<String, Plugin> in 'App'."
    );
    assert_eq!(diagnostic.origin, "app.second");
}
