use super::*;
use givens_solver::{CallableRef, ClassifierFlags, ComponentDescriptor, DeclarationIndexBuilder};

fn class(store: &ClassifierStore, name: &str, flags: ClassifierFlags) -> TypeRef {
    TypeRef::of(store.declare(name, flags))
}

fn app_index(store: &ClassifierStore, with_db: bool) -> (TypeRef, TypeRef, DeclarationIndex) {
    let app = class(store, "AppComponent", ClassifierFlags::COMPONENT);
    let db = class(store, "Db", ClassifierFlags::empty());
    let repo = class(store, "Repo", ClassifierFlags::empty());
    let mut declarations = vec![CallableRef::new("AppComponent.repo", repo.clone()).with_parameter("db", db.clone())];
    if with_db {
        declarations.push(CallableRef::new("AppComponent.db", db).scoped_to(app.clone()));
    }
    let mut builder = DeclarationIndexBuilder::new();
    builder.component(
        ComponentDescriptor::new(app.clone())
            .with_declarations(declarations)
            .with_entry_points(vec![repo.clone()]),
    );
    let index = builder.build(store).expect("index");
    (app, repo, index)
}

#[test]
fn test_resolve_component_builds_entry_points() {
    let store = ClassifierStore::new();
    let (app, repo, index) = app_index(&store, true);
    let plan = resolve_component(&store, &index, ResolverOptions::default(), &app).expect("resolves");
    assert_eq!(plan.roots.len(), 1);
    assert_eq!(plan.roots[0].request.type_ref, repo);
    assert_eq!(plan.nodes.len(), 2);
}

#[test]
fn test_plan_json_lists_nodes_and_roots() {
    let store = ClassifierStore::new();
    let (app, _, index) = app_index(&store, true);
    let plan = resolve_component(&store, &index, ResolverOptions::default(), &app).expect("resolves");
    let json = plan_to_json(&plan).expect("serializes");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["roots"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["scopes"][0]["name"], "AppComponent");
}

#[test]
fn test_missing_binding_becomes_diagnostic() {
    let store = ClassifierStore::new();
    let (app, _, index) = app_index(&store, false);
    let error = resolve_component(&store, &index, ResolverOptions::default(), &app).expect_err("missing");
    let diagnostics = diagnostics_for(&store, &[error]);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].message_text,
        "No binding found for 'Db' in 'AppComponent'."
    );

    let json = diagnostics_to_json(&diagnostics).expect("serializes");
    assert!(json.contains("No binding found for 'Db'"));
}
