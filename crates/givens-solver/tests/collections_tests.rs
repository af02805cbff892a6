use super::*;
use crate::callable::{CallableRef, ContributionKind, MapKey};
use crate::classifiers::{ClassifierFlags, ClassifierStore};
use crate::expand::expand_contributions;
use crate::index::DeclarationIndexBuilder;
use crate::scope::{ScopeKind, ScopeSpec};
use crate::types::FqName;

struct Fixture {
    store: ClassifierStore,
    string: TypeRef,
    plugin: TypeRef,
}

fn fixture() -> Fixture {
    let store = ClassifierStore::new();
    let string = TypeRef::of(store.declare("String", ClassifierFlags::empty()));
    let plugin = TypeRef::of(store.declare("Plugin", ClassifierFlags::empty()));
    Fixture { store, string, plugin }
}

fn push_scope(
    scopes: &mut Vec<ResolutionScope>,
    parent: Option<ScopeId>,
    declarations: Vec<CallableRef>,
    index: &DeclarationIndex,
) -> ScopeId {
    let declarations: Vec<Arc<CallableRef>> = declarations.into_iter().map(Arc::new).collect();
    let contributions = expand_contributions(&declarations, index).expect("expands");
    let id = ScopeId(scopes.len() as u32);
    let parent = parent.map(|p| (p, scopes[p.index()].depth));
    let name = format!("scope{}", id.0);
    let scope = ResolutionScope::new(
        id,
        parent,
        ScopeSpec::new(name, ScopeKind::Component),
        contributions,
        &ResolverOptions::default(),
    )
    .expect("scope");
    scopes.push(scope);
    id
}

fn element(name: &str, ty: &TypeRef) -> CallableRef {
    CallableRef::new(name, ty.clone()).contributing(ContributionKind::SetElement)
}

fn entry(name: &str, key: &str, f: &Fixture) -> CallableRef {
    CallableRef::new(name, f.plugin.clone()).with_map_key(MapKey::new(f.string.clone(), key))
}

fn origins(entries: &[CallableWithReceiver]) -> Vec<&str> {
    entries.iter().map(|e| e.origin().as_str()).collect()
}

#[test]
fn test_undeclared_set_does_not_exist() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(&mut scopes, None, Vec::new(), &index);
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let merged = merger
        .set_elements(&mut scopes, root, &TypeRef::set_of(f.plugin.clone()))
        .expect("merges");
    assert!(merged.is_none());
}

#[test]
fn test_multibinds_declares_empty_set() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let set = TypeRef::set_of(f.plugin.clone());
    let root = push_scope(
        &mut scopes,
        None,
        vec![CallableRef::new("app.plugins", set.clone()).contributing(ContributionKind::Multibinds)],
        &index,
    );
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let merged = merger.set_elements(&mut scopes, root, &set).expect("merges");
    assert_eq!(merged.map(|m| m.len()), Some(0));
}

#[test]
fn test_empty_collections_by_default_option() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(&mut scopes, None, Vec::new(), &index);
    let options = ResolverOptions {
        empty_collections_by_default: true,
        ..ResolverOptions::default()
    };
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let merged = merger
        .set_elements(&mut scopes, root, &TypeRef::set_of(f.plugin.clone()))
        .expect("merges");
    assert_eq!(merged.map(|m| m.len()), Some(0));
}

#[test]
fn test_set_merge_order_is_parent_globals_local() {
    let f = fixture();
    let mut builder = DeclarationIndexBuilder::new();
    builder.add(element("global.plugin", &f.plugin));
    let index = builder.build(&f.store).expect("index");
    let mut scopes = Vec::new();
    let root = push_scope(&mut scopes, None, vec![element("root.plugin", &f.plugin)], &index);
    let child = push_scope(&mut scopes, Some(root), vec![element("child.plugin", &f.plugin)], &index);

    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let set = TypeRef::set_of(f.plugin.clone());
    let merged = merger.set_elements(&mut scopes, child, &set).expect("merges").expect("exists");
    assert_eq!(origins(&merged), vec!["global.plugin", "root.plugin", "child.plugin"]);

    // The root sees only its own and global elements.
    let root_merged = merger.set_elements(&mut scopes, root, &set).expect("merges").expect("exists");
    assert_eq!(origins(&root_merged), vec!["global.plugin", "root.plugin"]);
}

#[test]
fn test_set_elements_match_by_assignability() {
    let f = fixture();
    let special = f.store.declare("SpecialPlugin", ClassifierFlags::empty());
    f.store.add_supertype(special, f.plugin.clone());
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(
        &mut scopes,
        None,
        vec![
            element("app.special", &TypeRef::of(special)),
            element("app.string", &f.string),
        ],
        &index,
    );
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let merged = merger
        .set_elements(&mut scopes, root, &TypeRef::set_of(f.plugin.clone()))
        .expect("merges")
        .expect("exists");
    assert_eq!(origins(&merged), vec!["app.special"]);
}

#[test]
fn test_map_duplicate_key_in_child_fails_by_default() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(&mut scopes, None, vec![entry("root.a", "a", &f)], &index);
    let child = push_scope(&mut scopes, Some(root), vec![entry("child.a", "a", &f)], &index);
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let map = TypeRef::map_of(f.string.clone(), f.plugin.clone());

    let error = merger.map_entries(&mut scopes, child, &map).expect_err("duplicate");
    let ResolutionError::Duplicate {
        existing, duplicate, key, ..
    } = &error
    else {
        panic!("expected a duplicate error, got {error:?}");
    };
    assert_eq!(*existing, FqName::new("root.a"));
    assert_eq!(*duplicate, FqName::new("child.a"));
    assert_eq!(*key, DuplicateKey::Key(MapKey::new(f.string.clone(), "a")));
}

#[test]
fn test_map_override_replaces_parent_entry_in_place() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(
        &mut scopes,
        None,
        vec![entry("root.a", "a", &f), entry("root.b", "b", &f)],
        &index,
    );
    let child = push_scope(
        &mut scopes,
        Some(root),
        vec![
            entry("child.a", "a", &f).with_policy(DuplicatePolicy::Override),
            entry("child.c", "c", &f),
        ],
        &index,
    );
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let map = TypeRef::map_of(f.string.clone(), f.plugin.clone());
    let merged = merger.map_entries(&mut scopes, child, &map).expect("merges").expect("exists");
    assert_eq!(origins(&merged), vec!["child.a", "root.b", "child.c"]);
}

#[test]
fn test_map_drop_keeps_parent_entry() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(&mut scopes, None, vec![entry("root.a", "a", &f)], &index);
    let child = push_scope(
        &mut scopes,
        Some(root),
        vec![entry("child.a", "a", &f).with_policy(DuplicatePolicy::Drop)],
        &index,
    );
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let map = TypeRef::map_of(f.string.clone(), f.plugin.clone());
    let merged = merger.map_entries(&mut scopes, child, &map).expect("merges").expect("exists");
    assert_eq!(origins(&merged), vec!["root.a"]);
}

#[test]
fn test_map_entries_require_assignable_key_type() {
    let f = fixture();
    let int = TypeRef::of(f.store.declare("Int", ClassifierFlags::empty()));
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let root = push_scope(
        &mut scopes,
        None,
        vec![
            entry("app.byName", "a", &f),
            CallableRef::new("app.byId", f.plugin.clone()).with_map_key(MapKey::new(int, "1")),
        ],
        &index,
    );
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let map = TypeRef::map_of(f.string.clone(), f.plugin.clone());
    let merged = merger.map_entries(&mut scopes, root, &map).expect("merges").expect("exists");
    assert_eq!(origins(&merged), vec!["app.byName"]);
}

#[test]
fn test_interceptors_skip_those_depending_on_target() {
    let f = fixture();
    let index = DeclarationIndex::empty();
    let mut scopes = Vec::new();
    let factory = TypeRef::function(Vec::new(), f.plugin.clone());
    let root = push_scope(
        &mut scopes,
        None,
        vec![
            CallableRef::new("app.logCalls", factory.clone())
                .with_parameter("factory", factory.clone())
                .contributing(ContributionKind::Interceptor),
            CallableRef::new("app.selfish", factory.clone())
                .with_parameter("factory", factory.clone())
                .with_parameter("plugin", f.plugin.clone())
                .contributing(ContributionKind::Interceptor),
        ],
        &index,
    );
    let options = ResolverOptions::default();
    let merger = CollectionMerger::new(TypeRelation::new(&f.store), &index, &options);
    let interceptors = merger.interceptors(&mut scopes, root, &f.plugin);
    assert_eq!(origins(&interceptors), vec!["app.logCalls"]);
    assert!(merger.interceptors(&mut scopes, root, &f.string).is_empty());
}
