use super::*;
use crate::classifiers::{ClassifierFlags, ClassifierStore};

fn module_map(descriptors: Vec<ModuleDescriptor>) -> FxHashMap<ClassifierId, ModuleDescriptor> {
    descriptors.into_iter().map(|d| (d.classifier, d)).collect()
}

fn arcs(declarations: Vec<CallableRef>) -> Vec<Arc<CallableRef>> {
    declarations.into_iter().map(Arc::new).collect()
}

#[test]
fn test_declarations_are_bucketed_by_kind() {
    let store = ClassifierStore::new();
    let foo = TypeRef::of(store.declare("Foo", ClassifierFlags::empty()));
    let declarations = arcs(vec![
        CallableRef::new("app.foo", foo.clone()),
        CallableRef::new("app.element", foo.clone()).contributing(ContributionKind::SetElement),
        CallableRef::new("app.intercept", TypeRef::function(Vec::new(), foo.clone()))
            .contributing(ContributionKind::Interceptor),
        CallableRef::new("app.multi", TypeRef::set_of(foo.clone())).contributing(ContributionKind::Multibinds),
        CallableRef::new("app.ignored", foo.clone()).contributing(ContributionKind::None),
    ]);
    let out = expand_contributions(&declarations, &module_map(Vec::new())).expect("expands");

    assert_eq!(out.bindings.len(), 1);
    assert_eq!(out.set_elements.len(), 1);
    assert_eq!(out.interceptors.len(), 1);
    assert_eq!(out.multibinds, vec![TypeRef::set_of(foo)]);
    assert!(out.map_entries.is_empty());
}

#[test]
fn test_module_members_carry_receiver_path() {
    let store = ClassifierStore::new();
    let db = TypeRef::of(store.declare("Db", ClassifierFlags::empty()));
    let outer = store.declare("OuterModule", ClassifierFlags::empty());
    let inner = store.declare("InnerModule", ClassifierFlags::empty());
    let modules = module_map(vec![
        ModuleDescriptor::new(
            outer,
            vec![CallableRef::new("OuterModule.inner", TypeRef::of(inner)).contributing(ContributionKind::Module)],
        ),
        ModuleDescriptor::new(inner, vec![CallableRef::new("InnerModule.db", db.clone())]),
    ]);
    let declarations =
        arcs(vec![CallableRef::new("app.outer", TypeRef::of(outer)).contributing(ContributionKind::Module)]);
    let out = expand_contributions(&declarations, &modules).expect("expands");

    let names: Vec<&str> = out.bindings.iter().map(|b| b.origin().as_str()).collect();
    assert_eq!(names, vec!["app.outer", "OuterModule.inner", "InnerModule.db"]);
    let db_binding = &out.bindings[2];
    assert_eq!(db_binding.callable.type_ref, db);
    assert_eq!(
        db_binding.receivers,
        vec![FqName::new("app.outer"), FqName::new("OuterModule.inner")]
    );
}

#[test]
fn test_generic_module_members_are_substituted() {
    let store = ClassifierStore::new();
    let user = TypeRef::of(store.declare("User", ClassifierFlags::empty()));
    let repo = store.declare("Repo", ClassifierFlags::empty());
    let module = store.declare("RepoModule", ClassifierFlags::empty());
    let t = store.type_parameter("RepoModule.T", Vec::new());
    let modules = module_map(vec![
        ModuleDescriptor::new(
            module,
            vec![CallableRef::new("RepoModule.repo", TypeRef::generic(repo, vec![TypeRef::of(t)]))],
        )
        .with_type_parameters(vec![t]),
    ]);
    let declarations = arcs(vec![
        CallableRef::new("app.repos", TypeRef::generic(module, vec![user.clone()]))
            .contributing(ContributionKind::Module),
    ]);
    let out = expand_contributions(&declarations, &modules).expect("expands");
    assert_eq!(out.bindings[1].callable.type_ref, TypeRef::generic(repo, vec![user]));
}

#[test]
fn test_module_including_itself_is_reported() {
    let store = ClassifierStore::new();
    let module = store.declare("LoopModule", ClassifierFlags::empty());
    let modules = module_map(vec![ModuleDescriptor::new(
        module,
        vec![CallableRef::new("LoopModule.again", TypeRef::of(module)).contributing(ContributionKind::Module)],
    )]);
    let declarations =
        arcs(vec![CallableRef::new("app.loop", TypeRef::of(module)).contributing(ContributionKind::Module)]);
    let error = expand_contributions(&declarations, &modules).expect_err("cycle");
    assert_eq!(
        error,
        ResolutionError::ModuleCycle {
            module,
            path: vec![FqName::new("app.loop"), FqName::new("LoopModule.again")],
        }
    );
}

#[test]
fn test_unknown_module_contributes_only_itself() {
    let store = ClassifierStore::new();
    let module = store.declare("Opaque", ClassifierFlags::empty());
    let declarations =
        arcs(vec![CallableRef::new("app.opaque", TypeRef::of(module)).contributing(ContributionKind::Module)]);
    let out = expand_contributions(&declarations, &module_map(Vec::new())).expect("expands");
    assert_eq!(out.bindings.len(), 1);
    assert!(!out.is_empty());
}
