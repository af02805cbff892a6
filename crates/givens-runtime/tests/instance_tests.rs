use super::*;
use crate::factory::{arg, downcast, optional_arg};
use givens_solver::{
    BindingGraph, BindingRequest, CallableRef, ClassifierFlags, ClassifierStore, ComponentDescriptor,
    ContributionKind, DeclarationIndex, DeclarationIndexBuilder, MapKey, ResolverOptions, ScopeKind, ScopeSpec,
};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Db(usize);
struct Repo(Arc<Db>);
struct Config(&'static str);
struct Service(Arc<Config>);

fn class(store: &ClassifierStore, name: &str) -> TypeRef {
    TypeRef::of(store.declare(name, ClassifierFlags::empty()))
}

fn component(store: &ClassifierStore) -> TypeRef {
    TypeRef::of(store.declare("AppComponent", ClassifierFlags::COMPONENT))
}

/// Resolve `requests` in a root scope for `app` and return the plan.
fn plan(
    store: &ClassifierStore,
    index: &DeclarationIndex,
    app: &TypeRef,
    declarations: Vec<CallableRef>,
    requests: &[&TypeRef],
) -> BindingPlan {
    let mut graph = BindingGraph::new(store, index, ResolverOptions::default());
    let root = graph
        .add_scope(
            None,
            ScopeSpec::new("App", ScopeKind::Component).for_component(app.clone()),
            declarations,
        )
        .expect("scope");
    graph
        .resolve_all(
            root,
            requests
                .iter()
                .map(|t| BindingRequest::new((*t).clone(), "app.main")),
        )
        .expect("resolves")
}

fn db_table(db_calls: &Arc<AtomicUsize>, repo_calls: &Arc<AtomicUsize>) -> FactoryTable {
    let mut table = FactoryTable::new();
    let db_calls = Arc::clone(db_calls);
    let repo_calls = Arc::clone(repo_calls);
    table
        .register("app.db", move |_| Ok(instance(Db(db_calls.fetch_add(1, Ordering::SeqCst)))))
        .register("app.repo", move |args| {
            repo_calls.fetch_add(1, Ordering::SeqCst);
            Ok(instance(Repo(arg::<Db>(args, 0)?)))
        });
    table
}

#[test]
fn test_scoped_node_is_shared_and_unscoped_is_recomputed() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let db = class(&store, "Db");
    let repo = class(&store, "Repo");
    let index = DeclarationIndex::empty();
    let plan = plan(
        &store,
        &index,
        &app,
        vec![
            CallableRef::new("app.db", db.clone()).scoped_to(app.clone()),
            CallableRef::new("app.repo", repo.clone()).with_parameter("db", db.clone()),
        ],
        &[&repo],
    );
    let db_calls = Arc::new(AtomicUsize::new(0));
    let repo_calls = Arc::new(AtomicUsize::new(0));
    let runtime = Runtime::new(plan, db_table(&db_calls, &repo_calls));
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let first = downcast::<Repo>(root.get(&repo).expect("repo")).expect("type");
    let second = downcast::<Repo>(root.get(&repo).expect("repo")).expect("type");
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.0, &second.0));
    assert_eq!(repo_calls.load(Ordering::SeqCst), 2);
    assert_eq!(db_calls.load(Ordering::SeqCst), 1);

    let other = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");
    let third = downcast::<Repo>(other.get(&repo).expect("repo")).expect("type");
    assert!(!Arc::ptr_eq(&first.0, &third.0));
    assert_eq!(db_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_requests_initialize_scoped_node_once() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let db = class(&store, "Db");
    let index = DeclarationIndex::empty();
    let plan = plan(
        &store,
        &index,
        &app,
        vec![CallableRef::new("app.db", db.clone()).scoped_to(app.clone())],
        &[&db],
    );
    let db_calls = Arc::new(AtomicUsize::new(0));
    let runtime = Runtime::new(plan, db_table(&db_calls, &Arc::new(AtomicUsize::new(0))));
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let values: Vec<Instance> = (0..128)
        .into_par_iter()
        .map(|_| root.get(&db).expect("db"))
        .collect();
    assert_eq!(db_calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
}

#[test]
fn test_eager_nodes_initialize_with_their_scope() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let db = class(&store, "Db");
    let index = DeclarationIndex::empty();
    let plan = plan(
        &store,
        &index,
        &app,
        vec![CallableRef::new("app.db", db.clone()).scoped_to(app.clone()).eager()],
        &[&db],
    );
    let db_node = plan.root_for(ScopeId(0), &db).expect("root");
    let db_calls = Arc::new(AtomicUsize::new(0));
    let runtime = Runtime::new(plan, db_table(&db_calls, &Arc::new(AtomicUsize::new(0))));

    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");
    assert_eq!(db_calls.load(Ordering::SeqCst), 1);
    assert!(root.is_initialized(db_node));
    root.get(&db).expect("db");
    assert_eq!(db_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_eager_failure_aborts_scope_construction() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let db = class(&store, "Db");
    let index = DeclarationIndex::empty();
    let plan = plan(
        &store,
        &index,
        &app,
        vec![CallableRef::new("app.db", db.clone()).scoped_to(app.clone()).eager()],
        &[&db],
    );
    let mut table = FactoryTable::new();
    table.register("app.db", |_| Err("disk full".into()));
    let runtime = Runtime::new(plan, table);

    let error = runtime.instantiate(ScopeId(0), Vec::new()).err().expect("fails");
    let RuntimeError::EagerInit { source, .. } = &error else {
        panic!("expected an eager failure, got {error:?}");
    };
    assert!(matches!(source.as_ref(), RuntimeError::FactoryFailed { .. }));
}

#[test]
fn test_provider_builds_nested_scope_with_inputs() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let config = class(&store, "Config");
    let service = class(&store, "Service");
    let mut builder = DeclarationIndexBuilder::new();
    builder.add(CallableRef::new("app.service", service.clone()).with_parameter("config", config.clone()));
    let index = builder.build(&store).expect("index");
    let factory = TypeRef::function(vec![config], service);
    let plan = plan(&store, &index, &app, Vec::new(), &[&factory]);

    let mut table = FactoryTable::new();
    table.register("app.service", |args| Ok(instance(Service(arg::<Config>(args, 0)?))));
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let provider = downcast::<Function>(root.get(&factory).expect("provider")).expect("function");
    assert_eq!(provider.arity(), 1);
    let value = provider.invoke(&[instance(Config("prod"))]).expect("invokes");
    let service = downcast::<Service>(value).expect("service");
    assert_eq!((service.0).0, "prod");
}

#[test]
fn test_assisted_factory_places_arguments_in_declared_order() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let id = class(&store, "Id");
    let db = class(&store, "Db");
    let presenter = class(&store, "Presenter");
    let index = DeclarationIndex::empty();
    let factory = TypeRef::function(vec![id.clone()], presenter.clone());
    let plan = plan(
        &store,
        &index,
        &app,
        vec![
            CallableRef::new("app.db", db.clone()),
            CallableRef::new("app.presenter", presenter)
                .with_parameter("db", db)
                .with_assisted_parameter("id", id),
        ],
        &[&factory],
    );

    let mut table = FactoryTable::new();
    table
        .register("app.db", |_| Ok(instance(Db(1))))
        .register("app.presenter", |args| {
            let db = arg::<Db>(args, 0)?;
            let id = arg::<u32>(args, 1)?;
            Ok(instance(format!("presenter {} on db {}", id, db.0)))
        });
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let create = downcast::<Function>(root.get(&factory).expect("factory")).expect("function");
    let value = create.invoke(&[instance(9u32)]).expect("invokes");
    assert_eq!(downcast::<String>(value).expect("string").as_str(), "presenter 9 on db 1");
}

#[test]
fn test_child_component_factory_creates_child_instance() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let activity = TypeRef::of(store.declare("ActivityComponent", ClassifierFlags::CHILD_COMPONENT));
    let db = class(&store, "Db");
    let label = class(&store, "Label");
    let name = class(&store, "Name");
    let mut builder = DeclarationIndexBuilder::new();
    builder.component(
        ComponentDescriptor::new(activity.clone())
            .with_declarations(vec![
                CallableRef::new("Activity.label", label.clone())
                    .with_parameter("db", db.clone())
                    .with_parameter("name", name.marked_nullable()),
            ])
            .with_entry_points(vec![label.clone()]),
    );
    let index = builder.build(&store).expect("index");
    let factory = TypeRef::function(vec![db.clone()], activity);
    let plan = plan(&store, &index, &app, Vec::new(), &[&factory]);

    let mut table = FactoryTable::new();
    table.register("Activity.label", |args| {
        let db = arg::<Db>(args, 0)?;
        let name = optional_arg::<String>(args, 1)?;
        Ok(instance(format!("db {} name {:?}", db.0, name.as_deref())))
    });
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let create = downcast::<Function>(root.get(&factory).expect("factory")).expect("function");
    let child = downcast::<ScopeInstance>(create.invoke(&[instance(Db(3))]).expect("creates")).expect("scope");
    assert!(child.parent().is_some_and(|p| Arc::ptr_eq(p, &root)));
    let value = child.get(&label).expect("label");
    assert_eq!(downcast::<String>(value).expect("string").as_str(), "db 3 name None");
}

#[test]
fn test_collections_and_self_binding() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let string = class(&store, "String");
    let plugin = class(&store, "Plugin");
    let index = DeclarationIndex::empty();
    let set = TypeRef::set_of(plugin.clone());
    let map = TypeRef::map_of(string.clone(), plugin.clone());
    let plan = plan(
        &store,
        &index,
        &app,
        vec![
            CallableRef::new("app.first", plugin.clone()).contributing(ContributionKind::SetElement),
            CallableRef::new("app.second", plugin.clone()).contributing(ContributionKind::SetElement),
            CallableRef::new("app.named", plugin.clone()).with_map_key(MapKey::new(string, "named")),
        ],
        &[&set, &map, &app],
    );

    let mut table = FactoryTable::new();
    table
        .register("app.first", |_| Ok(instance("first")))
        .register("app.second", |_| Ok(instance("second")))
        .register("app.named", |_| Ok(instance("named")));
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let elements = downcast::<Vec<Instance>>(root.get(&set).expect("set")).expect("vec");
    let names: Vec<&str> = elements
        .iter()
        .filter_map(|e| e.downcast_ref::<&str>().copied())
        .collect();
    assert_eq!(names, vec!["first", "second"]);

    let entries = downcast::<IndexMap<Arc<str>, Instance>>(root.get(&map).expect("map")).expect("map");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries["named"].downcast_ref::<&str>(), Some(&"named"));

    let itself = downcast::<ScopeInstance>(root.get(&app).expect("self")).expect("scope");
    assert!(Arc::ptr_eq(&itself, &root));
}

#[test]
fn test_interceptor_wraps_factory() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let db = class(&store, "Db");
    let counter = class(&store, "Counter");
    let index = DeclarationIndex::empty();
    let factory = TypeRef::function(Vec::new(), db.clone());
    let plan = plan(
        &store,
        &index,
        &app,
        vec![
            CallableRef::new("app.db", db.clone()),
            CallableRef::new("app.counter", counter.clone()),
            CallableRef::new("app.countDb", factory.clone())
                .with_parameter("counter", counter)
                .with_parameter("factory", factory)
                .contributing(ContributionKind::Interceptor),
        ],
        &[&db],
    );

    let intercepted = Arc::new(AtomicUsize::new(0));
    let mut table = FactoryTable::new();
    let shared = Arc::clone(&intercepted);
    table
        .register("app.db", |_| Ok(instance(Db(5))))
        .register("app.counter", move |_| Ok(instance(Arc::clone(&shared))))
        .register("app.countDb", |args| {
            let counter = arg::<Arc<AtomicUsize>>(args, 0)?;
            let inner = arg::<Function>(args, 1)?;
            Ok(instance(Function::new(0, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                inner.invoke(&[])
            })))
        });
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let value = downcast::<Db>(root.get(&db).expect("db")).expect("type");
    assert_eq!(value.0, 5);
    assert_eq!(intercepted.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cycle_through_provider_evaluates_lazily() {
    struct A(Arc<B>);
    struct B(Arc<Function>);

    let store = ClassifierStore::new();
    let app = component(&store);
    let a = class(&store, "A");
    let b = class(&store, "B");
    let index = DeclarationIndex::empty();
    let plan = plan(
        &store,
        &index,
        &app,
        vec![
            CallableRef::new("app.a", a.clone()).with_parameter("b", b.clone()),
            CallableRef::new("app.b", b).with_parameter("a", TypeRef::function(Vec::new(), a.clone())),
        ],
        &[&a],
    );
    let mut table = FactoryTable::new();
    table
        .register("app.a", |args| Ok(instance(A(arg::<B>(args, 0)?))))
        .register("app.b", |args| Ok(instance(B(arg::<Function>(args, 0)?))));
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let first = downcast::<A>(root.get(&a).expect("a")).expect("type");
    let again = downcast::<A>((first.0).0.invoke(&[]).expect("invokes")).expect("type");
    assert!(!Arc::ptr_eq(&first, &again));
}

#[test]
fn test_star_projected_request_shares_canonical_instance() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let repo = store.declare("Repo", ClassifierFlags::empty());
    let user = class(&store, "User");
    let t = store.type_parameter("repo.T", Vec::new());
    let mut builder = DeclarationIndexBuilder::new();
    builder.add(
        CallableRef::new("app.repo", TypeRef::generic(repo, vec![TypeRef::of(t)]))
            .with_type_parameters(vec![t])
            .scoped_to(app.clone()),
    );
    let index = builder.build(&store).expect("index");
    let star = TypeRef::generic(repo, vec![TypeRef::star()]);
    let concrete = TypeRef::generic(repo, vec![user]);
    let plan = plan(&store, &index, &app, Vec::new(), &[&star, &concrete]);

    let calls = Arc::new(AtomicUsize::new(0));
    let shared = Arc::clone(&calls);
    let mut table = FactoryTable::new();
    table.register("app.repo", move |_| Ok(instance(shared.fetch_add(1, Ordering::SeqCst))));
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let from_star = root.get(&star).expect("star");
    let from_concrete = root.get(&concrete).expect("concrete");
    assert!(Arc::ptr_eq(&from_star, &from_concrete));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_object_and_missing_entries() {
    let store = ClassifierStore::new();
    let app = component(&store);
    let logger = TypeRef::of(store.declare("Logger", ClassifierFlags::OBJECT));
    let db = class(&store, "Db");
    let index = DeclarationIndex::empty();
    let plan = plan(
        &store,
        &index,
        &app,
        vec![CallableRef::new("app.db", db.clone())],
        &[&logger, &db],
    );
    let mut table = FactoryTable::new();
    table.object(logger.clone(), instance("the logger"));
    let runtime = Runtime::new(plan, table);
    let root = runtime.instantiate(ScopeId(0), Vec::new()).expect("instantiates");

    let value = root.get(&logger).expect("object");
    assert_eq!(value.downcast_ref::<&str>(), Some(&"the logger"));
    assert!(matches!(root.get(&db), Err(RuntimeError::MissingFactory { .. })));
    let unknown = TypeRef::set_of(db);
    assert!(matches!(root.get(&unknown), Err(RuntimeError::MissingBinding { .. })));
}
