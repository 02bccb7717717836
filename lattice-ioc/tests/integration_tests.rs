//! Integration tests for the IoC container

use lattice_ioc::actions::Action;
use lattice_ioc::prelude::*;
use lattice_ioc::{
    AfterInit, BeforeInit, OnDestroy, ResolutionContext, TokenKey, TypeKey,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

// Test services

#[derive(Clone)]
struct Logger {
    name: String,
}

struct AppService {
    log: Arc<Logger>,
}

struct Foo(u32);
struct Bar(u32);

struct Pair {
    a: Option<Arc<Foo>>,
    b: Option<Arc<Bar>>,
}

fn define_logger(registry: &TypeRegistry) {
    registry.define(
        TypeRegistration::<Logger>::injectable()
            .singleton()
            .construct(|_| {
                Ok(Logger {
                    name: "root".to_string(),
                })
            }),
    );
}

fn define_app_service(registry: &TypeRegistry) {
    registry.define(
        TypeRegistration::<AppService>::injectable()
            .param::<Logger>("log")
            .construct(|args| {
                Ok(AppService {
                    log: arg::<Logger>(args, 0).expect("logger injected"),
                })
            }),
    );
}

fn define_foo_bar(registry: &TypeRegistry) {
    registry.define(TypeRegistration::<Foo>::injectable().construct(|_| Ok(Foo(1))));
    registry.define(TypeRegistration::<Bar>::injectable().construct(|_| Ok(Bar(2))));
}

#[test]
fn idempotent_registration() {
    init_tracing();
    let container = Container::new();
    define_logger(container.registry());

    container.register::<Logger>().unwrap();
    container.register::<Logger>().unwrap();

    let first = container.resolve::<Logger>(&[]).unwrap().unwrap();
    let second = container.resolve::<Logger>(&[]).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn register_value_keeps_first_registration() {
    let container = Container::new();
    let token = Token::name("answer");
    container
        .register_value(&token, Arc::new(41u32))
        .unwrap();
    container
        .register_value(&token, Arc::new(42u32))
        .unwrap();

    let value = container.resolve_token(&token, &[]).unwrap().unwrap();
    assert_eq!(*lattice_ioc::downcast_shared::<u32>(&value).unwrap(), 41);
}

#[test]
fn singleton_stability_same_container() {
    let container = Container::new();
    define_logger(container.registry());
    container.register::<Logger>().unwrap();

    let a = container.resolve::<Logger>(&[]).unwrap().unwrap();
    let b = container.resolve::<Logger>(&[]).unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn sibling_children_pin_distinct_singletons() {
    let root = Container::new();
    define_logger(root.registry());

    let left = root.create_child();
    let right = root.create_child();
    left.register::<Logger>().unwrap();
    right.register::<Logger>().unwrap();

    let from_left = left.resolve::<Logger>(&[]).unwrap().unwrap();
    let from_right = right.resolve::<Logger>(&[]).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&from_left, &from_right));
}

#[test]
fn hierarchical_fallback_is_one_way() {
    struct ChildOnly;

    let parent = Container::new();
    define_logger(parent.registry());
    parent.registry().define(
        TypeRegistration::<ChildOnly>::injectable().construct(|_| Ok(ChildOnly)),
    );
    parent.register::<Logger>().unwrap();

    let child = parent.create_child();
    child.register::<ChildOnly>().unwrap();

    // Child sees the parent's token.
    assert!(child.resolve::<Logger>(&[]).unwrap().is_some());
    // Parent never sees the child's.
    assert!(parent.resolve::<ChildOnly>(&[]).unwrap().is_none());
}

#[test]
fn transient_services_share_the_singleton_dependency() {
    // Two resolves give two services carrying the identical logger.
    let container = Container::new();
    define_logger(container.registry());
    define_app_service(container.registry());
    container.register::<Logger>().unwrap();
    container.register::<AppService>().unwrap();

    let first = container.resolve::<AppService>(&[]).unwrap().unwrap();
    let second = container.resolve::<AppService>(&[]).unwrap().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.log, &second.log));
    assert_eq!(first.log.name, "root");
}

#[test]
fn parameter_order_survives_single_override() {
    let container = Container::new();
    define_foo_bar(container.registry());
    container.registry().define(
        TypeRegistration::<Pair>::injectable()
            .param::<Foo>("a")
            .param::<Bar>("b")
            .inject(Token::name("special_b"))
            .construct(|args| {
                Ok(Pair {
                    a: arg::<Foo>(args, 0),
                    b: arg::<Bar>(args, 1),
                })
            }),
    );
    container
        .register_value(&Token::name("special_b"), Arc::new(Bar(99)))
        .unwrap();
    container.register::<Pair>().unwrap();

    let pair = container.resolve::<Pair>(&[]).unwrap().unwrap();
    assert_eq!(pair.a.as_ref().unwrap().0, 1);
    assert_eq!(pair.b.as_ref().unwrap().0, 99);
}

#[test]
fn provider_precedence_name_type_position() {
    let container = Container::new();
    define_foo_bar(container.registry());
    container.registry().define(
        TypeRegistration::<Pair>::injectable()
            .param::<Foo>("a")
            .param::<Bar>("b")
            .construct(|args| {
                Ok(Pair {
                    a: arg::<Foo>(args, 0),
                    b: arg::<Bar>(args, 1),
                })
            }),
    );
    container.register::<Pair>().unwrap();

    // Name match beats everything.
    let pair = container
        .resolve::<Pair>(&[Provider::named("a", Foo(7))])
        .unwrap()
        .unwrap();
    assert_eq!(pair.a.as_ref().unwrap().0, 7);
    assert_eq!(pair.b.as_ref().unwrap().0, 2);

    // Declared-type match.
    let pair = container
        .resolve::<Pair>(&[Provider::value(Token::of::<Bar>(), Bar(55))])
        .unwrap()
        .unwrap();
    assert_eq!(pair.b.as_ref().unwrap().0, 55);

    // Positional match fills what name and type do not.
    let pair = container
        .resolve::<Pair>(&[Provider::pos(0, Foo(8))])
        .unwrap()
        .unwrap();
    assert_eq!(pair.a.as_ref().unwrap().0, 8);
}

#[test]
fn missing_use_existing_is_skipped_not_fatal() {
    init_tracing();
    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Pair>::injectable()
            .param::<Foo>("a")
            .param::<Bar>("b")
            .construct(|args| {
                Ok(Pair {
                    a: arg::<Foo>(args, 0),
                    b: arg::<Bar>(args, 1),
                })
            }),
    );
    define_foo_bar(container.registry());
    container.register::<Pair>().unwrap();

    let pair = container
        .resolve::<Pair>(&[Provider::existing(
            Token::of::<Foo>(),
            Token::name("nowhere"),
        )])
        .unwrap()
        .unwrap();

    // The broken provider was dropped; the slot fell back to the
    // container and construction continued.
    assert_eq!(pair.a.as_ref().unwrap().0, 1);
    assert_eq!(pair.b.as_ref().unwrap().0, 2);
}

#[test]
fn factory_provider_resolves_deps_eagerly() {
    let container = Container::new();
    define_foo_bar(container.registry());
    container.registry().define(
        TypeRegistration::<Pair>::injectable()
            .param::<Foo>("a")
            .param::<Bar>("b")
            .construct(|args| {
                Ok(Pair {
                    a: arg::<Foo>(args, 0),
                    b: arg::<Bar>(args, 1),
                })
            }),
    );
    container.register::<Pair>().unwrap();

    let provider = Provider::factory(
        Token::of::<Bar>(),
        vec![Token::of::<Foo>()],
        |deps| {
            let foo = arg::<Foo>(deps, 0).expect("dep resolved before factory");
            Ok(Arc::new(Bar(foo.0 + 100)))
        },
    );
    let pair = container.resolve::<Pair>(&[provider]).unwrap().unwrap();
    assert_eq!(pair.b.as_ref().unwrap().0, 101);
}

#[test]
fn unregistered_token_resolves_to_none() {
    let container = Container::new();
    assert!(container.resolve::<Logger>(&[]).unwrap().is_none());
    assert!(container
        .resolve_value(&Token::name("ghost"), &[])
        .unwrap()
        .is_none());
}

#[test]
fn register_unknown_type_is_invalid_target() {
    struct Undescribed;
    let container = Container::new();
    let result = container.register::<Undescribed>();
    assert!(matches!(result, Err(DiError::InvalidTarget { .. })));
}

#[test]
fn abstract_type_is_invalid_target() {
    struct AbstractBase;
    let container = Container::new();
    container.registry().define(
        TypeRegistration::<AbstractBase>::injectable()
            .abstract_type()
            .construct(|_| Ok(AbstractBase)),
    );
    let result = container.register::<AbstractBase>();
    assert!(matches!(result, Err(DiError::InvalidTarget { .. })));
}

#[test]
fn bind_provider_flattens_alias_chains() {
    let container = Container::new();
    define_logger(container.registry());
    container.register::<Logger>().unwrap();

    container
        .bind_provider(&Token::name("logger"), &Token::of::<Logger>())
        .unwrap();
    // A second alias pointing at the first flattens to the class.
    container
        .bind_provider(&Token::name("log2"), &Token::name("logger"))
        .unwrap();

    let impl_key = container.get_token_impl(&Token::name("log2")).unwrap();
    assert_eq!(impl_key.id, TypeKey::of::<Logger>().id);

    let via_alias = container
        .resolve_token(&Token::name("log2"), &[])
        .unwrap()
        .unwrap();
    assert!(lattice_ioc::downcast_shared::<Logger>(&via_alias).is_some());
}

#[test]
fn bind_provider_to_unbound_alias_fails_fast() {
    let container = Container::new();
    let result = container.bind_provider(&Token::name("a"), &Token::name("never-bound"));
    assert!(matches!(result, Err(DiError::InvalidTarget { .. })));
}

#[test]
fn provide_as_registers_alias_at_design_time() {
    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Logger>::injectable()
            .singleton()
            .provide_as(Token::of::<Logger>(), "audit")
            .construct(|_| {
                Ok(Logger {
                    name: "audit".to_string(),
                })
            }),
    );
    container.register::<Logger>().unwrap();

    let resolved = container
        .resolve_token(&Token::registration::<Logger>("audit"), &[])
        .unwrap()
        .unwrap();
    let logger = lattice_ioc::downcast_shared::<Logger>(&resolved).unwrap();
    assert_eq!(logger.name, "audit");
}

#[test]
fn extends_chain_answers_through_token_impl() {
    struct Base;
    struct Derived;

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Base>::injectable()
            .abstract_type()
            .construct(|_| Ok(Base)),
    );
    container.registry().define(
        TypeRegistration::<Derived>::injectable()
            .extends::<Base>()
            .construct(|_| Ok(Derived)),
    );
    container.register::<Derived>().unwrap();
    container
        .bind_provider(&Token::name("base impl"), &Token::of::<Derived>())
        .unwrap();

    let chain = container.get_token_extends_chain(&Token::name("base impl"));
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].id, TypeKey::of::<Derived>().id);
    assert_eq!(chain[1].id, TypeKey::of::<Base>().id);
}

#[test]
fn invoke_fills_method_arguments() {
    struct Greeter {
        word: String,
    }

    let container = Container::new();
    define_logger(container.registry());
    container.registry().define(
        TypeRegistration::<Greeter>::injectable()
            .construct(|_| {
                Ok(Greeter {
                    word: "hello".to_string(),
                })
            })
            .method("greet", |t, args| {
                let log = arg::<Logger>(args, 0).expect("logger arg");
                Ok(Some(Arc::new(format!("{} from {}", t.word, log.name))))
            })
            .method_param::<Logger>("log"),
    );
    container.register::<Logger>().unwrap();
    container.register::<Greeter>().unwrap();

    let result = container
        .sync_invoke(&Token::of::<Greeter>(), "greet", &[])
        .unwrap()
        .unwrap();
    let text = lattice_ioc::downcast_shared::<String>(&result).unwrap();
    assert_eq!(&*text, "hello from root");
}

#[test]
fn invoke_missing_method_fails_fast() {
    let container = Container::new();
    define_logger(container.registry());
    container.register::<Logger>().unwrap();

    let result = container.sync_invoke(&Token::of::<Logger>(), "nope", &[]);
    assert!(matches!(result, Err(DiError::MethodNotFound { .. })));
}

#[tokio::test]
async fn invoke_is_the_async_face_of_sync_invoke() {
    struct Echo;

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Echo>::injectable()
            .construct(|_| Ok(Echo))
            .method("ping", |_, _| Ok(Some(Arc::new("pong".to_string())))),
    );
    container.register::<Echo>().unwrap();

    let result = container
        .invoke(&Token::of::<Echo>(), "ping", &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        &*lattice_ioc::downcast_shared::<String>(&result).unwrap(),
        "pong"
    );
}

#[test]
fn property_injection_prefers_provider_map() {
    struct Holder {
        dep: Option<Arc<Foo>>,
    }

    let container = Container::new();
    define_foo_bar(container.registry());
    container.registry().define(
        TypeRegistration::<Holder>::injectable()
            .construct(|_| Ok(Holder { dep: None }))
            .property::<Foo>("dep", |t, v| t.dep = Some(v)),
    );
    container.register::<Holder>().unwrap();

    // Container-resolved.
    let holder = container.resolve::<Holder>(&[]).unwrap().unwrap();
    assert_eq!(holder.dep.as_ref().unwrap().0, 1);

    // Provider map wins over the container.
    let holder = container
        .resolve::<Holder>(&[Provider::named("dep", Foo(42))])
        .unwrap()
        .unwrap();
    assert_eq!(holder.dep.as_ref().unwrap().0, 42);
}

#[test]
fn lifecycle_hooks_run_in_order() {
    struct Hooked {
        order: Vec<&'static str>,
    }
    impl BeforeInit for Hooked {
        fn before_init(&mut self) {
            self.order.push("before");
        }
    }
    impl AfterInit for Hooked {
        fn after_init(&mut self) {
            self.order.push("after");
        }
    }

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Hooked>::injectable()
            .construct(|_| Ok(Hooked { order: vec![] }))
            .with_before_init()
            .with_after_init(),
    );
    container.register::<Hooked>().unwrap();

    let hooked = container.resolve::<Hooked>(&[]).unwrap().unwrap();
    assert_eq!(hooked.order, vec!["before", "after"]);
}

#[test]
fn expiring_types_short_circuit_within_ttl() {
    struct Session(#[allow(dead_code)] u32);

    let mut builder = lattice_ioc::ContainerBuilder::new();
    builder.sweep_interval(Duration::from_millis(20));
    builder.register(
        TypeRegistration::<Session>::injectable()
            .expires_ms(200)
            .construct(|_| Ok(Session(0))),
    );
    let container = builder.build().unwrap();

    let first = container.resolve::<Session>(&[]).unwrap().unwrap();
    let second = container.resolve::<Session>(&[]).unwrap().unwrap();
    // Cache hit: identical instance, no reconstruction.
    assert!(Arc::ptr_eq(&first, &second));

    std::thread::sleep(Duration::from_millis(400));
    let third = container.resolve::<Session>(&[]).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn cache_eviction_runs_destroy_hook_once() {
    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    struct Session;
    impl OnDestroy for Session {
        fn on_destroy(&self) {
            DESTROYED.fetch_add(1, Ordering::SeqCst);
        }
    }

    let mut builder = lattice_ioc::ContainerBuilder::new();
    builder.sweep_interval(Duration::from_millis(20));
    builder.register(
        TypeRegistration::<Session>::injectable()
            .expires_ms(80)
            .construct(|_| Ok(Session))
            .with_on_destroy(),
    );
    let container = builder.build().unwrap();

    let instance = container.resolve::<Session>(&[]).unwrap().unwrap();
    drop(instance);

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    assert!(container.cache().is_empty());
}

#[test]
fn root_aspects_observe_child_constructions() {
    struct Counting {
        count: Arc<AtomicUsize>,
    }
    impl Action for Counting {
        fn execute(
            &self,
            _container: &Container,
            _ctx: &mut ResolutionContext,
        ) -> DiResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let root = Container::new();
    define_foo_bar(root.registry());
    let count = Arc::new(AtomicUsize::new(0));
    root.life_scope()
        .add_before_constructor(Arc::new(Counting {
            count: count.clone(),
        }));

    let child = root.create_child();
    child.register::<Foo>().unwrap();
    child.resolve::<Foo>(&[]).unwrap().unwrap();

    // The aspect registered on the root fired for the child's
    // construction.
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn autorun_fires_for_singletons_at_registration() {
    static RUNS: AtomicUsize = AtomicUsize::new(0);

    struct Boot;

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Boot>::injectable()
            .singleton()
            .autorun("setup")
            .construct(|_| Ok(Boot))
            .method("setup", |_, _| {
                RUNS.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }),
    );
    container.register::<Boot>().unwrap();

    assert_eq!(RUNS.load(Ordering::SeqCst), 1);
    // Registration is idempotent, so autorun cannot fire again.
    container.register::<Boot>().unwrap();
    assert_eq!(RUNS.load(Ordering::SeqCst), 1);
}

#[test]
fn unregister_removes_and_destroys() {
    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    struct Pinned;
    impl OnDestroy for Pinned {
        fn on_destroy(&self) {
            DESTROYED.fetch_add(1, Ordering::SeqCst);
        }
    }

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Pinned>::injectable()
            .singleton()
            .construct(|_| Ok(Pinned))
            .with_on_destroy(),
    );
    container.register::<Pinned>().unwrap();
    container.resolve::<Pinned>(&[]).unwrap().unwrap();

    container.unregister(&Token::of::<Pinned>());
    assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    assert!(!container.has_register(&TokenKey::Type(
        std::any::TypeId::of::<Pinned>()
    )));
    assert!(container.resolve::<Pinned>(&[]).unwrap().is_none());
}

#[test]
fn third_party_decorators_carry_metadata_and_actions() {
    struct Audited;

    let container = Container::new();
    container
        .life_scope()
        .register_decorator("Audited", &["runtime.on_init"]);
    assert_eq!(
        container.life_scope().decorator_paths("Audited"),
        vec!["runtime.on_init".to_string()]
    );

    container.registry().define(
        TypeRegistration::<Audited>::injectable()
            .decorate("Audited")
            .construct(|_| Ok(Audited)),
    );
    container.register::<Audited>().unwrap();

    let records = container
        .registry()
        .get_own_type_metadata("Audited", std::any::TypeId::of::<Audited>());
    assert_eq!(records.len(), 1);
    // The extra decorator does not disturb construction.
    assert!(container.resolve::<Audited>(&[]).unwrap().is_some());
}

#[test]
fn builder_modules_bundle_registrations() {
    use lattice_ioc::{BuilderModule, ContainerBuilder};

    struct LoggingModule;
    impl BuilderModule for LoggingModule {
        fn configure(&self, builder: &mut ContainerBuilder) {
            builder.register(
                TypeRegistration::<Logger>::injectable()
                    .singleton()
                    .construct(|_| {
                        Ok(Logger {
                            name: "module".to_string(),
                        })
                    }),
            );
        }
    }

    let container = ContainerBuilder::new()
        .add_module(LoggingModule)
        .build()
        .unwrap();

    let logger = container.resolve::<Logger>(&[]).unwrap().unwrap();
    assert_eq!(logger.name, "module");
}

#[test]
fn dispose_drains_singletons_through_destroy_hooks() {
    static DESTROYED: AtomicUsize = AtomicUsize::new(0);

    struct Held;
    impl OnDestroy for Held {
        fn on_destroy(&self) {
            DESTROYED.fetch_add(1, Ordering::SeqCst);
        }
    }

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Held>::injectable()
            .singleton()
            .construct(|_| Ok(Held))
            .with_on_destroy(),
    );
    container.register::<Held>().unwrap();
    container.resolve::<Held>(&[]).unwrap().unwrap();

    container.dispose();
    assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    assert!(container.resolve::<Held>(&[]).unwrap().is_none());
}

#[test]
fn method_providers_feed_invoke_arguments() {
    struct Calc;

    let container = Container::new();
    container.registry().define(
        TypeRegistration::<Calc>::injectable()
            .construct(|_| Ok(Calc))
            .method("double", |_, args| {
                let n = arg::<Foo>(args, 0).expect("provided arg");
                Ok(Some(Arc::new(Foo(n.0 * 2))))
            })
            .method_param::<Foo>("n")
            .method_providers(vec![Provider::named("n", Foo(21))]),
    );
    container.register::<Calc>().unwrap();

    let result = container
        .sync_invoke(&Token::of::<Calc>(), "double", &[])
        .unwrap()
        .unwrap();
    assert_eq!(lattice_ioc::downcast_shared::<Foo>(&result).unwrap().0, 42);

    // Call-site providers override the method's own.
    let result = container
        .sync_invoke(&Token::of::<Calc>(), "double", &[Provider::named("n", Foo(5))])
        .unwrap()
        .unwrap();
    assert_eq!(lattice_ioc::downcast_shared::<Foo>(&result).unwrap().0, 10);
}

#[cfg(feature = "config")]
#[test]
fn manifest_applies_against_the_registry() {
    use lattice_ioc::config::ContainerConfig;

    let container = Container::new();
    define_logger(container.registry());

    let manifest = r#"
        [[services]]
        service = "log"
        implement = "Logger"
        lifetime = "singleton"
    "#;
    ContainerConfig::from_toml(manifest)
        .unwrap()
        .apply(&container)
        .unwrap();

    let via_name = container
        .resolve_token(&Token::name("log"), &[])
        .unwrap()
        .unwrap();
    let logger = lattice_ioc::downcast_shared::<Logger>(&via_name).unwrap();
    assert_eq!(logger.name, "root");
}
