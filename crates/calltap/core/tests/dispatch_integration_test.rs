// Calltap
// Copyright (C) 2025 Calltap

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! End-to-end dispatch behavior: pairing, fail-open isolation, skip
//! precedence, argument visibility, error routing and return-value
//! composition across interceptor chains.

use calltap_core::{
    Args, AttachmentSlot, BusinessError, CallDescriptor, ConstructorInterceptor, InstanceMethodInterceptor,
    InstrumentedInstance, InterceptContext, InterceptError, InterceptorBinding, InterceptorChain,
    RegistryResolver, ScopeId, StaticMethodInterceptor, Value,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
struct IllegalArgument(String);

/// Receiver used by the instance-method and constructor scenarios.
#[derive(Default)]
struct Greeter {
    attachment: AttachmentSlot,
}

impl InstrumentedInstance for Greeter {
    fn attachment(&self) -> Option<Value> {
        self.attachment.get()
    }

    fn set_attachment(&self, value: Value) {
        self.attachment.set(value)
    }
}

/// The instrumented body: `greet(name)` returns `"Hi, {name}"` and refuses
/// cats.
fn greet_body(args: &mut Args) -> Result<Value, BusinessError> {
    let name = args.get(0).and_then(Value::as_str).unwrap_or("").to_owned();
    if name.contains("Cat") {
        return Err(Box::new(IllegalArgument("Invalid".to_owned())));
    }
    Ok(Value::from(format!("Hi, {name}")))
}

fn greet_descriptor() -> CallDescriptor {
    CallDescriptor::instance_method("Greeter", "greet", &["string"])
}

/// Instance-method interceptor with observable counters and configurable
/// behavior, driven by which fields are set.
#[derive(Default)]
struct Recording {
    before_calls: AtomicUsize,
    after_calls: AtomicUsize,
    error_calls: AtomicUsize,
    seen_arg0: Mutex<Option<Value>>,
    seen_attachment: Mutex<Option<Value>>,
    seen_error: Mutex<Option<String>>,
    skip_with: Option<Value>,
    set_arg0: Option<Value>,
    append_on_after: Option<String>,
    fail_before: bool,
    fail_after: bool,
    fail_on_error: bool,
}

impl InstanceMethodInterceptor for Recording {
    fn before_call(
        &self,
        instance: &dyn InstrumentedInstance,
        _descriptor: &CallDescriptor,
        args: &mut Args,
        context: &mut InterceptContext,
    ) -> Result<(), InterceptError> {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_arg0.lock().unwrap() = args.get(0).cloned();
        *self.seen_attachment.lock().unwrap() = instance.attachment();
        if let Some(value) = &self.set_arg0 {
            args.set(0, value.clone()).unwrap();
        }
        if let Some(value) = &self.skip_with {
            context.define_return_value(value.clone());
        }
        if self.fail_before {
            return Err("before_call exploded".into());
        }
        Ok(())
    }

    fn after_call(
        &self,
        _instance: &dyn InstrumentedInstance,
        _descriptor: &CallDescriptor,
        _args: &Args,
        return_value: Value,
    ) -> Result<Value, InterceptError> {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_after {
            return Err("after_call exploded".into());
        }
        match &self.append_on_after {
            Some(suffix) => Ok(Value::from(format!(
                "{}{}",
                return_value.as_str().unwrap_or(""),
                suffix
            ))),
            None => Ok(return_value),
        }
    }

    fn on_error(
        &self,
        _instance: &dyn InstrumentedInstance,
        _descriptor: &CallDescriptor,
        _args: &Args,
        error: &BusinessError,
    ) -> Result<(), InterceptError> {
        self.error_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_error.lock().unwrap() = Some(error.to_string());
        if self.fail_on_error {
            return Err("on_error exploded".into());
        }
        Ok(())
    }
}

fn register(resolver: &RegistryResolver, name: &str, interceptor: &Arc<Recording>) {
    let instance = Arc::clone(interceptor);
    resolver.register_instance(name, move || {
        let shared: Arc<dyn InstanceMethodInterceptor> = instance.clone();
        Ok(shared)
    });
}

/// Chain over the given interceptors, bound in order under one scope.
fn chain_of(interceptors: &[(&str, &Arc<Recording>)]) -> InterceptorChain {
    let resolver = Arc::new(RegistryResolver::new());
    let scope = ScopeId::new("test-scope");
    let mut chain = InterceptorChain::new(resolver.clone());
    for (name, interceptor) in interceptors {
        register(&resolver, name, interceptor);
        chain.push_binding(InterceptorBinding::new(*name, scope.clone()));
    }
    chain
}

#[test]
fn test_skip_overrides_return_value_and_body_never_runs() {
    let interceptor = Arc::new(Recording {
        skip_with: Some(Value::from("Reject: Tom")),
        ..Default::default()
    });
    let chain = chain_of(&[("rejecting", &interceptor)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);
    let body_ran = AtomicBool::new(false);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, |args| {
            body_ran.store(true, Ordering::SeqCst);
            greet_body(args)
        })
        .unwrap();

    assert_eq!(result, Value::from("Reject: Tom"));
    assert!(!body_ran.load(Ordering::SeqCst));
    assert_eq!(interceptor.before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(interceptor.after_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_after_call_still_transforms_a_skip_override() {
    let interceptor = Arc::new(Recording {
        skip_with: Some(Value::from("Reject: Tom")),
        append_on_after: Some(" (checked)".to_owned()),
        ..Default::default()
    });
    let chain = chain_of(&[("rejecting", &interceptor)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    assert_eq!(result, Value::from("Reject: Tom (checked)"));
}

#[test]
fn test_entry_exit_pairing_holds_across_outcomes() {
    // Skipping chain: both interceptors still enter and exit once.
    let skipper = Arc::new(Recording {
        skip_with: Some(Value::from("skipped")),
        ..Default::default()
    });
    let bystander = Arc::new(Recording::default());
    let chain = chain_of(&[("skipper", &skipper), ("bystander", &bystander)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);
    chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    // Failing entry hook: still paired.
    let broken = Arc::new(Recording {
        fail_before: true,
        ..Default::default()
    });
    let chain = chain_of(&[("broken", &broken)]);
    let mut args = Args::new(vec![Value::from("Tom")]);
    chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    // Failing body: still paired, with one on_error in between.
    let observer = Arc::new(Recording::default());
    let chain = chain_of(&[("observer", &observer)]);
    let mut args = Args::new(vec![Value::from("Cat")]);
    chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap_err();

    for interceptor in [&skipper, &bystander, &broken, &observer] {
        assert_eq!(
            interceptor.before_calls.load(Ordering::SeqCst),
            interceptor.after_calls.load(Ordering::SeqCst),
        );
    }
    assert_eq!(observer.error_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_before_call_is_fail_open_and_rolls_back_arguments() {
    let interceptor = Arc::new(Recording {
        set_arg0: Some(Value::from("Hacked")),
        fail_before: true,
        ..Default::default()
    });
    let chain = chain_of(&[("broken", &interceptor)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    // The body ran with the original argument and no failure surfaced.
    assert_eq!(result, Value::from("Hi, Tom"));
    assert_eq!(args.get(0), Some(&Value::from("Tom")));
}

#[test]
fn test_first_skip_wins_and_later_entries_still_run() {
    let first = Arc::new(Recording {
        skip_with: Some(Value::from("X")),
        ..Default::default()
    });
    let second = Arc::new(Recording {
        skip_with: Some(Value::from("Y")),
        ..Default::default()
    });
    let chain = chain_of(&[("first", &first), ("second", &second)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);
    let body_ran = AtomicBool::new(false);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, |args| {
            body_ran.store(true, Ordering::SeqCst);
            greet_body(args)
        })
        .unwrap();

    assert_eq!(result, Value::from("X"));
    assert!(!body_ran.load(Ordering::SeqCst));
    assert_eq!(second.before_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_argument_mutations_are_visible_down_the_chain_and_to_the_body() {
    let mutator = Arc::new(Recording {
        set_arg0: Some(Value::from("Tom boy")),
        ..Default::default()
    });
    let witness = Arc::new(Recording::default());
    let chain = chain_of(&[("mutator", &mutator), ("witness", &witness)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    assert_eq!(
        *witness.seen_arg0.lock().unwrap(),
        Some(Value::from("Tom boy"))
    );
    assert_eq!(result, Value::from("Hi, Tom boy"));
}

#[test]
fn test_business_error_is_observed_by_every_entry_and_rethrown_unchanged() {
    let first = Arc::new(Recording::default());
    let second = Arc::new(Recording::default());
    let chain = chain_of(&[("first", &first), ("second", &second)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Cat")]);

    let err = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap_err();

    assert_eq!(first.error_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.error_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *first.seen_error.lock().unwrap(),
        Some("Invalid".to_owned())
    );
    let illegal = err.downcast_ref::<IllegalArgument>().unwrap();
    assert_eq!(illegal.to_string(), "Invalid");
}

#[test]
fn test_skip_prevents_the_body_error_entirely() {
    let skipper = Arc::new(Recording {
        skip_with: Some(Value::from("saved")),
        ..Default::default()
    });
    let chain = chain_of(&[("skipper", &skipper)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Cat")]);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    assert_eq!(result, Value::from("saved"));
    assert_eq!(skipper.error_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_after_call_composes_left_to_right() {
    let boy = Arc::new(Recording {
        append_on_after: Some(" boy".to_owned()),
        ..Default::default()
    });
    let girl = Arc::new(Recording {
        append_on_after: Some(" girl".to_owned()),
        ..Default::default()
    });
    let chain = chain_of(&[("boy", &boy), ("girl", &girl)]);
    let greeter = Greeter::default();
    let mut args = Args::empty();

    let result = chain
        .dispatch_instance(
            &CallDescriptor::instance_method("Greeter", "hello", &[]),
            &greeter,
            &mut args,
            |_| Ok(Value::from("Hi")),
        )
        .unwrap();

    assert_eq!(result, Value::from("Hi boy girl"));
}

#[test]
fn test_failing_after_call_keeps_the_last_known_good_value() {
    let boy = Arc::new(Recording {
        append_on_after: Some(" boy".to_owned()),
        ..Default::default()
    });
    let broken = Arc::new(Recording {
        fail_after: true,
        ..Default::default()
    });
    let bang = Arc::new(Recording {
        append_on_after: Some("!".to_owned()),
        ..Default::default()
    });
    let chain = chain_of(&[("boy", &boy), ("broken", &broken), ("bang", &bang)]);
    let greeter = Greeter::default();
    let mut args = Args::empty();

    let result = chain
        .dispatch_instance(
            &CallDescriptor::instance_method("Greeter", "hello", &[]),
            &greeter,
            &mut args,
            |_| Ok(Value::from("Hi")),
        )
        .unwrap();

    assert_eq!(result, Value::from("Hi boy!"));
}

#[test]
fn test_failing_on_error_masks_nothing() {
    let fragile = Arc::new(Recording {
        fail_on_error: true,
        ..Default::default()
    });
    let witness = Arc::new(Recording::default());
    let chain = chain_of(&[("fragile", &fragile), ("witness", &witness)]);
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Cat")]);

    let err = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap_err();

    // The on_error failure neither masked the business error nor stopped
    // the rest of exit dispatch.
    assert!(err.downcast_ref::<IllegalArgument>().is_some());
    assert_eq!(fragile.after_calls.load(Ordering::SeqCst), 1);
    assert_eq!(witness.error_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unresolvable_binding_dispatches_as_no_op() {
    let resolver = Arc::new(RegistryResolver::new());
    let scope = ScopeId::new("test-scope");
    let witness = Arc::new(Recording::default());
    register(&resolver, "witness", &witness);

    let chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("missing", scope.clone()))
        .with_binding(InterceptorBinding::new("witness", scope));
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    assert_eq!(result, Value::from("Hi, Tom"));
    assert_eq!(witness.before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(witness.after_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_factory_dispatches_as_no_op() {
    let resolver = Arc::new(RegistryResolver::new());
    let scope = ScopeId::new("test-scope");
    resolver.register_instance("refuses", || Err("init refused".into()));

    let chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("refuses", scope));
    let greeter = Greeter::default();
    let mut args = Args::new(vec![Value::from("Tom")]);

    let result = chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    assert_eq!(result, Value::from("Hi, Tom"));
}

#[test]
fn test_split_phase_dispatch_matches_the_closure_driver() {
    let interceptor = Arc::new(Recording {
        skip_with: Some(Value::from("Reject: Tom")),
        ..Default::default()
    });
    let chain = chain_of(&[("rejecting", &interceptor)]);
    let greeter = Greeter::default();
    let descriptor = greet_descriptor();
    let mut args = Args::new(vec![Value::from("Tom")]);

    // What a binary-rewriting collaborator emits: enter, conditionally run
    // the body, always exit.
    let enter = chain.enter_instance(&descriptor, &greeter, &mut args);
    assert!(!enter.proceed());
    assert_eq!(enter.override_value(), Some(&Value::from("Reject: Tom")));

    let result = chain.exit_instance(&descriptor, &greeter, &args, Value::Null, None, enter);
    assert_eq!(result, Value::from("Reject: Tom"));
    assert_eq!(interceptor.before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(interceptor.after_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_one_binding_per_scope_instantiates_separately() {
    let resolver = Arc::new(RegistryResolver::new());
    let instantiations = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&instantiations);
    resolver.register_instance("shared", move || {
        count.fetch_add(1, Ordering::SeqCst);
        let shared: Arc<dyn InstanceMethodInterceptor> = Arc::new(Recording::default());
        Ok(shared)
    });

    let chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("shared", ScopeId::new("plugin-a")))
        .with_binding(InterceptorBinding::new("shared", ScopeId::new("plugin-b")));
    let greeter = Greeter::default();

    for _ in 0..3 {
        let mut args = Args::new(vec![Value::from("Tom")]);
        chain
            .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
            .unwrap();
    }

    // One instance per (name, scope), reused across all three dispatches.
    assert_eq!(instantiations.load(Ordering::SeqCst), 2);
}

/// Static-method interceptor used by the static dispatch tests.
#[derive(Default)]
struct StaticRecording {
    before_calls: AtomicUsize,
    after_calls: AtomicUsize,
    skip_with: Option<Value>,
    append_on_after: Option<String>,
}

impl StaticMethodInterceptor for StaticRecording {
    fn before_call(
        &self,
        _descriptor: &CallDescriptor,
        _args: &mut Args,
        context: &mut InterceptContext,
    ) -> Result<(), InterceptError> {
        self.before_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(value) = &self.skip_with {
            context.define_return_value(value.clone());
        }
        Ok(())
    }

    fn after_call(
        &self,
        _descriptor: &CallDescriptor,
        _args: &Args,
        return_value: Value,
    ) -> Result<Value, InterceptError> {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        match &self.append_on_after {
            Some(suffix) => Ok(Value::from(format!(
                "{}{}",
                return_value.as_str().unwrap_or(""),
                suffix
            ))),
            None => Ok(return_value),
        }
    }
}

#[test]
fn test_static_dispatch_skip_and_composition() {
    let resolver = Arc::new(RegistryResolver::new());
    let scope = ScopeId::new("test-scope");
    let skipper = Arc::new(StaticRecording {
        skip_with: Some(Value::from("cached")),
        ..Default::default()
    });
    let decorator = Arc::new(StaticRecording {
        append_on_after: Some(" [hit]".to_owned()),
        ..Default::default()
    });
    for (name, interceptor) in [("skipper", &skipper), ("decorator", &decorator)] {
        let instance = Arc::clone(interceptor);
        resolver.register_static(name, move || {
            let shared: Arc<dyn StaticMethodInterceptor> = instance.clone();
            Ok(shared)
        });
    }

    let chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("skipper", scope.clone()))
        .with_binding(InterceptorBinding::new("decorator", scope));
    let descriptor = CallDescriptor::static_method("Cache", "lookup", &["string"]);
    let mut args = Args::new(vec![Value::from("key")]);
    let body_ran = AtomicBool::new(false);

    let result = chain
        .dispatch_static(&descriptor, &mut args, |_| {
            body_ran.store(true, Ordering::SeqCst);
            Ok(Value::from("fresh"))
        })
        .unwrap();

    assert_eq!(result, Value::from("cached [hit]"));
    assert!(!body_ran.load(Ordering::SeqCst));
    assert_eq!(skipper.before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(skipper.after_calls.load(Ordering::SeqCst), 1);
    assert_eq!(decorator.before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(decorator.after_calls.load(Ordering::SeqCst), 1);
}

/// Constructor interceptor that tags the new instance through its
/// attachment slot.
#[derive(Default)]
struct Tagging {
    calls: AtomicUsize,
    tag: Option<Value>,
    fail: bool,
}

impl ConstructorInterceptor for Tagging {
    fn on_construct(
        &self,
        instance: &dyn InstrumentedInstance,
        _args: &Args,
    ) -> Result<(), InterceptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(tag) = &self.tag {
            instance.set_attachment(tag.clone());
        }
        if self.fail {
            return Err("on_construct exploded".into());
        }
        Ok(())
    }
}

#[test]
fn test_construction_hooks_run_isolated_from_failures() {
    let resolver = Arc::new(RegistryResolver::new());
    let scope = ScopeId::new("test-scope");
    let broken = Arc::new(Tagging {
        fail: true,
        ..Default::default()
    });
    let tagger = Arc::new(Tagging {
        tag: Some(Value::from("from-ctor")),
        ..Default::default()
    });
    for (name, interceptor) in [("broken", &broken), ("tagger", &tagger)] {
        let instance = Arc::clone(interceptor);
        resolver.register_constructor(name, move || {
            let shared: Arc<dyn ConstructorInterceptor> = instance.clone();
            Ok(shared)
        });
    }

    let chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("broken", scope.clone()))
        .with_binding(InterceptorBinding::new("tagger", scope));
    let greeter = Greeter::default();
    let descriptor = CallDescriptor::constructor("Greeter", &[]);

    chain.dispatch_construct(&descriptor, &greeter, &Args::empty());

    // The failing hook ran, did not stop the second hook, and nothing
    // propagated.
    assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
    assert_eq!(tagger.calls.load(Ordering::SeqCst), 1);
    assert_eq!(greeter.attachment(), Some(Value::from("from-ctor")));
}

#[test]
fn test_attachment_links_constructor_and_method_interceptors() {
    let resolver = Arc::new(RegistryResolver::new());
    let scope = ScopeId::new("test-scope");

    let tagger = Arc::new(Tagging {
        tag: Some(Value::from("from-ctor")),
        ..Default::default()
    });
    let ctor_instance = Arc::clone(&tagger);
    resolver.register_constructor("tagger", move || {
        let shared: Arc<dyn ConstructorInterceptor> = ctor_instance.clone();
        Ok(shared)
    });

    let witness = Arc::new(Recording::default());
    register(&resolver, "witness", &witness);

    let ctor_chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("tagger", scope.clone()));
    let method_chain = InterceptorChain::new(resolver.clone())
        .with_binding(InterceptorBinding::new("witness", scope));

    let greeter = Greeter::default();
    ctor_chain.dispatch_construct(
        &CallDescriptor::constructor("Greeter", &[]),
        &greeter,
        &Args::empty(),
    );

    let mut args = Args::new(vec![Value::from("Tom")]);
    method_chain
        .dispatch_instance(&greet_descriptor(), &greeter, &mut args, greet_body)
        .unwrap();

    assert_eq!(
        *witness.seen_attachment.lock().unwrap(),
        Some(Value::from("from-ctor"))
    );
}
