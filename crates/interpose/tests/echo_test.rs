//! Echo round-trips through a generated proxy

use std::sync::Arc;

use interpose::{proxy, CallContext, Interceptor, ProxyFactory, ProxyInterface, TypeKind, Value};
use parking_lot::Mutex;

/// Returns the first argument, or null when there is none
struct EchoInterceptor;

impl Interceptor for EchoInterceptor {
    fn intercept(&self, call: CallContext<'_>) -> anyhow::Result<Value> {
        Ok(call.first_arg().cloned().unwrap_or(Value::Null))
    }
}

#[derive(Debug)]
pub struct Payload {
    label: &'static str,
}

#[proxy]
pub trait ITestInterface {
    fn echo(&self, value: Value) -> Value;
    fn echo_text(&self, text: &str) -> String;
    fn echo_int(&self, value: i32) -> i32;
    fn echo_float(&self, value: f64) -> f64;
    fn echo_object(&self, payload: Arc<Payload>) -> Arc<Payload>;
    fn nothing(&self) -> Value;
    fn maybe(&self) -> Option<String>;
    fn combine(&mut self, left: i64, right: String) -> Value;
}

fn echo_proxy() -> Box<dyn ITestInterface> {
    ProxyFactory::new(EchoInterceptor)
        .create_proxy::<dyn ITestInterface>()
        .unwrap()
}

#[test]
fn test_echo_dynamic_values() {
    let proxy = echo_proxy();

    assert_eq!(proxy.echo(Value::from("Hello")), Value::from("Hello"));
    assert_eq!(proxy.echo(Value::from(123)), Value::I32(123));
    assert_eq!(proxy.echo(Value::from(123.123)), Value::F64(123.123));

    let object = Arc::new(Payload { label: "original" });
    let echoed = proxy.echo(Value::object(object.clone()));
    let back = echoed.as_object().unwrap().downcast::<Payload>().unwrap();
    assert!(Arc::ptr_eq(&object, &back));
}

#[test]
fn test_echo_typed_values() {
    let proxy = echo_proxy();

    assert_eq!(proxy.echo_text("Hello"), "Hello");
    assert_eq!(proxy.echo_int(123), 123);
    assert_eq!(proxy.echo_float(123.123), 123.123);

    let object = Arc::new(Payload { label: "shared" });
    let back = proxy.echo_object(object.clone());
    assert!(Arc::ptr_eq(&object, &back));
    assert_eq!(back.label, "shared");
}

#[test]
fn test_echo_without_arguments() {
    let proxy = echo_proxy();
    assert!(proxy.nothing().is_null());
    assert_eq!(proxy.maybe(), None);
}

#[test]
fn test_call_context_fidelity() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);

    let factory = ProxyFactory::new(interpose::interceptor_fn(move |call| {
        let method = call.method();
        let types: Vec<String> = method
            .parameter_types()
            .iter()
            .map(|ty| ty.name.clone())
            .collect();
        record.lock().push((
            method.name().to_string(),
            types,
            call.instance().interface().clone(),
            call.args().to_vec(),
        ));
        Ok(Value::Null)
    }));

    let mut proxy = factory.create_proxy::<dyn ITestInterface>().unwrap();
    proxy.combine(1, "a".to_string());
    proxy.combine(i64::MAX, String::new());

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    for (name, types, interface, _) in seen.iter() {
        assert_eq!(name, "combine");
        assert_eq!(types, &vec!["i64".to_string(), "String".to_string()]);
        assert_eq!(interface, &<dyn ITestInterface as ProxyInterface>::interface_id());
    }
    assert_eq!(seen[1].3, vec![Value::I64(i64::MAX), Value::from("")]);
}

#[test]
fn test_generated_descriptor() {
    let descriptor = <dyn ITestInterface as ProxyInterface>::descriptor();
    assert_eq!(descriptor.name, "ITestInterface");
    assert_eq!(descriptor.id.as_str(), "echo_test::ITestInterface");
    assert_eq!(descriptor.methods().count(), 8);

    let factory = ProxyFactory::new(EchoInterceptor);
    let instance = factory.create_dynamic(&descriptor).unwrap();
    let methods = instance.methods();
    assert_eq!(methods[0].signature(), "echo(Value) -> Value");
    assert_eq!(methods[1].signature(), "echo_text(String) -> String");
    assert_eq!(methods[6].return_type().kind, TypeKind::Optional);
    assert_eq!(methods[7].slot(), 7);

    // The typed proxy reuses what create_dynamic synthesized
    let proxy = factory.create_proxy::<dyn ITestInterface>().unwrap();
    assert_eq!(factory.synthesis_count(), 1);
    assert_eq!(proxy.echo_int(5), 5);
}

#[test]
fn test_bind_and_instance_accessor() {
    let factory = ProxyFactory::new(EchoInterceptor);
    let instance = factory
        .create_dynamic(&<dyn ITestInterface as ProxyInterface>::descriptor())
        .unwrap();

    let proxy = <dyn ITestInterface as ProxyInterface>::bind(instance.clone());
    assert_eq!(proxy.echo_int(9), 9);

    let generated = TestInterfaceProxy {
        instance: instance.clone(),
    };
    assert_eq!(generated.instance().id(), instance.id());
    assert_eq!(generated.clone().echo_text("again"), "again");
}

#[proxy]
pub trait IShapes {
    fn nested(&self, value: Option<Vec<Option<i32>>>) -> Option<Vec<Option<i32>>>;
    fn maybe_object(&self, payload: Option<Arc<Payload>>) -> Option<Arc<Payload>>;
    fn index(&self, value: usize) -> usize;
    fn offset(&self, value: isize) -> isize;
    fn byte(&self, value: u8) -> u8;
    fn small(&self, value: i8) -> i8;
    fn letter(&self, value: char) -> char;
    fn ignored(&self, _: u16) -> u16;
}

fn shapes_proxy() -> Box<dyn IShapes> {
    ProxyFactory::new(EchoInterceptor)
        .create_proxy::<dyn IShapes>()
        .unwrap()
}

#[test]
fn test_echo_nested_options() {
    let proxy = shapes_proxy();

    assert_eq!(proxy.nested(Some(vec![None, Some(3)])), Some(vec![None, Some(3)]));
    assert_eq!(proxy.nested(Some(vec![])), Some(vec![]));
    assert_eq!(proxy.nested(None), None);

    let object = Arc::new(Payload { label: "boxed" });
    let back = proxy.maybe_object(Some(object.clone())).unwrap();
    assert!(Arc::ptr_eq(&object, &back));
    assert!(proxy.maybe_object(None).is_none());
}

#[test]
fn test_echo_narrow_integers_and_char() {
    let proxy = shapes_proxy();

    assert_eq!(proxy.index(usize::MAX), usize::MAX);
    assert_eq!(proxy.offset(-5), -5);
    assert_eq!(proxy.byte(u8::MAX), u8::MAX);
    assert_eq!(proxy.small(i8::MIN), i8::MIN);
    assert_eq!(proxy.letter('é'), 'é');
    assert_eq!(proxy.letter('\u{1F600}'), '\u{1F600}');
}

#[test]
fn test_narrow_return_overflow_panics() {
    let factory = ProxyFactory::new(interpose::interceptor_fn(|_| Ok(Value::U32(300))));
    let proxy = factory.create_proxy::<dyn IShapes>().unwrap();

    let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| proxy.byte(1))).unwrap_err();
    let message = payload.downcast::<String>().unwrap();
    assert!(message.contains("IShapes::byte"));
    assert!(message.contains("Type mismatch: expected u8, got u32 300"));

    assert_eq!(proxy.ignored(1), 300);
}

#[test]
fn test_wildcard_parameter_is_forwarded() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let factory = ProxyFactory::new(interpose::interceptor_fn(move |call| {
        record.lock().push(call.args().to_vec());
        Ok(call.first_arg().cloned().unwrap_or(Value::Null))
    }));
    let proxy = factory.create_proxy::<dyn IShapes>().unwrap();

    assert_eq!(proxy.ignored(7), 7);
    assert_eq!(*seen.lock(), vec![vec![Value::U32(7)]]);

    let descriptor = <dyn IShapes as ProxyInterface>::descriptor();
    let ignored = descriptor.methods().find(|m| m.name == "ignored").unwrap();
    assert_eq!(ignored.params[0].name, "arg0");
}
