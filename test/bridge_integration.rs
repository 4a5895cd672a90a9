//! Integration Tests for the Foreign Bridge
//!
//! Drives the bridge end to end against the fixture library built by
//! build.rs:
//! - Loading and calling functions of every arity
//! - Marshaling of every type code through real native calls
//! - Reading and writing exported variables
//! - Failures surfacing as typed errors or host error values

use dynffi::ffi::{FfiError, ForeignBridge, InvocationRegistry, Phase, SearchPaths};
use dynffi::host::{Value, ValueType};

fn fixture() -> Option<&'static str> {
    let path = option_env!("DYNFFI_FIXTURE_LIB");
    if path.is_none() {
        eprintln!("DYNFFI_FIXTURE_LIB not set, skipping fixture test");
    }
    path
}

macro_rules! require_fixture {
    () => {
        match fixture() {
            Some(path) => path,
            None => return,
        }
    };
}

fn bridge() -> ForeignBridge {
    let registry = Box::leak(Box::new(InvocationRegistry::new(SearchPaths::default())));
    ForeignBridge::new(registry)
}

fn load(bridge: &ForeignBridge, lib: &str, symbol: &str, ret: char, args: &str) -> Value {
    bridge
        .try_load_function(lib, symbol, None, ret, args)
        .unwrap_or_else(|e| panic!("loading {symbol}: {e}"))
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_scenario_add() {
    let lib = require_fixture!();
    let bridge = bridge();

    let add = load(&bridge, lib, "add", 'i', "ii");
    let result = add.apply(&[Value::int(5), Value::int(3)]);

    assert_eq!(result.value_type(), ValueType::Int);
    assert!(!result.is_vector());
    assert_eq!(result.as_i64(), Some(8));
}

#[test]
fn test_scenario_missing_symbol() {
    let lib = require_fixture!();
    let bridge = bridge();

    let err = bridge
        .try_load_function(lib, "does_not_exist", None, 'i', "")
        .unwrap_err();
    assert_eq!(
        err,
        FfiError::SymbolNotFound {
            symbol: "does_not_exist".to_string(),
        }
    );

    let value = bridge.load_function(lib, "does_not_exist", None, 'i', "");
    assert_eq!(value.error_message(), Some("symbol not found: does_not_exist"));
}

#[test]
fn test_scenario_too_many_arguments() {
    let lib = require_fixture!();
    let bridge = bridge();

    let err = bridge
        .try_load_function(lib, "add", None, 'i', "iiiiiiii")
        .unwrap_err();
    assert_eq!(err, FfiError::TooManyArguments(8));
    assert!(bridge.registry().is_empty());
    assert_eq!(bridge.registry().libraries_opened(), 0);
}

#[test]
fn test_scenario_variable_round_trip() {
    let lib = require_fixture!();
    let bridge = bridge();

    let written = bridge.write_variable(lib, "counter_j", 'j', &Value::long(42));
    assert!(written.is_unit(), "{}", written);

    let value = bridge.read_variable(lib, "counter_j", 'j');
    assert_eq!(value.value_type(), ValueType::Long);
    assert_eq!(value.as_i64(), Some(42));
}

// =============================================================================
// Arity
// =============================================================================

#[test]
fn test_every_arity() {
    let lib = require_fixture!();
    let bridge = bridge();

    for arity in 0..=7usize {
        let symbol = format!("count{}", arity);
        let codes = "i".repeat(arity);
        let function = load(&bridge, lib, &symbol, 'i', &codes);

        let args: Vec<Value> = (1..=arity as i32).map(Value::int).collect();
        let result = function.apply(&args);
        let expected = (arity * (arity + 1) / 2) as i64;
        assert_eq!(result.as_i64(), Some(expected), "{}: {}", symbol, result);
    }
}

#[test]
fn test_arity_mismatch_at_invocation() {
    let lib = require_fixture!();
    let bridge = bridge();
    load(&bridge, lib, "count3", 'i', "iii");

    let invocation = bridge.registry().get(lib, "count3").unwrap();
    for count in [0usize, 1, 2, 4, 7] {
        let args = vec![Value::int(1); count];
        assert_eq!(
            invocation.call(&args).unwrap_err(),
            FfiError::ArityMismatch {
                expected: 3,
                got: count,
            }
        );
    }
    let ok = invocation.call(&[Value::int(1), Value::int(2), Value::int(3)]);
    assert_eq!(ok.unwrap().as_i64(), Some(6));
}

#[test]
fn test_zero_arity_accepts_placeholder() {
    let lib = require_fixture!();
    let bridge = bridge();
    let count0 = load(&bridge, lib, "count0", 'i', "");

    assert_eq!(count0.apply(&[]).as_i64(), Some(0));
    assert_eq!(count0.apply(&[Value::int(99)]).as_i64(), Some(0));

    let invocation = bridge.registry().get(lib, "count0").unwrap();
    assert_eq!(invocation.call(&[]).unwrap().as_i64(), Some(0));
    assert!(matches!(
        invocation.call(&[Value::unit(), Value::unit()]),
        Err(FfiError::ArityMismatch { expected: 0, got: 2 })
    ));
}

#[test]
fn test_host_rank_error_on_wrong_count() {
    let lib = require_fixture!();
    let bridge = bridge();
    let add = load(&bridge, lib, "add", 'i', "ii");

    let result = add.apply(&[Value::int(1), Value::int(2), Value::int(3)]);
    assert_eq!(result.error_message(), Some("rank"));
}

// =============================================================================
// Marshaling
// =============================================================================

#[test]
fn test_every_type_code_as_argument() {
    let lib = require_fixture!();
    let bridge = bridge();
    let mixed = load(&bridge, lib, "mixed", 'f', "xhijefc");

    let result = mixed.apply(&[
        Value::byte(1),
        Value::short(2),
        Value::int(3),
        Value::long(4),
        Value::real(0.5),
        Value::float(0.25),
        Value::char(b'a'),
    ]);
    assert_eq!(result.value_type(), ValueType::Float);
    assert_eq!(result.as_f64(), Some(107.75));
}

#[test]
fn test_narrow_and_float_returns() {
    let lib = require_fixture!();
    let bridge = bridge();

    let negate = load(&bridge, lib, "negate_short", 'h', "h");
    let result = negate.apply(&[Value::short(-300)]);
    assert_eq!(result.value_type(), ValueType::Short);
    assert_eq!(result.as_i64(), Some(300));

    let bump = load(&bridge, lib, "bump_byte", 'x', "x");
    assert_eq!(bump.apply(&[Value::byte(255)]).as_i64(), Some(0));
    assert_eq!(bump.apply(&[Value::byte(41)]).as_i64(), Some(42));

    let upper = load(&bridge, lib, "upper", 'c', "c");
    let result = upper.apply(&[Value::char(b'q')]);
    assert_eq!(result.value_type(), ValueType::Char);
    assert_eq!(result.text().as_deref(), Some("Q"));

    let is_even = load(&bridge, lib, "is_even", 'b', "j");
    let result = is_even.apply(&[Value::long(4)]);
    assert_eq!(result.value_type(), ValueType::Bool);
    assert_eq!(result.as_i64(), Some(1));
    assert_eq!(is_even.apply(&[Value::long(3)]).as_i64(), Some(0));

    let widen = load(&bridge, lib, "widen", 'j', "i");
    assert_eq!(widen.apply(&[Value::int(3)]).as_i64(), Some(3 << 32));

    let scale = load(&bridge, lib, "scale", 'e', "ee");
    let result = scale.apply(&[Value::real(1.5), Value::real(2.0)]);
    assert_eq!(result.value_type(), ValueType::Real);
    assert_eq!(result.as_f64(), Some(3.0));

    let mul_add = load(&bridge, lib, "mul_add", 'f', "fff");
    let result = mul_add.apply(&[Value::float(2.0), Value::float(3.0), Value::float(1.0)]);
    assert_eq!(result.as_f64(), Some(7.0));
}

#[test]
fn test_arguments_are_coerced() {
    let lib = require_fixture!();
    let bridge = bridge();
    let add = load(&bridge, lib, "add", 'i', "ii");

    let long = Value::long(5);
    let result = add.apply(&[long.clone(), Value::float(3.7)]);
    assert_eq!(result.as_i64(), Some(8));
    assert_eq!(long.ref_count(), 1);

    let upper = load(&bridge, lib, "upper", 'c', "c");
    assert_eq!(upper.apply(&[Value::byte(b'a')]).text().as_deref(), Some("A"));
}

#[test]
fn test_bad_arguments_become_error_values() {
    let lib = require_fixture!();
    let bridge = bridge();
    let add = load(&bridge, lib, "add", 'i', "ii");

    let result = add.apply(&[Value::symbol("five"), Value::int(3)]);
    let message = result.error_message().unwrap();
    assert!(message.starts_with("type mismatch"), "{}", message);

    // still usable afterwards
    assert_eq!(add.apply(&[Value::int(2), Value::int(2)]).as_i64(), Some(4));
}

#[test]
fn test_void_function() {
    let lib = require_fixture!();
    let bridge = bridge();
    let touch = load(&bridge, lib, "touch", ' ', "");
    let touches = load(&bridge, lib, "touches", 'i', "");

    let before = touches.apply(&[]).as_i64().unwrap();
    assert!(touch.apply(&[]).is_unit());
    assert!(touch.apply(&[]).is_unit());
    assert_eq!(touches.apply(&[]).as_i64(), Some(before + 2));
}

// =============================================================================
// Registry Reuse
// =============================================================================

#[test]
fn test_reloading_reuses_invocation() {
    let lib = require_fixture!();
    let bridge = bridge();

    let first = load(&bridge, lib, "add", 'i', "ii");
    let second = load(&bridge, lib, "add", 'i', "ii");
    assert_eq!(bridge.registry().len(), 1);
    assert_eq!(bridge.registry().libraries_opened(), 1);

    assert_eq!(first.apply(&[Value::int(1), Value::int(1)]).as_i64(), Some(2));
    assert_eq!(second.apply(&[Value::int(2), Value::int(2)]).as_i64(), Some(4));

    let invocation = bridge.registry().get(lib, "add").unwrap();
    assert_eq!(invocation.phase(), Phase::Ready);
    assert_eq!(
        invocation.signature().unwrap().to_string(),
        "int32_t add(int32_t, int32_t)"
    );
}

// =============================================================================
// Variables
// =============================================================================

#[test]
fn test_variable_types() {
    let lib = require_fixture!();
    let bridge = bridge();

    assert!(bridge.write_variable(lib, "level_i", 'i', &Value::long(11)).is_unit());
    let level = bridge.read_variable(lib, "level_i", 'i');
    assert_eq!(level.value_type(), ValueType::Int);
    assert_eq!(level.as_i64(), Some(11));

    assert!(bridge.write_variable(lib, "ratio_f", 'f', &Value::float(0.75)).is_unit());
    assert_eq!(bridge.read_variable(lib, "ratio_f", 'f').as_f64(), Some(0.75));

    assert!(bridge.write_variable(lib, "grade_c", 'c', &Value::char(b'B')).is_unit());
    assert_eq!(
        bridge.read_variable(lib, "grade_c", 'c').text().as_deref(),
        Some("B")
    );
}

#[test]
fn test_variable_errors() {
    let lib = require_fixture!();
    let bridge = bridge();

    let result = bridge.write_variable(lib, "level_i", 'i', &Value::symbol("x"));
    assert!(result.error_message().unwrap().starts_with("type mismatch"));

    assert!(matches!(
        bridge.try_read_variable(lib, "no_such_variable", 'i'),
        Err(FfiError::SymbolNotFound { .. })
    ));
    assert!(matches!(
        bridge.try_read_variable(lib, "level_i", ' '),
        Err(FfiError::UnsupportedTypeCode(' '))
    ));
}

#[test]
fn test_variable_access_retargets_function_key() {
    let lib = require_fixture!();
    let bridge = bridge();

    // bound as a function but never called
    let as_function = load(&bridge, lib, "level_i", 'i', "");
    assert_eq!(bridge.registry().get(lib, "level_i").unwrap().phase(), Phase::Ready);

    let level = bridge.read_variable(lib, "level_i", 'i');
    assert_eq!(level.value_type(), ValueType::Int);

    let result = as_function.apply(&[]);
    assert_eq!(
        result.error_message(),
        Some("'level_i' is not loaded as a function")
    );

    let add = load(&bridge, lib, "add", 'i', "ii");
    assert_eq!(add.apply(&[Value::int(1), Value::int(2)]).as_i64(), Some(3));
    assert_eq!(bridge.registry().len(), 2);
}

#[test]
fn test_missing_library() {
    let bridge = bridge();
    let err = bridge
        .try_load_function("/nonexistent/libdynffi_missing.so", "add", None, 'i', "ii")
        .unwrap_err();
    assert!(matches!(err, FfiError::LibraryLoad { .. }));
    assert!(err.is_retryable());
}
