// Integration tests for Parser + Evaluator
//
// These tests verify that the parser and evaluator work together correctly
// to process complete expressions against data contexts.

use ac_templating::{
    evaluator::Evaluator, functions::FunctionRegistry, parser::parse, DataContext, EngineError,
    ErrorKind, ExpressionEngine, ParserError, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn eval(expression: &str, data: serde_json::Value) -> Result<Value, EngineError> {
    let engine = ExpressionEngine::new();
    engine.evaluate(expression, &DataContext::new(data.into()))
}

#[test]
fn test_simple_field_access() {
    let data: Value = json!({
        "name": "Alice",
        "age": 30
    })
    .into();

    let ast = parse("name").unwrap();
    let registry = FunctionRegistry::with_builtins();
    let evaluator = Evaluator::new(&registry);
    let result = evaluator.evaluate(&ast, &DataContext::new(data)).unwrap();

    assert_eq!(result, Value::from(json!("Alice")));
}

#[test]
fn test_nested_field_access() {
    let result = eval(
        "user.profile.name",
        json!({"user": {"profile": {"name": "Bob"}}}),
    )
    .unwrap();
    assert_eq!(result, Value::from("Bob"));
}

#[test]
fn test_arithmetic_expression() {
    let result = eval("price * quantity", json!({"price": 100, "quantity": 5})).unwrap();
    assert_eq!(result, Value::from(500i64));
}

#[test]
fn test_precedence_scenario() {
    assert_eq!(eval("1 + 2 * 3", json!({})).unwrap(), Value::from(7i64));
    assert_eq!(eval("(1 + 2) * 3", json!({})).unwrap(), Value::from(9i64));
    assert_eq!(eval("2 * 3 > 5 && 1 < 2", json!({})).unwrap(), Value::from(true));
}

#[test]
fn test_ternary_scenario() {
    let result = eval("a > b ? 'yes' : 'no'", json!({"a": 5, "b": 3})).unwrap();
    assert_eq!(result, Value::from("yes"));
}

#[test]
fn test_array_index_paths() {
    let data = json!({"orders": [{"id": "A1", "lines": [{"sku": "x"}, {"sku": "y"}]}]});
    assert_eq!(eval("orders[0].lines[1].sku", data.clone()).unwrap(), Value::from("y"));
    assert_eq!(eval("orders[0]['id']", data.clone()).unwrap(), Value::from("A1"));
    assert_eq!(eval("orders[3].id", data.clone()).unwrap(), Value::Null);
    assert_eq!(eval("count(orders[0].lines)", data).unwrap(), Value::from(2i64));
}

#[test]
fn test_function_composition() {
    let data = json!({
        "first": "ada",
        "last": "lovelace",
        "tags": ["math", "", null, "poetry"]
    });
    assert_eq!(
        eval(
            "toUpper(substring(first, 0, 1)) + substring(first, 1) + ' ' + last",
            data.clone()
        )
        .unwrap(),
        Value::from("Ada lovelace")
    );
    assert_eq!(
        eval("join(sort(filter(tags)), ', ')", data.clone()).unwrap(),
        Value::from("math, poetry")
    );
    assert_eq!(
        eval("format('{0} has {1} tags', first, count(filter(tags)))", data).unwrap(),
        Value::from("ada has 2 tags")
    );
}

#[test]
fn test_date_functions() {
    let data = json!({"due": "2024-02-27"});
    assert_eq!(
        eval("addDays(due, 3)", data.clone()).unwrap(),
        Value::from("2024-03-01T00:00:00Z")
    );
    assert_eq!(
        eval("formatDateTime(addDays(due, 3), 'MMM d')", data.clone()).unwrap(),
        Value::from("Mar 1")
    );
    assert_eq!(eval("getMonth(due)", data.clone()).unwrap(), Value::from(2i64));
    assert_eq!(
        eval("dateDiff(due, '03/05/2024')", data).unwrap(),
        Value::from(7i64)
    );
}

#[test]
fn test_equality_coercion() {
    let data = json!({"n": 1, "s": "1", "t": true, "nothing": null});
    assert_eq!(eval("n == s", data.clone()).unwrap(), Value::from(true));
    assert_eq!(eval("t == 'true'", data.clone()).unwrap(), Value::from(true));
    assert_eq!(eval("nothing == 0", data.clone()).unwrap(), Value::from(false));
    assert_eq!(eval("nothing == missing", data).unwrap(), Value::from(true));
}

#[test]
fn test_parse_errors_propagate() {
    for (source, expected) in [
        ("'open", ParserError::UnterminatedString),
        ("a # b", ParserError::UnexpectedCharacter('#')),
        ("1 +", ParserError::UnexpectedEnd),
        ("(1)(2)", ParserError::ExpectedFunctionName),
    ] {
        match eval(source, json!({})) {
            Err(EngineError::Parse(e)) => assert_eq!(e, expected, "source: {}", source),
            other => panic!("{}: unexpected {:?}", source, other),
        }
    }

    assert!(matches!(
        eval("a ? b", json!({})),
        Err(EngineError::Parse(ParserError::MissingColon(_)))
    ));
    assert!(matches!(
        eval("f(1", json!({})),
        Err(EngineError::Parse(ParserError::Expected { .. }))
    ));
}

#[test]
fn test_evaluation_error_kinds() {
    let kind = |source: &str| match eval(source, json!({})) {
        Err(EngineError::Evaluate(e)) => e.kind(),
        other => panic!("{}: unexpected {:?}", source, other),
    };

    assert_eq!(kind("unknownFn()"), ErrorKind::UnknownFunction);
    assert_eq!(kind("count(1, 2)"), ErrorKind::ArityMismatch);
    assert_eq!(kind("10 / 0"), ErrorKind::DivisionByZero);
    assert_eq!(kind("mod(3, 0)"), ErrorKind::DivisionByZero);
    assert_eq!(kind("toNumber('twelve')"), ErrorKind::TypeCoercion);
    assert_eq!(kind("'a' in 'abc'"), ErrorKind::UnknownOperator);
}
