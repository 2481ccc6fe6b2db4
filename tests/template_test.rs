// Integration tests for template expansion
//
// Whole card documents expanded through the public API.

use std::sync::Arc;
use std::thread;

use ac_templating::{
    value, BindingErrorPolicy, EngineConfig, ExpressionEngine, TemplateEngine, TemplateError,
    Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn card_template() -> Value {
    json!({
        "type": "AdaptiveCard",
        "version": "1.5",
        "body": [
            {
                "type": "TextBlock",
                "text": "Order ${orderId} for ${toUpper(customer.name)}",
                "weight": "bolder"
            },
            {
                "type": "TextBlock",
                "$when": "${customer.vip}",
                "text": "VIP since ${getYear(customer.since)}"
            },
            {
                "type": "FactSet",
                "facts": [
                    {
                        "$data": "${lines}",
                        "title": "${$index + 1}. ${name}",
                        "value": "${qty} x ${price} = ${qty * price}"
                    }
                ]
            },
            {
                "type": "TextBlock",
                "$when": "${count(lines) == 0}",
                "text": "No lines"
            },
            {
                "type": "TextBlock",
                "text": "Total: ${format('{0} {1}', $root.currency, total)}"
            }
        ]
    })
    .into()
}

fn order_data() -> Value {
    json!({
        "orderId": "A-17",
        "currency": "EUR",
        "total": 23.5,
        "customer": {"name": "ada", "vip": true, "since": "2019-06-01"},
        "lines": [
            {"name": "Pen", "qty": 2, "price": 1.75},
            {"name": "Notebook", "qty": 1, "price": 20}
        ]
    })
    .into()
}

#[test]
fn test_expand_full_card() {
    let engine = TemplateEngine::new();
    let expanded = engine.expand(&card_template(), &order_data()).unwrap();

    let expected: Value = json!({
        "type": "AdaptiveCard",
        "version": "1.5",
        "body": [
            {
                "type": "TextBlock",
                "text": "Order A-17 for ADA",
                "weight": "bolder"
            },
            {
                "type": "TextBlock",
                "text": "VIP since 2019"
            },
            {
                "type": "FactSet",
                "facts": [
                    {"title": "1. Pen", "value": "2 x 1.75 = 3.5"},
                    {"title": "2. Notebook", "value": "1 x 20 = 20"}
                ]
            },
            {
                "type": "TextBlock",
                "text": "Total: EUR 23.5"
            }
        ]
    })
    .into();
    assert_eq!(expanded, expected);
}

#[test]
fn test_conditions_follow_data() {
    let engine = TemplateEngine::new();
    let data: Value = json!({
        "orderId": "B-2",
        "currency": "USD",
        "total": 0,
        "customer": {"name": "bob", "vip": false},
        "lines": []
    })
    .into();

    let expanded = engine.expand(&card_template(), &data).unwrap();
    let body = expanded.get("body").and_then(Value::as_array).unwrap();

    let texts: Vec<_> = body
        .iter()
        .filter_map(|block| block.get("text"))
        .cloned()
        .collect();
    assert_eq!(
        texts,
        vec![
            value!("Order B-2 for BOB"),
            value!("No lines"),
            value!("Total: USD 0")
        ]
    );

    let facts = body[1].get("facts").unwrap();
    assert_eq!(facts, &value!([]));
}

#[test]
fn test_expand_json_round_trip() {
    let engine = TemplateEngine::new();
    let out = engine
        .expand_json(
            r#"{"items":[{"$data":"${rows}","label":"${$data}"}]}"#,
            r#"{"rows":["a","b"]}"#,
        )
        .unwrap();
    assert_eq!(out, r#"{"items":[{"label":"a"},{"label":"b"}]}"#);
}

#[test]
fn test_policy_comes_from_config() {
    let config = EngineConfig::from_json_str(r#"{"binding_errors": "keep_original"}"#).unwrap();
    let engine = TemplateEngine::with_engine(ExpressionEngine::with_config(config));
    assert_eq!(engine.policy(), BindingErrorPolicy::KeepOriginal);
    assert_eq!(
        engine.expand_str("${1 / 0} and ${2}", &Value::Null).unwrap(),
        "${1 / 0} and 2"
    );

    let engine = TemplateEngine::new();
    assert_eq!(engine.expand_str("${1 / 0} and ${2}", &Value::Null).unwrap(), " and 2");
}

#[test]
fn test_host_functions_in_templates() {
    let mut engine = TemplateEngine::new();
    engine
        .engine_mut()
        .register_function("shout", |args: &[Value]| {
            let text = args.first().and_then(Value::as_str).unwrap_or_default();
            Ok(Value::from(format!("{}!", text.to_uppercase())))
        });

    assert_eq!(
        engine.expand_str("${shout(word)}", &value!({"word": "hey"})).unwrap(),
        "HEY!"
    );
}

#[test]
fn test_unmatched_brace_aborts_expansion() {
    let engine = TemplateEngine::new();
    let template = value!({"ok": "${a}", "bad": "${a"});
    let err = engine.expand(&template, &value!({"a": 1i64})).unwrap_err();
    assert!(matches!(err, TemplateError::UnmatchedBrace { position: 0 }));
}

#[test]
fn test_shared_engine_across_threads() {
    let engine = Arc::new(TemplateEngine::new());
    let template = Arc::new(card_template());

    thread::scope(|scope| {
        for worker in 0..4i64 {
            let engine = Arc::clone(&engine);
            let template = Arc::clone(&template);
            scope.spawn(move || {
                for round in 0..25i64 {
                    let data: Value = json!({
                        "orderId": format!("{}-{}", worker, round),
                        "currency": "EUR",
                        "total": round,
                        "customer": {"name": "w", "vip": false},
                        "lines": [{"name": "x", "qty": round, "price": 2}]
                    })
                    .into();
                    let expanded = engine.expand(&template, &data).unwrap();
                    let body = expanded.get("body").and_then(Value::as_array).unwrap();
                    assert_eq!(
                        body[0].get("text"),
                        Some(&Value::from(format!("Order {}-{} for W", worker, round)))
                    );
                }
            });
        }
    });

    let stats = engine.engine().cache_stats().unwrap();
    assert!(stats.hits > 0);
    assert!(stats.entries <= engine.engine().config().cache.max_entries);
}
