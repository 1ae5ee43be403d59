#![allow(dead_code)]

use std::collections::HashMap;

use depwatch::builder::PlanBuilder;
use prost_reflect::{DynamicMessage, MapKey, ReflectMessage, Value};

pub const PKG: &str = "depwatch.testdata.v1";

pub fn msg(short_name: &str) -> DynamicMessage {
    depwatch_testdata::new_message(&format!("{PKG}.{short_name}"))
}

pub fn set_i32(msg: &mut DynamicMessage, field: &str, value: i32) {
    msg.set_field_by_name(field, Value::I32(value));
}

pub fn set_enum(msg: &mut DynamicMessage, field: &str, number: i32) {
    msg.set_field_by_name(field, Value::EnumNumber(number));
}

pub fn set_msg(msg: &mut DynamicMessage, field: &str, child: DynamicMessage) {
    msg.set_field_by_name(field, Value::Message(child));
}

pub fn set_list(msg: &mut DynamicMessage, field: &str, items: Vec<Value>) {
    msg.set_field_by_name(field, Value::List(items));
}

pub fn set_str_map(msg: &mut DynamicMessage, field: &str, pairs: &[(&str, &str)]) {
    let map: HashMap<MapKey, Value> = pairs
        .iter()
        .map(|(k, v)| (MapKey::String(k.to_string()), Value::String(v.to_string())))
        .collect();
    msg.set_field_by_name(field, Value::Map(map));
}

pub fn set_msg_map(msg: &mut DynamicMessage, field: &str, entries: Vec<(&str, DynamicMessage)>) {
    let map: HashMap<MapKey, Value> = entries
        .into_iter()
        .map(|(k, v)| (MapKey::String(k.to_string()), Value::Message(v)))
        .collect();
    msg.set_field_by_name(field, Value::Map(map));
}

pub fn set_enum_map(msg: &mut DynamicMessage, field: &str, entries: &[(&str, i32)]) {
    let map: HashMap<MapKey, Value> = entries
        .iter()
        .map(|(k, v)| (MapKey::String(k.to_string()), Value::EnumNumber(*v)))
        .collect();
    msg.set_field_by_name(field, Value::Map(map));
}

/// `Simple` with only the non-zero fields populated.
pub fn simple(field: i32, field_deprecated: i32) -> DynamicMessage {
    let mut simple = msg("Simple");
    if field != 0 {
        set_i32(&mut simple, "field", field);
    }
    if field_deprecated != 0 {
        set_i32(&mut simple, "field_deprecated", field_deprecated);
    }
    simple
}

/// Events collected from one evaluation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Events {
    /// `(path, presence)`
    pub fields: Vec<(String, String)>,
    /// `(path, enum value name, enum number)`
    pub enums: Vec<(String, String, i32)>,
    /// `(path, collection type)`
    pub caps: Vec<(String, String)>,
}

pub fn evaluate(msg: &DynamicMessage) -> Events {
    evaluate_with(&PlanBuilder::new(), msg)
}

pub fn evaluate_with(builder: &PlanBuilder, msg: &DynamicMessage) -> Events {
    let plan = builder.load_or_build(&msg.descriptor());
    let mut fields = Vec::new();
    let mut enums = Vec::new();
    let mut caps = Vec::new();
    plan.eval_message(
        msg,
        &mut |_, path, presence| fields.push((path.to_string(), presence.as_str().to_string())),
        &mut |_, path, name, number| enums.push((path.to_string(), name.to_string(), number)),
        &mut |path, kind| caps.push((path.to_string(), kind.as_str().to_string())),
    );
    Events {
        fields,
        enums,
        caps,
    }
}

/// Compares field events as a multiset.
pub fn assert_fields(events: &Events, want: &[(&str, &str)]) {
    let mut got = events.fields.clone();
    got.sort();
    let mut want: Vec<(String, String)> = want
        .iter()
        .map(|(path, presence)| (path.to_string(), presence.to_string()))
        .collect();
    want.sort();
    assert_eq!(got, want);
}

/// Compares enum events as a multiset.
pub fn assert_enums(events: &Events, want: &[(&str, &str, i32)]) {
    let mut got = events.enums.clone();
    got.sort();
    let mut want: Vec<(String, String, i32)> = want
        .iter()
        .map(|(path, name, number)| (path.to_string(), name.to_string(), *number))
        .collect();
    want.sort();
    assert_eq!(got, want);
}
