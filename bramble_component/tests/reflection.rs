// Copyright 2025 the Bramble Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property and attribute reflection through the runtime.

use std::cell::RefCell;
use std::rc::Rc;

use bramble_component::{
    ComponentError, ComponentSchema, PropDefinition, PropKind, PropValue, Runtime, RuntimeConfig,
    parse_attribute,
};
use bramble_dom::{NodeId, json};

fn runtime_with(schema: ComponentSchema) -> (Runtime, NodeId) {
    let rt = Runtime::new(RuntimeConfig::default());
    let tag = schema.tag().to_owned();
    rt.define_component(schema).unwrap();
    let doc = rt.document();
    let el = doc.create_element(&tag);
    doc.append_child(doc.body(), el).unwrap();
    (rt, el)
}

#[test]
fn boolean_reflects_through_presence() {
    let (rt, el) = runtime_with(
        ComponentSchema::new("x-button").prop(PropDefinition::boolean("disabled")),
    );
    let doc = rt.document();
    assert_eq!(rt.prop(el, "disabled").unwrap(), PropValue::Boolean(false));

    rt.set_prop(el, "disabled", true).unwrap();
    assert_eq!(doc.get_attribute(el, "disabled").as_deref(), Some(""));

    rt.set_prop(el, "disabled", false).unwrap();
    assert!(!doc.has_attribute(el, "disabled"));

    doc.set_attribute(el, "disabled", "false");
    assert_eq!(rt.prop(el, "disabled").unwrap(), PropValue::Boolean(false));
    doc.set_attribute(el, "disabled", "yes");
    assert_eq!(rt.prop(el, "disabled").unwrap(), PropValue::Boolean(true));
}

#[test]
fn values_survive_the_attribute() {
    let (rt, el) = runtime_with(
        ComponentSchema::new("x-slider")
            .prop(PropDefinition::number("maxValue").with_default(100.0))
            .prop(PropDefinition::string("label"))
            .prop(PropDefinition::boolean("vertical")),
    );
    let doc = rt.document();
    let cases = [
        ("maxValue", "max-value", PropKind::Number, PropValue::Number(42.5)),
        ("label", "label", PropKind::String, PropValue::from("Volume")),
        ("vertical", "vertical", PropKind::Boolean, PropValue::Boolean(true)),
        ("vertical", "vertical", PropKind::Boolean, PropValue::Boolean(false)),
    ];
    for (prop, attribute, kind, value) in cases {
        rt.set_prop(el, prop, value.clone()).unwrap();
        let raw = doc.get_attribute(el, attribute);
        let default = PropDefinition::new(prop, kind).default_value().clone();
        assert_eq!(parse_attribute(raw.as_deref(), kind, &default), value, "{prop}");
    }
    assert_eq!(rt.prop(el, "maxValue").unwrap(), PropValue::Number(42.5));
}

#[test]
fn malformed_structured_values_fall_back_to_default() {
    let (rt, el) = runtime_with(
        ComponentSchema::new("x-chart")
            .prop(PropDefinition::array("series").with_default(json!([0]))),
    );
    let doc = rt.document();
    doc.set_attribute(el, "series", "[1, 2");
    assert_eq!(rt.prop(el, "series").unwrap(), PropValue::Json(json!([0])));
    rt.set_prop(el, "series", json!([3, 4])).unwrap();
    assert_eq!(doc.get_attribute(el, "series").as_deref(), Some("[3,4]"));
}

#[test]
fn change_notifications_skip_equal_values() {
    let (rt, el) = runtime_with(
        ComponentSchema::new("x-meter").prop(PropDefinition::number("value")),
    );
    let doc = rt.document();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    rt.instance_context(el)
        .unwrap()
        .on_prop_change("value", move |now, before| {
            s.borrow_mut().push((now.as_f64(), before.as_f64()));
        });

    rt.set_prop(el, "value", 3).unwrap();
    doc.set_attribute(el, "value", "3");
    doc.set_attribute(el, "value", "3.0");
    doc.set_attribute(el, "value", "7");
    assert_eq!(*seen.borrow(), vec![(Some(3.0), Some(0.0)), (Some(7.0), Some(3.0))]);
}

#[test]
fn property_errors_are_typed() {
    let (rt, el) = runtime_with(
        ComponentSchema::new("x-field").prop(PropDefinition::string("name")),
    );
    assert!(matches!(
        rt.set_prop(el, "name", 5),
        Err(ComponentError::PropType { expected: PropKind::String, .. })
    ));
    assert!(matches!(
        rt.prop(el, "missing"),
        Err(ComponentError::UnknownProp { .. })
    ));
    let plain = rt.document().create_element("div");
    assert!(matches!(
        rt.prop(plain, "name"),
        Err(ComponentError::NotAComponent(_))
    ));
}
