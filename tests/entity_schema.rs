use serde_json::json;

use soft7::entity::Entity;
use soft7::error::Soft7Error;

const IDENTITY: &str = "https://onto-ns.com/s7/0.1.0/molecule";

#[test]
fn valid_schema_is_accepted() {
    let entity = Entity::from_json(json!({
        "identity": IDENTITY,
        "description": "A molecule.",
        "dimensions": {"natoms": "Number of atoms."},
        "properties": {
            "name": {"type": "string", "description": "The molecule name."},
            "masses": {"type": "float", "shape": ["natoms"], "unit": "u"}
        }
    }))
    .expect("a valid schema");
    assert_eq!(entity.identity().iri(), IDENTITY);
    assert_eq!(entity.properties().len(), 2);
    assert_eq!(entity.dimension_names(), vec!["natoms"]);
}

#[test]
fn uri_alias_is_accepted() {
    let entity = Entity::from_json(json!({
        "uri": IDENTITY,
        "properties": {"name": {"type": "string"}}
    }))
    .expect("'uri' aliases 'identity'");
    assert_eq!(entity.identity().iri(), IDENTITY);
}

#[test]
fn empty_properties_are_rejected() {
    let error = Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {}
    }))
    .unwrap_err();
    assert!(matches!(error, Soft7Error::InvalidEntity(_)));
    assert!(format!("{}", error).contains("must not be empty"));
}

#[test]
fn private_property_names_are_rejected() {
    let error = Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {"_private": {"type": "string"}}
    }))
    .unwrap_err();
    assert!(format!("{}", error).contains("private"));
}

#[test]
fn shape_without_dimensions_is_rejected() {
    let error = Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {"masses": {"type": "float", "shape": ["natoms"]}}
    }))
    .unwrap_err();
    assert!(format!("{}", error).contains("no dimensions are defined"));
}

#[test]
fn shape_with_unknown_dimension_is_rejected() {
    let error = Entity::from_json(json!({
        "identity": IDENTITY,
        "dimensions": {"natoms": "Number of atoms."},
        "properties": {"masses": {"type": "float", "shape": ["unknown_dim"]}}
    }))
    .unwrap_err();
    assert!(format!("{}", error).contains("unknown_dim"));
}

#[test]
fn violations_are_reported_together() {
    // One private name and one orphaned shape: both must appear in a single
    // validation report.
    let error = Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {
            "_private": {"type": "string"},
            "masses": {"type": "float", "shape": ["natoms"]}
        }
    }))
    .unwrap_err();
    let message = format!("{}", error);
    assert!(message.contains("private"), "missing the private-name violation: {}", message);
    assert!(
        message.contains("no dimensions are defined"),
        "missing the shape violation: {}",
        message
    );
}

#[test]
fn ref_property_with_dollar_ref_is_accepted() {
    let entity = Entity::from_json(json!({
        "identity": IDENTITY,
        "dimensions": {"natoms": "Number of atoms."},
        "properties": {
            "atoms": {
                "type": "ref",
                "$ref": "https://onto-ns.com/s7/0.1.0/atom",
                "shape": ["natoms"]
            }
        }
    }))
    .expect("a DLite-style ref property");
    assert!(entity.properties()["atoms"].property_type().is_ref());
}

#[test]
fn ref_property_as_bare_identity_is_accepted() {
    let entity = Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {
            "atom": {"type": "https://onto-ns.com/s7/0.1.0/atom"}
        }
    }))
    .expect("an identity URI as a property type");
    assert!(entity.properties()["atom"].property_type().is_ref());
}

#[test]
fn unknown_property_type_is_rejected() {
    assert!(Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {"name": {"type": "floaty"}}
    }))
    .is_err());
}

#[test]
fn unknown_schema_fields_are_rejected() {
    assert!(Entity::from_json(json!({
        "identity": IDENTITY,
        "properties": {"name": {"type": "string"}},
        "extra": true
    }))
    .is_err());
}
