use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value as Json};

use soft7::datatype::Value;
use soft7::entity::Entity;
use soft7::error::{Result, Soft7Error};
use soft7::factory::{create_datasource, EntityRegistry};
use soft7::instance::Instance;
use soft7::pipeline::DataPipeline;

/// A pipeline that counts how many times the underlying fetch executes.
/// Digests are derived from a per-test tag, since the payload cache is
/// process-wide.
struct CountingPipeline {
    payload: Json,
    digest: blake3::Hash,
    calls: Arc<AtomicUsize>,
}

impl CountingPipeline {
    fn new(tag: &str, payload: Json) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Self {
            payload,
            digest: blake3::hash(tag.as_bytes()),
            calls: Arc::clone(&calls),
        };
        (pipeline, calls)
    }
}

impl DataPipeline for CountingPipeline {
    fn digest(&self) -> blake3::Hash {
        self.digest
    }
    fn execute(&self) -> Result<Json> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

fn shaped_entity() -> Entity {
    Entity::from_json(json!({
        "identity": "https://onto-ns.com/s7/0.1.0/measurement",
        "dimensions": {"N": "Number of samples."},
        "properties": {
            "label": {"type": "string"},
            "values": {"type": "float", "shape": ["N"]}
        }
    }))
    .expect("a valid entity")
}

fn datasource(tag: &str, payload: Json) -> (Instance, Arc<AtomicUsize>) {
    let (pipeline, calls) = CountingPipeline::new(tag, payload);
    let registry = EntityRegistry::new();
    let instance = create_datasource(Arc::new(shaped_entity()), Arc::new(pipeline), &registry)
        .expect("a data source instance");
    (instance, calls)
}

#[test]
fn resolution_is_idempotent_and_fetches_at_most_once() {
    let (instance, calls) = datasource(
        "lazy/idempotent",
        json!({"soft7_entity_data": {
            "dimensions": {"N": 3},
            "properties": {"label": "run-1", "values": [1.0, 2.0, 3.0]}
        }}),
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0, "construction must not fetch");

    let first = instance.get("label").expect("resolves");
    let second = instance.get("label").expect("resolves again");
    assert_eq!(first, second);
    assert_eq!(first, Value::String("run-1".to_owned()));

    // A different property reuses the shared payload.
    instance.get("values").expect("resolves");
    instance.get("values").expect("resolves again");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one underlying fetch for all fields");
}

#[test]
fn shape_coercion_builds_fixed_length_sequences() {
    let (instance, _) = datasource(
        "lazy/shape-ok",
        json!({"soft7_entity_data": {
            "dimensions": {"N": 5},
            "properties": {"label": "runs", "values": [1.0, 2.0, 3.0, 4.0, 5.0]}
        }}),
    );
    assert_eq!(instance.dimension("N").expect("resolves"), 5);
    let values = instance.get("values").expect("resolves");
    let Value::Sequence(items) = values else {
        panic!("expected a sequence, got {:?}", values);
    };
    assert_eq!(items.len(), 5);
    assert_eq!(items[0], Value::Float(1.0));
}

#[test]
fn wrong_length_fails_validation() {
    let (instance, _) = datasource(
        "lazy/shape-short",
        json!({"soft7_entity_data": {
            "dimensions": {"N": 5},
            "properties": {"label": "runs", "values": [1.0, 2.0, 3.0]}
        }}),
    );
    let error = instance.get("values").unwrap_err();
    assert!(
        matches!(error, Soft7Error::AttributeValidation { ref field, .. } if field == "values"),
        "expected a validation error naming the field, got {:?}",
        error
    );
}

#[test]
fn wrong_leaf_type_fails_validation() {
    let (instance, _) = datasource(
        "lazy/leaf-type",
        json!({"soft7_entity_data": {
            "dimensions": {"N": 1},
            "properties": {"label": 42, "values": [1.0]}
        }}),
    );
    let error = instance.get("label").unwrap_err();
    assert!(matches!(error, Soft7Error::AttributeValidation { .. }));
}

#[test]
fn absent_datum_fails_retrieval() {
    let (instance, _) = datasource(
        "lazy/absent",
        json!({"soft7_entity_data": {
            "dimensions": {"N": 1},
            "properties": {"values": [1.0]}
        }}),
    );
    let error = instance.get("label").unwrap_err();
    assert!(
        matches!(error, Soft7Error::AttributeRetrieval { ref field, .. } if field == "label"),
        "expected a retrieval error naming the field, got {:?}",
        error
    );
}

#[test]
fn missing_entity_data_section_fails_retrieval() {
    let (instance, _) = datasource("lazy/no-section", json!({"something_else": {}}));
    let error = instance.get("label").unwrap_err();
    let message = format!("{}", error);
    assert!(message.contains("soft7_entity_data"), "got: {}", message);
}

#[test]
fn undeclared_property_fails_retrieval() {
    let (instance, _) = datasource("lazy/undeclared", json!({"soft7_entity_data": {}}));
    assert!(matches!(
        instance.get("nope").unwrap_err(),
        Soft7Error::AttributeRetrieval { .. }
    ));
}

#[test]
fn serialization_forces_resolution_exactly_once() {
    let (instance, calls) = datasource(
        "lazy/serialize",
        json!({"soft7_entity_data": {
            "dimensions": {"N": 2},
            "properties": {"label": "runs", "values": [0.5, 1.5]}
        }}),
    );
    let document = instance.to_json().expect("serializes");
    assert_eq!(document["properties"]["label"], json!("runs"));
    assert_eq!(document["properties"]["values"], json!([0.5, 1.5]));
    assert_eq!(document["dimensions"]["N"], json!(2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A second serialization reuses every cached field.
    instance.to_json().expect("serializes again");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn instances_sharing_a_digest_share_the_fetch() {
    let payload = json!({"soft7_entity_data": {
        "dimensions": {"N": 1},
        "properties": {"label": "shared", "values": [1.0]}
    }});
    let (instance_a, calls_a) = datasource("lazy/shared-digest", payload.clone());
    let (instance_b, calls_b) = datasource("lazy/shared-digest", payload);

    instance_a.get("label").expect("resolves");
    instance_b.get("label").expect("resolves");
    assert_eq!(
        calls_a.load(Ordering::SeqCst) + calls_b.load(Ordering::SeqCst),
        1,
        "equal digests mean one underlying fetch across instances"
    );
}

#[test]
fn metadata_is_populated_eagerly() {
    let (instance, calls) = datasource("lazy/metadata", json!({"soft7_entity_data": {}}));
    assert_eq!(instance.name(), "measurement");
    assert_eq!(instance.version(), Some("0.1.0"));
    assert_eq!(instance.namespace(), "https://onto-ns.com/s7");
    assert_eq!(
        instance.identity().iri(),
        "https://onto-ns.com/s7/0.1.0/measurement"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0, "metadata must not trigger the pipeline");
}

#[test]
fn dimension_values_must_be_integers() {
    let (instance, _) = datasource(
        "lazy/dimension-type",
        json!({"soft7_entity_data": {
            "dimensions": {"N": "five"},
            "properties": {}
        }}),
    );
    assert!(matches!(
        instance.dimension("N").unwrap_err(),
        Soft7Error::AttributeValidation { .. }
    ));
    assert!(matches!(
        instance.dimension("M").unwrap_err(),
        Soft7Error::AttributeRetrieval { .. }
    ));
}
