use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use soft7::datatype::Value;
use soft7::entity::Entity;
use soft7::error::Soft7Error;
use soft7::factory::{create_datasource, EntityRegistry};
use soft7::graph::Graph;
use soft7::instance::Instance;
use soft7::pipeline::StaticPipeline;
use soft7::resolver::{create_outer_entity, AmbiguityPolicy, FunctionLibrary};

fn inner_instance() -> Arc<Instance> {
    let entity = Entity::from_json(json!({
        "identity": "https://onto-ns.com/s7/0.1.0/sample",
        "properties": {
            "x": {"type": "int"},
            "z": {"type": "int"}
        }
    }))
    .expect("a valid inner entity");
    let pipeline = StaticPipeline::new(json!({
        "soft7_entity_data": {"properties": {"x": 3, "z": 7}}
    }));
    let registry = EntityRegistry::new();
    Arc::new(
        create_datasource(Arc::new(entity), Arc::new(pipeline), &registry)
            .expect("an inner instance"),
    )
}

fn outer_entity_schema(property_type: &str) -> Arc<Entity> {
    Arc::new(
        Entity::from_json(json!({
            "identity": "https://onto-ns.com/s7/0.1.0/derived",
            "properties": {"y": {"type": property_type}}
        }))
        .expect("a valid outer entity"),
    )
}

fn inner_entities() -> BTreeMap<String, Arc<Instance>> {
    let mut inner = BTreeMap::new();
    inner.insert("inner".to_owned(), inner_instance());
    inner
}

#[test]
fn degenerate_chain_maps_straight_through() {
    let mut mapping = Graph::new();
    mapping.append("outer.y", "mapsTo", "inner.x");

    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &Graph::new(),
        Arc::new(FunctionLibrary::new()),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");

    assert_eq!(outer.get("y").expect("resolves"), Value::Int(3));
}

#[test]
fn single_function_chain_transforms_inner_data() {
    let mut mapping = Graph::new();
    mapping.append("inner.x", "mapsTo", "RawX");
    mapping.append("outer.y", "mapsTo", "DoubledX");

    let knowledge = Graph::from_triples([
        ("double", "isA", "function"),
        ("double", "expects", "RawX"),
        ("double", "outputs", "DoubledX"),
        ("double", "executes", "double_impl"),
    ]);

    let mut functions = FunctionLibrary::new();
    functions.register("double_impl", |arguments: &BTreeMap<String, Value>| {
        let Some(Value::Int(x)) = arguments.get("RawX") else {
            return Err(Soft7Error::Traversal("RawX must be an int".to_owned()));
        };
        Ok(Value::Int(x * 2))
    });

    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &knowledge,
        Arc::new(functions),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");

    assert_eq!(outer.get("y").expect("resolves"), Value::Int(6));
}

#[test]
fn chained_functions_apply_in_reverse_discovery_order() {
    let mut mapping = Graph::new();
    mapping.append("inner.x", "mapsTo", "A");
    mapping.append("outer.y", "mapsTo", "C");

    let knowledge = Graph::from_triples([
        ("increment", "isA", "function"),
        ("increment", "expects", "A"),
        ("increment", "outputs", "B"),
        ("increment", "executes", "increment_impl"),
        ("tenfold", "isA", "function"),
        ("tenfold", "expects", "B"),
        ("tenfold", "outputs", "C"),
        ("tenfold", "executes", "tenfold_impl"),
    ]);

    let mut functions = FunctionLibrary::new();
    functions.register("increment_impl", |arguments: &BTreeMap<String, Value>| {
        let Some(Value::Int(a)) = arguments.get("A") else {
            return Err(Soft7Error::Traversal("A must be an int".to_owned()));
        };
        Ok(Value::Int(a + 1))
    });
    functions.register("tenfold_impl", |arguments: &BTreeMap<String, Value>| {
        let Some(Value::Int(b)) = arguments.get("B") else {
            return Err(Soft7Error::Traversal("B must be an int".to_owned()));
        };
        Ok(Value::Int(b * 10))
    });

    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &knowledge,
        Arc::new(functions),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");

    // increment applies first (x = 3 -> 4), tenfold consumes the chain result.
    assert_eq!(outer.get("y").expect("resolves"), Value::Int(40));
}

#[test]
fn missing_path_is_a_traversal_failure() {
    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &Graph::new(),
        &Graph::new(),
        Arc::new(FunctionLibrary::new()),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");

    let error = outer.get("y").unwrap_err();
    assert!(
        matches!(error, Soft7Error::AttributeRetrieval { ref field, .. } if field == "y"),
        "expected a retrieval error naming the field, got {:?}",
        error
    );
    assert!(format!("{}", error).contains("path"), "got: {}", error);
}

#[test]
fn ambiguous_paths_honor_the_policy() {
    let mut mapping = Graph::new();
    mapping.append("outer.y", "mapsTo", "inner.x");
    mapping.append("outer.y", "mapsTo", "inner.z");

    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &Graph::new(),
        Arc::new(FunctionLibrary::new()),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");
    // First match in traversal order: the mapping appended first wins.
    assert_eq!(outer.get("y").expect("resolves"), Value::Int(3));

    let strict = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &Graph::new(),
        Arc::new(FunctionLibrary::new()),
        &EntityRegistry::new(),
        AmbiguityPolicy::RequireUnique,
    )
    .expect("an outer instance");
    let error = strict.get("y").unwrap_err();
    assert!(
        format!("{}", error).contains("more than one"),
        "expected an ambiguity failure, got: {}",
        error
    );
}

#[test]
fn missing_executable_is_a_traversal_failure() {
    let mut mapping = Graph::new();
    mapping.append("inner.x", "mapsTo", "RawX");
    mapping.append("outer.y", "mapsTo", "DoubledX");

    let knowledge = Graph::from_triples([
        ("double", "isA", "function"),
        ("double", "expects", "RawX"),
        ("double", "outputs", "DoubledX"),
    ]);

    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &knowledge,
        Arc::new(FunctionLibrary::new()),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");

    let error = outer.get("y").unwrap_err();
    assert!(
        format!("{}", error).contains("executable"),
        "expected a missing-executable failure, got: {}",
        error
    );
}

#[test]
fn ambiguous_parameter_mapping_is_fatal() {
    let mut mapping = Graph::new();
    mapping.append("inner.x", "mapsTo", "RawX");
    mapping.append("inner.z", "mapsTo", "RawX");
    mapping.append("outer.y", "mapsTo", "DoubledX");

    let knowledge = Graph::from_triples([
        ("double", "isA", "function"),
        ("double", "expects", "RawX"),
        ("double", "outputs", "DoubledX"),
        ("double", "executes", "double_impl"),
    ]);
    let mut functions = FunctionLibrary::new();
    functions.register("double_impl", |_: &BTreeMap<String, Value>| Ok(Value::Int(0)));

    let outer = create_outer_entity(
        outer_entity_schema("int"),
        inner_entities(),
        &mapping,
        &knowledge,
        Arc::new(functions),
        &EntityRegistry::new(),
        AmbiguityPolicy::FirstMatch,
    )
    .expect("an outer instance");

    let error = outer.get("y").unwrap_err();
    assert!(
        format!("{}", error).contains("exactly 1 mapping"),
        "expected a uniqueness failure, got: {}",
        error
    );
}
