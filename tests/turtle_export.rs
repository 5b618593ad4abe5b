use serde_json::json;

use soft7::entity::Entity;
use soft7::rdf::to_turtle;

#[test]
fn entities_export_as_turtle() {
    let entity = Entity::from_json(json!({
        "identity": "https://onto-ns.com/s7/0.1.0/molecule",
        "description": "A molecule.",
        "dimensions": {"natoms": "Number of atoms."},
        "properties": {
            "name": {"type": "string", "description": "The molecule name."},
            "masses": {"type": "float", "shape": ["natoms"], "unit": "u"}
        }
    }))
    .expect("a valid entity");

    let turtle = to_turtle(&entity);

    assert!(turtle.contains("@prefix : <https://onto-ns.com/s7#> ."));
    assert!(turtle.contains("@prefix soft: <http://www.quaat.com/ontologies#> ."));
    assert!(turtle.contains(":Entity_molecule rdf:type owl:NamedIndividual , soft:Entity ;"));
    assert!(turtle.contains("soft:uri \"https://onto-ns.com/s7/0.1.0/molecule\"^^xsd:anyURI ;"));
    assert!(turtle.contains(":Dimension_natoms rdf:type owl:NamedIndividual , soft:Dimension ;"));
    assert!(turtle.contains(":Entity_molecule soft:dimension :Dimension_natoms ."));
    assert!(turtle.contains(":Property_masses rdf:type owl:NamedIndividual , soft:Property ;"));
    assert!(turtle.contains("soft:hasShape :Shape_masses_0 ;"));
    assert!(turtle.contains("soft:hasDimension :Dimension_natoms ;"));
    assert!(turtle.contains("soft:property_unit \"u\"^^xsd:string ;"));
    assert!(turtle.contains(":Entity_molecule soft:property :Property_name ."));
}

#[test]
fn unshaped_properties_have_no_shape_individuals() {
    let entity = Entity::from_json(json!({
        "identity": "https://onto-ns.com/s7/0.1.0/temperature",
        "properties": {"celsius": {"type": "float"}}
    }))
    .expect("a valid entity");

    let turtle = to_turtle(&entity);
    assert!(!turtle.contains("soft:Shape"));
    assert!(turtle.contains(":Property_celsius"));
    assert!(turtle.contains("soft:property_type \"float\"^^xsd:string ;"));
}
