use std::fmt::Write;

use lazy_static::lazy_static;
use regex::Regex;

use crate::entity::Entity;

lazy_static! {
    // Characters that may not appear in a Turtle local name.
    static ref NON_LOCAL: Regex = Regex::new(r"[^A-Za-z0-9_]").expect("a valid regex");
}

fn local(name: &str) -> String {
    NON_LOCAL.replace_all(name, "_").into_owned()
}

/// Serialize an entity schema as Turtle.
///
/// The output names one individual for the entity, one per dimension, one per
/// property, and a chain of shape individuals for each shaped property.
pub fn to_turtle(entity: &Entity) -> String {
    let mut out = String::new();
    let entity_name = local(entity.identity().name());

    let _ = writeln!(out, "@prefix : <{}#> .", entity.identity().namespace());
    let _ = writeln!(out, "@prefix owl: <http://www.w3.org/2002/07/owl#> .");
    let _ = writeln!(out, "@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .");
    let _ = writeln!(out, "@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .");
    let _ = writeln!(out, "@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .");
    let _ = writeln!(out, "@prefix soft: <http://www.quaat.com/ontologies#> .");
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        ":Entity_{} rdf:type owl:NamedIndividual , soft:Entity ;",
        entity_name
    );
    let _ = writeln!(out, "    soft:uri \"{}\"^^xsd:anyURI ;", entity.identity());
    let _ = writeln!(out, "    rdfs:label \"{}\"@en .", entity.identity().name());
    let _ = writeln!(out);

    if let Some(dimensions) = entity.dimensions() {
        for (dimension_name, description) in dimensions {
            let dimension = local(dimension_name);
            let _ = writeln!(
                out,
                ":Dimension_{} rdf:type owl:NamedIndividual , soft:Dimension ;",
                dimension
            );
            let _ = writeln!(
                out,
                "    soft:dimension_description \"{}\"^^xsd:string ;",
                description
            );
            let _ = writeln!(out, "    rdfs:label \"{}\"@en .", dimension_name);
            let _ = writeln!(out, ":Entity_{} soft:dimension :Dimension_{} .", entity_name, dimension);
            let _ = writeln!(out);
        }
    }

    for (property_name, property) in entity.properties() {
        let prop = local(property_name);

        if let Some(shape) = property.shape() {
            for (index, dimension_name) in shape.iter().enumerate() {
                let _ = writeln!(
                    out,
                    ":Shape_{}_{} rdf:type owl:NamedIndividual , soft:Shape ;",
                    prop, index
                );
                let _ = writeln!(
                    out,
                    "    soft:hasDimension :Dimension_{} ;",
                    local(dimension_name)
                );
                if index + 1 < shape.len() {
                    let _ = writeln!(out, "    soft:hasShape :Shape_{}_{} ;", prop, index + 1);
                }
                let _ = writeln!(out, "    rdfs:label \"{}\"@en .", dimension_name);
                let _ = writeln!(out);
            }
        }

        let _ = writeln!(
            out,
            ":Property_{} rdf:type owl:NamedIndividual , soft:Property ;",
            prop
        );
        if property.shape().is_some() {
            let _ = writeln!(out, "    soft:hasShape :Shape_{}_0 ;", prop);
        }
        if let Some(description) = property.description() {
            let _ = writeln!(
                out,
                "    soft:property_description \"{}\"^^xsd:string ;",
                description
            );
        }
        let _ = writeln!(
            out,
            "    soft:property_type \"{}\"^^xsd:string ;",
            property.property_type()
        );
        if let Some(unit) = property.unit() {
            let _ = writeln!(out, "    soft:property_unit \"{}\"^^xsd:string ;", unit);
        }
        let _ = writeln!(out, "    rdfs:label \"{}\"@en .", property_name);
        let _ = writeln!(out, ":Entity_{} soft:property :Property_{} .", entity_name, prop);
        let _ = writeln!(out);
    }

    out
}
