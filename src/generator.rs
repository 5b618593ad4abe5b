use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::debug;

use crate::entity::{Entity, Identity, PropertyType};
use crate::error::{Result, Soft7Error};
use crate::factory::{EntityRegistry, EntityType};
use crate::mapping::MappingDocument;

/// One generated entity instance: its identity and the fully resolved,
/// validated instance document.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedInstance {
    pub identity: String,
    pub document: Json,
}

/// Generate entity instances from mapping triples and parsed content.
///
/// The mapping's triple objects address entities (`<identity>#dimensions.x`,
/// `<identity>#properties.y`), its subjects address the parsed content by
/// dotted path. Every entity referenced by the mapping is validated against
/// it, ordered by reference dependencies, generated by walking the parsed
/// content, and validated through the instance machinery.
pub fn generate_entity_instances(
    mapping: &MappingDocument,
    parsed: &Json,
    registry: &EntityRegistry,
) -> Result<Vec<GeneratedInstance>> {
    let flat = mapping.flatten()?;

    // The object namespaces that are entity identities select the entities
    // this mapping populates.
    let mut identities: Vec<String> = Vec::new();
    for triple in &flat {
        let namespace = triple.object.namespace.trim_end_matches('#');
        if namespace.is_empty() || identities.iter().any(|known| known == namespace) {
            continue;
        }
        if Identity::parse(namespace).is_ok() {
            identities.push(namespace.to_owned());
        }
    }

    let mut entities: BTreeMap<String, Arc<Entity>> = BTreeMap::new();
    for identity in &identities {
        let entity = registry.get(identity).ok_or_else(|| {
            Soft7Error::EntityNotFound(format!("entity {} is not registered", identity))
        })?;
        entities.insert(identity.clone(), entity);
    }

    // Reverse the mapping per entity: entity path -> data path.
    let mut data_mapping: BTreeMap<String, BTreeMap<String, String>> = identities
        .iter()
        .map(|identity| (identity.clone(), BTreeMap::new()))
        .collect();
    for triple in &flat {
        let namespace = triple.object.namespace.trim_end_matches('#');
        if let Some(entity_mapping) = data_mapping.get_mut(namespace) {
            entity_mapping.insert(triple.object.concept.clone(), triple.subject.concept.clone());
        }
    }

    validate_data_mapping(&data_mapping, &entities)?;

    // Referenced entities are embedded recursively into their referrers, so
    // only unreferenced entities produce standalone instances.
    let referenced: BTreeSet<String> = entities
        .values()
        .flat_map(|entity| entity.properties().values())
        .filter_map(|property| match property.property_type() {
            PropertyType::Ref(identity) => Some(identity.iri().to_owned()),
            _ => None,
        })
        .collect();

    let ordered = determine_generation_order(&entities)?;
    debug!(entities = ordered.len(), "generating entity instances");

    let mut generated = Vec::with_capacity(ordered.len());
    for entity in ordered {
        let identity = entity.identity().iri().to_owned();
        if referenced.contains(&identity) {
            continue;
        }
        let document =
            generate_instance_document(&entity, &data_mapping, parsed, registry, "")?;
        // Validate through the instance machinery, producing the resolved
        // snapshot form.
        let schema = EntityType::resolve(Arc::clone(&entity), registry)?;
        let instance = schema.instantiate(&document)?;
        let snapshot = instance.snapshot()?;
        generated.push(GeneratedInstance {
            identity,
            document: serde_json::to_value(snapshot)?,
        });
    }
    Ok(generated)
}

/// Validate the data mapping for every entity it references, then confirm
/// every collected entity reference is itself covered by the mapping.
fn validate_data_mapping(
    data_mapping: &BTreeMap<String, BTreeMap<String, String>>,
    entities: &BTreeMap<String, Arc<Entity>>,
) -> Result<()> {
    let mut pending_refs: BTreeSet<String> = BTreeSet::new();
    for (identity, entity) in entities {
        let entity_mapping = data_mapping.get(identity).ok_or_else(|| {
            Soft7Error::InsufficientData(format!(
                "entity identity {} is missing from the data mapping.",
                identity
            ))
        })?;
        pending_refs.extend(validate_entity_mapping(entity_mapping, entity)?);
    }
    for reference in pending_refs {
        if !entities.contains_key(&reference) {
            return Err(Soft7Error::InsufficientData(format!(
                "entity identity {} is missing from the data mapping.",
                reference
            )));
        }
    }
    Ok(())
}

/// Validate the data mapping for one entity. Entity-typed (`ref`) properties
/// are deferred: their identities are returned for cross-entity checking
/// instead of being required in the mapping.
fn validate_entity_mapping(
    entity_mapping: &BTreeMap<String, String>,
    entity: &Entity,
) -> Result<BTreeSet<String>> {
    for entity_path in entity_mapping.keys() {
        if entity_path.starts_with("dimensions.") && entity_path.matches('.').count() > 1 {
            return Err(Soft7Error::InvalidMapping(
                "nested dimensions are not supported.".to_owned(),
            ));
        }
        if entity_path.starts_with("properties.") && entity_path.matches('.').count() > 1 {
            return Err(Soft7Error::InvalidMapping(
                "nested properties are not supported.".to_owned(),
            ));
        }
    }

    for dimension_name in entity.dimension_names() {
        if !entity_mapping.contains_key(&format!("dimensions.{}", dimension_name)) {
            return Err(Soft7Error::InvalidMapping(format!(
                "dimension '{}' is missing from the data mapping for {}.",
                dimension_name,
                entity.identity()
            )));
        }
    }

    let mut refs = BTreeSet::new();
    for (property_name, property) in entity.properties() {
        if let PropertyType::Ref(identity) = property.property_type() {
            refs.insert(identity.iri().to_owned());
            continue;
        }
        if !entity_mapping.contains_key(&format!("properties.{}", property_name)) {
            return Err(Soft7Error::InvalidMapping(format!(
                "property '{}' is missing from the data mapping for {}.",
                property_name,
                entity.identity()
            )));
        }
    }
    Ok(refs)
}

/// Order entities so every entity is generated after the entities it
/// references.
fn determine_generation_order(
    entities: &BTreeMap<String, Arc<Entity>>,
) -> Result<Vec<Arc<Entity>>> {
    let mut ordered: Vec<Arc<Entity>> = Vec::new();
    let mut handled: BTreeSet<String> = BTreeSet::new();
    let mut remaining: Vec<Arc<Entity>> = Vec::new();

    for entity in entities.values() {
        let has_refs = entity
            .properties()
            .values()
            .any(|property| property.property_type().is_ref());
        if has_refs {
            remaining.push(Arc::clone(entity));
        } else {
            handled.insert(entity.identity().iri().to_owned());
            ordered.push(Arc::clone(entity));
        }
    }

    while !remaining.is_empty() {
        let before = handled.len();
        let mut still_remaining = Vec::new();
        for entity in remaining {
            let ready = entity
                .properties()
                .values()
                .all(|property| match property.property_type() {
                    PropertyType::Ref(identity) => handled.contains(identity.iri()),
                    _ => true,
                });
            if ready {
                handled.insert(entity.identity().iri().to_owned());
                ordered.push(entity);
            } else {
                still_remaining.push(entity);
            }
        }
        remaining = still_remaining;
        if handled.len() == before {
            return Err(Soft7Error::InsufficientData(
                "unable to determine a generation order for the entities; \
                 a referenced entity is likely missing from the data mapping."
                    .to_owned(),
            ));
        }
    }
    Ok(ordered)
}

/// Build the raw instance document for one entity by walking the parsed
/// content along the mapped data paths. `suffix` carries the literal index
/// segments accumulated through shaped entity-typed properties.
fn generate_instance_document(
    entity: &Arc<Entity>,
    data_mapping: &BTreeMap<String, BTreeMap<String, String>>,
    parsed: &Json,
    registry: &EntityRegistry,
    suffix: &str,
) -> Result<Json> {
    let identity = entity.identity().iri();
    let entity_mapping = data_mapping.get(identity).ok_or_else(|| {
        Soft7Error::InsufficientData(format!(
            "entity identity {} is missing from the data mapping.",
            identity
        ))
    })?;

    let mut dimensions = serde_json::Map::new();
    for (entity_path, data_path) in entity_mapping {
        if let Some(name) = entity_path.strip_prefix("dimensions.") {
            let datum = get_parsed_datum(parsed, &format!("{}{}", data_path, suffix), true)?;
            dimensions.insert(name.to_owned(), datum);
        }
    }

    let mut properties = serde_json::Map::new();
    for (entity_path, data_path) in entity_mapping {
        if let Some(name) = entity_path.strip_prefix("properties.") {
            let datum = get_parsed_datum(parsed, &format!("{}{}", data_path, suffix), false)?;
            properties.insert(name.to_owned(), datum);
        }
    }

    // Entity-typed properties expand recursively: one shape dimension yields
    // a fixed-length sequence of sub-instances with the data path extended by
    // a literal index segment, no shape recurses once as-is.
    for (property_name, property) in entity.properties() {
        let PropertyType::Ref(reference) = property.property_type() else {
            continue;
        };
        let referenced = registry.get(reference.iri()).ok_or_else(|| {
            Soft7Error::EntityNotFound(format!(
                "referenced entity {} is not registered",
                reference
            ))
        })?;
        let shape = property.shape().unwrap_or_default();
        let value = match shape {
            [] => generate_instance_document(&referenced, data_mapping, parsed, registry, suffix)?,
            [dimension] => {
                let size = dimensions
                    .get(dimension.as_str())
                    .and_then(Json::as_i64)
                    .ok_or_else(|| {
                        Soft7Error::InvalidMapping(format!(
                            "dimension '{}' bounding property '{}' did not resolve to an integer",
                            dimension, property_name
                        ))
                    })?;
                let mut items = Vec::with_capacity(size as usize);
                for index in 0..size {
                    items.push(generate_instance_document(
                        &referenced,
                        data_mapping,
                        parsed,
                        registry,
                        &format!("{}.{}", suffix, index),
                    )?);
                }
                Json::Array(items)
            }
            _ => {
                return Err(Soft7Error::InvalidMapping(format!(
                    "property '{}' is entity-typed with more than one shape dimension, \
                     which is not supported",
                    property_name
                )))
            }
        };
        properties.insert(property_name.clone(), value);
    }

    Ok(serde_json::json!({ "dimensions": dimensions, "properties": properties }))
}

/// Walk a dot-separated data path through the parsed content tree.
///
/// Each segment resolves as a mapping key or, against a list, as an integer
/// index. A non-numeric terminal segment against a list measures the list
/// instead when the target is a dimension.
pub fn get_parsed_datum(parsed: &Json, data_path: &str, dimension: bool) -> Result<Json> {
    let parts: Vec<&str> = data_path.split('.').collect();
    let mut current = parsed;
    for (depth, part) in parts.iter().enumerate() {
        let terminal = depth + 1 == parts.len();
        match current {
            Json::Object(map) => {
                current = map.get(*part).ok_or_else(|| {
                    Soft7Error::InsufficientData(format!(
                        "data path '{}' is missing from the parsed data (no key '{}').",
                        data_path, part
                    ))
                })?;
            }
            Json::Array(items) => {
                if let Ok(index) = part.parse::<usize>() {
                    current = items.get(index).ok_or_else(|| {
                        Soft7Error::InsufficientData(format!(
                            "data path '{}' is missing from the parsed data; \
                             index {} out of range.",
                            data_path, index
                        ))
                    })?;
                } else if terminal && dimension {
                    // The terminal segment of a dimension path measures the
                    // list it lands on.
                    return Ok(Json::from(items.len() as u64));
                } else {
                    return Err(Soft7Error::InsufficientData(format!(
                        "data path '{}' is missing from the parsed data; \
                         got a list where segment '{}' is not an index.",
                        data_path, part
                    )));
                }
            }
            _ => {
                return Err(Soft7Error::InsufficientData(format!(
                    "data path '{}' walks past a leaf value at segment '{}'.",
                    data_path, part
                )));
            }
        }
    }
    Ok(current.clone())
}
