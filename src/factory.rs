use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::debug;

use crate::datatype::ScalarType;
use crate::entity::{Entity, PropertyType};
use crate::error::{Result, Soft7Error};
use crate::graph::OtherHasher;
use crate::instance::{document_getters, Getter, Instance};
use crate::pipeline::{fetch_once, DataPipeline, ENTITY_DATA_KEY};

// ------------- EntityRegistry -------------
/// A keeper of parsed entities, deduplicated by identity.
///
/// Entity-typed (`ref`) properties are resolved against this registry when an
/// entity type is synthesized.
#[derive(Default)]
pub struct EntityRegistry {
    kept: HashMap<String, Arc<Entity>, OtherHasher>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self { kept: HashMap::default() }
    }

    /// Keep an entity, unless one with the same identity is already kept.
    /// Returns the kept entity and whether it was previously kept.
    pub fn keep(&mut self, entity: Entity) -> (Arc<Entity>, bool) {
        let keepsake = entity.identity().iri().to_owned();
        let mut previously_kept = true;
        let kept = self
            .kept
            .entry(keepsake)
            .or_insert_with(|| {
                previously_kept = false;
                Arc::new(entity)
            });
        (Arc::clone(kept), previously_kept)
    }

    pub fn get(&self, identity: &str) -> Option<Arc<Entity>> {
        self.kept.get(identity).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- EntityType -------------
/// The leaf of a field type: a scalar, or a nested entity type.
pub(crate) enum LeafType {
    Scalar(ScalarType),
    Model(Arc<EntityType>),
}

/// The fully resolved type of one field: a leaf nested inside `shape`-many
/// fixed-length sequence levels.
pub(crate) struct FieldType {
    pub leaf: LeafType,
    pub shape: Vec<String>,
}

/// A runtime type descriptor synthesized from an entity: the ordered field
/// list with every `ref` property resolved to the referenced entity's own
/// descriptor. Instances are built by interpreting this descriptor rather
/// than by generating named types.
pub struct EntityType {
    entity: Arc<Entity>,
    fields: BTreeMap<String, FieldType>,
}

impl EntityType {
    /// Synthesize the type descriptor for an entity, resolving `ref`
    /// properties against the registry.
    pub fn resolve(entity: Arc<Entity>, registry: &EntityRegistry) -> Result<Arc<Self>> {
        let mut visiting = Vec::new();
        Self::resolve_inner(entity, registry, &mut visiting)
    }

    fn resolve_inner(
        entity: Arc<Entity>,
        registry: &EntityRegistry,
        visiting: &mut Vec<String>,
    ) -> Result<Arc<Self>> {
        let iri = entity.identity().iri().to_owned();
        if visiting.contains(&iri) {
            return Err(Soft7Error::InvalidEntity(format!(
                "circular entity reference through {}",
                iri
            )));
        }
        visiting.push(iri);

        let mut fields = BTreeMap::new();
        for (name, property) in entity.properties() {
            let leaf = match property.property_type() {
                PropertyType::Scalar(scalar) => LeafType::Scalar(*scalar),
                PropertyType::Ref(identity) => {
                    let referenced = registry.get(identity.iri()).ok_or_else(|| {
                        Soft7Error::EntityNotFound(format!(
                            "referenced entity {} is not registered",
                            identity
                        ))
                    })?;
                    LeafType::Model(Self::resolve_inner(referenced, registry, visiting)?)
                }
            };
            let shape = property
                .shape()
                .map(<[String]>::to_vec)
                .unwrap_or_default();
            fields.insert(name.clone(), FieldType { leaf, shape });
        }

        visiting.pop();
        Ok(Arc::new(Self { entity, fields }))
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    pub(crate) fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Build an instance over a static instance document of the form
    /// `{"dimensions": {...}, "properties": {...}}`. Properties omitted from
    /// the document resolve to null.
    pub fn instantiate(self: &Arc<Self>, document: &Json) -> Result<Instance> {
        if !document.is_object() {
            return Err(Soft7Error::InvalidEntity(format!(
                "instance document for {} must be a mapping",
                self.entity.identity()
            )));
        }
        let (properties, dimensions) = document_getters(document);
        Ok(Instance::new(Arc::clone(self), properties, dimensions, true))
    }
}

// ------------- Data source factory -------------
/// Create a data-source instance: an entity realization whose every property
/// and dimension resolves lazily out of the pipeline payload.
///
/// The pipeline runs at most once per configuration digest, process-wide;
/// distinct properties backed by the same pipeline reuse the fetched payload.
/// The payload must carry the entity data section under
/// [`ENTITY_DATA_KEY`], with `properties` and `dimensions` containers inside
/// it.
pub fn create_datasource(
    entity: Arc<Entity>,
    pipeline: Arc<dyn DataPipeline>,
    registry: &EntityRegistry,
) -> Result<Instance> {
    let schema = EntityType::resolve(entity, registry)?;
    debug!(entity = %schema.entity().identity(), "creating data source instance");

    let getter: Getter = Arc::new(move |name: &str| -> Result<Json> {
        let payload = fetch_once(pipeline.as_ref())?;
        let Some(section) = payload.get(ENTITY_DATA_KEY) else {
            return Err(Soft7Error::InsufficientData(format!(
                "the pipeline payload has no '{}' section while resolving '{}'",
                ENTITY_DATA_KEY, name
            )));
        };
        for container in ["properties", "dimensions"] {
            if let Some(value) = section.get(container).and_then(|c| c.get(name)) {
                return Ok(value.clone());
            }
        }
        Err(Soft7Error::AttributeRetrieval {
            field: name.to_owned(),
            reason: "absent from both the properties and dimensions containers".to_owned(),
        })
    });

    Ok(Instance::new(schema, Arc::clone(&getter), getter, false))
}
