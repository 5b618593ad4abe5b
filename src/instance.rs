use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::datatype::{coerce_scalar, Value};
use crate::entity::{Entity, Identity};
use crate::error::{Result, Soft7Error};
use crate::factory::{EntityType, LeafType};
use crate::graph::OtherHasher;

/// A deferred lookup of one named datum (property or dimension).
///
/// The same getter is shared by every field of one instance; which datum to
/// produce is selected by the name passed in. Getters are invoked at most
/// once per field, on first access.
pub type Getter = Arc<dyn Fn(&str) -> Result<Json> + Send + Sync>;

// ------------- Snapshot -------------
/// A fully resolved instance: dimension sizes and property values with no
/// residual getters. This is the serialization form of an [`Instance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub dimensions: BTreeMap<String, i64>,
    pub properties: BTreeMap<String, Value>,
}

// ------------- Dimensions -------------
/// The resolved-or-pending dimension sizes of one instance.
///
/// Dimensions are frozen: there is no way to assign a size from outside, and
/// a resolved size never changes. Only declared dimension names resolve;
/// anything else is rejected.
pub struct Dimensions {
    declared: Vec<String>,
    getter: Getter,
    resolved: Mutex<HashMap<String, i64, OtherHasher>>,
}

impl Dimensions {
    pub(crate) fn new(declared: Vec<String>, getter: Getter) -> Self {
        Self { declared, getter, resolved: Mutex::new(HashMap::default()) }
    }

    pub fn names(&self) -> &[String] {
        &self.declared
    }

    /// Resolve a dimension size, caching the result.
    pub fn get(&self, name: &str) -> Result<i64> {
        if !self.declared.iter().any(|declared| declared == name) {
            return Err(Soft7Error::AttributeRetrieval {
                field: name.to_owned(),
                reason: "not a declared dimension".to_owned(),
            });
        }
        {
            let resolved = self
                .resolved
                .lock()
                .map_err(|error| Soft7Error::Lock(error.to_string()))?;
            if let Some(size) = resolved.get(name) {
                return Ok(*size);
            }
        }
        let raw = (self.getter.as_ref())(name).map_err(|error| Soft7Error::AttributeRetrieval {
            field: name.to_owned(),
            reason: error.to_string(),
        })?;
        let size = raw
            .as_i64()
            .filter(|size| *size >= 0)
            .ok_or_else(|| Soft7Error::AttributeValidation {
                field: name.to_owned(),
                reason: "dimension sizes must be non-negative integers".to_owned(),
            })?;
        self.resolved
            .lock()
            .map_err(|error| Soft7Error::Lock(error.to_string()))?
            .insert(name.to_owned(), size);
        Ok(size)
    }
}

// ------------- Instance -------------
/// A concrete, lazily resolved realization of an entity.
///
/// Every property starts out unresolved; the first read invokes the shared
/// getter, validates the raw datum against the declared (possibly shaped)
/// type, and caches the result. Subsequent reads and serialization reuse the
/// cached value, so resolution happens at most once per field per instance.
///
/// There is no mutable access to fields: once resolved, a value never
/// changes, and nothing outside the resolution path can assign one.
pub struct Instance {
    schema: Arc<EntityType>,
    dimensions: Arc<Dimensions>,
    getter: Getter,
    // Properties omitted from a mapping resolve to null instead of erroring.
    optional_properties: bool,
    resolved: Mutex<HashMap<String, Value, OtherHasher>>,
}

impl Instance {
    pub(crate) fn new(
        schema: Arc<EntityType>,
        getter: Getter,
        dimension_getter: Getter,
        optional_properties: bool,
    ) -> Self {
        let declared = schema
            .entity()
            .dimension_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        Self {
            schema,
            dimensions: Arc::new(Dimensions::new(declared, dimension_getter)),
            getter,
            optional_properties,
            resolved: Mutex::new(HashMap::default()),
        }
    }

    pub fn entity(&self) -> &Arc<Entity> {
        self.schema.entity()
    }
    pub fn identity(&self) -> &Identity {
        self.schema.entity().identity()
    }
    pub fn namespace(&self) -> &str {
        self.identity().namespace()
    }
    pub fn version(&self) -> Option<&str> {
        self.identity().version()
    }
    pub fn name(&self) -> &str {
        self.identity().name()
    }
    pub fn dimensions(&self) -> &Arc<Dimensions> {
        &self.dimensions
    }

    /// Resolve one dimension size.
    pub fn dimension(&self, name: &str) -> Result<i64> {
        self.dimensions.get(name)
    }

    /// Resolve one property value.
    ///
    /// The first read fetches the raw datum through the getter and validates
    /// it; later reads return the cached value unchanged. A failed fetch
    /// surfaces as an "attribute could not be retrieved" error, a failed
    /// validation as an "attribute could not be validated" error, both naming
    /// the field.
    pub fn get(&self, name: &str) -> Result<Value> {
        let Some(field) = self.schema.field(name) else {
            return Err(Soft7Error::AttributeRetrieval {
                field: name.to_owned(),
                reason: "not a declared property".to_owned(),
            });
        };
        {
            let resolved = self
                .resolved
                .lock()
                .map_err(|error| Soft7Error::Lock(error.to_string()))?;
            if let Some(value) = resolved.get(name) {
                debug!(property = name, "using cached value");
                return Ok(value.clone());
            }
        }
        debug!(property = name, "resolving value");
        let raw = (self.getter.as_ref())(name).map_err(|error| Soft7Error::AttributeRetrieval {
            field: name.to_owned(),
            reason: error.to_string(),
        })?;

        let value = if self.optional_properties && raw.is_null() {
            // Legitimately absent from the mapping: skipped, not an error.
            Value::Null
        } else {
            let mut sizes = Vec::with_capacity(field.shape.len());
            for dimension in &field.shape {
                let size = self.dimensions.get(dimension).map_err(|error| {
                    Soft7Error::AttributeRetrieval {
                        field: name.to_owned(),
                        reason: error.to_string(),
                    }
                })?;
                sizes.push(size);
            }
            coerce_value(&raw, &field.leaf, &sizes).map_err(|reason| {
                Soft7Error::AttributeValidation { field: name.to_owned(), reason }
            })?
        };

        self.resolved
            .lock()
            .map_err(|error| Soft7Error::Lock(error.to_string()))?
            .insert(name.to_owned(), value.clone());
        Ok(value)
    }

    /// Force resolution of every still-unresolved dimension and property and
    /// return the fully concrete form. Already-resolved fields are reused
    /// verbatim.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let mut dimensions = BTreeMap::new();
        for name in self.dimensions.names().to_vec() {
            let size = self.dimensions.get(&name)?;
            dimensions.insert(name, size);
        }
        let mut properties = BTreeMap::new();
        for name in self.schema.field_names() {
            properties.insert(name.to_owned(), self.get(name)?);
        }
        Ok(Snapshot { dimensions, properties })
    }

    /// Serialize the instance, forcing full resolution.
    pub fn to_json(&self) -> Result<Json> {
        Ok(serde_json::to_value(self.snapshot()?)?)
    }
}

/// Coerce a raw datum against a declared leaf type nested inside
/// `sizes`-many fixed-length sequence levels (outermost size first).
///
/// The error value is a bare reason; callers wrap it into an attribute-level
/// error naming the failing field.
pub(crate) fn coerce_value(
    raw: &Json,
    leaf: &LeafType,
    sizes: &[i64],
) -> std::result::Result<Value, String> {
    if let Some((&size, rest)) = sizes.split_first() {
        let Json::Array(items) = raw else {
            return Err(format!("expected a sequence of length {}", size));
        };
        if items.len() as i64 != size {
            return Err(format!(
                "length {} does not match the dimension size {}",
                items.len(),
                size
            ));
        }
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(coerce_value(item, leaf, rest)?);
        }
        Ok(Value::Sequence(values))
    } else {
        match leaf {
            LeafType::Scalar(scalar) => coerce_scalar(raw, *scalar),
            LeafType::Model(entity_type) => {
                let instance = entity_type
                    .instantiate(raw)
                    .map_err(|error| error.to_string())?;
                let snapshot = instance.snapshot().map_err(|error| error.to_string())?;
                Ok(Value::Model(Box::new(snapshot)))
            }
        }
    }
}

/// Getters over a static instance document of the form
/// `{"dimensions": {...}, "properties": {...}}`.
///
/// A property missing from the document yields null (it was skipped by the
/// mapping); a missing dimension is an error, since shaped properties cannot
/// be validated without it.
pub(crate) fn document_getters(document: &Json) -> (Getter, Getter) {
    let document = Arc::new(document.clone());
    let properties = {
        let document = Arc::clone(&document);
        Arc::new(move |name: &str| -> Result<Json> {
            Ok(document
                .get("properties")
                .and_then(|section| section.get(name))
                .cloned()
                .unwrap_or(Json::Null))
        }) as Getter
    };
    let dimensions = Arc::new(move |name: &str| -> Result<Json> {
        document
            .get("dimensions")
            .and_then(|section| section.get(name))
            .cloned()
            .ok_or_else(|| Soft7Error::AttributeRetrieval {
                field: name.to_owned(),
                reason: "absent from the instance document".to_owned(),
            })
    }) as Getter;
    (properties, dimensions)
}
