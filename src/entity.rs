use std::collections::BTreeMap;
use std::fmt;

use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::datatype::ScalarType;
use crate::error::{Result, Soft7Error};
use crate::loader;

// ------------- Identity -------------
/// The semantic reference for an entity.
///
/// An identity is a URI of the form `<namespace>/<version>/<name>`, where the
/// last two path segments are version and name and everything preceding them
/// forms the namespace. Query parameters and fragments are not part of the
/// identity and are removed silently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    iri: String,
    namespace: String,
    version: Option<String>,
    name: String,
}

impl Identity {
    /// Parse an identity URI.
    ///
    /// The scheme must be `http`, `https` or `file`, the host must be
    /// present, the path must be non-empty and the name segment must be
    /// non-empty once a trailing slash is stripped. Default ports for
    /// `http`/`https` are not part of the reconstructed namespace.
    pub fn parse(input: &str) -> Result<Self> {
        let cleaned = input
            .split('#')
            .next()
            .unwrap_or_default()
            .split('?')
            .next()
            .unwrap_or_default();

        let url = Url::parse(cleaned).map_err(|error| {
            Soft7Error::InvalidEntity(format!("identity '{}' is not a valid URL: {}", input, error))
        })?;

        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(Soft7Error::InvalidEntity(format!(
                "identity '{}' must use the http, https or file scheme.",
                input
            )));
        }

        let Some(host) = url.host_str() else {
            return Err(Soft7Error::InvalidEntity(
                "identity as a URL must have a host part.".to_owned(),
            ));
        };

        let path = url.path();
        if path.is_empty() || path == "/" {
            return Err(Soft7Error::InvalidEntity(
                "identity as a URL must have a path part.".to_owned(),
            ));
        }

        // The last two path segments are version and name.
        let trimmed = path.trim_end_matches('/');
        let mut segments = trimmed.rsplit('/');
        let name = segments.next().unwrap_or_default().to_owned();
        let version = segments.next().unwrap_or_default().to_owned();

        if name.is_empty() {
            return Err(Soft7Error::InvalidEntity(
                "identity must have a name part.".to_owned(),
            ));
        }

        let mut namespace = format!("{}://", url.scheme());
        if !url.username().is_empty() {
            namespace.push_str(url.username());
        }
        if let Some(password) = url.password() {
            namespace.push(':');
            namespace.push_str(password);
        }
        if !url.username().is_empty() || url.password().is_some() {
            namespace.push('@');
        }
        namespace.push_str(host);
        // `Url::port` already omits the default ports for http(s).
        if let Some(port) = url.port() {
            namespace.push_str(&format!(":{}", port));
        }
        // Remove version and name from the path, including their two
        // preceding slashes.
        let keep = trimmed.len().saturating_sub(version.len() + name.len() + 2);
        namespace.push_str(&trimmed[..keep]);

        let version = if version.is_empty() { None } else { Some(version) };
        let iri = match &version {
            Some(version) => format!("{}/{}/{}", namespace, version, name),
            None => format!("{}/{}", namespace, name),
        };

        Ok(Self { iri, namespace, version, name })
    }

    /// The canonical identity URI.
    pub fn iri(&self) -> &str {
        &self.iri
    }
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.iri)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.iri)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identity::parse(&raw).map_err(D::Error::custom)
    }
}

// ------------- PropertyType -------------
/// The declared type of an entity property: one of the closed scalar types,
/// or a reference to another entity (identified by its identity URI).
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyType {
    Scalar(ScalarType),
    Ref(Identity),
}

impl PropertyType {
    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref(_))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => write!(f, "{}", scalar),
            Self::Ref(identity) => write!(f, "{}", identity),
        }
    }
}

impl Serialize for PropertyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(scalar) => serializer.serialize_str(scalar.soft_name()),
            Self::Ref(identity) => serializer.serialize_str(identity.iri()),
        }
    }
}

// ------------- EntityProperty -------------
/// One typed, optionally shaped property of an entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityProperty {
    #[serde(rename = "type")]
    property_type: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
}

impl EntityProperty {
    pub fn property_type(&self) -> &PropertyType {
        &self.property_type
    }
    pub fn shape(&self) -> Option<&[String]> {
        self.shape.as_deref()
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// Wire form of a property. The `$ref` spelling comes from DLite, which adds
/// a separate `$ref` field holding the entity URI when `type` is `"ref"`.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntityProperty {
    #[serde(rename = "type")]
    property_type: String,
    #[serde(rename = "$ref", alias = "ref", default)]
    reference: Option<String>,
    #[serde(default)]
    shape: Option<Vec<String>>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    unit: Option<String>,
}

impl<'de> Deserialize<'de> for EntityProperty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawEntityProperty::deserialize(deserializer)?;
        let property_type = if raw.property_type == "ref" {
            let Some(reference) = raw.reference else {
                return Err(D::Error::custom(
                    "property type 'ref' requires a '$ref' entity identity",
                ));
            };
            PropertyType::Ref(Identity::parse(&reference).map_err(D::Error::custom)?)
        } else if let Some(scalar) = ScalarType::from_soft_name(&raw.property_type) {
            PropertyType::Scalar(scalar)
        } else {
            // Not a scalar keyword, so it must be an entity identity URI.
            PropertyType::Ref(Identity::parse(&raw.property_type).map_err(|_| {
                D::Error::custom(format!("invalid property type '{}'", raw.property_type))
            })?)
        };
        Ok(Self {
            property_type,
            shape: raw.shape,
            description: raw.description,
            unit: raw.unit,
        })
    }
}

// ------------- Entity -------------
/// A SOFT7 entity: a named, versioned data-model schema with dimensions and
/// typed properties.
///
/// Construct entities through [`Entity::from_json`] or [`Entity::load`];
/// both enforce the structural invariants. Fields are encapsulated so an
/// entity is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entity {
    #[serde(alias = "uri")]
    identity: Identity,
    #[serde(default)]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimensions: Option<BTreeMap<String, String>>,
    properties: BTreeMap<String, EntityProperty>,
}

impl Entity {
    /// Create an entity from an already-parsed document.
    pub fn from_json(document: serde_json::Value) -> Result<Self> {
        let entity: Entity = serde_json::from_value(document)
            .map_err(|error| Soft7Error::InvalidEntity(error.to_string()))?;
        entity.validate()?;
        Ok(entity)
    }

    /// Create an entity from a document reference: a filesystem path, an
    /// http(s) URL, or a raw YAML/JSON string.
    pub fn load(source: &str) -> Result<Self> {
        let document = loader::load_document(source).map_err(|error| match error {
            Soft7Error::Config(message) => Soft7Error::EntityNotFound(message),
            other => other,
        })?;
        Self::from_json(document)
    }

    /// Enforce the structural invariants, collecting every violation before
    /// reporting so a single round of corrections suffices.
    fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.properties.is_empty() {
            errors.push("properties must not be empty.".to_owned());
        }
        for property_name in self.properties.keys() {
            if property_name.starts_with('_') {
                errors.push(format!(
                    "property names may not be 'private', i.e., start with an underscore (_): '{}'",
                    property_name
                ));
            }
        }

        // Every shape entry must name a declared dimension.
        match &self.dimensions {
            Some(dimensions) => {
                for (property_name, property) in &self.properties {
                    if let Some(shape) = property.shape() {
                        let wrong: Vec<&String> = shape
                            .iter()
                            .filter(|dimension| !dimensions.contains_key(*dimension))
                            .collect();
                        if !wrong.is_empty() {
                            errors.push(format!(
                                "{}: contains shape dimensions that are not defined in 'dimensions': {:?}",
                                property_name, wrong
                            ));
                        }
                    }
                }
            }
            None => {
                for (property_name, property) in &self.properties {
                    if property.shape().is_some() {
                        errors.push(format!(
                            "{}: cannot have shape; no dimensions are defined.",
                            property_name
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Soft7Error::InvalidEntity(errors.join("\n")))
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn dimensions(&self) -> Option<&BTreeMap<String, String>> {
        self.dimensions.as_ref()
    }
    pub fn properties(&self) -> &BTreeMap<String, EntityProperty> {
        &self.properties
    }
    /// The declared dimension names, in document order.
    pub fn dimension_names(&self) -> Vec<&str> {
        self.dimensions
            .as_ref()
            .map(|dimensions| dimensions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
