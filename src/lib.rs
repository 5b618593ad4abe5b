//! SOFT7 – semantic data models with lazily resolved, graph-mapped instances.
//!
//! SOFT7 builds dynamically typed data-model instances ("entities") whose
//! attribute values are resolved on first access from an external data
//! pipeline, and a graph-based mapping layer that determines — at
//! attribute-access time — which chain of mapping and transform steps must
//! execute to produce a requested value:
//! * An [`entity::Entity`] is a named, versioned schema: an identity URI,
//!   named integer dimensions, and typed, optionally shaped properties.
//! * An [`instance::Instance`] is a concrete realization of an entity whose
//!   fields are getter thunks until first read; a resolved value is
//!   validated, cached, and never re-fetched.
//! * A [`graph::Graph`] is an append-only, deduplicated triple collection
//!   with pattern matching and exhaustive depth-first path discovery.
//! * The [`factory`] synthesizes data-source instances over a
//!   [`pipeline::DataPipeline`], memoizing the underlying fetch process-wide
//!   by configuration digest.
//! * The [`resolver`] composes outer entities whose properties are computed
//!   by discovering and executing function chains through the graph.
//! * The [`generator`] turns mapping triples plus parsed content into
//!   validated entity instances.
//!
//! ## Modules
//! * [`entity`] – Schema model: identity parsing and structural validation.
//! * [`instance`] – The lazy attribute-resolution engine and snapshots.
//! * [`datatype`] – Scalar property types and resolved values.
//! * [`graph`] – Triple graph with match and path search.
//! * [`pipeline`] – The raw-data access contract and its memoization.
//! * [`factory`] – Entity registry, entity types, data-source factory.
//! * [`mapping`] – Mapping documents: prefixes, triples, text format.
//! * [`resolver`] – Outer entities resolved by graph traversal.
//! * [`generator`] – Mapping-driven instance generation.
//! * [`loader`] – Documents from paths, URLs, or raw YAML/JSON.
//! * [`rdf`] – Turtle export of entity schemas.
//! * [`store`] – SQLite-backed entity store.
//! * [`server`] – The dataspace HTTP surface over the store.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use soft7::datatype::Value;
//! use soft7::entity::Entity;
//! use soft7::factory::{create_datasource, EntityRegistry};
//! use soft7::pipeline::StaticPipeline;
//!
//! let entity = Entity::from_json(json!({
//!     "identity": "https://onto-ns.com/s7/0.1.0/temperature",
//!     "properties": {"celsius": {"type": "float"}}
//! })).unwrap();
//! let pipeline = StaticPipeline::new(json!({
//!     "soft7_entity_data": {"properties": {"celsius": 21.5}}
//! }));
//! let registry = EntityRegistry::new();
//! let instance = create_datasource(Arc::new(entity), Arc::new(pipeline), &registry).unwrap();
//! assert_eq!(instance.get("celsius").unwrap(), Value::Float(21.5));
//! ```

pub mod datatype;
pub mod entity;
pub mod error;
pub mod factory;
pub mod generator;
pub mod graph;
pub mod instance;
pub mod loader;
pub mod mapping;
pub mod pipeline;
pub mod rdf;
pub mod resolver;
pub mod server;
pub mod store;
