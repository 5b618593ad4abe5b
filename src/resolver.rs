use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::debug;

use crate::datatype::Value;
use crate::entity::Entity;
use crate::error::{Result, Soft7Error};
use crate::factory::{EntityRegistry, EntityType};
use crate::graph::{Graph, OtherHasher};
use crate::instance::{Getter, Instance};

/// A transform step in a mapping chain. Arguments arrive as named values,
/// one entry per declared parameter.
pub type TransformFn = Arc<dyn Fn(&BTreeMap<String, Value>) -> Result<Value> + Send + Sync>;

// ------------- FunctionLibrary -------------
/// A keeper of executable transforms. Graph nodes carrying an `executes`
/// relation name entries of this library, so function-call structure stays in
/// the graph while the executables stay here.
#[derive(Default)]
pub struct FunctionLibrary {
    kept: HashMap<String, TransformFn, OtherHasher>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self { kept: HashMap::default() }
    }

    pub fn register<F>(&mut self, name: &str, function: F)
    where
        F: Fn(&BTreeMap<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.kept.insert(name.to_owned(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<TransformFn> {
        self.kept.get(name).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.kept.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Path selection -------------
/// How to pick among several acceptable traversal paths.
///
/// The acceptance rule (exactly one outer and one inner attribute reference
/// on the path) can leave more than one candidate; `FirstMatch` takes the
/// first in traversal order, `RequireUnique` treats genuine ambiguity as an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    #[default]
    FirstMatch,
    RequireUnique,
}

const OUTER: &str = "outer";
const INNER_DATA: &str = "inner_data";
const PATH_PREDICATES: [&str; 5] = ["mapsTo", "outputs", "expects", "hasProperty", "hasPart"];

// ------------- Outer entity -------------
/// Compose an outer (mapped, derived) entity from an outer schema, a set of
/// named inner instances, and mapping triples.
///
/// Each property of the returned instance resolves by graph traversal: the
/// combined graph (structural triples, the mapping, derived property/getter
/// triples, and the function knowledge base) is searched for a path from
/// `outer.<property>` to the inner data, the functions on that path are
/// extracted, and the chain is executed against the inner instances.
pub fn create_outer_entity(
    entity: Arc<Entity>,
    inner_entities: BTreeMap<String, Arc<Instance>>,
    mapping: &Graph,
    knowledge: &Graph,
    functions: Arc<FunctionLibrary>,
    registry: &EntityRegistry,
    policy: AmbiguityPolicy,
) -> Result<Instance> {
    let schema = EntityType::resolve(entity, registry)?;

    // Build the combined local graph.
    let mut graph = Graph::new();
    graph.append(OUTER, "isA", "OuterEntity");
    graph.append("DataSourceEntity", "isA", "SOFT7DataEntity");
    graph.append("OuterEntity", "isA", "SOFT7DataEntity");
    for inner_name in inner_entities.keys() {
        graph.append(inner_name, "isA", "DataSourceEntity");
        graph.append(INNER_DATA, "hasPart", inner_name);
    }
    let mapping_triples: Vec<(String, String, String)> = mapping
        .triples()
        .map(|(s, p, o)| (s.to_owned(), p.to_owned(), o.to_owned()))
        .collect();
    for (subject, predicate, object) in &mapping_triples {
        graph.append(subject, predicate, object);
        // Every dotted part is an attribute reference: tie it to its root and
        // bind a getter to it.
        for part in [subject.as_str(), object.as_str()] {
            if let Some((root, _)) = part.split_once('.') {
                graph.append(root, "hasProperty", part);
                graph.append(part, "get", &format!("get#{}", part));
            }
        }
    }
    graph.extend_from(knowledge);

    let resolver = Arc::new(GraphResolver { graph, inner: inner_entities, functions, policy });
    let getter: Getter = Arc::new(move |name: &str| -> Result<Json> {
        let value = resolver.resolve(name)?;
        serde_json::to_value(&value).map_err(|error| Soft7Error::External(error.to_string()))
    });
    Ok(Instance::new(schema, Arc::clone(&getter), getter, false))
}

/// The per-property resolution engine behind an outer entity's getter.
struct GraphResolver {
    graph: Graph,
    inner: BTreeMap<String, Arc<Instance>>,
    functions: Arc<FunctionLibrary>,
    policy: AmbiguityPolicy,
}

/// How a function's parameters are filled: either every expected parameter
/// has a unique mapping to inner data, or none has and the parameters take
/// the upstream chain result.
enum FunctionInputs {
    Bound(Vec<(String, String)>),
    Chained(Vec<String>),
}

impl GraphResolver {
    fn resolve(&self, name: &str) -> Result<Value> {
        let origin = format!("{}.{}", OUTER, name);
        let paths = self
            .graph
            .path(&origin, INNER_DATA, Some(&PATH_PREDICATES), Some(&[OUTER]));
        debug!(property = name, candidates = paths.len(), "discovered traversal paths");

        // Accept paths carrying exactly one outer and one inner attribute
        // reference.
        let mut candidates = paths
            .iter()
            .filter(|path| path.iter().filter(|node| node.contains('.')).count() == 2);
        let path = match self.policy {
            AmbiguityPolicy::FirstMatch => candidates.next(),
            AmbiguityPolicy::RequireUnique => {
                let first = candidates.next();
                if first.is_some() && candidates.next().is_some() {
                    return Err(Soft7Error::Traversal(format!(
                        "found more than one valid path through the graph for '{}'",
                        origin
                    )));
                }
                first
            }
        };
        let Some(path) = path else {
            return Err(Soft7Error::Traversal(format!(
                "could not determine a proper path through the graph for '{}'",
                origin
            )));
        };
        debug!(path = %path.join(" -> "), "graph traversed");

        // Functions on the accepted path, in path order.
        let functions: Vec<&str> = path
            .iter()
            .map(String::as_str)
            .filter(|node| {
                self.graph
                    .matches(Some(*node), Some("isA"), Some("function"))
                    .next()
                    .is_some()
            })
            .collect();

        if functions.is_empty() {
            // Degenerate chain: the outer property maps straight onto inner
            // data, with no transform in between.
            let input = path
                .iter()
                .find(|node| node.contains('.') && node.as_str() != origin)
                .ok_or_else(|| {
                    Soft7Error::Traversal(format!("no function found to retrieve '{}'", name))
                })?;
            return self.inner_value(input);
        }

        let mut plan = Vec::with_capacity(functions.len());
        for function in &functions {
            plan.push((*function, self.inputs(function)?, self.executable(function)?));
        }

        // Walk the chain in reverse discovery order: the function nearest the
        // inner data applies first, later functions consume the running
        // result.
        let mut result: Option<Value> = None;
        for (function, inputs, executable) in plan.iter().rev() {
            let mut arguments: BTreeMap<String, Value> = BTreeMap::new();
            match inputs {
                FunctionInputs::Bound(bound) => {
                    for (parameter, input) in bound {
                        arguments.insert(parameter.clone(), self.inner_value(input)?);
                    }
                }
                FunctionInputs::Chained(parameters) => {
                    let upstream = result.clone().ok_or_else(|| {
                        Soft7Error::Traversal(format!(
                            "function '{}' expects an upstream result, but none has been produced",
                            function
                        ))
                    })?;
                    for parameter in parameters {
                        arguments.insert(parameter.clone(), upstream.clone());
                    }
                }
            }
            result = Some((executable.as_ref())(&arguments)?);
        }
        result.ok_or_else(|| {
            Soft7Error::Traversal(format!("no function found to retrieve '{}'", name))
        })
    }

    /// Resolve the parameters of one function: every `expects` edge must have
    /// either a unique `mapsTo` supplier or none at all.
    fn inputs(&self, function: &str) -> Result<FunctionInputs> {
        let expects: Vec<String> = self
            .graph
            .matches(Some(function), Some("expects"), None)
            .map(|(_, _, object)| object.to_owned())
            .collect();

        let mut bound: Vec<(String, String)> = Vec::new();
        let mut unmapped = 0usize;
        for expect in &expects {
            let suppliers: Vec<String> = self
                .graph
                .matches(None, Some("mapsTo"), Some(expect.as_str()))
                .map(|(subject, _, _)| subject.to_owned())
                .collect();
            match suppliers.len() {
                0 => unmapped += 1,
                1 => bound.push((expect.clone(), suppliers.into_iter().next().expect("one supplier"))),
                found => {
                    return Err(Soft7Error::Traversal(format!(
                        "expected exactly 1 mapping to '{}', instead found {}",
                        expect, found
                    )))
                }
            }
        }

        if bound.is_empty() {
            Ok(FunctionInputs::Chained(expects))
        } else if unmapped == 0 {
            Ok(FunctionInputs::Bound(bound))
        } else {
            Err(Soft7Error::Traversal(format!(
                "function '{}' has mappings for only {} of its {} expected parameters",
                function,
                bound.len(),
                expects.len()
            )))
        }
    }

    /// Find the executable registered for a function node via its unique
    /// `executes` edge.
    fn executable(&self, function: &str) -> Result<TransformFn> {
        let executes: Vec<&str> = self
            .graph
            .matches(Some(function), Some("executes"), None)
            .map(|(_, _, object)| object)
            .collect();
        if executes.len() != 1 {
            return Err(Soft7Error::Traversal(format!(
                "expected exactly 1 executable for function '{}', instead found {}",
                function,
                executes.len()
            )));
        }
        self.functions.get(executes[0]).ok_or_else(|| {
            Soft7Error::Traversal(format!(
                "function '{}' executes '{}', which is not registered",
                function, executes[0]
            ))
        })
    }

    /// Fetch an inner attribute value for a dotted input path, after
    /// confirming the unique getter bound to it.
    fn inner_value(&self, input: &str) -> Result<Value> {
        let getters = self
            .graph
            .matches(Some(input), Some("get"), None)
            .count();
        if getters != 1 {
            return Err(Soft7Error::Traversal(format!(
                "expected exactly 1 getter for '{}', instead found {}",
                input, getters
            )));
        }
        let Some((entity_name, attribute)) = input.split_once('.') else {
            return Err(Soft7Error::Traversal(format!(
                "input '{}' is not an <entity>.<attribute> path",
                input
            )));
        };
        let instance = self.inner.get(entity_name).ok_or_else(|| {
            Soft7Error::Traversal(format!(
                "data source entity '{}' is not among the inner entities",
                entity_name
            ))
        })?;
        instance.get(attribute)
    }
}
