use bimap::BiMap;
use pest::error::LineColLocation;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{Result, Soft7Error};

#[derive(Parser)]
#[grammar = "mapping.pest"]
struct MappingParser;

// ------------- TriplePart -------------
/// One part of an expanded triple: a namespace and the concept within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePart {
    pub namespace: String,
    pub concept: String,
}

/// An expanded mapping triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdfTriple {
    pub subject: TriplePart,
    pub predicate: TriplePart,
    pub object: TriplePart,
}

// ------------- MappingDocument -------------
/// A set of mapping triples plus the prefix table used to expand them.
///
/// Triple parts stay in their compact written form (`alias:concept`,
/// `namespace#concept`, or a literal); [`MappingDocument::flatten`] expands
/// them into `{namespace, concept}` pairs.
#[derive(Debug)]
pub struct MappingDocument {
    prefixes: BiMap<String, String>,
    triples: Vec<(String, String, String)>,
}

impl MappingDocument {
    pub fn new() -> Self {
        Self { prefixes: BiMap::new(), triples: Vec::new() }
    }

    /// Parse a mapping document in the minimal Turtle-like text format
    /// described by `mapping.pest`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut pairs =
            MappingParser::parse(Rule::document, text).map_err(|error| {
                let (line, col) = match error.line_col {
                    LineColLocation::Pos((line, col)) => (line, col),
                    LineColLocation::Span((line, col), _) => (line, col),
                };
                Soft7Error::Parse {
                    message: error.variant.message().into_owned(),
                    line: Some(line),
                    col: Some(col),
                }
            })?;
        let document = pairs.next().expect("the document rule always matches");

        let mut result = Self::new();
        for item in document.into_inner() {
            match item.as_rule() {
                Rule::prefix => {
                    let mut inner = item.into_inner();
                    let alias = inner
                        .next()
                        .expect("prefix rule has an alias")
                        .as_str()
                        .trim_end_matches(':')
                        .to_owned();
                    let namespace = inner
                        .next()
                        .expect("prefix rule has an iri")
                        .as_str()
                        .trim_start_matches('<')
                        .trim_end_matches('>')
                        .to_owned();
                    result.add_prefix(alias, namespace);
                }
                Rule::statement => {
                    let mut parts = item.into_inner().map(|part| {
                        let part = part.into_inner().next().expect("part has an alternative");
                        match part.as_rule() {
                            Rule::iri => part
                                .as_str()
                                .trim_start_matches('<')
                                .trim_end_matches('>')
                                .to_owned(),
                            Rule::literal => part.as_str().trim_matches('"').to_owned(),
                            _ => part.as_str().to_owned(),
                        }
                    });
                    let subject = parts.next().expect("statement has a subject");
                    let predicate = parts.next().expect("statement has a predicate");
                    let object = parts.next().expect("statement has an object");
                    result.add_triple(subject, predicate, object);
                }
                Rule::EOI => {}
                _ => {}
            }
        }
        Ok(result)
    }

    pub fn add_prefix(&mut self, alias: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(alias.into(), namespace.into());
    }

    pub fn add_triple(
        &mut self,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) {
        self.triples
            .push((subject.into(), predicate.into(), object.into()));
    }

    /// Look up the namespace bound to an alias.
    pub fn namespace(&self, alias: &str) -> Option<&str> {
        self.prefixes.get_by_left(alias).map(String::as_str)
    }

    /// Look up the alias bound to a namespace.
    pub fn alias(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get_by_right(namespace).map(String::as_str)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes
            .iter()
            .map(|(alias, namespace)| (alias.as_str(), namespace.as_str()))
    }

    pub fn triples(&self) -> &[(String, String, String)] {
        &self.triples
    }

    /// Expand every triple part into a `{namespace, concept}` pair, either by
    /// prefix substitution (`alias:concept`) or by splitting on the first
    /// hash (`namespace#concept`).
    pub fn flatten(&self) -> Result<Vec<RdfTriple>> {
        self.triples
            .iter()
            .map(|(subject, predicate, object)| {
                Ok(RdfTriple {
                    subject: self.flatten_part(subject)?,
                    predicate: self.flatten_part(predicate)?,
                    object: self.flatten_part(object)?,
                })
            })
            .collect()
    }

    fn flatten_part(&self, part: &str) -> Result<TriplePart> {
        if part.is_empty() {
            return Ok(TriplePart { namespace: String::new(), concept: String::new() });
        }
        if let Some((alias, concept)) = part.split_once(':') {
            if let Some(namespace) = self.namespace(alias) {
                return Ok(TriplePart {
                    namespace: namespace.to_owned(),
                    concept: concept.to_owned(),
                });
            }
        }
        if let Some((namespace, concept)) = part.split_once('#') {
            return Ok(TriplePart {
                namespace: format!("{}#", namespace),
                concept: concept.to_owned(),
            });
        }
        Err(Soft7Error::InvalidMapping(format!(
            "invalid triple part '{}': the namespace is not in the prefix table, \
             and the part cannot be split into namespace and concept on a hash (#)",
            part
        )))
    }
}

impl Default for MappingDocument {
    fn default() -> Self {
        Self::new()
    }
}
