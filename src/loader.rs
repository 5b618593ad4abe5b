use std::path::Path;
use std::time::Duration;

use serde_json::Value as Json;
use tracing::debug;
use url::Url;

use crate::error::{Result, Soft7Error};

/// Load a document from a reference: an http(s) URL, a filesystem path, or a
/// raw YAML/JSON string. The result is always a mapping; anything else is a
/// configuration error naming the offending source.
pub fn load_document(source: &str) -> Result<Json> {
    if let Some(url) = as_http_url(source) {
        return load_from_url(&url);
    }
    let path = Path::new(source);
    if path.exists() {
        debug!(path = source, "loading document from file");
        let text = std::fs::read_to_string(path).map_err(|error| {
            Soft7Error::Config(format!("could not read the document at {}: {}", source, error))
        })?;
        return parse_text(&text, source);
    }
    parse_text(source, "the given string")
}

fn as_http_url(source: &str) -> Option<Url> {
    let url = Url::parse(source).ok()?;
    if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
        Some(url)
    } else {
        None
    }
}

fn load_from_url(url: &Url) -> Result<Json> {
    debug!(url = %url, "loading document from url");
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|error| Soft7Error::External(error.to_string()))?;
    let response = client
        .get(url.as_str())
        .header(reqwest::header::ACCEPT, "application/yaml, application/json")
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|error| {
            Soft7Error::Config(format!(
                "could not retrieve the document online from {}: {}",
                url, error
            ))
        })?;
    let text = response.text().map_err(|error| {
        Soft7Error::Config(format!(
            "could not read the document retrieved from {}: {}",
            url, error
        ))
    })?;
    parse_text(&text, url.as_str())
}

fn parse_text(text: &str, source: &str) -> Result<Json> {
    // YAML is a superset of JSON, so one parser covers both formats.
    let value: Json = serde_yaml::from_str(text).map_err(|error| {
        Soft7Error::Config(format!(
            "could not parse {} as a YAML/JSON document: {}",
            source, error
        ))
    })?;
    if !value.is_object() {
        return Err(Soft7Error::Config(format!(
            "the document from {} does not contain a mapping.",
            source
        )));
    }
    Ok(value)
}
