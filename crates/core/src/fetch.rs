//! Remote structure retrieval.
//!
//! The coordinate service serves structures by identifier (optionally a
//! single assembly). It reports some failures in-band: the body is a valid
//! response containing a `_coordinate_server_error.message` line, which
//! [`validate_structure`] turns into a [`CoreError::FetchFailed`].

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::CoreError;

/// Prefix of the in-band error line written by the coordinate service.
const ERROR_MARKER: &str = "_coordinate_server_error.message";

/// Source of structure files and assembly metadata.
#[async_trait::async_trait]
pub trait StructureSource: Send + Sync {
    /// Download a structure, or one of its assemblies.
    async fn fetch_structure(
        &self,
        structure_id: &str,
        assembly_id: Option<&str>,
    ) -> Result<Vec<u8>, CoreError>;

    /// Identifier of the preferred biological assembly, if one is declared.
    async fn preferred_assembly(&self, structure_id: &str) -> Result<Option<String>, CoreError>;
}

/// [`StructureSource`] backed by the public coordinate and metadata services.
pub struct RemoteStructureSource {
    client: reqwest::Client,
    coordinate_url: String,
    metadata_url: String,
}

impl RemoteStructureSource {
    pub fn new(
        coordinate_url: impl Into<String>,
        metadata_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            coordinate_url: coordinate_url.into().trim_end_matches('/').to_string(),
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn structure_url(&self, structure_id: &str, assembly_id: Option<&str>) -> String {
        match assembly_id {
            Some(assembly) => format!(
                "{}/{structure_id}/assembly?id={assembly}",
                self.coordinate_url
            ),
            None => format!("{}/{structure_id}/full", self.coordinate_url),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl StructureSource for RemoteStructureSource {
    async fn fetch_structure(
        &self,
        structure_id: &str,
        assembly_id: Option<&str>,
    ) -> Result<Vec<u8>, CoreError> {
        let url = self.structure_url(structure_id, assembly_id);
        tracing::debug!(%url, "Downloading structure");

        let response = self.get(&url).await.map_err(|reason| {
            CoreError::FetchFailed(format!(
                "Structure [{structure_id}] is unlikely to exist or has been made obsolete. ({reason})"
            ))
        })?;
        let body = response.bytes().await.map_err(|e| {
            CoreError::FetchFailed(format!(
                "Error downloading structure [{structure_id}]: {e}"
            ))
        })?;
        Ok(body.to_vec())
    }

    async fn preferred_assembly(&self, structure_id: &str) -> Result<Option<String>, CoreError> {
        let url = format!("{}/{structure_id}-assembly.xml", self.metadata_url);
        let response = self.get(&url).await.map_err(|reason| {
            CoreError::FetchFailed(format!("assembly metadata for {structure_id}: {reason}"))
        })?;
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::FetchFailed(e.to_string()))?;
        Ok(preferred_assembly_id(&body))
    }
}

/// Reject a downloaded structure that carries the in-band error marker.
pub fn validate_structure(content: &[u8]) -> Result<(), CoreError> {
    match error_marker_message(content) {
        Some(message) => Err(CoreError::FetchFailed(message)),
        None => Ok(()),
    }
}

/// The unquoted message of the first error marker line, if any.
pub fn error_marker_message(content: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(content);
    let line = text.lines().find(|l| l.starts_with(ERROR_MARKER))?;
    let value = line[ERROR_MARKER.len()..].trim();
    let unquoted = value
        .strip_prefix(['\'', '"'])
        .and_then(|v| v.strip_suffix(['\'', '"']))
        .unwrap_or(value);
    Some(unquoted.to_string())
}

static ASSEMBLY_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<assembly\b([^>]*)>").expect("valid regex"));

static ATTRIBUTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w:-]+)\s*=\s*"([^"]*)""#).expect("valid regex"));

/// Id of the `<assembly>` element marked `prefered="True"`.
pub fn preferred_assembly_id(metadata_xml: &str) -> Option<String> {
    ASSEMBLY_TAG_RE.captures_iter(metadata_xml).find_map(|tag| {
        let attrs = tag.get(1)?.as_str();
        let mut id = None;
        let mut preferred = false;
        for attr in ATTRIBUTE_RE.captures_iter(attrs) {
            match &attr[1] {
                "id" => id = Some(attr[2].to_string()),
                "prefered" => preferred = attr[2].eq_ignore_ascii_case("true"),
                _ => {}
            }
        }
        if preferred {
            id
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn clean_structure_validates() {
        let cif = b"data_1TQN\n_entry.id 1TQN\nATOM 1 N\n";
        assert_matches!(validate_structure(cif), Ok(()));
    }

    #[test]
    fn error_marker_message_is_unquoted() {
        let cif = b"data_error\n_coordinate_server_error.message   'Entry 9zzz not found.'\n";
        assert_eq!(
            error_marker_message(cif).as_deref(),
            Some("Entry 9zzz not found.")
        );
        assert_matches!(
            validate_structure(cif),
            Err(CoreError::FetchFailed(msg)) if msg == "Entry 9zzz not found."
        );
    }

    #[test]
    fn marker_must_start_the_line() {
        let cif = b"# mentions _coordinate_server_error.message 'x'\n";
        assert!(error_marker_message(cif).is_none());
    }

    #[test]
    fn preferred_assembly_is_found_in_any_attribute_order() {
        let xml = r#"<?xml version="1.0"?>
            <assembly_list>
              <assembly id="1" composition="monomer" prefered="False" />
              <assembly prefered="True" id="2" composition="dimer">
              </assembly>
            </assembly_list>"#;
        assert_eq!(preferred_assembly_id(xml).as_deref(), Some("2"));
    }

    #[test]
    fn no_preferred_assembly() {
        let xml = r#"<assembly_list><assembly id="1" prefered="False"/></assembly_list>"#;
        assert!(preferred_assembly_id(xml).is_none());
        assert!(preferred_assembly_id("not xml").is_none());
    }

    #[test]
    fn structure_urls() {
        let source = RemoteStructureSource::new(
            "https://coords.example.org/",
            "https://meta.example.org",
            Duration::from_secs(5),
        )
        .expect("client");
        assert_eq!(
            source.structure_url("1tqn", None),
            "https://coords.example.org/1tqn/full"
        );
        assert_eq!(
            source.structure_url("1tqn", Some("1")),
            "https://coords.example.org/1tqn/assembly?id=1"
        );
    }
}
