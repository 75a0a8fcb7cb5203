use serde_json::Value;

use super::rewrap;
use crate::{
    client::Client,
    config::Config,
    error::KubiyaError,
    router::Endpoint,
    search::{match_distance, rank, source_is_relevant, threshold},
    types::tool::{Source, SourceMetadata, Tool, ToolDescription, ToolMatch},
};

/// API resource for tool sources and the tools they define
pub struct Tools<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Tools<'c, C> {
    /// Creates a new Tools resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Lists tool sources
    ///
    /// A response that is not a list yields no sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn sources(&self) -> Result<Vec<Source>, KubiyaError> {
        let path = Endpoint::SourcesList.path(&[])?;
        let response: Value = self.client.get(&path).await?;
        if !response.is_array() {
            return Ok(Vec::new());
        }
        serde_json::from_value(response).map_err(|e| KubiyaError::Serde(e.to_string()))
    }

    /// Metadata of one source, including its tools
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn source_metadata(&self, source_uuid: &str) -> Result<SourceMetadata, KubiyaError> {
        let path = Endpoint::SourceMetadata.path(&[("source_uuid", source_uuid)])?;
        self.client.get(&path).await
    }

    /// Tools of one source, or of every source when `source_uuid` is `None`
    ///
    /// Sources whose metadata cannot be fetched are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Tool`] if the named source or the source list
    /// cannot be fetched.
    pub async fn list(&self, source_uuid: Option<&str>) -> Result<Vec<Tool>, KubiyaError> {
        let wrap = |e: &KubiyaError| KubiyaError::Tool(format!("Failed to list tools: {e}"));

        if let Some(uuid) = source_uuid {
            let metadata = self
                .source_metadata(uuid)
                .await
                .map_err(|e| rewrap(e, wrap))?;
            return Ok(metadata.all_tools().cloned().collect());
        }

        let mut tools = Vec::new();
        for source in self.sources().await.map_err(|e| rewrap(e, wrap))? {
            if let Some(metadata) = self.metadata_or_skip(&source).await {
                tools.extend(metadata.all_tools().cloned());
            }
        }
        Ok(tools)
    }

    /// Tools whose name or description resembles `query`
    ///
    /// Sources whose name or description relates to the query are searched
    /// first; when none do, every source is searched. Matches are sorted by
    /// distance, then name, and capped.
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Tool`] if the source list cannot be fetched.
    pub async fn search(&self, query: &str) -> Result<Vec<ToolMatch>, KubiyaError> {
        let query = query.to_lowercase();
        let max_distance = threshold(&query);

        let sources = self.sources().await.map_err(|e| {
            rewrap(e, |e| KubiyaError::Tool(format!("Failed to search tools: {e}")))
        })?;
        let (relevant, others): (Vec<Source>, Vec<Source>) = sources
            .into_iter()
            .partition(|s| source_is_relevant(&query, &s.name, &s.description));
        let candidates = if relevant.is_empty() { others } else { relevant };

        let mut matches = Vec::new();
        for source in candidates {
            let Some(metadata) = self.metadata_or_skip(&source).await else {
                continue;
            };
            for tool in metadata.tools {
                let distance = match_distance(&query, &tool.name, &tool.description);
                if distance <= max_distance {
                    matches.push(ToolMatch {
                        tool,
                        source: source.clone(),
                        distance,
                    });
                }
            }
        }

        rank(&mut matches, |m| (m.distance, m.tool.name.as_str()));
        Ok(matches)
    }

    /// Finds a tool by exact name
    ///
    /// Regular tools are checked before inline tools, and sources in listing
    /// order when no source is given.
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::ToolNotFound`] when no source defines the tool,
    /// or [`KubiyaError::Tool`] if a lookup fails.
    pub async fn describe(
        &self,
        name: &str,
        source_uuid: Option<&str>,
    ) -> Result<ToolDescription, KubiyaError> {
        let wrap = |e: &KubiyaError| KubiyaError::Tool(format!("Failed to describe tool: {e}"));

        if let Some(uuid) = source_uuid {
            let metadata = self
                .source_metadata(uuid)
                .await
                .map_err(|e| rewrap(e, wrap))?;
            return metadata
                .find(name)
                .map(|tool| ToolDescription {
                    tool: tool.clone(),
                    source_name: metadata.name.clone(),
                })
                .ok_or_else(|| KubiyaError::ToolNotFound(name.to_string()));
        }

        for source in self.sources().await.map_err(|e| rewrap(e, wrap))? {
            let Some(metadata) = self.metadata_or_skip(&source).await else {
                continue;
            };
            if let Some(tool) = metadata.find(name) {
                return Ok(ToolDescription {
                    tool: tool.clone(),
                    source_name: Some(source.name),
                });
            }
        }
        Err(KubiyaError::ToolNotFound(name.to_string()))
    }

    async fn metadata_or_skip(&self, source: &Source) -> Option<SourceMetadata> {
        if source.uuid.is_empty() {
            tracing::warn!(source = %source.name, "skipping source without uuid");
            return None;
        }
        match self.source_metadata(&source.uuid).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(source = %source.uuid, "skipping source: {e}");
                None
            }
        }
    }
}

impl<C: Config> crate::Client<C> {
    /// Returns the Tools API resource
    #[must_use]
    pub const fn tools(&self) -> Tools<'_, C> {
        Tools::new(self)
    }
}
