//! Show command - reads one entity back from the catalog.

use anyhow::{Context, Result};
use catalog_emitter::{CatalogTransport, EmissionClient, EmitSettings, HttpTransport};
use config::Config;
use serde_json::Value;

/// Runs the show command against the configured catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be reached or the entity cannot be
/// rendered.
pub async fn execute(config: &Config, urn: &str) -> Result<()> {
    let transport = HttpTransport::new(&config.gms_url, config.token.as_deref())
        .context("Failed to create catalog transport")?;
    let client = EmissionClient::new(transport, EmitSettings::default());

    match run(&client, urn).await? {
        Some(entity) => println!("{}", serde_json::to_string_pretty(&entity)?),
        None => println!("No entity found for {urn}"),
    }

    Ok(())
}

/// Looks up `urn` in the catalog.
///
/// # Errors
///
/// Returns an error if the catalog read fails.
pub async fn run<T: CatalogTransport>(client: &EmissionClient<T>, urn: &str) -> Result<Option<Value>> {
    client
        .lookup(urn)
        .await
        .with_context(|| format!("Failed to read {urn}"))
}

#[cfg(test)]
mod tests {
    use catalog_emitter::EmitError;
    use serde_json::json;

    use super::*;

    struct StaticCatalog(Option<Value>);

    impl CatalogTransport for StaticCatalog {
        async fn ingest(&self, _payload: &Value) -> Result<(), EmitError> {
            Ok(())
        }

        async fn get_entity(&self, urn: &str) -> Result<Option<Value>, EmitError> {
            if urn.contains("unreachable") {
                return Err(EmitError::Transport("connection refused".to_string()));
            }
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_show_found_and_missing() {
        let entity = json!({"urn": "urn:li:mlModel:(urn:li:dataPlatform:llm,OpenAI/gpt-4,PROD)"});
        let found = EmissionClient::new(StaticCatalog(Some(entity.clone())), EmitSettings::default());
        let missing = EmissionClient::new(StaticCatalog(None), EmitSettings::default());

        assert_eq!(run(&found, "urn:li:mlModel:x").await.unwrap(), Some(entity));
        assert_eq!(run(&missing, "urn:li:mlModel:x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_show_read_error() {
        let client = EmissionClient::new(StaticCatalog(None), EmitSettings::default());

        let error = run(&client, "urn:li:unreachable").await.unwrap_err();

        assert!(error.to_string().contains("urn:li:unreachable"));
    }
}
