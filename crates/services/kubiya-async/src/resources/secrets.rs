use serde_json::{Value, json};

use super::rewrap;
use crate::{
    client::Client,
    config::Config,
    error::KubiyaError,
    router::Endpoint,
    types::secret::{CreateSecret, Secret, SecretValueResponse, UpdateSecret},
};

/// API resource for organization secrets
pub struct Secrets<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Secrets<'c, C> {
    /// Creates a new Secrets resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// Lists secret metadata
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Secret`] if the request fails.
    pub async fn list(&self) -> Result<Vec<Secret>, KubiyaError> {
        let path = Endpoint::SecretsList.path(&[])?;
        self.client
            .get(&path)
            .await
            .map_err(|e| rewrap(e, |e| KubiyaError::secret("Failed to list secrets", None, e)))
    }

    /// Secret metadata by name
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Secret`] if the request fails.
    pub async fn get(&self, name: &str) -> Result<Secret, KubiyaError> {
        let path = Endpoint::SecretsGet.path(&[("secret_name", name)])?;
        self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| KubiyaError::secret("Failed to get secret", Some(name), e))
        })
    }

    /// The secret's value; empty when the API returns none
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name, or
    /// [`KubiyaError::Secret`] if the request fails.
    pub async fn value(&self, name: &str) -> Result<String, KubiyaError> {
        if name.is_empty() {
            return Err(KubiyaError::validation("Secret name is required", "name"));
        }
        let path = Endpoint::SecretsGetValue.path(&[("secret_name", name)])?;
        let response: SecretValueResponse = self.client.get(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::secret("Failed to get secret value", Some(name), e)
            })
        })?;
        Ok(response.value)
    }

    /// Creates a secret
    ///
    /// Returns the API's response, or a confirmation message when the API
    /// answers with an empty body.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or ambiguous value,
    /// [`KubiyaError::Secret`] for an unreadable file or failed request.
    pub async fn create(&self, request: CreateSecret) -> Result<Value, KubiyaError> {
        let name = request.name().to_string();
        let body = request.into_body().await?;
        let path = Endpoint::SecretsCreate.path(&[])?;
        let response: Value = self.client.post(&path, body).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::secret("Failed to create secret", Some(&name), e)
            })
        })?;
        tracing::debug!(secret = %name, "created secret");
        Ok(if response.is_null() {
            json!({ "message": "Secret created successfully" })
        } else {
            response
        })
    }

    /// Replaces a secret's value and optionally its description
    ///
    /// # Errors
    ///
    /// Same as [`Secrets::create`].
    pub async fn update(&self, name: &str, request: UpdateSecret) -> Result<Value, KubiyaError> {
        let body = request.into_body().await?;
        let path = Endpoint::SecretsUpdate.path(&[("secret_name", name)])?;
        self.client.put(&path, body).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::secret("Failed to update secret", Some(name), e)
            })
        })
    }

    /// Deletes a secret
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::Secret`] if the request fails.
    pub async fn delete(&self, name: &str) -> Result<Value, KubiyaError> {
        let path = Endpoint::SecretsDelete.path(&[("secret_name", name)])?;
        self.client.delete(&path).await.map_err(|e| {
            rewrap(e, |e| {
                KubiyaError::secret("Failed to delete secret", Some(name), e)
            })
        })
    }
}

impl<C: Config> crate::Client<C> {
    /// Returns the Secrets API resource
    #[must_use]
    pub const fn secrets(&self) -> Secrets<'_, C> {
        Secrets::new(self)
    }
}
