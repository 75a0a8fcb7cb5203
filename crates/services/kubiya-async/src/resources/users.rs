use serde_json::Value;

use super::rewrap;
use crate::{
    client::Client,
    config::Config,
    error::KubiyaError,
    router::{Endpoint, with_query},
    types::{
        list_or_field,
        user::{Group, User, UserPage},
    },
};

/// API resource for organization users and groups
pub struct Users<'c, C: Config> {
    client: &'c Client<C>,
}

impl<'c, C: Config> Users<'c, C> {
    /// Creates a new Users resource
    #[must_use]
    pub const fn new(client: &'c Client<C>) -> Self {
        Self { client }
    }

    /// One page of users
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::User`] if the request fails.
    pub async fn list_users(&self, page: UserPage) -> Result<Vec<User>, KubiyaError> {
        let wrap = |e: &KubiyaError| KubiyaError::User(format!("Failed to list users: {e}"));
        let path = with_query(
            &Endpoint::UserList.path(&[])?,
            &[
                ("limit", page.limit.to_string()),
                ("page", page.page.to_string()),
            ],
        );
        let response: Value = self.client.get(&path).await.map_err(|e| rewrap(e, wrap))?;
        list_or_field(response, "items").map_err(|e| wrap(&KubiyaError::Serde(e.to_string())))
    }

    /// All groups
    ///
    /// # Errors
    ///
    /// Returns [`KubiyaError::User`] if the request fails.
    pub async fn list_groups(&self) -> Result<Vec<Group>, KubiyaError> {
        let wrap = |e: &KubiyaError| KubiyaError::User(format!("Failed to list groups: {e}"));
        let path = Endpoint::GroupList.path(&[])?;
        let response: Value = self.client.get(&path).await.map_err(|e| rewrap(e, wrap))?;
        list_or_field(response, "groups").map_err(|e| wrap(&KubiyaError::Serde(e.to_string())))
    }
}

impl<C: Config> crate::Client<C> {
    /// Returns the Users API resource
    #[must_use]
    pub const fn users(&self) -> Users<'_, C> {
        Users::new(self)
    }
}
