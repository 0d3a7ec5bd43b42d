//! The data lake facade: namespaced resource storage.

use crate::error::DataLakeError;
use crate::resource::Resource;
use crate::storage::Storage;

/// Raw data storage namespaced under a network and chain.
///
/// Resources live at `network/chain/<name>`; height-scoped resources at
/// `network/chain/height/<height>/<name>`.
pub struct DataLake {
    network: String,
    chain: String,
    storage: Box<dyn Storage>,
}

impl DataLake {
    pub fn new(
        network: impl Into<String>,
        chain: impl Into<String>,
        storage: Box<dyn Storage>,
    ) -> Self {
        Self {
            network: network.into(),
            chain: chain.into(),
            storage,
        }
    }

    /// Store the resource data under `name`.
    pub async fn store_resource(&self, res: &Resource, name: &str) -> Result<(), DataLakeError> {
        let path = self.resource_path(name)?;
        self.storage.store(&res.data, &path).await
    }

    /// Whether a resource is stored under `name`.
    pub async fn is_resource_stored(&self, name: &str) -> Result<bool, DataLakeError> {
        let path = self.resource_path(name)?;
        self.storage.is_stored(&path).await
    }

    /// Retrieve the resource stored under `name`.
    pub async fn retrieve_resource(&self, name: &str) -> Result<Resource, DataLakeError> {
        let path = self.resource_path(name)?;
        let data = self.storage.retrieve(&path).await?;
        Ok(Resource::new(data))
    }

    /// Store the resource data under `name` at the given height.
    pub async fn store_resource_at_height(
        &self,
        res: &Resource,
        name: &str,
        height: i64,
    ) -> Result<(), DataLakeError> {
        let path = self.resource_at_height_path(name, height)?;
        self.storage.store(&res.data, &path).await
    }

    /// Whether a resource is stored under `name` at the given height.
    pub async fn is_resource_stored_at_height(
        &self,
        name: &str,
        height: i64,
    ) -> Result<bool, DataLakeError> {
        let path = self.resource_at_height_path(name, height)?;
        self.storage.is_stored(&path).await
    }

    /// Retrieve the resource stored under `name` at the given height.
    pub async fn retrieve_resource_at_height(
        &self,
        name: &str,
        height: i64,
    ) -> Result<Resource, DataLakeError> {
        let path = self.resource_at_height_path(name, height)?;
        let data = self.storage.retrieve(&path).await?;
        Ok(Resource::new(data))
    }

    fn resource_path(&self, name: &str) -> Result<Vec<String>, DataLakeError> {
        if name.is_empty() {
            return Err(DataLakeError::ResourceNameRequired);
        }
        Ok(vec![
            self.network.clone(),
            self.chain.clone(),
            name.to_string(),
        ])
    }

    fn resource_at_height_path(
        &self,
        name: &str,
        height: i64,
    ) -> Result<Vec<String>, DataLakeError> {
        if name.is_empty() {
            return Err(DataLakeError::ResourceNameRequired);
        }
        Ok(vec![
            self.network.clone(),
            self.chain.clone(),
            "height".to_string(),
            height.to_string(),
            name.to_string(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn lake() -> DataLake {
        DataLake::new("mainnet", "ethereum", Box::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn stores_and_retrieves_named_resources() {
        let lake = lake();
        let res = Resource::new(b"genesis".to_vec());

        lake.store_resource(&res, "genesis").await.unwrap();
        assert!(lake.is_resource_stored("genesis").await.unwrap());

        let loaded = lake.retrieve_resource("genesis").await.unwrap();
        assert_eq!(loaded, res);
    }

    #[tokio::test]
    async fn height_scoped_resources_do_not_collide() {
        let lake = lake();

        lake.store_resource_at_height(&Resource::new(b"a".to_vec()), "block", 10)
            .await
            .unwrap();
        lake.store_resource_at_height(&Resource::new(b"b".to_vec()), "block", 11)
            .await
            .unwrap();

        assert_eq!(
            lake.retrieve_resource_at_height("block", 10)
                .await
                .unwrap()
                .data,
            b"a"
        );
        assert_eq!(
            lake.retrieve_resource_at_height("block", 11)
                .await
                .unwrap()
                .data,
            b"b"
        );
        assert!(!lake.is_resource_stored("block").await.unwrap());
    }

    #[tokio::test]
    async fn empty_resource_name_is_rejected() {
        let lake = lake();
        let res = Resource::new(b"x".to_vec());

        let err = lake.store_resource(&res, "").await.unwrap_err();
        assert!(matches!(err, DataLakeError::ResourceNameRequired));

        let err = lake.retrieve_resource_at_height("", 5).await.unwrap_err();
        assert!(matches!(err, DataLakeError::ResourceNameRequired));
    }
}
