use validator::Validate;

use super::memory::SharedStorage;
use super::types::ServiceResult;
use crate::errors::*;
use crate::models::*;
use crate::repos;
use crate::types::*;

#[async_trait]
pub trait AddressService: Send + Sync {
    /// Saves a delivery address. The first address of a user becomes the default one.
    async fn create_address(&self, user_id: UserId, payload: NewAddress) -> ServiceResult<Address>;
    /// Addresses of the user, default first
    async fn list_addresses(&self, user_id: UserId) -> ServiceResult<Vec<Address>>;
    /// Makes the address the only default one of its owner
    async fn set_default(&self, user_id: UserId, address_id: AddressId) -> ServiceResult<Address>;
}

fn default_conflict(e: RepoError) -> Error {
    match e {
        RepoError::UniqueViolation { .. } => Error::DuplicateDefaultAddress,
        other => other.into(),
    }
}

pub struct AddressServiceImpl {
    db_pool: DbPool,
}

impl AddressServiceImpl {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AddressService for AddressServiceImpl {
    async fn create_address(&self, user_id: UserId, payload: NewAddress) -> ServiceResult<Address> {
        payload.validate()?;
        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        let mut address = payload.into_address(user_id);
        if repos::address::count_for_user(&tx, user_id).await? == 0 {
            address.is_default = true;
        }
        if address.is_default {
            repos::address::clear_default(&tx, user_id).await?;
        }
        let address = repos::address::insert(&tx, &address).await.map_err(default_conflict)?;
        tx.commit().await?;

        Ok(address)
    }

    async fn list_addresses(&self, user_id: UserId) -> ServiceResult<Vec<Address>> {
        let conn = self.db_pool.get().await?;
        Ok(repos::address::list_for_user(&*conn, user_id).await?)
    }

    async fn set_default(&self, user_id: UserId, address_id: AddressId) -> ServiceResult<Address> {
        debug!("Setting address {} as default for user {}", address_id, user_id);
        let mut conn = self.db_pool.get().await?;
        let tx = conn.transaction().await?;

        repos::address::get(&tx, address_id)
            .await?
            .filter(|a| a.belongs_to(user_id))
            .ok_or(Error::NotFound("Address"))?;
        repos::address::clear_default(&tx, user_id).await?;
        let address = repos::address::mark_default(&tx, address_id)
            .await
            .map_err(default_conflict)?
            .ok_or(Error::NotFound("Address"))?;
        tx.commit().await?;

        Ok(address)
    }
}

pub struct AddressServiceMemory {
    pub inner: SharedStorage,
}

#[async_trait]
impl AddressService for AddressServiceMemory {
    async fn create_address(&self, user_id: UserId, payload: NewAddress) -> ServiceResult<Address> {
        payload.validate()?;
        let mut inner = self.inner.lock().unwrap();

        let mut address = payload.into_address(user_id);
        if !inner.addresses.values().any(|a| a.user_id == user_id) {
            address.is_default = true;
        }
        if address.is_default {
            for a in inner.addresses.values_mut().filter(|a| a.user_id == user_id) {
                a.is_default = false;
            }
        }
        inner.addresses.insert(address.id, address.clone());

        Ok(address)
    }

    async fn list_addresses(&self, user_id: UserId) -> ServiceResult<Vec<Address>> {
        let inner = self.inner.lock().unwrap();
        let mut addresses = inner.addresses.values().filter(|a| a.user_id == user_id).cloned().collect::<Vec<_>>();
        addresses.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(b.created_at.cmp(&a.created_at)));

        Ok(addresses)
    }

    async fn set_default(&self, user_id: UserId, address_id: AddressId) -> ServiceResult<Address> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.addresses.get(&address_id).map_or(false, |a| a.belongs_to(user_id)) {
            return Err(Error::NotFound("Address"));
        }

        for a in inner.addresses.values_mut().filter(|a| a.user_id == user_id) {
            a.is_default = a.id == address_id;
        }

        inner.addresses.get(&address_id).cloned().ok_or(Error::NotFound("Address"))
    }
}
