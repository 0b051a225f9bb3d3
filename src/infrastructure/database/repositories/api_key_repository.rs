//! SeaORM implementation of ApiKeyRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use tracing::debug;

use crate::domain::{ApiKey, ApiKeyRepository, DomainError, DomainResult, NewApiKey};
use crate::infrastructure::database::entities::api_key;

pub struct SeaOrmApiKeyRepository {
    db: DatabaseConnection,
}

impl SeaOrmApiKeyRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn insert_err(e: DbErr) -> DomainError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            DomainError::Conflict("api_key with this key".to_string())
        }
        _ => db_err(e),
    }
}

#[async_trait]
impl ApiKeyRepository for SeaOrmApiKeyRepository {
    async fn insert(&self, new: NewApiKey) -> DomainResult<ApiKey> {
        let model = api_key::ActiveModel {
            name: Set(new.name),
            key: Set(new.key),
            created_at: Set(new.created_at),
            expires_at: Set(new.expires_at),
            ..Default::default()
        };
        let model = model.insert(&self.db).await.map_err(insert_err)?;
        debug!(id = model.id, name = %model.name, "API key row inserted");
        Ok(model.into())
    }

    async fn list(&self, name: Option<&str>) -> DomainResult<Vec<ApiKey>> {
        let mut query = api_key::Entity::find();
        if let Some(name) = name {
            query = query.filter(api_key::Column::Name.eq(name));
        }
        let keys = query
            .order_by_asc(api_key::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(keys.into_iter().map(ApiKey::from).collect())
    }

    async fn get_by_id(&self, id: i32) -> DomainResult<ApiKey> {
        api_key::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(ApiKey::from)
            .ok_or_else(|| DomainError::key_not_found(id))
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Vec<ApiKey>> {
        let keys = self.list(Some(name)).await?;
        if keys.is_empty() {
            return Err(DomainError::name_not_found(name));
        }
        Ok(keys)
    }

    async fn get_by_secret(&self, secret: &str) -> DomainResult<ApiKey> {
        api_key::Entity::find()
            .filter(api_key::Column::Key.eq(secret))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(ApiKey::from)
            .ok_or_else(DomainError::secret_not_found)
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        let result = api_key::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(DomainError::key_not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::infrastructure::database::{init_database, DatabaseConfig};

    async fn repo() -> SeaOrmApiKeyRepository {
        let db = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        crate::infrastructure::database::run_migrations(&db).await.unwrap();
        SeaOrmApiKeyRepository::new(db)
    }

    fn new_key(name: &str, key: &str) -> NewApiKey {
        NewApiKey {
            name: name.to_string(),
            key: key.to_string(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_round_trips_timestamps() {
        let repo = repo().await;
        let expires = Utc::now() + Duration::days(7);
        let mut first = new_key("svc-a", "k1");
        first.expires_at = Some(expires);

        let a = repo.insert(first).await.unwrap();
        let b = repo.insert(new_key("svc-b", "k2")).await.unwrap();

        assert!(b.id > a.id);
        let fetched = repo.get_by_id(a.id).await.unwrap();
        assert_eq!(fetched.key, "k1");
        assert_eq!(
            fetched.expires_at.map(|t| t.timestamp()),
            Some(expires.timestamp())
        );
    }

    #[tokio::test]
    async fn duplicate_secret_is_a_conflict() {
        let repo = repo().await;
        repo.insert(new_key("a", "same")).await.unwrap();
        let err = repo.insert(new_key("b", "same")).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_filters_by_exact_name() {
        let repo = repo().await;
        repo.insert(new_key("x", "k1")).await.unwrap();
        repo.insert(new_key("y", "k2")).await.unwrap();
        repo.insert(new_key("x", "k3")).await.unwrap();
        repo.insert(new_key("xx", "k4")).await.unwrap();

        let xs = repo.list(Some("x")).await.unwrap();
        assert_eq!(
            xs.iter().map(|k| k.key.as_str()).collect::<Vec<_>>(),
            vec!["k1", "k3"]
        );
        assert_eq!(repo.list(None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn lookups_report_not_found() {
        let repo = repo().await;
        assert!(matches!(
            repo.get_by_id(42).await,
            Err(DomainError::NotFound { field: "id", .. })
        ));
        assert!(matches!(
            repo.get_by_name("nobody").await,
            Err(DomainError::NotFound { field: "name", .. })
        ));
        assert!(matches!(
            repo.get_by_secret("nope").await,
            Err(DomainError::NotFound { field: "key", .. })
        ));
    }

    #[tokio::test]
    async fn delete_is_not_idempotent() {
        let repo = repo().await;
        let k = repo.insert(new_key("a", "k1")).await.unwrap();

        repo.delete(k.id).await.unwrap();
        assert!(matches!(
            repo.get_by_id(k.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete(k.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
