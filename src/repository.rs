use crate::models::{
    ContactMessage, NewResource, Resource, ResourceRow, Role, Subscription, SubscriptionRow,
    UnknownVariant, UpsertSubscriptionRequest, User, UserRow,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// RepositoryError
///
/// A backend fault: the query failed, or a row came back holding a value the
/// domain enums do not know. "Row absent" is never an error; it is `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Decode(#[from] UnknownVariant),
    /// A unique constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Repository Trait
///
/// Typed data access per entity. Handlers never see table or column names; every
/// row is decoded into a domain type here, at a single boundary.
///
/// **Send + Sync + async_trait** keep `Arc<dyn Repository>` usable across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn create_user(&self, user: User) -> Result<User, RepositoryError>;
    async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<String>,
    ) -> Result<Option<User>, RepositoryError>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepositoryError>;

    // --- Subscriptions ---
    /// Most recent subscription row of the user, if any.
    async fn get_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, RepositoryError>;
    /// Inserts or updates by `id`. `None` when the id already belongs to a
    /// different user; rows never change owner.
    async fn upsert_subscription(
        &self,
        req: UpsertSubscriptionRequest,
    ) -> Result<Option<Subscription>, RepositoryError>;

    // --- Resources ---
    /// Returns `None` for missing rows and for rows that are not published, so
    /// drafts and archived items cannot be told apart from unknown ids.
    async fn get_published_resource(&self, id: Uuid) -> Result<Option<Resource>, RepositoryError>;
    async fn get_published_resource_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Resource>, RepositoryError>;
    async fn list_published_resources(&self) -> Result<Vec<Resource>, RepositoryError>;
    async fn create_resource(&self, resource: NewResource) -> Result<Resource, RepositoryError>;

    // --- Contact ---
    async fn create_contact_message(&self, message: ContactMessage) -> Result<(), RepositoryError>;
}

/// RepositoryState
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the hosted Postgres instance. Queries are bound at
/// runtime (`sqlx::query_as` + `bind`) so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, role, display_name";

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, plan, status, current_period_end, cancel_at_period_end, provider, created_at";

const RESOURCE_COLUMNS: &str =
    "id, slug, title, excerpt, min_plan, status, kind, public_url, file_path, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::try_from).transpose()?)
    }

    /// create_user
    ///
    /// Creates the profile mirroring a fresh auth-provider account. New accounts
    /// always start as members, whatever the caller sent.
    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO profiles (id, email, role, display_name) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(Role::Member.as_str())
        .bind(&user.display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(User::try_from(row)?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<String>,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE profiles SET display_name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::try_from).transpose()?)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE profiles SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::try_from).transpose()?)
    }

    /// get_latest_subscription
    ///
    /// Uniqueness per user is not enforced by the schema; the newest row wins.
    async fn get_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Subscription::try_from).transpose()?)
    }

    async fn upsert_subscription(
        &self,
        req: UpsertSubscriptionRequest,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let id = req.id.unwrap_or_else(Uuid::new_v4);
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            r#"
            INSERT INTO subscriptions
                (id, user_id, plan, status, current_period_end, cancel_at_period_end, provider, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (id) DO UPDATE SET
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                provider = EXCLUDED.provider
            WHERE subscriptions.user_id = EXCLUDED.user_id
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.user_id)
        .bind(req.plan.as_str())
        .bind(req.status.as_str())
        .bind(req.current_period_end)
        .bind(req.cancel_at_period_end)
        .bind(&req.provider)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Subscription::try_from).transpose()?)
    }

    async fn get_published_resource(&self, id: Uuid) -> Result<Option<Resource>, RepositoryError> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = $1 AND status = 'published'"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Resource::try_from).transpose()?)
    }

    async fn get_published_resource_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Resource>, RepositoryError> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE slug = $1 AND status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Resource::try_from).transpose()?)
    }

    async fn list_published_resources(&self) -> Result<Vec<Resource>, RepositoryError> {
        let rows = sqlx::query_as::<_, ResourceRow>(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources WHERE status = 'published' \
             ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Resource::try_from(row).map_err(RepositoryError::from))
            .collect()
    }

    async fn create_resource(&self, resource: NewResource) -> Result<Resource, RepositoryError> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            r#"
            INSERT INTO resources
                (id, slug, title, excerpt, min_plan, status, kind, public_url, file_path, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING {RESOURCE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&resource.slug)
        .bind(&resource.title)
        .bind(&resource.excerpt)
        .bind(resource.min_plan.as_str())
        .bind(resource.status.as_str())
        .bind(resource.kind.as_str())
        .bind(&resource.public_url)
        .bind(&resource.file_path)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("slug '{}' already exists", resource.slug))
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(Resource::try_from(row)?)
    }

    async fn create_contact_message(&self, message: ContactMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO contact_messages (name, email, phone, topic, message, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.phone)
        .bind(&message.topic)
        .bind(&message.message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
