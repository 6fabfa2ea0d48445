#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use uuid::Uuid;
use wellness_portal::{
    AppConfig, AppState, create_router,
    auth::Claims,
    models::{
        ContactMessage, NewResource, PlanTier, Resource, ResourceKind, ResourceStatus, Role,
        Subscription, SubscriptionStatus, UpsertSubscriptionRequest, User,
    },
    repository::{Repository, RepositoryError, RepositoryState},
    storage::{MockStorageService, StorageState},
};

// --- In-Memory Repository ---

/// Repository double backed by plain collections. The `fail_*` switches make the
/// matching lookups return a backend error.
#[derive(Default)]
pub struct MockRepository {
    pub users: Mutex<HashMap<Uuid, User>>,
    pub subscriptions: Mutex<Vec<Subscription>>,
    pub resources: Mutex<Vec<Resource>>,
    pub contact_messages: Mutex<Vec<ContactMessage>>,
    pub fail_users: bool,
    pub fail_subscriptions: bool,
    pub fail_resources: bool,
}

fn backend_down() -> RepositoryError {
    RepositoryError::Database(sqlx::Error::PoolTimedOut)
}

impl MockRepository {
    pub fn with_user(self, id: Uuid, role: Role) -> Self {
        self.users.lock().unwrap().insert(
            id,
            User {
                id,
                email: format!("{}@example.com", role.as_str()),
                role,
                display_name: None,
            },
        );
        self
    }

    pub fn with_subscription(
        self,
        user_id: Uuid,
        status: SubscriptionStatus,
        period_end: Option<chrono::DateTime<Utc>>,
    ) -> Self {
        self.subscriptions
            .lock()
            .unwrap()
            .push(subscription(user_id, status, period_end));
        self
    }

    pub fn with_resource(self, resource: Resource) -> Self {
        self.resources.lock().unwrap().push(resource);
        self
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        if self.fail_users {
            return Err(backend_down());
        }
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, RepositoryError> {
        let user = User {
            role: Role::Member,
            ..user
        };
        self.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<String>,
    ) -> Result<Option<User>, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        Ok(users.get_mut(&id).map(|user| {
            user.display_name = display_name;
            user.clone()
        }))
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> Result<Option<User>, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        Ok(users.get_mut(&id).map(|user| {
            user.role = role;
            user.clone()
        }))
    }

    async fn get_latest_subscription(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, RepositoryError> {
        if self.fail_subscriptions {
            return Err(backend_down());
        }
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn upsert_subscription(
        &self,
        req: UpsertSubscriptionRequest,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let mut subs = self.subscriptions.lock().unwrap();
        let id = req.id.unwrap_or_else(Uuid::new_v4);
        let existing = subs.iter().find(|s| s.id == id);
        if existing.is_some_and(|s| s.user_id != req.user_id) {
            return Ok(None);
        }
        let created_at = existing.map(|s| s.created_at).unwrap_or_else(Utc::now);
        subs.retain(|s| s.id != id);
        let sub = Subscription {
            id,
            user_id: req.user_id,
            plan: req.plan,
            status: req.status,
            current_period_end: req.current_period_end,
            cancel_at_period_end: req.cancel_at_period_end,
            provider: req.provider,
            created_at,
        };
        subs.push(sub.clone());
        Ok(Some(sub))
    }

    async fn get_published_resource(&self, id: Uuid) -> Result<Option<Resource>, RepositoryError> {
        if self.fail_resources {
            return Err(backend_down());
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.is_published())
            .cloned())
    }

    async fn get_published_resource_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Resource>, RepositoryError> {
        if self.fail_resources {
            return Err(backend_down());
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.slug == slug && r.is_published())
            .cloned())
    }

    async fn list_published_resources(&self) -> Result<Vec<Resource>, RepositoryError> {
        if self.fail_resources {
            return Err(backend_down());
        }
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_published())
            .cloned()
            .collect())
    }

    async fn create_resource(&self, new: NewResource) -> Result<Resource, RepositoryError> {
        let mut resources = self.resources.lock().unwrap();
        if resources.iter().any(|r| r.slug == new.slug) {
            return Err(RepositoryError::Conflict(format!(
                "slug '{}' already exists",
                new.slug
            )));
        }
        let resource = Resource {
            id: Uuid::new_v4(),
            slug: new.slug,
            title: new.title,
            excerpt: new.excerpt,
            min_plan: new.min_plan,
            status: new.status,
            kind: new.kind,
            public_url: new.public_url,
            file_path: new.file_path,
            created_at: Utc::now(),
        };
        resources.push(resource.clone());
        Ok(resource)
    }

    async fn create_contact_message(&self, message: ContactMessage) -> Result<(), RepositoryError> {
        self.contact_messages.lock().unwrap().push(message);
        Ok(())
    }
}

// --- Fixtures ---

pub fn subscription(
    user_id: Uuid,
    status: SubscriptionStatus,
    period_end: Option<chrono::DateTime<Utc>>,
) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        user_id,
        plan: PlanTier::Premium,
        status,
        current_period_end: period_end,
        cancel_at_period_end: false,
        provider: "stripe".to_string(),
        created_at: Utc::now(),
    }
}

pub fn premium_resource(slug: &str, file_path: Option<&str>) -> Resource {
    Resource {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        title: slug.to_uppercase(),
        excerpt: None,
        min_plan: PlanTier::Premium,
        status: ResourceStatus::Published,
        kind: ResourceKind::Audio,
        public_url: None,
        file_path: file_path.map(str::to_string),
        created_at: Utc::now(),
    }
}

pub fn free_resource(slug: &str, public_url: &str) -> Resource {
    Resource {
        min_plan: PlanTier::Free,
        public_url: Some(public_url.to_string()),
        file_path: None,
        ..premium_resource(slug, None)
    }
}

pub fn in_one_day() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

pub fn one_day_ago() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::days(1)
}

// --- Sessions ---

/// A provider-style access token for `user_id`, signed with the test secret.
pub fn session_token(user_id: Uuid) -> String {
    signed_token(user_id, &AppConfig::default().jwt_secret, 3600)
}

pub fn signed_token(user_id: Uuid, secret: &str, ttl_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: (now + ttl_secs) as usize,
        iat: Some(now as usize),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(user_id: Uuid) -> String {
    format!("Bearer {}", session_token(user_id))
}

// --- App ---

pub fn app(repo: MockRepository, storage: MockStorageService) -> Router {
    app_with_shared(Arc::new(repo), storage)
}

pub fn app_with_shared(repo: Arc<MockRepository>, storage: MockStorageService) -> Router {
    let repo = repo as RepositoryState;
    let storage = Arc::new(storage) as StorageState;
    create_router(AppState::new(repo, storage, AppConfig::default()))
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(axum::http::header::LOCATION)
        .expect("redirect without Location header")
        .to_str()
        .unwrap()
        .to_string()
}
