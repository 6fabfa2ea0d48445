use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// UnknownVariant
///
/// Raised when a text column or form field holds a value outside one of the closed
/// enumerations below. Rows are decoded once in the repository, so this only ever
/// surfaces there (as a repository fault) or in form validation (as a 400).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// --- Closed Enumerations ---

/// Role
///
/// RBAC field of a profile. Members only read; editors publish library content;
/// admins additionally manage roles and subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Member,
    Editor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }

    /// Editors and admins may create library resources.
    pub fn can_publish(&self) -> bool {
        matches!(self, Role::Editor | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "member" => Ok(Role::Member),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// SubscriptionStatus
///
/// Mirrors the billing provider's lifecycle. Only `Active` grants entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "incomplete" => Ok(SubscriptionStatus::Incomplete),
            other => Err(UnknownVariant::new("subscription status", other)),
        }
    }
}

/// PlanTier
///
/// Used both as the plan a subscription is on and as the minimum plan a
/// resource requires. Anything above `Free` is premium content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PlanTier {
    #[default]
    Free,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
        }
    }
}

impl FromStr for PlanTier {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "premium" => Ok(PlanTier::Premium),
            other => Err(UnknownVariant::new("plan", other)),
        }
    }
}

/// ResourceStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ResourceStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Draft => "draft",
            ResourceStatus::Published => "published",
            ResourceStatus::Archived => "archived",
        }
    }
}

impl FromStr for ResourceStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ResourceStatus::Draft),
            "published" => Ok(ResourceStatus::Published),
            "archived" => Ok(ResourceStatus::Archived),
            other => Err(UnknownVariant::new("resource status", other)),
        }
    }
}

/// ResourceKind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ResourceKind {
    #[default]
    Audio,
    Video,
    Pdf,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Audio => "audio",
            ResourceKind::Video => "video",
            ResourceKind::Pdf => "pdf",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(ResourceKind::Audio),
            "video" => Ok(ResourceKind::Video),
            "pdf" => Ok(ResourceKind::Pdf),
            other => Err(UnknownVariant::new("resource kind", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Core Entities ---

/// User
///
/// A row of `public.profiles`. The id is the auth provider's user id; the row is
/// created at signup and only ever updated here (display name, role).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
}

/// Subscription
///
/// Billing state of a user. Several rows may exist per user; only the most recent
/// one (by `created_at`) is ever consulted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    #[ts(type = "string | null")]
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    /// Billing provider tag, e.g. "stripe".
    pub provider: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Resource
///
/// A library item. Exactly one of `public_url` / `file_path` is expected to be set:
/// free items are served from a public URL, premium items from the private bucket.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Resource {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub min_plan: PlanTier,
    pub status: ResourceStatus,
    pub kind: ResourceKind,
    pub public_url: Option<String>,
    /// Object key inside the private bucket.
    pub file_path: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn is_premium(&self) -> bool {
        self.min_plan != PlanTier::Free
    }

    pub fn is_published(&self) -> bool {
        self.status == ResourceStatus::Published
    }
}

/// ContactMessage
///
/// Write-only record created by the public contact form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub topic: Option<String>,
    pub message: String,
}

// --- Raw Database Rows (Repository Use Only) ---

/// Profile row as stored; enum columns are plain text until decoded.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub display_name: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = UnknownVariant;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            role: row.role.parse()?,
            display_name: row.display_name,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = UnknownVariant;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: row.id,
            user_id: row.user_id,
            plan: row.plan.parse()?,
            status: row.status.parse()?,
            current_period_end: row.current_period_end,
            cancel_at_period_end: row.cancel_at_period_end,
            provider: row.provider,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ResourceRow {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub min_plan: String,
    pub status: String,
    pub kind: String,
    pub public_url: Option<String>,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = UnknownVariant;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(Resource {
            id: row.id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            min_plan: row.min_plan.parse()?,
            status: row.status.parse()?,
            kind: row.kind.parse()?,
            public_url: row.public_url,
            file_path: row.file_path,
            created_at: row.created_at,
        })
    }
}

// --- Request Payloads (Input Schemas) ---

/// SignedUrlQuery
///
/// Query string of `GET /api/recursos/signed-url`. The id stays a raw string so a
/// missing id (400) can be told apart from a malformed one (404).
#[derive(Debug, Clone, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct SignedUrlQuery {
    /// Resource id (UUID).
    pub id: Option<String>,
}

/// NewResource
///
/// Validated input for inserting a library resource. Built by the admin handler
/// from the multipart form after any file upload has completed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewResource {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub min_plan: PlanTier,
    pub status: ResourceStatus,
    pub kind: ResourceKind,
    pub public_url: Option<String>,
    pub file_path: Option<String>,
}

/// ContactRequest
///
/// Payload of the public contact form (POST /api/contacto).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ContactRequest {
    #[schema(example = "Ana")]
    pub name: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    pub message: String,
}

/// RegisterUserRequest
///
/// Signup form. The password is forwarded to the auth provider and never stored
/// or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// UpdateProfileRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

/// SetRoleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// UpsertSubscriptionRequest
///
/// Admin/billing sync payload. When `id` is absent a new row is created.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpsertSubscriptionRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub provider: String,
}

// --- Output Schemas ---

/// ResourceSummary
///
/// Library listing entry. Premium items never carry a storage location; `locked`
/// tells the frontend whether the caller's subscription opens them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ResourceSummary {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub kind: ResourceKind,
    pub min_plan: PlanTier,
    pub public_url: Option<String>,
    pub locked: bool,
}

impl ResourceSummary {
    pub fn from_resource(resource: Resource, entitled: bool) -> Self {
        let premium = resource.is_premium();
        ResourceSummary {
            id: resource.id,
            slug: resource.slug,
            title: resource.title,
            excerpt: resource.excerpt,
            kind: resource.kind,
            min_plan: resource.min_plan,
            public_url: if premium { None } else { resource.public_url },
            locked: premium && !entitled,
        }
    }
}

/// UserProfile
///
/// Output of GET /api/me.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub display_name: Option<String>,
    /// Whether the latest subscription currently grants premium access.
    pub entitled: bool,
}

/// ErrorBody
///
/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub error: String,
}
