use crate::{
    AppState,
    access::{AccessGrant, issue_grant},
    auth::{AuthUser, MaybeAuthUser, resolve_caller},
    entitlement::{Entitlement, check_entitlement},
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    models::{
        ContactMessage, ContactRequest, ErrorBody, NewResource, PlanTier, RegisterUserRequest,
        Resource, ResourceKind, ResourceStatus, ResourceSummary, SetRoleRequest, SignedUrlQuery,
        Subscription, UpdateProfileRequest, UpsertSubscriptionRequest, User, UserProfile,
    },
    repository::RepositoryError,
    storage::{Bucket, object_path},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Resource Access ---

/// get_signed_url
///
/// [Public Route, session required] Sends the caller to a resource's file.
///
/// Checks run in a fixed order, each ending the request on failure: id present,
/// session present, subscription lookup, entitlement, resource lookup, grant.
/// Free resources with a public URL redirect there; premium ones redirect to a
/// signed URL that expires after 60 seconds.
#[utoipa::path(
    get,
    path = "/api/recursos/signed-url",
    params(SignedUrlQuery),
    responses(
        (status = 307, description = "Redirect to the file"),
        (status = 400, description = "Missing id or misconfigured resource", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody),
        (status = 403, description = "Subscription does not grant access", body = ErrorBody),
        (status = 404, description = "Unknown or unpublished resource", body = ErrorBody),
        (status = 500, description = "Backend or signing failure", body = ErrorBody)
    )
)]
pub async fn get_signed_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<SignedUrlQuery>,
) -> Result<AccessGrant, ApiError> {
    let raw_id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingId)?;

    let caller = resolve_caller(&headers, &state.repo, &state.config).await?;

    let entitlement = check_entitlement(state.repo.as_ref(), caller.as_ref(), Utc::now()).await?;
    if entitlement == Entitlement::NotEntitled {
        tracing::info!(resource_id = %raw_id, "resource access denied: not entitled");
        return Err(ApiError::Forbidden);
    }

    // A malformed id cannot name any row; answer exactly as for an unknown one.
    let Ok(resource_id) = Uuid::parse_str(raw_id) else {
        return Err(ApiError::NotFound);
    };

    let resource = state
        .repo
        .get_published_resource(resource_id)
        .await
        .map_err(|e| {
            tracing::error!(resource_id = %resource_id, error = %e, "resource lookup failed");
            ApiError::ResourceLookupFailed
        })?
        .ok_or(ApiError::NotFound)?;

    let grant = issue_grant(&resource, state.storage.as_ref()).await?;
    tracing::info!(
        resource_id = %resource.id,
        signed = matches!(grant, AccessGrant::Signed(_)),
        "resource access granted"
    );
    Ok(grant)
}

/// Entitlement of an optional caller; anonymous visitors are simply not entitled.
async fn caller_entitled(state: &AppState, caller: Option<&AuthUser>) -> Result<bool, ApiError> {
    match caller {
        Some(_) => Ok(check_entitlement(state.repo.as_ref(), caller, Utc::now())
            .await?
            .is_entitled()),
        None => Ok(false),
    }
}

/// list_resources
///
/// [Public Route] Published library items. Premium items are listed for everyone
/// but flagged `locked` unless the caller's subscription opens them.
#[utoipa::path(
    get,
    path = "/api/recursos",
    responses((status = 200, description = "Library", body = [ResourceSummary]))
)]
pub async fn list_resources(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResourceSummary>>, ApiError> {
    let entitled = caller_entitled(&state, caller.as_ref()).await?;

    let resources = state.repo.list_published_resources().await.map_err(|e| {
        tracing::error!(error = %e, "resource listing failed");
        ApiError::ResourceLookupFailed
    })?;

    Ok(Json(
        resources
            .into_iter()
            .map(|resource| ResourceSummary::from_resource(resource, entitled))
            .collect(),
    ))
}

/// get_resource
///
/// [Public Route] One published item by slug.
#[utoipa::path(
    get,
    path = "/api/recursos/{slug}",
    params(("slug" = String, Path, description = "Resource slug")),
    responses(
        (status = 200, description = "Found", body = ResourceSummary),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_resource(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ResourceSummary>, ApiError> {
    let resource = state
        .repo
        .get_published_resource_by_slug(&slug)
        .await
        .map_err(|e| {
            tracing::error!(slug = %slug, error = %e, "resource lookup failed");
            ApiError::ResourceLookupFailed
        })?
        .ok_or(ApiError::NotFound)?;

    let entitled = if resource.is_premium() {
        caller_entitled(&state, caller.as_ref()).await?
    } else {
        false
    };

    Ok(Json(ResourceSummary::from_resource(resource, entitled)))
}

// --- Contact Form ---

/// validate_contact
///
/// Name, email and message are required; everything is trimmed and empty optional
/// fields are dropped.
pub fn validate_contact(req: ContactRequest) -> Result<ContactMessage, ApiError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    let message = req.message.trim().to_string();

    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Valid email is required".to_string()));
    }
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }

    Ok(ContactMessage {
        name,
        email,
        phone: non_empty(req.phone),
        topic: non_empty(req.topic),
        message,
    })
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// submit_contact
///
/// [Public Route] Stores a contact form submission.
#[utoipa::path(
    post,
    path = "/api/contacto",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Stored"),
        (status = 400, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ContactRequest>,
) -> Result<StatusCode, ApiError> {
    let message = validate_contact(payload)?;

    state
        .repo
        .create_contact_message(message)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "contact message insert failed");
            ApiError::Internal("Could not send message".to_string())
        })?;

    Ok(StatusCode::CREATED)
}

// --- Accounts ---

/// Signup response of the auth provider. Depending on whether email confirmation
/// is on, the user is either the top-level object or nested under `user`.
#[derive(Deserialize)]
struct SignupResponse {
    id: Option<Uuid>,
    user: Option<SignupUser>,
}

#[derive(Deserialize)]
struct SignupUser {
    id: Uuid,
}

/// register_user
///
/// [Public Route] Forwards the signup to the auth provider, then creates the
/// matching `member` profile under the provider's user id.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Rejected by the auth provider", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = payload.email.trim().to_string();
    if !is_plausible_email(&email) {
        return Err(ApiError::BadRequest("Valid email is required".to_string()));
    }

    let signup_url = format!(
        "{}/auth/v1/signup",
        state.config.supabase_url.trim_end_matches('/')
    );

    let response = state
        .http
        .post(signup_url)
        .header("apikey", &state.config.supabase_anon_key)
        .json(&serde_json::json!({ "email": email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "auth provider unreachable");
            ApiError::Internal("Signup failed".to_string())
        })?;

    if !response.status().is_success() {
        tracing::info!(status = %response.status(), "signup rejected by auth provider");
        return Err(ApiError::BadRequest("Signup rejected".to_string()));
    }

    let body = response.json::<SignupResponse>().await.map_err(|e| {
        tracing::error!(error = %e, "unexpected signup response");
        ApiError::Internal("Signup failed".to_string())
    })?;

    let id = body
        .id
        .or(body.user.map(|user| user.id))
        .ok_or_else(|| ApiError::Internal("Signup failed".to_string()))?;

    let user = User {
        id,
        email,
        display_name: non_empty(payload.display_name),
        ..User::default()
    };

    let created = state.repo.create_user(user).await.map_err(|e| {
        tracing::error!(user_id = %id, error = %e, "profile creation failed");
        ApiError::Internal("Signup failed".to_string())
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// get_me
///
/// [Authenticated Route] Caller profile plus current entitlement.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .repo
        .get_user(auth.id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %auth.id, error = %e, "profile lookup failed");
            ApiError::Internal("Profile lookup failed".to_string())
        })?
        .ok_or(ApiError::Unauthenticated)?;

    let entitled = check_entitlement(state.repo.as_ref(), Some(&auth), Utc::now())
        .await?
        .is_entitled();

    Ok(Json(UserProfile {
        id: user.id,
        email: user.email,
        role: user.role,
        display_name: user.display_name,
        entitled,
    }))
}

/// update_me
///
/// [Authenticated Route] Profile edit: only the display name is user-editable.
#[utoipa::path(
    patch,
    path = "/api/me",
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Updated", body = User))
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let display_name = non_empty(payload.display_name);

    state
        .repo
        .update_profile(id, display_name)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %id, error = %e, "profile update failed");
            ApiError::Internal("Profile update failed".to_string())
        })?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

// --- Admin / Editor ---

/// validate_slug
///
/// URL-safe identifiers only: lowercase ASCII letters, digits and inner hyphens.
pub fn validate_slug(slug: &str) -> Result<(), ApiError> {
    let valid = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest("Invalid slug".to_string()))
    }
}

fn default_content_type(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Audio => "audio/mpeg",
        ResourceKind::Video => "video/mp4",
        ResourceKind::Pdf => "application/pdf",
    }
}

/// Raw fields of the resource creation form.
#[derive(Default)]
struct ResourceForm {
    slug: Option<String>,
    title: Option<String>,
    excerpt: Option<String>,
    min_plan: Option<String>,
    status: Option<String>,
    kind: Option<String>,
    public_url: Option<String>,
    file: Option<UploadedFile>,
}

struct UploadedFile {
    name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_resource_form(mut multipart: Multipart) -> Result<ResourceForm, ApiError> {
    let mut form = ResourceForm::default();
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Invalid form: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("file").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_form)?;
            if !bytes.is_empty() {
                form.file = Some(UploadedFile {
                    name: file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = non_empty(Some(field.text().await.map_err(bad_form)?));
        match name.as_str() {
            "slug" => form.slug = value,
            "title" => form.title = value,
            "excerpt" => form.excerpt = value,
            "min_plan" => form.min_plan = value,
            "status" => form.status = value,
            "kind" => form.kind = value,
            "public_url" => form.public_url = value,
            other => tracing::debug!(field = %other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

fn parse_field<T>(value: Option<&str>, default: T) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = crate::models::UnknownVariant>,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: crate::models::UnknownVariant| {
            ApiError::BadRequest(e.to_string())
        }),
        None => Ok(default),
    }
}

/// create_resource
///
/// [Editor/Admin Route] Multipart form creating a library item. An attached file
/// is stored at `{slug}/{millis}-{name}`: in the private bucket for premium items
/// (kept as `file_path`), in the public bucket for free ones (kept as `public_url`).
#[utoipa::path(
    post,
    path = "/api/admin/recursos",
    responses(
        (status = 201, description = "Created", body = Resource),
        (status = 400, description = "Invalid form", body = ErrorBody),
        (status = 403, description = "Not an editor", body = ErrorBody)
    )
)]
pub async fn create_resource(
    AuthUser { id: user_id, role, .. }: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Resource>), ApiError> {
    if !role.can_publish() {
        return Err(ApiError::Forbidden);
    }

    let form = read_resource_form(multipart).await?;

    let slug = form
        .slug
        .ok_or_else(|| ApiError::BadRequest("Slug is required".to_string()))?;
    validate_slug(&slug)?;
    let title = form
        .title
        .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?;
    let min_plan = parse_field(form.min_plan.as_deref(), PlanTier::Free)?;
    let status = parse_field(form.status.as_deref(), ResourceStatus::Draft)?;
    let kind = parse_field(form.kind.as_deref(), ResourceKind::Audio)?;
    let premium = min_plan != PlanTier::Free;

    if premium && form.public_url.is_some() {
        return Err(ApiError::BadRequest(
            "Premium resources cannot have a public_url".to_string(),
        ));
    }

    let mut new_resource = NewResource {
        slug,
        title,
        excerpt: form.excerpt,
        min_plan,
        status,
        kind,
        public_url: form.public_url,
        file_path: None,
    };

    match form.file {
        Some(file) => {
            let path = object_path(&new_resource.slug, &file.name, Utc::now());
            let bucket = if premium { Bucket::Private } else { Bucket::Public };
            let content_type = file
                .content_type
                .unwrap_or_else(|| default_content_type(kind).to_string());

            state
                .storage
                .upload_object(bucket, &path, file.bytes, &content_type)
                .await
                .map_err(|e| {
                    tracing::error!(path = %path, error = %e, "resource upload failed");
                    ApiError::Internal("Upload failed".to_string())
                })?;

            if premium {
                new_resource.file_path = Some(path);
            } else {
                new_resource.public_url = Some(state.storage.get_public_url(&path));
            }
        }
        None if premium => {
            return Err(ApiError::BadRequest(
                "Premium resources need a file".to_string(),
            ));
        }
        None if new_resource.public_url.is_none() => {
            return Err(ApiError::BadRequest(
                "Free resources need a file or public_url".to_string(),
            ));
        }
        None => {}
    }

    let created = state
        .repo
        .create_resource(new_resource)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => ApiError::BadRequest("Slug already in use".to_string()),
            other => {
                tracing::error!(error = %other, "resource insert failed");
                ApiError::Internal("Could not create resource".to_string())
            }
        })?;

    tracing::info!(resource_id = %created.id, slug = %created.slug, by = %user_id, "resource created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// set_user_role
///
/// [Admin Route] Changes a profile's role.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn set_user_role(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<SetRoleRequest>,
) -> Result<Json<User>, ApiError> {
    if !role.is_admin() {
        return Err(ApiError::Forbidden);
    }

    state
        .repo
        .set_user_role(id, payload.role)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %id, error = %e, "role update failed");
            ApiError::Internal("Role update failed".to_string())
        })?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// upsert_subscription
///
/// [Admin Route] Writes a subscription row, e.g. when syncing from the billing
/// provider or granting access by hand.
#[utoipa::path(
    put,
    path = "/api/admin/subscriptions",
    request_body = UpsertSubscriptionRequest,
    responses(
        (status = 200, description = "Stored", body = Subscription),
        (status = 400, description = "Invalid payload or id owned by another user", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn upsert_subscription(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpsertSubscriptionRequest>,
) -> Result<Json<Subscription>, ApiError> {
    if !role.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if payload.provider.trim().is_empty() {
        return Err(ApiError::BadRequest("Provider is required".to_string()));
    }

    let user_id = payload.user_id;
    let subscription_id = payload.id;
    state
        .repo
        .upsert_subscription(payload)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "subscription upsert failed");
            ApiError::Internal("Subscription update failed".to_string())
        })?
        .map(Json)
        .ok_or_else(|| {
            tracing::warn!(
                user_id = %user_id,
                subscription_id = ?subscription_id,
                "subscription id belongs to another user"
            );
            ApiError::BadRequest("Subscription belongs to another user".to_string())
        })
}
