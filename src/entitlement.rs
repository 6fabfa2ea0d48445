use chrono::{DateTime, Utc};

use crate::{
    auth::AuthUser,
    error::ApiError,
    models::{Subscription, SubscriptionStatus},
    repository::Repository,
};

/// Entitlement
///
/// Verdict of the subscription check. `NotEntitled` is a normal answer, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Entitled,
    NotEntitled,
}

impl Entitlement {
    pub fn is_entitled(&self) -> bool {
        *self == Entitlement::Entitled
    }
}

impl From<bool> for Entitlement {
    fn from(entitled: bool) -> Self {
        if entitled {
            Entitlement::Entitled
        } else {
            Entitlement::NotEntitled
        }
    }
}

/// is_entitled
///
/// Status must be exactly `active`, and the period end, when recorded, must be
/// strictly after `now`. Trialing, past-due, canceled and incomplete never qualify.
pub fn is_entitled(subscription: Option<&Subscription>, now: DateTime<Utc>) -> bool {
    match subscription {
        Some(sub) => {
            sub.status == SubscriptionStatus::Active
                && sub.current_period_end.is_none_or(|end| end > now)
        }
        None => false,
    }
}

/// check_entitlement
///
/// Decides whether the caller may reach premium content, reading only the most
/// recent subscription row.
///
/// Errors: `Unauthenticated` without a caller, `SubscriptionLookupFailed` when the
/// backend query fails.
pub async fn check_entitlement(
    repo: &dyn Repository,
    caller: Option<&AuthUser>,
    now: DateTime<Utc>,
) -> Result<Entitlement, ApiError> {
    let caller = caller.ok_or(ApiError::Unauthenticated)?;

    let subscription = repo.get_latest_subscription(caller.id).await.map_err(|e| {
        tracing::error!(user_id = %caller.id, error = %e, "subscription lookup failed");
        ApiError::SubscriptionLookupFailed
    })?;

    let verdict = Entitlement::from(is_entitled(subscription.as_ref(), now));
    tracing::debug!(
        user_id = %caller.id,
        status = subscription.as_ref().map(|s| s.status.as_str()).unwrap_or("none"),
        entitled = verdict.is_entitled(),
        "entitlement resolved"
    );
    Ok(verdict)
}
