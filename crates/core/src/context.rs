//! Request-scoped tenant context.

use crate::id::{TenantId, UserId};

/// Tenant context for an inbound operation.
///
/// Produced by upstream request middleware after authentication and tenant
/// resolution; consumed read-only by every layer below. There is no implicit
/// "current tenant" global anywhere in the core: every repository and cache
/// call takes the tenant explicitly from this context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    actor: Option<UserId>,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            actor: None,
        }
    }

    /// Attach the acting user, recorded on movements as `performed_by`.
    pub fn with_actor(tenant_id: TenantId, actor: UserId) -> Self {
        Self {
            tenant_id,
            actor: Some(actor),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn actor(&self) -> Option<UserId> {
        self.actor
    }
}
