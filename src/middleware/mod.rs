pub mod auth;
pub mod authorize;
pub mod response;

pub use auth::{authenticate, AuthUser, RequestMeta};
pub use authorize::{
    attach_permissions, require_any_permission, require_ownership, require_permission,
    require_tenant_access, AttachedGrant,
};
pub use response::{ApiResponse, ApiResult};
