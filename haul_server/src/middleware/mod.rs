mod acl;
mod jwt;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use jwt::{JwtAuthMiddlewareFactory, JwtAuthMiddlewareService};
