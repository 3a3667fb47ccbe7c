pub mod reset_token;
pub use reset_token::ResetTokens;

pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{UserError, UserService};
pub use user_service_impl::SeaOrmUserService;

pub mod project_service;
pub mod project_service_impl;
pub use project_service::{ProjectError, ProjectService};
pub use project_service_impl::SeaOrmProjectService;
