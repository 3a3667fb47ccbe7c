pub mod prelude;

pub mod artifacts;
pub mod comments;
pub mod followers;
pub mod projects;
pub mod sea_orm_active_enums;
pub mod todos;
pub mod users;
