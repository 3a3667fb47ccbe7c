pub use super::artifacts::Entity as Artifacts;
pub use super::comments::Entity as Comments;
pub use super::followers::Entity as Followers;
pub use super::projects::Entity as Projects;
pub use super::todos::Entity as Todos;
pub use super::users::Entity as Users;
