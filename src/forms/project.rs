use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{FormError, FormErrors, parse_date};
use crate::db::Store;
use crate::entities::sea_orm_active_enums::ProjectStatus;
use crate::models::project::{ProjectInput, ProjectSummary};

/// Used for both creating and editing a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProjectForm {
    #[validate(length(min = 4, max = 140, message = "Field must be between 4 and 140 characters long."))]
    pub title: String,

    #[validate(length(min = 100, max = 300, message = "Field must be between 100 and 300 characters long."))]
    pub body: String,

    pub status: String,

    pub sdate: String,

    pub edate: String,
}

impl ProjectForm {
    #[must_use]
    pub fn from_project(project: &ProjectSummary) -> Self {
        Self {
            title: project.title.clone(),
            body: project.body.clone(),
            status: project.status.to_string(),
            sdate: project.sdate.format(super::DATE_FORMAT).to_string(),
            edate: project.edate.format(super::DATE_FORMAT).to_string(),
        }
    }

    /// Copy with surrounding whitespace removed, which is what gets validated and stored.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
            status: self.status.trim().to_string(),
            sdate: self.sdate.trim().to_string(),
            edate: self.edate.trim().to_string(),
        }
    }

    /// Checks every field, the date order, and title uniqueness for the owner.
    ///
    /// `original_title` is the current title when editing; keeping it unchanged
    /// is not a conflict.
    pub async fn clean(
        &self,
        store: &Store,
        owner_id: i32,
        original_title: Option<&str>,
    ) -> Result<ProjectInput, FormError> {
        let form = self.normalized();
        let mut errors = FormErrors::from_result(form.validate());
        let input = form.check_fields(&mut errors);

        let title = form.title.as_str();
        if !errors.has("title")
            && original_title != Some(title)
            && store.project_title_taken(owner_id, title).await?
        {
            errors.add("title", "Please use a different project title.");
        }

        match input {
            Some(input) => errors.finish(input),
            None => Err(FormError::Invalid(errors)),
        }
    }

    /// Everything that needs no store access. Returns the input only when all
    /// typed fields parsed.
    fn check_fields(&self, errors: &mut FormErrors) -> Option<ProjectInput> {
        let status = self
            .status
            .trim()
            .parse::<i32>()
            .ok()
            .and_then(ProjectStatus::from_code);
        if status.is_none() {
            errors.add("status", "Not a valid choice.");
        }

        let sdate = parse_date(errors, "sdate", &self.sdate, "Please select start date");
        let edate = parse_date(errors, "edate", &self.edate, "Please select end date");

        if let (Some(start), Some(end)) = (sdate, edate)
            && end < start
        {
            errors.add("edate", "End date must not be earlier than start date.");
        }

        Some(ProjectInput {
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
            status: status?,
            sdate: sdate?,
            edate: edate?,
        })
    }
}
