use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum ProjectStatus {
    #[sea_orm(num_value = 0)]
    Open,
    #[sea_orm(num_value = 1)]
    Closed,
    #[sea_orm(num_value = 2)]
    OnHold,
}

impl ProjectStatus {
    pub const ALL: [Self; 3] = [Self::Open, Self::Closed, Self::OnHold];

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
            Self::OnHold => 2,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::OnHold => "On hold",
        }
    }
}
