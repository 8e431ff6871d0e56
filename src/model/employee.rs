use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "company_id": 1,
        "employee_code": "EMP-003",
        "first_name": "Mina",
        "last_name": "Verhulst",
        "email": "mina.verhulst@acme.example",
        "avatar_url": null,
        "tz": "Europe/Brussels",
        "calendar_id": 1
    })
)]
pub struct Employee {
    #[schema(example = 3)]
    pub id: u64,

    #[schema(example = 1)]
    pub company_id: u64,

    #[schema(example = "EMP-003")]
    pub employee_code: String,

    #[schema(example = "Mina")]
    pub first_name: String,

    #[schema(example = "Verhulst")]
    pub last_name: String,

    #[schema(example = "mina.verhulst@acme.example")]
    pub email: String,

    #[schema(example = "https://cdn.acme.example/avatars/3.png", nullable = true)]
    pub avatar_url: Option<String>,

    /// IANA timezone used for day bucketing; falls back to UTC when invalid.
    #[schema(example = "Europe/Brussels")]
    pub tz: String,

    /// Personal work calendar; the company calendar applies when absent.
    #[schema(example = 1, nullable = true)]
    pub calendar_id: Option<u64>,
}

impl Employee {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
