use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::model::status::AccountStatus;
use crate::core::store::CollectionPath;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Employee {
    pub fn collection() -> CollectionPath {
        CollectionPath::Employees
    }
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience: Option<String>,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub skills: Option<Vec<String>>,
    pub experience: Option<Option<String>>,
    pub status: Option<AccountStatus>,
}

pub trait EmployeeRepository {
    fn add_employee(
        &self,
        business_id: &str,
        employee: NewEmployee,
    ) -> impl Future<Output = Result<Employee>>;
    fn get_employees(&self, business_id: &str) -> impl Future<Output = Result<Vec<Employee>>>;
    fn get_employee_by_id(
        &self,
        business_id: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<Employee>>>;
    fn update_employee(
        &self,
        employee: &Employee,
        update: &EmployeeUpdate,
    ) -> impl Future<Output = Result<Employee>>;
    fn delete_employee(&self, employee: Employee) -> impl Future<Output = Result<()>>;
}
