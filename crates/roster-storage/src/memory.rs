use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use roster_core::{
    Department, DepartmentId, Employee, NewEmployee, Position, PositionId,
    DEPARTMENT_LOCATION_MAX_LEN, DEPARTMENT_NAME_MAX_LEN, EMAIL_MAX_LEN, PERSON_NAME_MAX_LEN,
    PHONE_NUMBER_MAX_LEN, POSITION_TITLE_MAX_LEN,
};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{RosterStore, StoreError};

/// In-process store enforcing the same constraints as the Postgres schema:
/// unique department names, position titles, employee emails and phone
/// numbers, NOT NULL joining dates, non-negative salaries and restricted
/// deletes of referenced departments/positions.
#[derive(Debug, Default)]
pub struct MemoryRosterStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_department_id: i64,
    next_position_id: i64,
    next_employee_id: i64,
    departments: BTreeMap<DepartmentId, Department>,
    positions: BTreeMap<PositionId, Position>,
    employees: BTreeMap<i64, Employee>,
    emails: HashMap<String, i64>,
    phone_numbers: HashSet<String>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every employee in insertion order.
    pub async fn employees(&self) -> Vec<Employee> {
        self.state.lock().await.employees.values().cloned().collect()
    }
}

impl MemoryState {
    fn check_batch(&self, batch: &[NewEmployee]) -> Result<(), StoreError> {
        let mut batch_emails = HashSet::new();
        let mut batch_phones = HashSet::new();

        for employee in batch {
            check_len("first_name", &employee.first_name, PERSON_NAME_MAX_LEN)?;
            check_len("last_name", &employee.last_name, PERSON_NAME_MAX_LEN)?;
            check_len("email", &employee.email, EMAIL_MAX_LEN)?;
            check_len("phone_number", &employee.phone_number, PHONE_NUMBER_MAX_LEN)?;
            if employee.date_of_joining.is_none() {
                return Err(StoreError::Constraint(format!(
                    "null value in column \"date_of_joining\" for {}",
                    employee.email
                )));
            }
            if employee.salary < Decimal::ZERO {
                return Err(StoreError::Constraint(format!(
                    "negative salary for {}",
                    employee.email
                )));
            }
            if !self.departments.contains_key(&employee.department_id) {
                return Err(StoreError::Constraint(format!(
                    "department {} does not exist",
                    employee.department_id
                )));
            }
            if !self.positions.contains_key(&employee.position_id) {
                return Err(StoreError::Constraint(format!(
                    "position {} does not exist",
                    employee.position_id
                )));
            }
            if self.emails.contains_key(&employee.email) || !batch_emails.insert(&employee.email) {
                return Err(StoreError::UniqueViolation {
                    constraint: "employees_email_key".to_string(),
                });
            }
            if self.phone_numbers.contains(&employee.phone_number)
                || !batch_phones.insert(&employee.phone_number)
            {
                return Err(StoreError::UniqueViolation {
                    constraint: "employees_phone_number_key".to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_department_referenced(&self, id: DepartmentId) -> bool {
        self.employees.values().any(|e| e.department_id == id)
    }

    fn is_position_referenced(&self, id: PositionId) -> bool {
        self.employees.values().any(|e| e.position_id == id)
    }
}

/// Mirrors the VARCHAR(n) column limits of the schema.
fn check_len(column: &str, value: &str, max: usize) -> Result<(), StoreError> {
    if value.chars().count() > max {
        return Err(StoreError::Constraint(format!(
            "value too long for {column} (max {max})"
        )));
    }
    Ok(())
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn load_departments(&self) -> Result<Vec<Department>, StoreError> {
        let state = self.state.lock().await;
        let mut departments = state.departments.values().cloned().collect::<Vec<_>>();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn load_positions(&self) -> Result<Vec<Position>, StoreError> {
        let state = self.state.lock().await;
        let mut positions = state.positions.values().cloned().collect::<Vec<_>>();
        positions.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(positions)
    }

    async fn find_employee_by_email(&self, email: &str) -> Result<Option<Employee>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.employees.get(id))
            .cloned())
    }

    async fn create_department(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> Result<Department, StoreError> {
        check_len("name", name, DEPARTMENT_NAME_MAX_LEN)?;
        if let Some(location) = location {
            check_len("location", location, DEPARTMENT_LOCATION_MAX_LEN)?;
        }
        let mut state = self.state.lock().await;
        if state.departments.values().any(|d| d.name == name) {
            return Err(StoreError::UniqueViolation {
                constraint: "departments_name_key".to_string(),
            });
        }
        state.next_department_id += 1;
        let department = Department {
            id: state.next_department_id,
            name: name.to_string(),
            location: location.map(str::to_string),
            created_at: Utc::now(),
        };
        state.departments.insert(department.id, department.clone());
        Ok(department)
    }

    async fn create_position(&self, title: &str) -> Result<Position, StoreError> {
        check_len("title", title, POSITION_TITLE_MAX_LEN)?;
        let mut state = self.state.lock().await;
        if state.positions.values().any(|p| p.title == title) {
            return Err(StoreError::UniqueViolation {
                constraint: "positions_title_key".to_string(),
            });
        }
        state.next_position_id += 1;
        let position = Position {
            id: state.next_position_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };
        state.positions.insert(position.id, position.clone());
        Ok(position)
    }

    async fn bulk_create_employees(&self, batch: &[NewEmployee]) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.check_batch(batch)?;

        let now = Utc::now();
        for new in batch {
            // check_batch rejected every row without a joining date
            let Some(date_of_joining) = new.date_of_joining else {
                continue;
            };
            state.next_employee_id += 1;
            let employee = Employee {
                id: state.next_employee_id,
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                email: new.email.clone(),
                phone_number: new.phone_number.clone(),
                date_of_birth: new.date_of_birth,
                date_of_joining,
                salary: new.salary,
                department_id: new.department_id,
                position_id: new.position_id,
                created_at: now,
                updated_at: now,
            };
            state.emails.insert(employee.email.clone(), employee.id);
            state.phone_numbers.insert(employee.phone_number.clone());
            state.employees.insert(employee.id, employee);
        }
        Ok(batch.len() as u64)
    }

    async fn count_employees(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.employees.len() as u64)
    }

    async fn delete_department(&self, id: DepartmentId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.departments.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity: "department",
                id,
            });
        }
        if state.is_department_referenced(id) {
            return Err(StoreError::Protected {
                entity: "department",
                id,
            });
        }
        state.departments.remove(&id);
        Ok(())
    }

    async fn delete_position(&self, id: PositionId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.positions.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity: "position",
                id,
            });
        }
        if state.is_position_referenced(id) {
            return Err(StoreError::Protected {
                entity: "position",
                id,
            });
        }
        state.positions.remove(&id);
        Ok(())
    }
}
