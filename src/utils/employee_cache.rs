use std::time::Duration;

use moka::future::Cache;

use crate::model::employee::Employee;

/// Short-lived cache of employee profiles keyed by id.
///
/// Every attendance submission and create-form request looks the
/// submitting employee up, so reads dominate. Writers must invalidate.
#[derive(Clone)]
pub struct EmployeeCache {
    inner: Cache<u64, Employee>,
}

impl EmployeeCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity) // tune based on memory
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, id: u64) -> Option<Employee> {
        self.inner.get(&id).await
    }

    pub async fn put(&self, employee: Employee) {
        self.inner.insert(employee.id, employee).await;
    }

    pub async fn invalidate(&self, id: u64) {
        self.inner.invalidate(&id).await;
    }
}

impl Default for EmployeeCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(300))
    }
}
