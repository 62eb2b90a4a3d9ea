//! PostgreSQL lending store
//!
//! The resource uniqueness invariant is enforced twice: the availability flip
//! is a guarded `UPDATE` inside the insert transaction, and the schema carries
//! a partial unique index over open loans per resource.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{LoanStatusCatalog, LoanStore, PersonProvider, ResourceProvider};
use crate::error::{ApiError, ApiResult};
use crate::loan::{
    DueStanding, Loan, LoanFilter, LoanPatch, LoanSort, LoanStatus, LoanStatusRecord, NewLoan,
    PageRequest,
};
use crate::models::{Availability, Person, Resource};

#[derive(Clone)]
pub struct PgLendingStore {
    db_pool: PgPool,
}

impl PgLendingStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    fn push_filter(query_builder: &mut QueryBuilder<'_, Postgres>, filter: &LoanFilter) {
        if let Some(person_id) = filter.person_id {
            query_builder.push(" AND person_id = ");
            query_builder.push_bind(person_id);
        }
        if let Some(resource_id) = filter.resource_id {
            query_builder.push(" AND resource_id = ");
            query_builder.push_bind(resource_id);
        }
        if !filter.statuses.is_empty() {
            query_builder.push(" AND status IN (");
            let mut separated = query_builder.separated(", ");
            for status in &filter.statuses {
                separated.push_bind(*status);
            }
            separated.push_unseparated(")");
        }
        if let Some(from) = filter.loan_date_from {
            query_builder.push(" AND loan_date >= ");
            query_builder.push_bind(from);
        }
        if let Some(to) = filter.loan_date_to {
            query_builder.push(" AND loan_date < ");
            query_builder.push_bind(to);
        }
        if let Some(from) = filter.due_date_from {
            query_builder.push(" AND due_date >= ");
            query_builder.push_bind(from);
        }
        if let Some(to) = filter.due_date_to {
            query_builder.push(" AND due_date < ");
            query_builder.push_bind(to);
        }
        if let Some((standing, cutoff)) = filter.due_standing {
            query_builder.push(match standing {
                DueStanding::AtOrBefore => " AND due_date <= ",
                DueStanding::After => " AND due_date > ",
            });
            query_builder.push_bind(cutoff);
        }
    }
}

#[async_trait]
impl LoanStore for PgLendingStore {
    async fn find(
        &self,
        filter: &LoanFilter,
        sort: LoanSort,
        page: Option<PageRequest>,
    ) -> ApiResult<Vec<Loan>> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM loans WHERE 1=1");
        Self::push_filter(&mut query_builder, filter);

        query_builder.push(match sort {
            LoanSort::NewestFirst => " ORDER BY loan_date DESC, id ASC",
            LoanSort::OldestFirst => " ORDER BY loan_date ASC, id ASC",
        });

        if let Some(page) = page {
            query_builder.push(" LIMIT ");
            query_builder.push_bind(page.limit);
            query_builder.push(" OFFSET ");
            query_builder.push_bind(page.offset);
        }

        let loans = query_builder
            .build_query_as::<Loan>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(loans)
    }

    async fn count(&self, filter: &LoanFilter) -> ApiResult<i64> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM loans WHERE 1=1");
        Self::push_filter(&mut query_builder, filter);

        let count = query_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.db_pool)
            .await?;

        Ok(count)
    }

    async fn find_one(&self, id: Uuid) -> ApiResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(loan)
    }

    async fn insert(&self, new_loan: NewLoan) -> ApiResult<Loan> {
        let mut tx = self.db_pool.begin().await?;

        // 1. Claim the resource
        let claimed = sqlx::query(
            "UPDATE resources SET availability = $1, updated_at = NOW() WHERE id = $2 AND availability = $3",
        )
        .bind(Availability::Borrowed)
        .bind(new_loan.resource_id)
        .bind(Availability::Available)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM resources WHERE id = $1)",
            )
            .bind(new_loan.resource_id)
            .fetch_one(&mut *tx)
            .await?;

            return Err(if exists {
                ApiError::Conflict(format!(
                    "Resource {} is already on loan",
                    new_loan.resource_id
                ))
            } else {
                ApiError::NotFound(format!("Resource {}", new_loan.resource_id))
            });
        }

        // 2. Record the loan; the open-loan index rejects a concurrent twin
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                id, person_id, resource_id, loan_date, due_date,
                status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_loan.person_id)
        .bind(new_loan.resource_id)
        .bind(new_loan.loan_date)
        .bind(new_loan.due_date)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(loan)
    }

    async fn update(&self, id: Uuid, patch: LoanPatch) -> ApiResult<Loan> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE loans SET status = ");
        query_builder.push_bind(patch.status);
        query_builder.push(", return_date = ");
        query_builder.push_bind(patch.return_date);
        query_builder.push(", updated_at = NOW() WHERE id = ");
        query_builder.push_bind(id);
        query_builder.push(" AND status IN (");
        let mut separated = query_builder.separated(", ");
        for status in &patch.expected {
            separated.push_bind(*status);
        }
        separated.push_unseparated(") RETURNING *");

        let updated = query_builder
            .build_query_as::<Loan>()
            .fetch_optional(&self.db_pool)
            .await?;

        match updated {
            Some(loan) => Ok(loan),
            None => match self.find_one(id).await? {
                Some(current) => Err(ApiError::InvalidState(format!(
                    "Loan {} is {}",
                    id, current.status
                ))),
                None => Err(ApiError::NotFound(format!("Loan {}", id))),
            },
        }
    }
}

#[async_trait]
impl PersonProvider for PgLendingStore {
    async fn get_person(&self, id: Uuid) -> ApiResult<Person> {
        sqlx::query_as::<_, Person>(
            r#"
            SELECT
                p.id, p.full_name, p.email, p.document_number, p.grade,
                p.person_type, p.active, p.has_penalty, t.max_loans
            FROM persons p
            JOIN person_types t ON t.person_type = p.person_type
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Person {}", id)))
    }
}

#[async_trait]
impl ResourceProvider for PgLendingStore {
    async fn get_resource(&self, id: Uuid) -> ApiResult<Resource> {
        sqlx::query_as::<_, Resource>(
            "SELECT id, title, resource_type, availability FROM resources WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource {}", id)))
    }

    async fn set_availability(&self, id: Uuid, availability: Availability) -> ApiResult<()> {
        let result =
            sqlx::query("UPDATE resources SET availability = $1, updated_at = NOW() WHERE id = $2")
                .bind(availability)
                .bind(id)
                .execute(&self.db_pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Resource {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl LoanStatusCatalog for PgLendingStore {
    async fn verify_loan_statuses_exist(&self) -> ApiResult<bool> {
        let existing = sqlx::query_as::<_, LoanStatusRecord>(
            "SELECT name, description FROM loan_statuses",
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(LoanStatus::ALL
            .iter()
            .all(|s| existing.iter().any(|r| r.name == s.as_str())))
    }

    async fn seed_loan_statuses(&self) -> ApiResult<()> {
        let mut tx = self.db_pool.begin().await?;

        for status in LoanStatus::ALL {
            sqlx::query(
                "INSERT INTO loan_statuses (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
            )
            .bind(status.as_str())
            .bind(status.description())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
