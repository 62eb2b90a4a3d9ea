//! Shared fixtures: an in-memory lending desk on a settable clock

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use lendingdesk_server::clock::FixedClock;
use lendingdesk_server::config::EngineSettings;
use lendingdesk_server::loan::{Loan, LoanStatus};
use lendingdesk_server::models::{Availability, Person, PersonType, Resource};
use lendingdesk_server::state::AppState;
use lendingdesk_server::store::{InMemoryLendingStore, PersonProvider, ResourceProvider};

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub struct Desk {
    pub store: Arc<InMemoryLendingStore>,
    pub clock: Arc<FixedClock>,
    pub state: AppState,
}

impl Desk {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_settings(now, EngineSettings::default())
    }

    pub fn with_settings(now: DateTime<Utc>, settings: EngineSettings) -> Self {
        let store = Arc::new(InMemoryLendingStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let state = AppState::from_store(store.clone(), clock.clone(), settings);
        Self {
            store,
            clock,
            state,
        }
    }

    pub fn add_person(&self, name: &str, person_type: PersonType, grade: Option<&str>) -> Uuid {
        let max_loans = match person_type {
            PersonType::Student => 3,
            PersonType::Teacher => 5,
        };
        let person = Person {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: Some(format!("{}@school.test", name.to_lowercase().replace(' ', "."))),
            document_number: None,
            grade: grade.map(str::to_string),
            person_type,
            active: true,
            has_penalty: false,
            max_loans,
        };
        let id = person.id;
        self.store.add_person(person).unwrap();
        id
    }

    pub fn student(&self, name: &str) -> Uuid {
        self.add_person(name, PersonType::Student, Some("5A"))
    }

    pub fn teacher(&self, name: &str) -> Uuid {
        self.add_person(name, PersonType::Teacher, None)
    }

    pub async fn update_person(&self, id: Uuid, edit: impl FnOnce(&mut Person)) {
        let mut person = self.store.get_person(id).await.unwrap();
        edit(&mut person);
        self.store.add_person(person).unwrap();
    }

    pub fn resource(&self, title: &str) -> Uuid {
        let resource = Resource {
            id: Uuid::new_v4(),
            title: title.to_string(),
            resource_type: "book".to_string(),
            availability: Availability::Available,
        };
        let id = resource.id;
        self.store.add_resource(resource).unwrap();
        id
    }

    pub async fn availability(&self, resource_id: Uuid) -> Availability {
        self.store
            .get_resource(resource_id)
            .await
            .unwrap()
            .availability
    }

    /// Load a historical loan as-is; open and lost loans also take the resource off the shelf
    pub async fn history(
        &self,
        person_id: Uuid,
        resource_id: Uuid,
        loan_date: DateTime<Utc>,
        loan_days: i64,
        status: LoanStatus,
        return_date: Option<DateTime<Utc>>,
    ) -> Uuid {
        let loan = Loan {
            id: Uuid::new_v4(),
            person_id,
            resource_id,
            loan_date,
            due_date: loan_date + Duration::days(loan_days),
            return_date,
            status,
            created_at: loan_date,
            updated_at: return_date.unwrap_or(loan_date),
        };
        let id = loan.id;
        self.store.put_loan(loan).unwrap();

        let availability = match status {
            LoanStatus::Active | LoanStatus::Overdue => Some(Availability::Borrowed),
            LoanStatus::Lost => Some(Availability::Lost),
            LoanStatus::Returned => None,
        };
        if let Some(availability) = availability {
            self.store
                .set_availability(resource_id, availability)
                .await
                .unwrap();
        }
        id
    }
}
