#![allow(dead_code)]

use async_trait::async_trait;
use contactbook_core::{
    Classification, Contact, ContactId, ContactPayload, ContactsApi, DirectoryError,
    DirectoryObserver, DirectoryResult, DirectorySnapshot, FilterCriteria, RawContact,
    RemoteOperation,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn raw(id: u64, name: &str, tags: Option<&str>) -> RawContact {
    RawContact {
        id: ContactId::Number(id),
        full_name: Some(name.to_string()),
        email: None,
        phone_number: None,
        tags: tags.map(str::to_string),
    }
}

pub fn names(contacts: &[Contact]) -> Vec<String> {
    contacts
        .iter()
        .map(|contact| contact.full_name().to_string())
        .collect()
}

/// In-memory stand-in for the remote service with injectable delays/failures.
#[derive(Default)]
pub struct FakeApi {
    records: Mutex<Vec<RawContact>>,
    next_id: AtomicUsize,
    fetch_delay: Mutex<Duration>,
    write_delay: Mutex<Duration>,
    fail_status: Mutex<Option<u16>>,
    fetch_calls: AtomicUsize,
    write_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeApi {
    pub fn with_records(records: Vec<RawContact>) -> Self {
        let api = Self::default();
        api.next_id.store(records.len() + 100, Ordering::SeqCst);
        *api.records.lock().unwrap() = records;
        api
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    /// Every subsequent call fails with this HTTP status; `None` heals.
    pub fn fail_with(&self, status: Option<u16>) {
        *self.fail_status.lock().unwrap() = status;
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check_failure(&self, operation: RemoteOperation) -> DirectoryResult<()> {
        match *self.fail_status.lock().unwrap() {
            Some(status) => Err(DirectoryError::Http {
                operation,
                status,
                status_text: "Internal Server Error".to_string(),
                body: "boom".to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn write_pause(&self) {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.write_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn record_from(id: ContactId, payload: &ContactPayload) -> RawContact {
    RawContact {
        id,
        full_name: Some(payload.full_name.clone()),
        email: payload.email.clone(),
        phone_number: payload.phone_number.clone(),
        tags: payload.tags.clone(),
    }
}

#[async_trait]
impl ContactsApi for FakeApi {
    async fn fetch_all(&self) -> DirectoryResult<Vec<RawContact>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_failure(RemoteOperation::FetchAll)?;
        Ok(self.records.lock().unwrap().clone())
    }

    async fn create(&self, payload: &ContactPayload) -> DirectoryResult<Option<RawContact>> {
        self.write_pause().await;
        self.check_failure(RemoteOperation::Create)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as u64;
        let record = record_from(ContactId::Number(id), payload);
        self.records.lock().unwrap().push(record.clone());
        Ok(Some(record))
    }

    async fn update(
        &self,
        id: &ContactId,
        payload: &ContactPayload,
    ) -> DirectoryResult<Option<RawContact>> {
        self.write_pause().await;
        self.check_failure(RemoteOperation::Update)?;
        let record = record_from(id.clone(), payload);
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|existing| &existing.id == id) {
            Some(existing) => *existing = record.clone(),
            None => {
                return Err(DirectoryError::Http {
                    operation: RemoteOperation::Update,
                    status: 404,
                    status_text: "Not Found".to_string(),
                    body: String::new(),
                })
            }
        }
        Ok(Some(record))
    }

    async fn delete(&self, id: &ContactId) -> DirectoryResult<()> {
        self.write_pause().await;
        self.check_failure(RemoteOperation::Delete)?;
        self.records.lock().unwrap().retain(|record| &record.id != id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Replaced { generation: u64, visible: Vec<String> },
    Criteria { name: String, visible: Vec<String> },
    Failure(Classification),
    Message(String),
}

/// Observer that records every notification in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<Classification> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Failure(classification) => Some(classification),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn criteria_events(&self) -> Vec<(String, Vec<String>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Criteria { name, visible } => Some((name, visible)),
                _ => None,
            })
            .collect()
    }
}

impl DirectoryObserver for RecordingObserver {
    fn directory_replaced(&self, snapshot: &DirectorySnapshot, visible: &[Contact]) {
        self.events.lock().unwrap().push(Event::Replaced {
            generation: snapshot.generation(),
            visible: names(visible),
        });
    }

    fn criteria_changed(&self, criteria: &FilterCriteria, visible: &[Contact]) {
        self.events.lock().unwrap().push(Event::Criteria {
            name: criteria.name_substring().to_string(),
            visible: names(visible),
        });
    }

    fn failure_reported(&self, classification: &Classification) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Failure(classification.clone()));
    }

    fn user_message(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Message(message.to_string()));
    }
}
