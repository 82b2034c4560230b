use std::sync::Arc;

use mockable::Clock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::io::Store;
use crate::models::{default_states, Dataset, State, Student};
use crate::{breaks, proceeds, Error, Payload};

pub const STUDENTS_KEY: &str = "students";
pub const STATES_KEY: &str = "states";

/// Hands out ids that are unique within a dataset even when the clock is
/// coarse or repeats: `next = max(now_millis, last + 1)`.
pub struct IdGenerator {
    clock: Arc<dyn Clock + Send + Sync>,
    last: i64,
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { clock, last: 0 }
    }

    /// Never hand out anything at or below `id` again.
    pub fn observe(&mut self, id: i64) {
        self.last = self.last.max(id);
    }

    pub fn next_id(&mut self) -> i64 {
        let now = self.clock.utc().timestamp_millis();
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }
}

/// Sole owner of the canonical dataset, mirrored to the store.
///
/// Saves replace a whole collection. The in-memory copy only changes after
/// the store accepted the write, so a rejected write leaves both untouched.
pub struct Repository {
    store: Arc<dyn Store>,
    dataset: Dataset,
    ids: IdGenerator,
}

impl Repository {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            store,
            dataset: Dataset::default(),
            ids: IdGenerator::new(clock),
        }
    }

    /// Reads both collections, seeding the default states on first use.
    pub fn load(&mut self) -> Payload<&Dataset> {
        let states = match read_collection::<State>(self.store.as_ref(), STATES_KEY)? {
            Some(states) => states,
            None => {
                let seeded = default_states();
                write_collection(self.store.as_ref(), STATES_KEY, &seeded)?;
                log::info!("seeded {} default states", seeded.len());
                seeded
            }
        };
        let students = read_collection::<Student>(self.store.as_ref(), STUDENTS_KEY)?
            .unwrap_or_default();

        self.dataset = Dataset { students, states };
        if let Some(max) = self.dataset.max_id() {
            self.ids.observe(max);
        }
        log::info!(
            "loaded {} students and {} states",
            self.dataset.students.len(),
            self.dataset.states.len()
        );
        proceeds(&self.dataset)
    }

    pub fn save_students(&mut self, students: Vec<Student>) -> Payload<()> {
        write_collection(self.store.as_ref(), STUDENTS_KEY, &students)?;
        self.dataset.students = students;
        proceeds(())
    }

    pub fn save_states(&mut self, states: Vec<State>) -> Payload<()> {
        write_collection(self.store.as_ref(), STATES_KEY, &states)?;
        self.dataset.states = states;
        proceeds(())
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn ids(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Snapshot and id generator together, for mutations that need both.
    pub fn dataset_and_ids(&mut self) -> (&Dataset, &mut IdGenerator) {
        (&self.dataset, &mut self.ids)
    }

    /// Forgets the in-memory copy; the store keeps its contents.
    pub fn unload(&mut self) {
        self.dataset = Dataset::default();
    }
}

fn read_collection<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Payload<Option<Vec<T>>> {
    let Some(raw) = store.get(key)? else {
        return proceeds(None);
    };
    match serde_json::from_str(&raw) {
        Ok(items) => proceeds(Some(items)),
        Err(err) => {
            log::error!("stored `{}` failed to deserialize: {}", key, err);
            breaks(Error::DatasetCorrupt {
                key: key.to_string(),
                message: err.to_string(),
            })
        }
    }
}

fn write_collection<T: Serialize>(store: &dyn Store, key: &str, items: &[T]) -> Payload<()> {
    let raw = serde_json::to_string(items)?;
    store.put(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;
    use crate::models::{Marks, Subject};
    use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

    struct StoppedClock;

    impl Clock for StoppedClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
        }
    }

    fn repository(store: &Arc<MemoryStore>) -> Repository {
        Repository::new(store.clone(), Arc::new(StoppedClock))
    }

    fn student(id: i64) -> Student {
        Student {
            id,
            name: format!("student {}", id),
            age: 10,
            date_of_birth: NaiveDate::from_ymd_opt(2014, 2, 2).unwrap(),
            address: Some("12 Park Street".to_string()),
            state_ref: 1,
            phone: None,
            photos: vec!["data:image/jpeg;base64,AAAA".to_string()],
            subjects: vec![Subject {
                name: "Hindi".to_string(),
                marks: Marks::Number(77.5),
            }],
        }
    }

    #[test]
    fn first_load_seeds_and_persists_states() {
        let store = Arc::new(MemoryStore::default());
        let mut repo = repository(&store);
        let dataset = repo.load().unwrap().clone();

        assert_eq!(dataset.states, default_states());
        assert!(dataset.students.is_empty());
        let raw = store.get(STATES_KEY).unwrap().unwrap();
        assert!(raw.contains("Uttar Pradesh"));
        assert_eq!(store.get(STUDENTS_KEY).unwrap(), None);
    }

    #[test]
    fn saved_dataset_loads_back_equal_and_ordered() {
        let store = Arc::new(MemoryStore::new(64 * 1024));
        let mut repo = repository(&store);
        repo.load().unwrap();

        let mut states = default_states();
        states.push(State {
            id: 40,
            name: "Goa".to_string(),
        });
        let students = vec![student(30), student(10), student(20)];
        repo.save_students(students.clone()).unwrap();
        repo.save_states(states.clone()).unwrap();

        let mut fresh = repository(&store);
        let loaded = fresh.load().unwrap();
        assert_eq!(loaded, &Dataset { students, states });
    }

    #[test]
    fn corrupt_collection_is_fatal() {
        let store = Arc::new(MemoryStore::default());
        store.put(STUDENTS_KEY, "[{not json").unwrap();

        let err = repository(&store).load().unwrap_err();
        assert!(matches!(err, Error::DatasetCorrupt { ref key, .. } if key == STUDENTS_KEY));
    }

    #[test]
    fn rejected_write_keeps_previous_snapshot() {
        let store = Arc::new(MemoryStore::new(512));
        let mut repo = repository(&store);
        repo.load().unwrap();
        repo.save_students(vec![student(1)]).unwrap();

        let too_many: Vec<_> = (2..40).map(student).collect();
        let err = repo.save_students(too_many).unwrap_err();
        assert!(matches!(err, Error::StoreQuotaExceeded { .. }));
        assert_eq!(repo.dataset().students, vec![student(1)]);
        let raw = store.get(STUDENTS_KEY).unwrap().unwrap();
        assert_eq!(serde_json::from_str::<Vec<Student>>(&raw).unwrap(), vec![student(1)]);
    }

    #[test]
    fn ids_stay_unique_on_a_stopped_clock() {
        let mut ids = IdGenerator::new(Arc::new(StoppedClock));
        let first = ids.next_id();
        let second = ids.next_id();
        assert_eq!(first, StoppedClock.utc().timestamp_millis());
        assert_eq!(second, first + 1);
    }

    #[test]
    fn ids_continue_past_loaded_records() {
        let store = Arc::new(MemoryStore::new(64 * 1024));
        let future = StoppedClock.utc().timestamp_millis() + 1_000;
        store
            .put(STUDENTS_KEY, &serde_json::to_string(&[student(future)]).unwrap())
            .unwrap();

        let mut repo = repository(&store);
        repo.load().unwrap();
        assert_eq!(repo.ids().next_id(), future + 1);
    }
}
