use std::sync::Arc;

use chrono::Duration;
use mockable::{Clock, DefaultClock};

use crate::auth::{AuthResult, Credential, SessionManager};
use crate::config::Config;
use crate::io::{FileStore, Store};
use crate::models::{State, Student, StudentDraft};
use crate::page::{paginate, Page};
use crate::repo::Repository;
use crate::{breaks, mutate, photo, proceeds, Error, Payload};

/// Entry point for the presentation layer.
///
/// Owns the session, the repository and the configuration. Every data
/// operation re-checks the stored credential first and answers
/// [`Error::SessionExpired`] when the operator has to log in again.
pub struct Diary {
    config: Config,
    session: SessionManager,
    repo: Repository,
    loaded: bool,
}

impl Diary {
    /// File-backed store under `config.data_dir`, wall clock.
    pub fn open(config: Config) -> Payload<Self> {
        let store = FileStore::open(&config.data_dir, config.store_quota)?;
        proceeds(Self::with_store(
            config,
            Arc::new(store),
            Arc::new(DefaultClock),
        ))
    }

    pub fn with_store(
        config: Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let ttl = Duration::hours(config.session_ttl_hours);
        Self {
            session: SessionManager::new(store.clone(), clock.clone(), ttl),
            repo: Repository::new(store, clock),
            config,
            loaded: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Picks up a session left by an earlier run, loading the dataset when
    /// the stored credential is still good.
    pub fn resume(&mut self) -> Payload<AuthResult> {
        let result = self.session.ensure_authenticated()?;
        if result == AuthResult::Success {
            self.load()?;
        } else {
            self.unload();
        }
        proceeds(result)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Payload<Credential> {
        let operator = &self.config.operator;
        if username != operator.username || password != operator.password {
            log::warn!("rejected login attempt for `{}`", username);
            return breaks(Error::AuthenticationFailure {
                message: "Invalid Username or Password".to_string(),
            });
        }

        let credential = self.session.issue(username);
        self.session.persist(&credential)?;
        self.load()?;
        log::info!("`{}` logged in", username);
        proceeds(credential)
    }

    pub fn logout(&mut self) -> Payload<()> {
        self.session.revoke()?;
        self.unload();
        log::info!("logged out");
        proceeds(())
    }

    pub fn states(&mut self) -> Payload<Vec<State>> {
        self.ensure_session()?;
        proceeds(self.repo.dataset().states.clone())
    }

    pub fn state_name(&mut self, state_ref: i64) -> Payload<Option<String>> {
        self.ensure_session()?;
        proceeds(
            self.repo
                .dataset()
                .state(state_ref)
                .map(|state| state.name.clone()),
        )
    }

    /// `page` is 1-based and clamped; `page_size` falls back to the
    /// configured size when zero.
    pub fn list_students(&mut self, page: usize, page_size: usize) -> Payload<Page<Student>> {
        self.ensure_session()?;
        let page_size = if page_size == 0 {
            self.config.page_size
        } else {
            page_size
        };
        proceeds(paginate(&self.repo.dataset().students, page, page_size))
    }

    pub fn create_student(&mut self, draft: &StudentDraft) -> Payload<Student> {
        self.ensure_session()?;
        let (dataset, ids) = self.repo.dataset_and_ids();
        let (students, student) = mutate::create_student(dataset, draft, ids)?;
        self.repo.save_students(students)?;
        log::info!("created student {}", student.id);
        proceeds(student)
    }

    pub fn update_student(
        &mut self,
        id: i64,
        draft: &StudentDraft,
        step_up_secret: &str,
    ) -> Payload<Student> {
        self.ensure_session()?;
        let (students, student) = mutate::update_student(
            self.repo.dataset(),
            id,
            draft,
            step_up_secret,
            &self.config.step_up_secret,
        )?;
        self.repo.save_students(students)?;
        log::info!("updated student {}", id);
        proceeds(student)
    }

    /// Irreversible; the caller confirms with the operator beforehand.
    pub fn delete_student(&mut self, id: i64) -> Payload<()> {
        self.ensure_session()?;
        let students = mutate::delete_student(self.repo.dataset(), id);
        self.repo.save_students(students)?;
        log::info!("deleted student {}", id);
        proceeds(())
    }

    pub fn create_state(&mut self, name: &str) -> Payload<State> {
        self.ensure_session()?;
        let (dataset, ids) = self.repo.dataset_and_ids();
        let (states, state) = mutate::create_state(dataset, name, ids)?;
        self.repo.save_states(states)?;
        log::info!("created state {} `{}`", state.id, state.name);
        proceeds(state)
    }

    /// Compact encodings for `files`, in the order given, ready to be
    /// appended to a draft's photos.
    pub async fn attach_photos(&mut self, files: Vec<Vec<u8>>) -> Payload<Vec<String>> {
        self.ensure_session()?;
        let count = files.len();
        let encoded = photo::compress_all(files, self.config.photo).await?;
        log::info!("compressed {} photos", count);
        proceeds(encoded)
    }

    fn ensure_session(&mut self) -> Payload<()> {
        if self.session.ensure_authenticated()? != AuthResult::Success {
            self.unload();
            return breaks(Error::session_expired());
        }
        if !self.loaded {
            self.load()?;
        }
        proceeds(())
    }

    fn load(&mut self) -> Payload<()> {
        self.repo.load()?;
        self.loaded = true;
        proceeds(())
    }

    fn unload(&mut self) {
        self.repo.unload();
        self.loaded = false;
    }
}
