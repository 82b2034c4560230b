//! Session and persistence core of the OpenDiary student records tool.
//!
//! A single operator logs in, then creates, lists, edits and deletes student
//! records and a small table of states. Everything is kept in a key/value
//! [`io::Store`]; the presentation layer drives it through [`app::Diary`].

pub mod app;
pub mod auth;
pub mod config;
pub mod err;
pub mod io;
pub mod models;
pub mod mutate;
pub mod page;
pub mod photo;
pub mod repo;

pub use crate::app::Diary;
pub use crate::auth::{AuthResult, Credential, SessionManager};
pub use crate::config::{Config, OperatorConfig};
pub use crate::err::Error;
pub use crate::io::{FileStore, MemoryStore, Store};
pub use crate::models::{Dataset, Marks, State, Student, StudentDraft, Subject};
pub use crate::page::Page;
pub use crate::photo::PhotoSettings;
pub use crate::repo::{IdGenerator, Repository};

pub type Payload<T> = Result<T, Error>;

pub fn proceeds<V>(value: V) -> Payload<V> {
    Ok(value)
}

pub fn breaks<V>(err: Error) -> Payload<V> {
    Err(err)
}
