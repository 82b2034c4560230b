use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Reference entity a student's home state points at. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: i64,
    pub name: String,
}

/// Marks are either a number or whatever text the operator typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Marks {
    Number(f64),
    Text(String),
}

impl Default for Marks {
    fn default() -> Self {
        Marks::Text(String::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub marks: Marks,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub age: u32,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub address: Option<String>,
    pub state_ref: i64,
    #[serde(default)]
    pub phone: Option<String>,
    /// Compact photo encodings, in upload order.
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// Unvalidated student input, one string per form field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudentDraft {
    pub name: String,
    pub age: String,
    pub date_of_birth: String,
    pub address: String,
    pub state_ref: String,
    pub phone: String,
    pub photos: Vec<String>,
    pub subjects: Vec<Subject>,
}

impl StudentDraft {
    /// Pre-fills a draft from an existing record, as the edit form does.
    pub fn from_student(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            age: student.age.to_string(),
            date_of_birth: student.date_of_birth.format("%Y-%m-%d").to_string(),
            address: student.address.clone().unwrap_or_default(),
            state_ref: student.state_ref.to_string(),
            phone: student.phone.clone().unwrap_or_default(),
            photos: student.photos.clone(),
            subjects: student.subjects.clone(),
        }
    }
}

/// The unit of persistence: both collections, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub states: Vec<State>,
}

impl Dataset {
    pub fn state(&self, id: i64) -> Option<&State> {
        self.states.iter().find(|state| state.id == id)
    }

    pub fn student(&self, id: i64) -> Option<&Student> {
        self.students.iter().find(|student| student.id == id)
    }

    /// Largest id across both collections.
    pub fn max_id(&self) -> Option<i64> {
        self.students
            .iter()
            .map(|student| student.id)
            .chain(self.states.iter().map(|state| state.id))
            .max()
    }
}

pub fn default_states() -> Vec<State> {
    ["Uttar Pradesh", "Maharashtra", "Karnataka"]
        .iter()
        .zip(1..)
        .map(|(name, id)| State {
            id,
            name: name.to_string(),
        })
        .collect()
}
