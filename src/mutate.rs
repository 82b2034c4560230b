//! Validation and pure mutations of the dataset.
//!
//! Every function here takes the current snapshot and returns the new
//! collection to persist; nothing is written until the caller commits it
//! through the repository.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{Dataset, State, Student, StudentDraft, Subject};
use crate::repo::IdGenerator;
use crate::{breaks, proceeds, Error, Payload};

lazy_static! {
    // constant pattern, always compiles
    static ref PHONE: Regex = Regex::new(r"^[0-9]{10}$").expect("phone pattern is valid");
}

const MISSING_FIELDS: &str = "Please fill all required fields";
const BAD_PHONE: &str = "Phone number must be 10 digits";
const WRONG_SECRET: &str = "Wrong Password";

/// A draft that passed validation, minus the id.
struct StudentFields {
    name: String,
    age: u32,
    date_of_birth: NaiveDate,
    address: Option<String>,
    state_ref: i64,
    phone: Option<String>,
    photos: Vec<String>,
    subjects: Vec<Subject>,
}

impl StudentFields {
    fn into_student(self, id: i64) -> Student {
        Student {
            id,
            name: self.name,
            age: self.age,
            date_of_birth: self.date_of_birth,
            address: self.address,
            state_ref: self.state_ref,
            phone: self.phone,
            photos: self.photos,
            subjects: self.subjects,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_draft(draft: &StudentDraft, states: &[State]) -> Payload<StudentFields> {
    let required = [
        &draft.name,
        &draft.age,
        &draft.date_of_birth,
        &draft.state_ref,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return breaks(Error::validation(MISSING_FIELDS));
    }

    // phone is optional, but anything given is matched verbatim
    let phone = if draft.phone.is_empty() {
        None
    } else if PHONE.is_match(&draft.phone) {
        Some(draft.phone.clone())
    } else {
        return breaks(Error::validation(BAD_PHONE));
    };

    let age = match draft.age.trim().parse::<u32>() {
        Ok(age) if age > 0 => age,
        _ => return breaks(Error::validation("Age must be a positive whole number")),
    };
    let Ok(date_of_birth) = NaiveDate::parse_from_str(draft.date_of_birth.trim(), "%Y-%m-%d")
    else {
        return breaks(Error::validation("Date of birth must be a YYYY-MM-DD date"));
    };

    let state_ref = draft.state_ref.trim();
    let Some(state) = state_ref
        .parse::<i64>()
        .ok()
        .and_then(|id| states.iter().find(|state| state.id == id))
    else {
        return breaks(Error::ReferentialError {
            state_ref: state_ref.to_string(),
            message: format!("State `{}` does not exist", state_ref),
        });
    };

    proceeds(StudentFields {
        name: draft.name.trim().to_string(),
        age,
        date_of_birth,
        address: non_empty(&draft.address),
        state_ref: state.id,
        phone,
        photos: draft.photos.clone(),
        subjects: draft.subjects.clone(),
    })
}

/// Validates `draft` and appends it under a fresh id.
pub fn create_student(
    dataset: &Dataset,
    draft: &StudentDraft,
    ids: &mut IdGenerator,
) -> Payload<(Vec<Student>, Student)> {
    let fields = validate_draft(draft, &dataset.states)?;
    let student = fields.into_student(ids.next_id());

    let mut students = dataset.students.clone();
    students.push(student.clone());
    proceeds((students, student))
}

/// Replaces the record `id` with `draft`, but only behind the step-up gate.
///
/// Field validation runs first, then the secret, then the id lookup.
pub fn update_student(
    dataset: &Dataset,
    id: i64,
    draft: &StudentDraft,
    step_up_secret: &str,
    expected_secret: &str,
) -> Payload<(Vec<Student>, Student)> {
    let fields = validate_draft(draft, &dataset.states)?;
    if step_up_secret != expected_secret {
        return breaks(Error::StepUpRejected {
            message: WRONG_SECRET.to_string(),
        });
    }

    let mut students = dataset.students.clone();
    let Some(slot) = students.iter_mut().find(|student| student.id == id) else {
        return breaks(Error::StudentNotFound { id });
    };
    let updated = fields.into_student(id);
    *slot = updated.clone();
    proceeds((students, updated))
}

/// Drops the record `id`. Unknown ids leave the collection as it was.
pub fn delete_student(dataset: &Dataset, id: i64) -> Vec<Student> {
    dataset
        .students
        .iter()
        .filter(|student| student.id != id)
        .cloned()
        .collect()
}

pub fn create_state(
    dataset: &Dataset,
    name: &str,
    ids: &mut IdGenerator,
) -> Payload<(Vec<State>, State)> {
    let Some(name) = non_empty(name) else {
        return breaks(Error::validation("State name must not be empty"));
    };
    let state = State {
        id: ids.next_id(),
        name,
    };

    let mut states = dataset.states.clone();
    states.push(state.clone());
    proceeds((states, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_states, Marks};
    use chrono::{DateTime, Local, TimeZone, Utc};
    use mockable::Clock;
    use rstest::rstest;
    use std::sync::Arc;

    struct StoppedClock;

    impl Clock for StoppedClock {
        fn local(&self) -> DateTime<Local> {
            self.utc().with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
        }
    }

    fn ids() -> IdGenerator {
        IdGenerator::new(Arc::new(StoppedClock))
    }

    fn dataset() -> Dataset {
        Dataset {
            students: vec![],
            states: default_states(),
        }
    }

    fn draft() -> StudentDraft {
        StudentDraft {
            name: "Meera".to_string(),
            age: "15".to_string(),
            date_of_birth: "2009-11-30".to_string(),
            address: String::new(),
            state_ref: "2".to_string(),
            phone: String::new(),
            photos: vec![],
            subjects: vec![Subject {
                name: "Science".to_string(),
                marks: Marks::Number(88.0),
            }],
        }
    }

    #[rstest]
    #[case::ten_digits("1234567890", true)]
    #[case::omitted("", true)]
    #[case::five_digits("12345", false)]
    #[case::eleven_digits("123456789012", false)]
    #[case::letters("12345abcde", false)]
    #[case::blank("   ", false)]
    #[case::padded(" 1234567890 ", false)]
    fn phone_must_be_ten_digits_when_given(#[case] phone: &str, #[case] accepted: bool) {
        let draft = StudentDraft {
            phone: phone.to_string(),
            ..draft()
        };
        let result = create_student(&dataset(), &draft, &mut ids());
        match result {
            Ok((students, student)) => {
                assert!(accepted);
                assert_eq!(students.len(), 1);
                assert_eq!(student.phone.as_deref(), Some(phone).filter(|p| !p.is_empty()));
            }
            Err(err) => {
                assert!(!accepted);
                assert_eq!(err.to_string(), BAD_PHONE);
            }
        }
    }

    #[rstest]
    #[case::name(|d: &mut StudentDraft| d.name.clear())]
    #[case::age(|d: &mut StudentDraft| d.age = "  ".to_string())]
    #[case::dob(|d: &mut StudentDraft| d.date_of_birth.clear())]
    #[case::state(|d: &mut StudentDraft| d.state_ref.clear())]
    fn required_fields_are_enforced(#[case] blank: fn(&mut StudentDraft)) {
        let mut draft = draft();
        blank(&mut draft);
        let err = create_student(&dataset(), &draft, &mut ids()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), MISSING_FIELDS);
    }

    #[rstest]
    #[case::zero_age("0", "2009-11-30")]
    #[case::word_age("fifteen", "2009-11-30")]
    #[case::bad_date("15", "30/11/2009")]
    fn typed_fields_must_parse(#[case] age: &str, #[case] dob: &str) {
        let draft = StudentDraft {
            age: age.to_string(),
            date_of_birth: dob.to_string(),
            ..draft()
        };
        let err = create_student(&dataset(), &draft, &mut ids()).unwrap_err();
        assert!(matches!(err, Error::ValidationError { .. }));
    }

    #[rstest]
    #[case::unknown_id("99")]
    #[case::not_a_number("Goa")]
    fn unknown_state_is_a_referential_error(#[case] state_ref: &str) {
        let dataset = dataset();
        let draft = StudentDraft {
            state_ref: state_ref.to_string(),
            ..draft()
        };
        let err = create_student(&dataset, &draft, &mut ids()).unwrap_err();
        assert!(matches!(err, Error::ReferentialError { .. }));
        assert!(err.is_validation());
        assert!(dataset.students.is_empty());
    }

    #[test]
    fn create_assigns_distinct_ids() {
        let mut ids = ids();
        let (students, first) = create_student(&dataset(), &draft(), &mut ids).unwrap();
        let next = Dataset {
            students,
            states: default_states(),
        };
        let (students, second) = create_student(&next, &draft(), &mut ids).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(students.len(), 2);
        assert_eq!(first.address, None);
        assert_eq!(first.state_ref, 2);
    }

    fn with_one_student() -> (Dataset, Student) {
        let (students, student) = create_student(&dataset(), &draft(), &mut ids()).unwrap();
        (
            Dataset {
                students,
                states: default_states(),
            },
            student,
        )
    }

    #[test]
    fn wrong_secret_is_rejected_and_changes_nothing() {
        let (dataset, student) = with_one_student();
        let edit = StudentDraft {
            name: "Meera K".to_string(),
            ..draft()
        };
        let err = update_student(&dataset, student.id, &edit, "wrong", "72991").unwrap_err();
        assert!(matches!(err, Error::StepUpRejected { .. }));
        assert!(!err.is_validation());
        assert_eq!(dataset.students, vec![student]);
    }

    #[test]
    fn right_secret_replaces_record_keeping_id() {
        let (dataset, student) = with_one_student();
        let edit = StudentDraft {
            name: "Meera K".to_string(),
            phone: "9123456780".to_string(),
            state_ref: "3".to_string(),
            ..draft()
        };
        let (students, updated) =
            update_student(&dataset, student.id, &edit, "72991", "72991").unwrap();
        assert_eq!(updated.id, student.id);
        assert_eq!(updated.name, "Meera K");
        assert_eq!(updated.state_ref, 3);
        assert_eq!(students, vec![updated]);
    }

    #[test]
    fn invalid_draft_fails_before_secret_check() {
        let (dataset, student) = with_one_student();
        let edit = StudentDraft {
            phone: "12345".to_string(),
            ..draft()
        };
        let err = update_student(&dataset, student.id, &edit, "wrong", "72991").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn update_of_missing_student_is_reported() {
        let (dataset, _) = with_one_student();
        let err = update_student(&dataset, 7, &draft(), "72991", "72991").unwrap_err();
        assert!(matches!(err, Error::StudentNotFound { id: 7 }));
    }

    #[test]
    fn delete_removes_only_the_matching_id() {
        let (dataset, student) = with_one_student();
        assert!(delete_student(&dataset, student.id).is_empty());
        assert_eq!(delete_student(&dataset, student.id + 1), dataset.students);
    }

    #[rstest]
    #[case::blank("")]
    #[case::spaces("   ")]
    fn state_name_must_not_be_blank(#[case] name: &str) {
        let err = create_state(&dataset(), name, &mut ids()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn state_is_trimmed_and_appended() {
        let (states, state) = create_state(&dataset(), "  Kerala ", &mut ids()).unwrap();
        assert_eq!(state.name, "Kerala");
        assert_eq!(states.len(), 4);
        assert_eq!(states.last(), Some(&state));
        assert!(default_states().iter().all(|s| s.id != state.id));
    }
}
