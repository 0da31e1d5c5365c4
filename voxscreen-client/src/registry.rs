//! Patient registry (administrators only)
//!
//! An in-memory demo list seeded with fixture patients. Nothing here is
//! persisted; every operation checks the session role first.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;
use voxscreen_common::{PredictionResult, Verdict};

use crate::error::{RegistryError, SessionError};
use crate::sequencing::Analyzer;
use crate::session::AppSession;
use crate::transport::AudioUpload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Positive,
    Negative,
    Pending,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Positive => "positive",
            PatientStatus::Negative => "negative",
            PatientStatus::Pending => "pending",
        }
    }
}

impl From<Verdict> for PatientStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Positive => PatientStatus::Positive,
            Verdict::Negative => PatientStatus::Negative,
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(SessionError::IncompleteForm),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => f.write_str("Male"),
            Gender::Female => f.write_str("Female"),
        }
    }
}

/// Registry tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(PatientStatus),
}

impl StatusFilter {
    fn matches(&self, status: PatientStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "positive" => Ok(StatusFilter::Only(PatientStatus::Positive)),
            "negative" => Ok(StatusFilter::Only(PatientStatus::Negative)),
            "pending" => Ok(StatusFilter::Only(PatientStatus::Pending)),
            other => Err(format!(
                "unknown status '{}' (expected all, positive, negative or pending)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub date_added: NaiveDate,
    pub status: PatientStatus,
    pub last_test: Option<NaiveDate>,
    pub notes: String,
}

/// Add-patient form contents, as typed
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub notes: String,
}

pub struct PatientRegistry {
    patients: Vec<Patient>,
    next_id: u32,
}

/// Seed row; a bad date fails const evaluation instead of dropping a patient
struct Fixture {
    id: &'static str,
    name: &'static str,
    age: u32,
    gender: Gender,
    added: NaiveDate,
    status: PatientStatus,
    last_test: Option<NaiveDate>,
    notes: &'static str,
}

const fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(y, m, d) {
        Some(date) => date,
        None => panic!("invalid fixture date"),
    }
}

const FIXTURES: [Fixture; 5] = [
    Fixture {
        id: "p1",
        name: "Mohammed El Amrani",
        age: 65,
        gender: Gender::Male,
        added: date(2024, 10, 15),
        status: PatientStatus::Positive,
        last_test: Some(date(2025, 4, 10)),
        notes: "Early signs detected in voice analysis. Referred to neurologist.",
    },
    Fixture {
        id: "p2",
        name: "Fatima Bensouda",
        age: 58,
        gender: Gender::Female,
        added: date(2024, 11, 22),
        status: PatientStatus::Negative,
        last_test: Some(date(2025, 3, 28)),
        notes: "No significant indicators found. Scheduled for follow-up in 6 months.",
    },
    Fixture {
        id: "p3",
        name: "Ahmed Tazi",
        age: 72,
        gender: Gender::Male,
        added: date(2025, 1, 5),
        status: PatientStatus::Positive,
        last_test: Some(date(2025, 4, 15)),
        notes: "Moderate indicators in voice analysis. Currently under medication.",
    },
    Fixture {
        id: "p4",
        name: "Aisha Lahlou",
        age: 61,
        gender: Gender::Female,
        added: date(2024, 5, 18),
        status: PatientStatus::Pending,
        last_test: None,
        notes: "Initial consultation completed. Awaiting voice analysis.",
    },
    Fixture {
        id: "p5",
        name: "Youssef Alaoui",
        age: 68,
        gender: Gender::Male,
        added: date(2025, 3, 7),
        status: PatientStatus::Negative,
        last_test: Some(date(2025, 4, 2)),
        notes: "No indicators found. Family history of Parkinson's, monitoring recommended.",
    },
];

impl From<&Fixture> for Patient {
    fn from(fixture: &Fixture) -> Self {
        Patient {
            id: fixture.id.to_string(),
            name: fixture.name.to_string(),
            age: fixture.age,
            gender: fixture.gender,
            date_added: fixture.added,
            status: fixture.status,
            last_test: fixture.last_test,
            notes: fixture.notes.to_string(),
        }
    }
}

impl PatientRegistry {
    /// The five demo patients
    pub fn seeded() -> Self {
        let patients: Vec<Patient> = FIXTURES.iter().map(Patient::from).collect();
        let next_id = patients.len() as u32 + 1;
        Self { patients, next_id }
    }

    /// Patients matching the tab and a case-insensitive name search
    pub fn list(
        &self,
        session: &AppSession,
        filter: StatusFilter,
        search: &str,
    ) -> Result<Vec<&Patient>, SessionError> {
        session.require_admin()?;
        let needle = search.trim().to_lowercase();

        Ok(self
            .patients
            .iter()
            .filter(|p| filter.matches(p.status))
            .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub fn get(&self, session: &AppSession, id: &str) -> Result<&Patient, SessionError> {
        session.require_admin()?;
        self.patients
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| SessionError::NotFound(format!("patient {}", id)))
    }

    /// Validate and append a new pending patient
    pub fn add_patient(
        &mut self,
        session: &AppSession,
        form: &NewPatient,
        today: NaiveDate,
    ) -> Result<&Patient, SessionError> {
        session.require_admin()?;

        let name = form.name.trim();
        if name.is_empty() {
            return Err(SessionError::IncompleteForm);
        }
        let age: u32 = form
            .age
            .trim()
            .parse()
            .map_err(|_| SessionError::IncompleteForm)?;
        let gender: Gender = form.gender.parse()?;

        let id = self.allocate_id();
        info!(patient = %id, "Patient added");
        self.patients.push(Patient {
            id,
            name: name.to_string(),
            age,
            gender,
            date_added: today,
            status: PatientStatus::Pending,
            last_test: None,
            notes: form.notes.trim().to_string(),
        });

        self.patients
            .last()
            .ok_or_else(|| SessionError::NotFound("new patient".to_string()))
    }

    /// Run a voice test for one patient and record its outcome
    ///
    /// A failed analysis leaves the patient unchanged.
    pub async fn run_test(
        &mut self,
        session: &AppSession,
        id: &str,
        upload: &AudioUpload,
        analyzer: &Analyzer,
        today: NaiveDate,
    ) -> Result<PredictionResult, RegistryError> {
        session.require_admin()?;
        if !self.patients.iter().any(|p| p.id == id) {
            return Err(SessionError::NotFound(format!("patient {}", id)).into());
        }

        let result = analyzer.analyze_detached(upload).await?;

        let patient = self
            .patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SessionError::NotFound(format!("patient {}", id)))?;
        patient.status = result.verdict.into();
        patient.last_test = Some(today);
        info!(patient = %id, status = %patient.status, "Voice test recorded");

        Ok(result)
    }

    fn allocate_id(&mut self) -> String {
        loop {
            let candidate = format!("p{}", self.next_id);
            self.next_id += 1;
            if !self.patients.iter().any(|p| p.id == candidate) {
                return candidate;
            }
        }
    }
}
