use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::timestamp::{deserialize_timestamp, serialize_timestamp};

/// Backend identifier of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub u64);

/// Backend identifier of a grade/section offering (`gradoParaleloId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Academic period label such as `2025-2026`. Ordering is lexical, which matches the
/// `YYYY-YYYY` labels used by the school.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcademicPeriod(String);

impl AcademicPeriod {
    /// Trims the label; blank labels yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AcademicPeriod {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for AcademicPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `{key, value}` option served by the backend selector endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorOption {
    pub key: u64,
    pub value: String,
}

/// A student without an active enrollment, as listed by the student selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentOption {
    #[serde(rename = "key")]
    pub id: StudentId,
    #[serde(rename = "value")]
    pub label: String,
}

/// Concrete (grade, section, academic year) offering with its capacity counters.
///
/// `occupied <= capacity` holds for every value. Rows reporting more students than seats decode
/// as full sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SectionRecord", into = "SectionRecord")]
pub struct AcademicSection {
    pub id: SectionId,
    pub paralelo_id: u64,
    pub grade_name: String,
    pub section_name: String,
    pub academic_year: AcademicPeriod,
    capacity: u32,
    occupied: u32,
}

impl AcademicSection {
    pub fn new(
        id: SectionId,
        paralelo_id: u64,
        grade_name: impl Into<String>,
        section_name: impl Into<String>,
        academic_year: AcademicPeriod,
        capacity: u32,
        occupied: u32,
    ) -> Result<Self, CapacityViolation> {
        if occupied > capacity {
            return Err(CapacityViolation {
                section_id: id,
                capacity,
                occupied,
            });
        }

        Ok(Self {
            id,
            paralelo_id,
            grade_name: grade_name.into(),
            section_name: section_name.into(),
            academic_year,
            capacity,
            occupied,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn occupied(&self) -> u32 {
        self.occupied
    }

    pub fn available(&self) -> u32 {
        self.capacity - self.occupied
    }

    pub fn is_full(&self) -> bool {
        self.available() == 0
    }

    /// Consumes one seat. Only the authoritative store calls this.
    pub(crate) fn occupy_one(&mut self) -> Result<(), CapacityViolation> {
        if self.is_full() {
            return Err(CapacityViolation {
                section_id: self.id,
                capacity: self.capacity,
                occupied: self.occupied + 1,
            });
        }
        self.occupied += 1;
        Ok(())
    }

    pub fn label(&self) -> String {
        format!(
            "{} \"{}\" ({})",
            self.grade_name, self.section_name, self.academic_year
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("section {section_id} would hold {occupied} students with capacity {capacity}")]
pub struct CapacityViolation {
    pub section_id: SectionId,
    pub capacity: u32,
    pub occupied: u32,
}

/// Wire shape of `GradoParalelo/Disponibles` rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRecord {
    grado_paralelo_id: SectionId,
    paralelo_id: u64,
    grado_nombre: String,
    paralelo_nombre: String,
    anio_lectivo: AcademicPeriod,
    cupos: i64,
    ocupados: i64,
    #[serde(default)]
    disponibles: Option<i64>,
}

impl TryFrom<SectionRecord> for AcademicSection {
    type Error = String;

    fn try_from(record: SectionRecord) -> Result<Self, Self::Error> {
        let capacity = u32::try_from(record.cupos)
            .map_err(|_| format!("cupos {} is not a valid capacity", record.cupos))?;
        let reported = u32::try_from(record.ocupados)
            .map_err(|_| format!("ocupados {} is not a valid count", record.ocupados))?;
        if reported > capacity {
            warn!(
                section_id = %record.grado_paralelo_id,
                capacity,
                occupied = reported,
                "section reports more students than seats; treating it as full"
            );
        }
        let occupied = reported.min(capacity);

        AcademicSection::new(
            record.grado_paralelo_id,
            record.paralelo_id,
            record.grado_nombre,
            record.paralelo_nombre,
            record.anio_lectivo,
            capacity,
            occupied,
        )
        .map_err(|violation| violation.to_string())
    }
}

impl From<AcademicSection> for SectionRecord {
    fn from(section: AcademicSection) -> Self {
        let disponibles = Some(i64::from(section.available()));
        Self {
            grado_paralelo_id: section.id,
            paralelo_id: section.paralelo_id,
            grado_nombre: section.grade_name,
            paralelo_nombre: section.section_name,
            anio_lectivo: section.academic_year,
            cupos: i64::from(section.capacity),
            ocupados: i64::from(section.occupied),
            disponibles,
        }
    }
}

/// A section as offered to one student during the interactive flow.
///
/// Full sections stay in the list so the console can show "0 available"; they are never
/// selectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSlot {
    #[serde(flatten)]
    pub section: AcademicSection,
    #[serde(rename = "isFull")]
    pub is_full: bool,
}

impl CandidateSlot {
    pub fn from_section(section: AcademicSection) -> Self {
        let is_full = section.is_full();
        Self { section, is_full }
    }

    pub fn id(&self) -> SectionId {
        self.section.id
    }

    pub fn is_selectable(&self) -> bool {
        !self.is_full
    }
}

/// Backend-defined enrollment status, carried as an opaque label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnrollmentStatus(pub String);

impl EnrollmentStatus {
    pub fn pending() -> Self {
        Self("Pendiente".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_pending(&self) -> bool {
        self.0.to_lowercase().contains("pend")
    }

    pub fn is_approved(&self) -> bool {
        self.0.to_lowercase().contains("aprob")
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.to_lowercase().contains("anul")
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record binding a student to a section for one academic period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    #[serde(rename = "estudianteId")]
    pub student_id: StudentId,
    #[serde(rename = "estudianteNombre", default)]
    pub student_name: String,
    #[serde(rename = "gradoParaleloId")]
    pub section_id: SectionId,
    #[serde(rename = "gradoNombre", default)]
    pub grade_name: String,
    #[serde(rename = "paraleloNombre", default)]
    pub section_name: String,
    #[serde(rename = "periodo")]
    pub period: AcademicPeriod,
    #[serde(rename = "estadoMatricula")]
    pub status: EnrollmentStatus,
    #[serde(
        rename = "fechaMatricula",
        deserialize_with = "deserialize_timestamp",
        serialize_with = "serialize_timestamp"
    )]
    pub created_at: NaiveDateTime,
}

impl Enrollment {
    /// Case-insensitive match over the fields an operator searches by.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        let id = self.id.to_string();
        let blob = [
            self.student_name.as_str(),
            self.grade_name.as_str(),
            self.section_name.as_str(),
            self.period.as_str(),
            self.status.as_str(),
            id.as_str(),
        ]
        .join(" ")
        .to_lowercase();

        blob.contains(&needle)
    }
}

/// Commit request body for `Matricula/Crear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    #[serde(rename = "estudianteId")]
    pub student_id: StudentId,
    #[serde(rename = "gradoParaleloId")]
    pub section_id: SectionId,
}

/// Optional filters for the slot directory. A `0` id means "all", like the console's
/// "Todos" choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFilter {
    #[serde(rename = "gradoId", default, skip_serializing_if = "Option::is_none")]
    pub grade_id: Option<u64>,
    #[serde(rename = "paraleloId", default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<u64>,
    #[serde(
        rename = "anioLectivoId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub academic_year_id: Option<u64>,
}

impl SlotFilter {
    pub fn normalized(self) -> Self {
        let keep = |value: Option<u64>| value.filter(|id| *id != 0);
        Self {
            grade_id: keep(self.grade_id),
            section_id: keep(self.section_id),
            academic_year_id: keep(self.academic_year_id),
        }
    }

    /// Query pairs for the set filters only.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let normalized = self.normalized();
        [
            ("gradoId", normalized.grade_id),
            ("paraleloId", normalized.section_id),
            ("anioLectivoId", normalized.academic_year_id),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|id| (name, id.to_string())))
        .collect()
    }
}

/// Choices for the slot directory filter bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotFilterOptions {
    pub grades: Vec<SelectorOption>,
    pub sections: Vec<SelectorOption>,
    pub academic_years: Vec<SelectorOption>,
}
