use chrono::Datelike;

use crate::error::SearchError;
use crate::models::CandidateRecord;

/// Constraints for an advanced search. `None` and empty strings impose
/// nothing; every supplied field must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub identifier: Option<String>,
    pub full_name: Option<String>,
    pub exam_center: Option<String>,
    pub wilaya: Option<String>,
    pub birth_year: Option<String>,
    pub school: Option<String>,
    pub series: Option<String>,
}

impl SearchCriteria {
    pub fn by_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }

    /// True when no field carries anything but whitespace.
    pub fn is_blank(&self) -> bool {
        [
            &self.identifier,
            &self.full_name,
            &self.exam_center,
            &self.wilaya,
            &self.birth_year,
            &self.school,
            &self.series,
        ]
        .iter()
        .all(|field| field.as_deref().map_or(true, |value| value.trim().is_empty()))
    }

    pub fn matches(&self, record: &CandidateRecord) -> bool {
        if let Some(identifier) = constraint(&self.identifier) {
            if record.registration_id != identifier {
                return false;
            }
        }

        if let Some(name) = constraint(&self.full_name) {
            if !record
                .full_name
                .fr
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }

        if let Some(centre) = constraint(&self.exam_center) {
            if record.exam_center.fr != centre {
                return false;
            }
        }

        if let Some(wilaya) = constraint(&self.wilaya) {
            if record.wilaya.fr != wilaya {
                return false;
            }
        }

        if let Some(school) = constraint(&self.school) {
            if record.school.fr != school {
                return false;
            }
        }

        if let Some(year) = constraint(&self.birth_year) {
            match record.birth_date.parsed {
                Some(date) if date.year().to_string() == year => {}
                _ => return false,
            }
        }

        if let Some(series) = constraint(&self.series) {
            if record.series.code != series {
                return false;
            }
        }

        true
    }
}

fn constraint(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// First record in load order whose registration number equals `id`.
pub fn find_by_identifier<'a>(records: &'a [CandidateRecord], id: &str) -> Option<&'a CandidateRecord> {
    records.iter().find(|record| record.registration_id == id)
}

/// Every record satisfying all supplied criteria, in load order.
pub fn filter_by_criteria<'a>(
    records: &'a [CandidateRecord],
    criteria: &SearchCriteria,
) -> Vec<&'a CandidateRecord> {
    records
        .iter()
        .filter(|record| criteria.matches(record))
        .collect()
}

/// A user search: a candidate number takes precedence over the advanced
/// criteria when it is not blank.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub candidate_number: Option<String>,
    pub criteria: SearchCriteria,
}

impl SearchRequest {
    pub fn simple_number(&self) -> Option<&str> {
        self.candidate_number
            .as_deref()
            .filter(|number| !number.trim().is_empty())
    }
}

#[derive(Debug, PartialEq)]
pub enum SearchOutcome<'a> {
    Single(&'a CandidateRecord),
    Multiple(Vec<&'a CandidateRecord>),
}

pub fn search<'a>(
    records: &'a [CandidateRecord],
    request: &SearchRequest,
) -> Result<SearchOutcome<'a>, SearchError> {
    let mut found = match request.simple_number() {
        Some(number) => filter_by_criteria(records, &SearchCriteria::by_identifier(number)),
        None if request.criteria.is_blank() => return Err(SearchError::EmptyQuery),
        None => filter_by_criteria(records, &request.criteria),
    };

    match found.len() {
        0 => Err(SearchError::NoMatch),
        1 => Ok(SearchOutcome::Single(found.remove(0))),
        _ => Ok(SearchOutcome::Multiple(found)),
    }
}
