use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize;

/// One candidate object exactly as it appears in the published results file.
///
/// The external key spellings (including the double space in the exam
/// centre keys) live here and nowhere else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    #[serde(rename = "Noreg", default, deserialize_with = "text_field")]
    pub noreg: String,
    #[serde(rename = "Wilaya_FR", default, deserialize_with = "text_field")]
    pub wilaya_fr: String,
    #[serde(rename = "Wilaya_AR", default, deserialize_with = "text_field")]
    pub wilaya_ar: String,
    #[serde(rename = "Centre Examen  FR", default, deserialize_with = "text_field")]
    pub centre_fr: String,
    #[serde(rename = "Centre Examen  AR", default, deserialize_with = "text_field")]
    pub centre_ar: String,
    #[serde(rename = "Etablissement_FR", default, deserialize_with = "text_field")]
    pub etablissement_fr: String,
    #[serde(rename = "Etablissement_AR", default, deserialize_with = "text_field")]
    pub etablissement_ar: String,
    #[serde(rename = "Num_Bac", default, deserialize_with = "text_field")]
    pub num_bac: String,
    #[serde(rename = "SERIE", default, deserialize_with = "text_field")]
    pub serie: String,
    #[serde(rename = "Serie_FR", default, deserialize_with = "text_field")]
    pub serie_fr: String,
    #[serde(rename = "Serie_AR", default, deserialize_with = "text_field")]
    pub serie_ar: String,
    #[serde(rename = "NNI", default, deserialize_with = "text_field")]
    pub nni: String,
    #[serde(rename = "Nom_FR", default, deserialize_with = "text_field")]
    pub nom_fr: String,
    #[serde(rename = "NOM_AR", default, deserialize_with = "text_field")]
    pub nom_ar: String,
    #[serde(rename = "Lieun_FR", default, deserialize_with = "text_field")]
    pub lieu_fr: String,
    #[serde(rename = "Lieun_AR", default, deserialize_with = "text_field")]
    pub lieu_ar: String,
    #[serde(rename = "Date Naiss", default)]
    pub date_naiss: RawDate,
    #[serde(rename = "Moy_Bac", default)]
    pub moy_bac: RawScore,
    #[serde(rename = "Decision", default, deserialize_with = "text_field")]
    pub decision: String,
}

/// Spreadsheet exports mix strings and numbers for the same column.
fn text_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Number(number)) => number.to_string(),
        Some(serde_json::Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawScore {
    Number(f64),
    Text(String),
    #[default]
    Missing,
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    /// Day count since the spreadsheet epoch.
    Serial(f64),
    Text(String),
    #[default]
    Missing,
    Other(serde_json::Value),
}

impl fmt::Display for RawDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawDate::Serial(value) => write!(f, "{value}"),
            RawDate::Text(text) => write!(f, "{text}"),
            RawDate::Missing => Ok(()),
            RawDate::Other(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Fr,
    Ar,
}

impl Lang {
    pub fn load_failed(self) -> &'static str {
        match self {
            Lang::Fr => "Erreur lors du chargement des données",
            Lang::Ar => "خطأ في تحميل البيانات",
        }
    }

    pub fn no_results(self) -> &'static str {
        match self {
            Lang::Fr => "Aucun résultat trouvé",
            Lang::Ar => "لم يتم العثور على نتائج",
        }
    }

    pub fn empty_query(self) -> &'static str {
        match self {
            Lang::Fr => "Veuillez entrer un critère de recherche",
            Lang::Ar => "يرجى إدخال معيار البحث",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bilingual {
    pub fr: String,
    pub ar: String,
}

impl Bilingual {
    pub fn new(fr: impl Into<String>, ar: impl Into<String>) -> Self {
        Self {
            fr: fr.into(),
            ar: ar.into(),
        }
    }

    pub fn get(&self, lang: Lang) -> &str {
        match lang {
            Lang::Fr => &self.fr,
            Lang::Ar => &self.ar,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    pub code: String,
    pub name: Bilingual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BirthDate {
    pub raw: RawDate,
    pub parsed: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decision {
    Admitted,
    Postponed,
    Retake,
    Other(String),
}

impl Decision {
    pub const ADMITTED_LABEL: &'static str = "Admis Sn";
    pub const POSTPONED_LABEL: &'static str = "Ajourné Sn";
    pub const RETAKE_LABEL: &'static str = "Sessionnaire";

    /// Labels are matched literally; no case or accent folding.
    pub fn from_label(label: &str) -> Self {
        match label {
            Self::ADMITTED_LABEL => Decision::Admitted,
            Self::POSTPONED_LABEL => Decision::Postponed,
            Self::RETAKE_LABEL => Decision::Retake,
            other => Decision::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Decision::Admitted => Self::ADMITTED_LABEL,
            Decision::Postponed => Self::POSTPONED_LABEL,
            Decision::Retake => Self::RETAKE_LABEL,
            Decision::Other(label) => label,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }

    /// Headline shown on a result card.
    pub fn headline(&self, lang: Lang) -> &str {
        match (self, lang) {
            (Decision::Admitted, Lang::Fr) => "Admis au Baccalauréat",
            (Decision::Admitted, Lang::Ar) => "ناجح في البكالوريا",
            (other, _) => other.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mention {
    TresBien,
    Bien,
    AssezBien,
    Passable,
    Ajourne,
}

impl Mention {
    pub fn from_average(average: f64) -> Self {
        if average >= 16.0 {
            Mention::TresBien
        } else if average >= 14.0 {
            Mention::Bien
        } else if average >= 12.0 {
            Mention::AssezBien
        } else if average >= 10.0 {
            Mention::Passable
        } else {
            Mention::Ajourne
        }
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Mention::TresBien => "Très Bien",
            Mention::Bien => "Bien",
            Mention::AssezBien => "Assez Bien",
            Mention::Passable => "Passable",
            Mention::Ajourne => "Ajourné",
        };
        write!(f, "{label}")
    }
}

/// A candidate after the single normalization pass at the load boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub noreg: String,
    pub registration_id: String,
    pub national_id: Option<String>,
    pub full_name: Bilingual,
    pub birth_date: BirthDate,
    pub birth_place: Bilingual,
    pub wilaya: Bilingual,
    pub exam_center: Bilingual,
    pub school: Bilingual,
    pub series: Series,
    pub average: Option<f64>,
    pub decision: Decision,
}

impl CandidateRecord {
    pub fn from_raw(raw: RawCandidate) -> Self {
        let average = normalize::parse_average(&raw.moy_bac);
        let birth_date = normalize::normalize_birth_date(raw.date_naiss);
        let national_id = if raw.nni.is_empty() {
            None
        } else {
            Some(raw.nni)
        };

        Self {
            noreg: raw.noreg,
            registration_id: raw.num_bac,
            national_id,
            full_name: Bilingual::new(raw.nom_fr, raw.nom_ar),
            birth_date,
            birth_place: Bilingual::new(raw.lieu_fr, raw.lieu_ar),
            wilaya: Bilingual::new(raw.wilaya_fr, raw.wilaya_ar),
            exam_center: Bilingual::new(raw.centre_fr, raw.centre_ar),
            school: Bilingual::new(raw.etablissement_fr, raw.etablissement_ar),
            series: Series {
                code: raw.serie,
                name: Bilingual::new(raw.serie_fr, raw.serie_ar),
            },
            average,
            decision: Decision::from_label(&raw.decision),
        }
    }

    pub fn mention(&self) -> Option<Mention> {
        self.average.map(Mention::from_average)
    }
}

impl From<&CandidateRecord> for RawCandidate {
    fn from(record: &CandidateRecord) -> Self {
        Self {
            noreg: record.noreg.clone(),
            wilaya_fr: record.wilaya.fr.clone(),
            wilaya_ar: record.wilaya.ar.clone(),
            centre_fr: record.exam_center.fr.clone(),
            centre_ar: record.exam_center.ar.clone(),
            etablissement_fr: record.school.fr.clone(),
            etablissement_ar: record.school.ar.clone(),
            num_bac: record.registration_id.clone(),
            serie: record.series.code.clone(),
            serie_fr: record.series.name.fr.clone(),
            serie_ar: record.series.name.ar.clone(),
            nni: record.national_id.clone().unwrap_or_default(),
            nom_fr: record.full_name.fr.clone(),
            nom_ar: record.full_name.ar.clone(),
            lieu_fr: record.birth_place.fr.clone(),
            lieu_ar: record.birth_place.ar.clone(),
            date_naiss: record.birth_date.raw.clone(),
            moy_bac: record.average.map(RawScore::Number).unwrap_or_default(),
            decision: record.decision.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCounts {
    pub total: usize,
    pub admis: usize,
    pub ajournes: usize,
    pub sessionnaires: usize,
    pub taux_reussite: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMoments {
    pub generale: Option<f64>,
    pub admis: Option<f64>,
    pub ecart_type: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub total: usize,
    pub admis: usize,
    pub taux: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WilayaStats {
    pub total: usize,
    pub admis: usize,
    pub taux: f64,
    pub moyenne: Option<f64>,
    pub moyennes: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchoolStats {
    pub total: usize,
    pub admis: usize,
    pub moyennes: Vec<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentreStats {
    pub total: usize,
    pub admis: usize,
}

/// The published statistics artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSummary {
    pub global: GlobalCounts,
    pub moyennes: ScoreMoments,
    pub par_serie: BTreeMap<String, SeriesStats>,
    pub par_wilaya: BTreeMap<String, WilayaStats>,
    pub par_etablissement: BTreeMap<String, SchoolStats>,
    pub par_centre: BTreeMap<String, CentreStats>,
    pub top10: Vec<RawCandidate>,
    pub top10_wilaya: BTreeMap<String, Vec<RawCandidate>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mixed_cell_types() {
        let raw: RawCandidate = serde_json::from_str(
            r#"{
                "Num_Bac": 35733,
                "Nom_FR": "Ahmed Salem",
                "Centre Examen  FR": "Lycee 1",
                "Date Naiss": 38198,
                "Moy_Bac": "12,50",
                "Decision": "Admis Sn",
                "NNI": null
            }"#,
        )
        .unwrap();

        assert_eq!(raw.num_bac, "35733");
        assert_eq!(raw.centre_fr, "Lycee 1");
        assert_eq!(raw.date_naiss, RawDate::Serial(38198.0));
        assert_eq!(raw.moy_bac, RawScore::Text("12,50".to_string()));
        assert_eq!(raw.nni, "");
        assert_eq!(raw.wilaya_fr, "");
    }

    #[test]
    fn normalizes_raw_candidate() {
        let raw = RawCandidate {
            num_bac: "35733".to_string(),
            nom_fr: "Ahmed Salem".to_string(),
            moy_bac: RawScore::Text("12,50".to_string()),
            decision: "Admis Sn".to_string(),
            date_naiss: RawDate::Text("2004-07-10".to_string()),
            ..RawCandidate::default()
        };

        let record = CandidateRecord::from_raw(raw);
        assert_eq!(record.registration_id, "35733");
        assert_eq!(record.average, Some(12.5));
        assert_eq!(record.decision, Decision::Admitted);
        assert_eq!(record.national_id, None);
        assert_eq!(record.birth_date.parsed, NaiveDate::from_ymd_opt(2004, 7, 10));
        assert_eq!(record.mention(), Some(Mention::AssezBien));
    }

    #[test]
    fn decision_labels_match_literally() {
        assert_eq!(Decision::from_label("Admis Sn"), Decision::Admitted);
        assert_eq!(Decision::from_label("Ajourné Sn"), Decision::Postponed);
        assert_eq!(Decision::from_label("Sessionnaire"), Decision::Retake);
        assert_eq!(
            Decision::from_label("admis sn"),
            Decision::Other("admis sn".to_string())
        );
    }

    #[test]
    fn mention_bands() {
        assert_eq!(Mention::from_average(17.2), Mention::TresBien);
        assert_eq!(Mention::from_average(14.0), Mention::Bien);
        assert_eq!(Mention::from_average(12.9), Mention::AssezBien);
        assert_eq!(Mention::from_average(10.0), Mention::Passable);
        assert_eq!(Mention::from_average(9.99), Mention::Ajourne);
    }

    #[test]
    fn reemits_external_shape_with_numeric_average() {
        let raw = RawCandidate {
            num_bac: "1".to_string(),
            centre_fr: "Centre A".to_string(),
            moy_bac: RawScore::Text("15,25".to_string()),
            ..RawCandidate::default()
        };
        let record = CandidateRecord::from_raw(raw);
        let value = serde_json::to_value(RawCandidate::from(&record)).unwrap();

        assert_eq!(value["Moy_Bac"], serde_json::json!(15.25));
        assert_eq!(value["Centre Examen  FR"], "Centre A");
        assert_eq!(value["Date Naiss"], serde_json::Value::Null);
    }
}
