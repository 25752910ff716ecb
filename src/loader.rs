use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::models::{Bilingual, CandidateRecord, Lang, RawCandidate, StatisticsSummary};
use crate::query;

/// Where a published artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DataSource::Url(location.to_string())
        } else {
            DataSource::File(PathBuf::from(location))
        }
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>, LoadError> {
        match self {
            DataSource::File(path) => tokio::fs::read(path).await.map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            }),
            DataSource::Url(url) => {
                let http = |source| LoadError::Http {
                    url: url.clone(),
                    source,
                };
                let response = reqwest::get(url)
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(http)?;
                let body = response.bytes().await.map_err(http)?;
                Ok(body.to_vec())
            }
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "{}", path.display()),
            DataSource::Url(url) => write!(f, "{url}"),
        }
    }
}

/// The immutable, fully materialized candidate list.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<CandidateRecord>,
}

impl Dataset {
    /// Normalizes raw rows and fixes the load order: alphabetical by Latin
    /// full name ignoring case and accents, stable for equal names.
    pub fn from_raw(raw: Vec<RawCandidate>) -> Self {
        let mut records: Vec<CandidateRecord> =
            raw.into_iter().map(CandidateRecord::from_raw).collect();
        records.sort_by_cached_key(|record| {
            let name = &record.full_name.fr;
            (collation_key(name), name.to_lowercase(), name.clone())
        });
        Self { records }
    }

    pub fn records(&self) -> &[CandidateRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_identifier(&self, id: &str) -> Option<&CandidateRecord> {
        query::find_by_identifier(&self.records, id)
    }

    pub fn distinct_wilayas(&self) -> Vec<&str> {
        self.distinct(|record| &record.wilaya.fr)
    }

    pub fn distinct_centers(&self) -> Vec<&str> {
        self.distinct(|record| &record.exam_center.fr)
    }

    pub fn distinct_series(&self) -> Vec<&str> {
        self.distinct(|record| &record.series.code)
    }

    pub fn distinct_schools(&self) -> Vec<&str> {
        self.distinct(|record| &record.school.fr)
    }

    fn distinct<'a, F>(&'a self, field: F) -> Vec<&'a str>
    where
        F: Fn(&'a CandidateRecord) -> &'a String,
    {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|record| field(record).as_str())
            .filter(|value| !value.is_empty() && seen.insert(*value))
            .collect()
    }
}

/// Lowercased name with French and Latin-1 accents removed.
fn collation_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        match ch {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => key.push('a'),
            'æ' => key.push_str("ae"),
            'ç' => key.push('c'),
            'è' | 'é' | 'ê' | 'ë' => key.push('e'),
            'ì' | 'í' | 'î' | 'ï' => key.push('i'),
            'ñ' => key.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => key.push('o'),
            'œ' => key.push_str("oe"),
            'ù' | 'ú' | 'û' | 'ü' => key.push('u'),
            'ý' | 'ÿ' => key.push('y'),
            other => key.push(other),
        }
    }
    key
}

async fn load_raw(source: &DataSource) -> Result<Vec<RawCandidate>, LoadError> {
    let bytes = source.read_bytes().await?;
    let raw: Vec<RawCandidate> =
        serde_json::from_slice(&bytes).map_err(|source_err| LoadError::Malformed {
            origin: source.to_string(),
            source: source_err,
        })?;
    debug!("Decoded {} raw candidates from {}", raw.len(), source);
    Ok(raw)
}

/// Normalized candidates in source-file order, for the batch pipeline.
pub async fn load_records(source: &DataSource) -> Result<Vec<CandidateRecord>, LoadError> {
    let raw = load_raw(source).await?;
    Ok(raw.into_iter().map(CandidateRecord::from_raw).collect())
}

pub async fn load_dataset(source: &DataSource) -> Result<Dataset, LoadError> {
    let dataset = Dataset::from_raw(load_raw(source).await?);
    let unscored = dataset
        .records()
        .iter()
        .filter(|record| record.average.is_none())
        .count();
    if dataset.is_empty() {
        warn!("{source} contains no candidates");
    } else if unscored > 0 {
        warn!("{unscored} candidates have no usable average");
    }

    info!("Loaded {} candidates from {}", dataset.len(), source);
    Ok(dataset)
}

pub async fn load_summary(source: &DataSource) -> Result<StatisticsSummary, LoadError> {
    let bytes = source.read_bytes().await?;
    serde_json::from_slice(&bytes).map_err(|source_err| LoadError::Malformed {
        origin: source.to_string(),
        source: source_err,
    })
}

/// Load-once holder for the dataset. A failed load leaves the cache empty
/// so the next call tries again.
#[derive(Debug)]
pub struct DatasetCache {
    source: DataSource,
    cell: OnceCell<Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new(source: DataSource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<Dataset>, LoadError> {
        if !self.is_loaded() {
            debug!("Dataset not cached yet, loading from {}", self.source);
        }
        let dataset = self
            .cell
            .get_or_try_init(|| async { load_dataset(&self.source).await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(dataset))
    }
}

/// Latin wilaya name to its bilingual pair.
#[derive(Debug, Clone, Default)]
pub struct WilayaNames {
    names: BTreeMap<String, Bilingual>,
}

impl WilayaNames {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let names = dataset
            .records()
            .iter()
            .map(|record| (record.wilaya.fr.clone(), record.wilaya.clone()))
            .collect();
        Self { names }
    }

    /// Falls back to the key itself when no translation is known.
    pub fn display<'a>(&'a self, wilaya: &'a str, lang: Lang) -> &'a str {
        match self.names.get(wilaya) {
            Some(pair) if !pair.get(lang).is_empty() => pair.get(lang),
            _ => wilaya,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {"Num_Bac": "2", "Nom_FR": "zeinebou", "Wilaya_FR": "Trarza", "Wilaya_AR": "الترارزة",
         "SERIE": "SN", "Moy_Bac": "11,00", "Decision": "Admis Sn"},
        {"Num_Bac": "1", "Nom_FR": "Ahmed", "Wilaya_FR": "Adrar", "Wilaya_AR": "آدرار",
         "SERIE": "M", "Moy_Bac": 8.5, "Decision": "Ajourné Sn"},
        {"Num_Bac": "3", "Nom_FR": "Brahim", "Wilaya_FR": "Trarza", "Wilaya_AR": "الترارزة",
         "SERIE": "SN", "Moy_Bac": "n/a", "Decision": "Sessionnaire"}
    ]"#;

    fn write_sample(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_sources() {
        assert_eq!(
            DataSource::parse("https://example.org/results.json"),
            DataSource::Url("https://example.org/results.json".to_string())
        );
        assert_eq!(
            DataSource::parse("public/results.json"),
            DataSource::File(PathBuf::from("public/results.json"))
        );
    }

    #[tokio::test]
    async fn loads_and_sorts_by_latin_name() {
        let file = write_sample(SAMPLE);
        let dataset = load_dataset(&DataSource::File(file.path().to_path_buf()))
            .await
            .unwrap();

        let names: Vec<&str> = dataset
            .records()
            .iter()
            .map(|record| record.full_name.fr.as_str())
            .collect();
        assert_eq!(names, vec!["Ahmed", "Brahim", "zeinebou"]);
        assert_eq!(dataset.find_by_identifier("3").unwrap().average, None);
    }

    #[tokio::test]
    async fn batch_records_keep_file_order() {
        let file = write_sample(SAMPLE);
        let records = load_records(&DataSource::File(file.path().to_path_buf()))
            .await
            .unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.registration_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
    }

    #[tokio::test]
    async fn malformed_json_is_a_load_error() {
        let file = write_sample(r#"{"not": "an array"}"#);
        let err = load_dataset(&DataSource::File(file.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[tokio::test]
    async fn cache_retries_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let cache = DatasetCache::new(DataSource::File(path.clone()));

        assert!(matches!(cache.get().await, Err(LoadError::Io { .. })));
        assert!(!cache.is_loaded());

        std::fs::write(&path, SAMPLE).unwrap();
        let first = cache.get().await.unwrap();
        assert_eq!(first.len(), 3);

        std::fs::remove_file(&path).unwrap();
        let second = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let raw: Vec<RawCandidate> = ["zeinebou", "Élise", "Ahmed", "elise", "Emma"]
            .into_iter()
            .map(|name| RawCandidate {
                nom_fr: name.to_string(),
                ..RawCandidate::default()
            })
            .collect();

        let dataset = Dataset::from_raw(raw);
        let names: Vec<&str> = dataset
            .records()
            .iter()
            .map(|record| record.full_name.fr.as_str())
            .collect();
        assert_eq!(names, vec!["Ahmed", "elise", "Élise", "Emma", "zeinebou"]);
    }

    #[test]
    fn distinct_values_keep_load_order() {
        let raw: Vec<RawCandidate> = serde_json::from_str(SAMPLE).unwrap();
        let dataset = Dataset::from_raw(raw);
        assert_eq!(dataset.distinct_wilayas(), vec!["Adrar", "Trarza"]);
        assert_eq!(dataset.distinct_series(), vec!["M", "SN"]);
        assert!(dataset.distinct_centers().is_empty());
    }

    #[test]
    fn wilaya_names_fall_back_to_key() {
        let raw: Vec<RawCandidate> = serde_json::from_str(SAMPLE).unwrap();
        let names = WilayaNames::from_dataset(&Dataset::from_raw(raw));
        assert_eq!(names.display("Trarza", Lang::Ar), "الترارزة");
        assert_eq!(names.display("Trarza", Lang::Fr), "Trarza");
        assert_eq!(names.display("Inchiri", Lang::Ar), "Inchiri");
    }
}
