use std::collections::BTreeMap;

use crate::models::{CandidateRecord, Decision, RawCandidate, StatisticsSummary};
use crate::normalize::MAX_AVERAGE;

pub const TOP_N: usize = 10;
pub const HISTOGRAM_BAND_WIDTH: f64 = 2.0;

/// Build the statistics artifact from candidates in source-file order.
///
/// Candidates without a usable average still count toward totals and
/// decisions but are left out of means, dispersion, min/max and rankings.
pub fn compute_summary(records: &[CandidateRecord]) -> StatisticsSummary {
    let mut summary = StatisticsSummary::default();
    summary.global.total = records.len();

    let mut scores = Vec::with_capacity(records.len());
    let mut admitted_scores = Vec::new();

    for record in records {
        let admitted = record.decision.is_admitted();
        match record.decision {
            Decision::Admitted => summary.global.admis += 1,
            Decision::Postponed => summary.global.ajournes += 1,
            Decision::Retake => summary.global.sessionnaires += 1,
            Decision::Other(_) => {}
        }

        let serie = summary
            .par_serie
            .entry(record.series.code.clone())
            .or_default();
        serie.total += 1;

        let wilaya = summary
            .par_wilaya
            .entry(record.wilaya.fr.clone())
            .or_default();
        wilaya.total += 1;

        let school = summary
            .par_etablissement
            .entry(record.school.fr.clone())
            .or_default();
        school.total += 1;

        let centre = summary
            .par_centre
            .entry(record.exam_center.fr.clone())
            .or_default();
        centre.total += 1;

        if admitted {
            serie.admis += 1;
            wilaya.admis += 1;
            school.admis += 1;
            centre.admis += 1;
        }

        if let Some(average) = record.average {
            wilaya.moyennes.push(average);
            school.moyennes.push(average);
            school.min = Some(school.min.map_or(average, |min| min.min(average)));
            school.max = Some(school.max.map_or(average, |max| max.max(average)));

            scores.push(average);
            if admitted {
                admitted_scores.push(average);
            }
        }
    }

    summary.global.taux_reussite = pass_rate(summary.global.admis, summary.global.total);
    summary.moyennes.generale = mean(&scores);
    summary.moyennes.admis = mean(&admitted_scores);
    summary.moyennes.ecart_type = population_std_dev(&scores);

    for serie in summary.par_serie.values_mut() {
        serie.taux = pass_rate(serie.admis, serie.total);
    }

    for wilaya in summary.par_wilaya.values_mut() {
        wilaya.taux = pass_rate(wilaya.admis, wilaya.total);
        wilaya.moyenne = mean(&wilaya.moyennes);
    }

    summary.top10 = top_n(records.iter(), TOP_N);
    summary.top10_wilaya = summary
        .par_wilaya
        .keys()
        .map(|name| {
            let ranked = top_n(records.iter().filter(|r| &r.wilaya.fr == name), TOP_N);
            (name.clone(), ranked)
        })
        .collect::<BTreeMap<_, _>>();

    summary
}

/// `admitted / total × 100`, or 0 for an empty group.
pub fn pass_rate(admitted: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        admitted as f64 / total as f64 * 100.0
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation: squared deviations divided by `n`.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

/// Highest averages first. The sort is stable, so ties keep the order in
/// which candidates were supplied.
pub fn top_n<'a, I>(records: I, n: usize) -> Vec<RawCandidate>
where
    I: Iterator<Item = &'a CandidateRecord>,
{
    let mut ranked: Vec<(&CandidateRecord, f64)> = records
        .filter_map(|record| record.average.map(|average| (record, average)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
        .into_iter()
        .take(n)
        .map(|(record, _)| RawCandidate::from(record))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBand {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl HistogramBand {
    pub fn label(&self) -> String {
        format!("{}-{}", self.min, self.max)
    }
}

/// Fixed 2-point bands over the 0-20 scale; the last band includes 20.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bands: Vec<HistogramBand>,
}

impl Histogram {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let band_count = (MAX_AVERAGE / HISTOGRAM_BAND_WIDTH) as usize;
        let mut bands: Vec<HistogramBand> = (0..band_count)
            .map(|index| HistogramBand {
                min: index as f64 * HISTOGRAM_BAND_WIDTH,
                max: (index + 1) as f64 * HISTOGRAM_BAND_WIDTH,
                count: 0,
            })
            .collect();

        for value in values {
            if !(0.0..=MAX_AVERAGE).contains(&value) {
                continue;
            }
            let index = ((value / HISTOGRAM_BAND_WIDTH).floor() as usize).min(band_count - 1);
            bands[index].count += 1;
        }

        Self { bands }
    }

    /// Rebuild the distribution from the per-wilaya score lists.
    pub fn from_summary(summary: &StatisticsSummary) -> Self {
        Self::from_values(
            summary
                .par_wilaya
                .values()
                .flat_map(|wilaya| wilaya.moyennes.iter().copied()),
        )
    }

    pub fn total(&self) -> usize {
        self.bands.iter().map(|band| band.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawScore, SeriesStats};

    fn candidate(num_bac: &str, wilaya: &str, serie: &str, average: RawScore, decision: &str) -> CandidateRecord {
        CandidateRecord::from_raw(RawCandidate {
            num_bac: num_bac.to_string(),
            nom_fr: format!("Candidat {num_bac}"),
            wilaya_fr: wilaya.to_string(),
            centre_fr: format!("Centre {wilaya}"),
            etablissement_fr: format!("Lycee {wilaya}"),
            serie: serie.to_string(),
            moy_bac: average,
            decision: decision.to_string(),
            ..RawCandidate::default()
        })
    }

    fn score(value: f64) -> RawScore {
        RawScore::Number(value)
    }

    #[test]
    fn counts_decisions_and_pass_rate() {
        let records = vec![
            candidate("35733", "Trarza", "SN", RawScore::Text("12,50".to_string()), "Admis Sn"),
            candidate("2", "Trarza", "SN", score(8.0), "Ajourné Sn"),
            candidate("3", "Adrar", "M", score(9.5), "Sessionnaire"),
            candidate("4", "Adrar", "M", score(11.0), "Admis Sn"),
        ];

        let summary = compute_summary(&records);
        assert_eq!(summary.global.total, 4);
        assert_eq!(summary.global.admis, 2);
        assert_eq!(summary.global.ajournes, 1);
        assert_eq!(summary.global.sessionnaires, 1);
        assert_eq!(summary.global.taux_reussite, 50.0);
        assert_eq!(summary.moyennes.admis, Some(11.75));
        assert_eq!(
            summary.par_serie.get("SN"),
            Some(&SeriesStats {
                total: 2,
                admis: 1,
                taux: 50.0
            })
        );
    }

    #[test]
    fn unknown_decision_labels_are_not_counted() {
        let records = vec![candidate("1", "Trarza", "SN", score(12.0), "admis sn")];
        let summary = compute_summary(&records);
        assert_eq!(summary.global.total, 1);
        assert_eq!(summary.global.admis, 0);
        assert_eq!(summary.global.ajournes, 0);
        assert_eq!(summary.global.sessionnaires, 0);
    }

    #[test]
    fn std_dev_uses_population_formula() {
        assert_eq!(population_std_dev(&[10.0, 10.0, 10.0]), Some(0.0));
        assert_eq!(mean(&[10.0, 10.0, 10.0]), Some(10.0));
        assert_eq!(population_std_dev(&[8.0, 12.0]), Some(2.0));
        assert_eq!(population_std_dev(&[]), None);
    }

    #[test]
    fn wilaya_pass_rate_bounds() {
        let none_admitted: Vec<_> = (0..5)
            .map(|i| candidate(&i.to_string(), "Adrar", "M", score(7.0), "Ajourné Sn"))
            .collect();
        let all_admitted: Vec<_> = (0..5)
            .map(|i| candidate(&i.to_string(), "Trarza", "M", score(13.0), "Admis Sn"))
            .collect();
        let records: Vec<_> = none_admitted.into_iter().chain(all_admitted).collect();

        let summary = compute_summary(&records);
        assert_eq!(summary.par_wilaya["Adrar"].taux, 0.0);
        assert_eq!(summary.par_wilaya["Trarza"].taux, 100.0);
        assert_eq!(summary.par_wilaya["Trarza"].moyenne, Some(13.0));
        assert_eq!(summary.par_wilaya["Trarza"].moyennes.len(), 5);
    }

    #[test]
    fn no_admitted_candidates_yields_no_admitted_mean() {
        let records = vec![candidate("1", "Adrar", "M", score(7.0), "Ajourné Sn")];
        let summary = compute_summary(&records);
        assert_eq!(summary.moyennes.admis, None);
        assert_eq!(summary.moyennes.generale, Some(7.0));

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["moyennes"]["admis"].is_null());
    }

    #[test]
    fn empty_dataset_is_well_defined() {
        let summary = compute_summary(&[]);
        assert_eq!(summary.global.taux_reussite, 0.0);
        assert_eq!(summary.moyennes.generale, None);
        assert_eq!(summary.moyennes.ecart_type, None);
        assert!(summary.top10.is_empty());
    }

    #[test]
    fn school_min_max_follow_observed_scores() {
        let records = vec![
            candidate("1", "Adrar", "M", score(4.5), "Ajourné Sn"),
            candidate("2", "Adrar", "M", score(17.25), "Admis Sn"),
            candidate("3", "Adrar", "M", RawScore::Text("absent".to_string()), "Ajourné Sn"),
        ];
        let summary = compute_summary(&records);
        let school = &summary.par_etablissement["Lycee Adrar"];
        assert_eq!(school.total, 3);
        assert_eq!(school.min, Some(4.5));
        assert_eq!(school.max, Some(17.25));
        assert_eq!(school.moyennes, vec![4.5, 17.25]);
        assert_eq!(summary.par_centre["Centre Adrar"].admis, 1);
    }

    #[test]
    fn top_ten_of_three_returns_all_descending() {
        let records = vec![
            candidate("1", "Adrar", "M", score(11.0), "Admis Sn"),
            candidate("2", "Adrar", "M", score(15.5), "Admis Sn"),
            candidate("3", "Trarza", "M", score(9.0), "Ajourné Sn"),
        ];
        let summary = compute_summary(&records);
        let ids: Vec<&str> = summary.top10.iter().map(|c| c.num_bac.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(summary.top10[0].moy_bac, RawScore::Number(15.5));

        let adrar: Vec<&str> = summary.top10_wilaya["Adrar"]
            .iter()
            .map(|c| c.num_bac.as_str())
            .collect();
        assert_eq!(adrar, vec!["2", "1"]);
    }

    #[test]
    fn ranking_ties_keep_supplied_order() {
        let records: Vec<_> = (0..12)
            .map(|i| candidate(&format!("c{i}"), "Adrar", "M", score(14.0), "Admis Sn"))
            .collect();
        let top = top_n(records.iter(), TOP_N);
        let ids: Vec<&str> = top.iter().map(|c| c.num_bac.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("c{i}")).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn summary_output_is_deterministic() {
        let records = vec![
            candidate("1", "Trarza", "SN", score(12.0), "Admis Sn"),
            candidate("2", "Adrar", "M", score(9.0), "Ajourné Sn"),
            candidate("3", "Brakna", "LO", score(14.0), "Admis Sn"),
        ];
        let first = serde_json::to_string_pretty(&compute_summary(&records)).unwrap();
        let second = serde_json::to_string_pretty(&compute_summary(&records)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn histogram_bands_cover_zero_to_twenty() {
        let histogram = Histogram::from_values([0.0, 1.99, 2.0, 10.5, 19.9, 20.0, 21.0]);
        assert_eq!(histogram.bands.len(), 10);
        assert_eq!(histogram.bands[0].count, 2);
        assert_eq!(histogram.bands[1].count, 1);
        assert_eq!(histogram.bands[5].count, 1);
        assert_eq!(histogram.bands[9].count, 2);
        assert_eq!(histogram.bands[9].label(), "18-20");
        assert_eq!(histogram.total(), 6);
    }

    #[test]
    fn histogram_rebuilds_from_summary() {
        let records = vec![
            candidate("1", "Trarza", "SN", score(12.0), "Admis Sn"),
            candidate("2", "Adrar", "M", score(13.5), "Admis Sn"),
        ];
        let histogram = Histogram::from_summary(&compute_summary(&records));
        assert_eq!(histogram.bands[6].count, 2);
        assert_eq!(histogram.total(), 2);
    }
}
