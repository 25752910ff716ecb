use std::fmt::Write;

use crate::loader::WilayaNames;
use crate::models::{CandidateRecord, Lang, StatisticsSummary};
use crate::normalize;
use crate::stats::Histogram;

struct Labels {
    name: &'static str,
    candidate_number: &'static str,
    exam_center: &'static str,
    average: &'static str,
    mention: &'static str,
    series: &'static str,
    wilaya: &'static str,
    birth_date: &'static str,
    school: &'static str,
    decision: &'static str,
}

fn labels(lang: Lang) -> Labels {
    match lang {
        Lang::Fr => Labels {
            name: "Nom et Prénom",
            candidate_number: "Numéro de Candidat",
            exam_center: "Centre d'Examen",
            average: "Moyenne",
            mention: "Mention",
            series: "Série",
            wilaya: "Wilaya",
            birth_date: "Date de Naissance",
            school: "Établissement",
            decision: "Décision",
        },
        Lang::Ar => Labels {
            name: "الاسم واللقب",
            candidate_number: "رقم المرشح",
            exam_center: "مركز الامتحان",
            average: "المعدل",
            mention: "الميزة",
            series: "الشعبة",
            wilaya: "الولاية",
            birth_date: "تاريخ الميلاد",
            school: "المؤسسة",
            decision: "القرار",
        },
    }
}

fn format_average(average: Option<f64>) -> String {
    average.map_or_else(|| "-".to_string(), |value| format!("{value:.2}"))
}

/// One candidate's result in the selected language.
pub fn render_card(record: &CandidateRecord, lang: Lang) -> String {
    let labels = labels(lang);
    let mut output = String::new();

    let _ = writeln!(output, "{}", record.decision.headline(lang));
    let _ = writeln!(output);
    let _ = writeln!(output, "{}: {}", labels.name, record.full_name.get(lang));
    let _ = writeln!(output, "{}: {}", labels.candidate_number, record.registration_id);
    let _ = writeln!(output, "{}: {}", labels.exam_center, record.exam_center.get(lang));
    let _ = writeln!(output, "{}: {}", labels.average, format_average(record.average));
    if let Some(mention) = record.mention() {
        let _ = writeln!(output, "{}: {}", labels.mention, mention);
    }
    let _ = writeln!(output, "{}: {}", labels.series, record.series.code);
    let _ = writeln!(output, "{}: {}", labels.wilaya, record.wilaya.get(lang));
    let _ = writeln!(
        output,
        "{}: {}",
        labels.birth_date,
        normalize::format_display_date(&record.birth_date)
    );
    let _ = writeln!(output, "{}: {}", labels.school, record.school.get(lang));
    let _ = writeln!(output, "{}: {}", labels.decision, record.decision.label());

    output
}

/// Disambiguation list when several candidates match.
pub fn render_matches(records: &[&CandidateRecord], lang: Lang) -> String {
    let mut output = String::new();

    let _ = match lang {
        Lang::Fr => writeln!(output, "{} résultats trouvés:", records.len()),
        Lang::Ar => writeln!(output, "تم العثور على {} نتيجة:", records.len()),
    };
    for record in records {
        let _ = writeln!(
            output,
            "- {} {} ({}, {}) {}",
            record.registration_id,
            record.full_name.get(lang),
            record.wilaya.get(lang),
            record.series.code,
            format_average(record.average)
        );
    }

    output
}

/// Markdown rendering of the statistics artifact.
pub fn build_stats_report(summary: &StatisticsSummary, names: &WilayaNames, lang: Lang) -> String {
    let mut output = String::new();
    let global = &summary.global;

    let _ = writeln!(output, "# Statistiques du Baccalauréat");
    let _ = writeln!(output);
    let _ = writeln!(output, "- Candidats: {}", global.total);
    let _ = writeln!(output, "- Admis: {}", global.admis);
    let _ = writeln!(output, "- Ajournés: {}", global.ajournes);
    let _ = writeln!(output, "- Sessionnaires: {}", global.sessionnaires);
    let _ = writeln!(output, "- Taux de réussite: {:.2}%", global.taux_reussite);
    let _ = writeln!(
        output,
        "- Moyenne générale: {}",
        format_average(summary.moyennes.generale)
    );
    let _ = writeln!(
        output,
        "- Moyenne des admis: {}",
        format_average(summary.moyennes.admis)
    );
    let _ = writeln!(
        output,
        "- Écart-type: {}",
        format_average(summary.moyennes.ecart_type)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Par série");
    if summary.par_serie.is_empty() {
        let _ = writeln!(output, "Aucune donnée.");
    } else {
        let _ = writeln!(output, "| Série | Total | Admis | Taux |");
        let _ = writeln!(output, "|---|---|---|---|");
        for (code, serie) in &summary.par_serie {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.2}% |",
                code, serie.total, serie.admis, serie.taux
            );
        }
    }

    let mut wilayas: Vec<_> = summary.par_wilaya.iter().collect();
    wilayas.sort_by(|a, b| b.1.taux.total_cmp(&a.1.taux));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Meilleures wilayas");
    if wilayas.is_empty() {
        let _ = writeln!(output, "Aucune donnée.");
    } else {
        for (name, wilaya) in wilayas.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:.2}% ({} / {}), moyenne {}",
                names.display(name, lang),
                wilaya.taux,
                wilaya.admis,
                wilaya.total,
                format_average(wilaya.moyenne)
            );
        }
    }

    let histogram = Histogram::from_summary(summary);
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Distribution des moyennes ({} notes)",
        histogram.total()
    );
    for band in &histogram.bands {
        let _ = writeln!(output, "- {}: {}", band.label(), band.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top 10");
    if summary.top10.is_empty() {
        let _ = writeln!(output, "Aucun candidat classé.");
    } else {
        for (rank, candidate) in summary.top10.iter().enumerate() {
            let name = match lang {
                Lang::Fr => &candidate.nom_fr,
                Lang::Ar => &candidate.nom_ar,
            };
            let _ = writeln!(
                output,
                "{}. {} ({}, {}) {}",
                rank + 1,
                name,
                candidate.num_bac,
                candidate.serie,
                format_average(normalize::parse_average(&candidate.moy_bac))
            );
        }
    }

    output
}
