//! Plain-text rendering for the read-only dashboard commands and the trainer.

use std::fmt::Write;

use autoimport_client::HealthReport;
use autoimport_core::{Evaluation, LeadRecord, LeadStats, Preset, Qualification, TranscriptEntry};
use chrono::NaiveDateTime;

/// `2026-03-01T10:00:00[.ffffff]` as `01.03.2026 10:00`; anything else verbatim.
pub fn format_timestamp(raw: &str) -> String {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// `2000000` as `2 000 000`.
fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

fn budget(lead: &LeadRecord) -> Option<String> {
    match (lead.budget_min, lead.budget_max) {
        (Some(min), Some(max)) if min == max => Some(format!("{} ₽", group_thousands(min))),
        (Some(min), Some(max)) => Some(format!(
            "{} – {} ₽",
            group_thousands(min),
            group_thousands(max)
        )),
        (Some(min), None) => Some(format!("от {} ₽", group_thousands(min))),
        (None, Some(max)) => Some(format!("до {} ₽", group_thousands(max))),
        (None, None) => None,
    }
}

fn qualification_badge(qualification: Option<Qualification>) -> &'static str {
    match qualification {
        Some(Qualification::Hot) => "🔥 hot",
        Some(Qualification::Warm) => "🌤 warm",
        Some(Qualification::Cold) => "❄ cold",
        Some(Qualification::Unknown) | None => "–",
    }
}

pub fn format_stats(stats: &LeadStats) -> String {
    format!(
        "Всего лидов: {}\n🔥 Горячие: {}\n🌤 Тёплые: {}\n❄ Холодные: {}\n",
        stats.total_leads, stats.hot_leads, stats.warm_leads, stats.cold_leads
    )
}

pub fn format_leads(leads: &[LeadRecord]) -> String {
    if leads.is_empty() {
        return "Лидов пока нет.\n".to_string();
    }
    let mut out = String::new();
    for lead in leads {
        let _ = writeln!(
            out,
            "#{:<4} {:<16} {:<10} {:<20} {:<18} {}",
            lead.id,
            format_timestamp(&lead.created_at),
            qualification_badge(lead.qualification),
            lead.name.as_deref().unwrap_or("–"),
            lead.phone.as_deref().unwrap_or("–"),
            lead.vehicle().unwrap_or_else(|| "–".to_string()),
        );
    }
    out
}

pub fn format_lead(lead: &LeadRecord) -> String {
    let mut out = String::new();
    let field = |value: Option<String>| value.unwrap_or_else(|| "–".to_string());
    let _ = writeln!(out, "Лид #{} (сессия {})", lead.id, lead.session_id);
    let _ = writeln!(out, "  Создан:        {}", format_timestamp(&lead.created_at));
    let _ = writeln!(out, "  Статус:        {}", lead.status);
    let _ = writeln!(out, "  Квалификация:  {}", qualification_badge(lead.qualification));
    let _ = writeln!(out, "  Имя:           {}", field(lead.name.clone()));
    let _ = writeln!(out, "  Телефон:       {}", field(lead.phone.clone()));
    let _ = writeln!(out, "  Автомобиль:    {}", field(lead.vehicle()));
    let _ = writeln!(out, "  Бюджет:        {}", field(budget(lead)));
    let _ = writeln!(out, "  Страна:        {}", field(lead.country.clone()));
    let _ = writeln!(out, "  Сроки:         {}", field(lead.timeline.clone()));
    out
}

pub fn format_transcript(entries: &[TranscriptEntry]) -> String {
    if entries.is_empty() {
        return "Диалог пуст.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let speaker = match entry.role.as_str() {
            "user" => "Клиент",
            "assistant" => "Ассистент",
            other => other,
        };
        let _ = writeln!(
            out,
            "[{}] {}: {}",
            format_timestamp(&entry.created_at),
            speaker,
            entry.content
        );
    }
    out
}

pub fn format_presets(presets: &[Preset]) -> String {
    let mut out = String::new();
    for preset in presets {
        let _ = writeln!(
            out,
            "{:<10} {} {} ({})",
            preset.id,
            "★".repeat(preset.difficulty as usize),
            preset.name,
            preset.description
        );
    }
    out
}

pub fn format_health(report: &HealthReport) -> String {
    let mut out = format!("Backend: {}", report.status);
    if let Some(database) = &report.database {
        let _ = write!(out, ", database: {}", database);
    }
    if let Some(openai) = report.openai_configured {
        let _ = write!(
            out,
            ", OpenAI: {}",
            if openai { "configured" } else { "not configured" }
        );
    }
    out.push('\n');
    out
}

pub fn format_evaluation(evaluation: &Evaluation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Итоговая оценка: {}/100", evaluation.overall_score);
    for (name, score) in evaluation.scores.entries() {
        let label = match name {
            "contact" => "Установление контакта",
            "needs_discovery" => "Выявление потребностей",
            "objection_handling" => "Работа с возражениями",
            "presentation" => "Презентация",
            "closing" => "Закрытие сделки",
            other => other,
        };
        let _ = writeln!(out, "  {:<24} {:>3}", label, score);
    }
    if !evaluation.strengths.is_empty() {
        let _ = writeln!(out, "Сильные стороны:");
        for s in &evaluation.strengths {
            let _ = writeln!(out, "  + {}", s);
        }
    }
    if !evaluation.improvements.is_empty() {
        let _ = writeln!(out, "Зоны роста:");
        for s in &evaluation.improvements {
            let _ = writeln!(out, "  - {}", s);
        }
    }
    if !evaluation.recommendations.trim().is_empty() {
        let _ = writeln!(out, "Рекомендации: {}", evaluation.recommendations);
    }
    out
}
