pub mod export;

use std::fmt::Write;

use chrono::NaiveDateTime;
use colored::{ColoredString, Colorize};
use serde::Serialize;

use crate::model::{AnalysisResult, BondQuality, DepthUnit};

pub const REPORT_TITLE: &str = "CementLog AI - Technical Analysis Report";

/// Display language of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "ar" | "arabic" => Some(Self::Ar),
            _ => None,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::En => Direction::Ltr,
            Self::Ar => Direction::Rtl,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::En => Self::Ar,
            Self::Ar => Self::En,
        }
    }

    fn pick<'a>(self, en: &'a str, ar: &'a str) -> &'a str {
        match self {
            Self::En => en,
            Self::Ar => ar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

/// Visual severity tier of a quality badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    /// Green.
    Excellent,
    /// Emerald.
    Good,
    /// Amber.
    Moderate,
    /// Red. Poor, free pipe and anything unrecognised.
    Critical,
}

impl BadgeTier {
    pub fn for_quality(quality: &BondQuality) -> Self {
        match quality {
            BondQuality::Excellent => Self::Excellent,
            BondQuality::Good => Self::Good,
            BondQuality::Moderate => Self::Moderate,
            BondQuality::Poor | BondQuality::FreePipe | BondQuality::Other(_) => Self::Critical,
        }
    }

    /// RGB used for the badge in both terminal and document output.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Excellent => (74, 222, 128),
            Self::Good => (52, 211, 153),
            Self::Moderate => (250, 204, 21),
            Self::Critical => (248, 113, 113),
        }
    }

    fn paint(self, text: &str) -> ColoredString {
        let (r, g, b) = self.rgb();
        text.truecolor(r, g, b).bold()
    }
}

/// One table row of the rendered report.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneRow<'a> {
    pub depth: String,
    pub quality: &'a str,
    pub tier: BadgeTier,
    pub technical_description: &'a str,
    pub diagnosis: &'a str,
    /// Alternating background, set on every second row.
    pub shaded: bool,
}

/// Localized projection of a stored result; building it never touches the network.
#[derive(Debug, Clone, Serialize)]
pub struct ReportView<'a> {
    pub language: Language,
    pub direction: Direction,
    pub title: &'static str,
    pub log_type: &'a str,
    pub generated_at: String,
    pub depth_unit: DepthUnit,
    pub summary_title: &'static str,
    pub summary: &'a str,
    pub columns: [&'static str; 4],
    pub rows: Vec<ZoneRow<'a>>,
    pub recommendations_title: &'static str,
    pub recommendations: &'a [String],
}

impl<'a> ReportView<'a> {
    /// `generated_at` is the render time, not the analysis time.
    pub fn build(result: &'a AnalysisResult, language: Language, generated_at: NaiveDateTime) -> Self {
        let rows = result
            .zones
            .iter()
            .enumerate()
            .map(|(idx, zone)| ZoneRow {
                depth: zone.depth_range(),
                quality: zone.quality.label(),
                tier: BadgeTier::for_quality(&zone.quality),
                technical_description: language
                    .pick(&zone.technical_description_en, &zone.technical_description_ar),
                diagnosis: language.pick(&zone.diagnosis_en, &zone.diagnosis_ar),
                shaded: idx % 2 == 1,
            })
            .collect();
        let (summary_title, columns, recommendations_title) = match language {
            Language::En => (
                "Executive Summary",
                ["Depth", "Quality", "Technical Description", "Diagnosis"],
                "Recommendations",
            ),
            Language::Ar => (
                "الخلاصة التنفيذية",
                ["العمق", "الجودة", "الوصف الفني", "التشخيص"],
                "التوصيات",
            ),
        };
        Self {
            language,
            direction: language.direction(),
            title: REPORT_TITLE,
            log_type: &result.log_type_detected,
            generated_at: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            depth_unit: result.depth_unit,
            summary_title,
            summary: language.pick(&result.summary_en, &result.summary_ar),
            columns,
            rows,
            recommendations_title,
            recommendations: match language {
                Language::En => &result.recommendations_en,
                Language::Ar => &result.recommendations_ar,
            },
        }
    }
}

/// Format styles supported by [`render_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Produce a report string from a stored result in the requested language and format.
pub fn render_report(
    result: &AnalysisResult,
    language: Language,
    generated_at: NaiveDateTime,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let view = ReportView::build(result, language, generated_at);
    match format {
        OutputFormat::Human => render_human(&view),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&view)?),
    }
}

// Right-to-left mark so bidi-aware terminals anchor Arabic lines on the right.
const RLM: &str = "\u{200f}";

fn render_human(view: &ReportView<'_>) -> anyhow::Result<String> {
    let mark = match view.direction {
        Direction::Ltr => "",
        Direction::Rtl => RLM,
    };
    let mut out = String::new();
    writeln!(out, "{}", view.title.bold())?;
    writeln!(
        out,
        "Log Type: {} | Generated: {} | Units: {}",
        view.log_type, view.generated_at, view.depth_unit
    )?;
    writeln!(out)?;

    writeln!(out, "{mark}{}", view.summary_title.bold())?;
    writeln!(out, "{mark}{}", view.summary)?;
    writeln!(out)?;

    writeln!(out, "{mark}{}", view.columns.join(" | ").bold())?;
    if view.rows.is_empty() {
        writeln!(out, "{mark}  -")?;
    }
    for (idx, row) in view.rows.iter().enumerate() {
        let badge = row.tier.paint(&format!("[{}]", row.quality));
        let head = format!("{:>3}. {}", idx + 1, row.depth);
        let head = if row.shaded {
            head.on_truecolor(55, 65, 81).to_string()
        } else {
            head.on_truecolor(31, 41, 55).to_string()
        };
        writeln!(out, "{mark}{head}  {badge}  {}", row.diagnosis)?;
        writeln!(out, "{mark}     {}", row.technical_description)?;
    }
    writeln!(out)?;

    writeln!(out, "{mark}{}", view.recommendations_title.bold())?;
    for rec in view.recommendations {
        writeln!(out, "{mark}  • {rec}")?;
    }
    Ok(out)
}
