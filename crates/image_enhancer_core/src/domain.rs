//! crates/image_enhancer_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Accounts and usage records carry no storage format; the selector enums
//! derive serde so their ids double as wire names.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

//=========================================================================================
// Catalog Selectors
//=========================================================================================

/// One entry of the fixed enhancement catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    HistogramEqualization,
    GaussianBlur,
    Sharpening,
    EdgeDetection,
    Complement,
    SaltAndPepper,
    Denoise,
}

impl Technique {
    pub const ALL: [Technique; 7] = [
        Technique::HistogramEqualization,
        Technique::GaussianBlur,
        Technique::Sharpening,
        Technique::EdgeDetection,
        Technique::Complement,
        Technique::SaltAndPepper,
        Technique::Denoise,
    ];

    /// The stable identifier, identical to the serde representation.
    pub fn id(&self) -> &'static str {
        match self {
            Technique::HistogramEqualization => "histogram_equalization",
            Technique::GaussianBlur => "gaussian_blur",
            Technique::Sharpening => "sharpening",
            Technique::EdgeDetection => "edge_detection",
            Technique::Complement => "complement",
            Technique::SaltAndPepper => "salt_and_pepper",
            Technique::Denoise => "denoise",
        }
    }

    /// Human readable label shown in the enhancement selector.
    pub fn label(&self) -> &'static str {
        match self {
            Technique::HistogramEqualization => "Histogram Equalization (Contrast)",
            Technique::GaussianBlur => "Gaussian Blur (Smoothing)",
            Technique::Sharpening => "Sharpening (Detail Enhancement)",
            Technique::EdgeDetection => "Edge Detection (Feature Extraction)",
            Technique::Complement => "Complement (Invert Colors)",
            Technique::SaltAndPepper => "Salt & Pepper Noise (Film Grain)",
            Technique::Denoise => "Denoise (Noise Reduction)",
        }
    }

    /// Salt & pepper is the only transform whose output depends on a random source.
    pub fn is_stochastic(&self) -> bool {
        matches!(self, Technique::SaltAndPepper)
    }
}

/// Download encodings offered for the enhanced image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpeg,
    #[serde(rename = "webp")]
    WebP,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::WebP];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::WebP => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::WebP => "image/webp",
        }
    }

    /// The suggested file name for a client-side save, e.g. `enhanced.png`.
    pub fn file_name(&self) -> String {
        format!("enhanced.{}", self.extension())
    }
}

/// The views available to an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Enhancement,
    Profile,
    Analytics,
}

//=========================================================================================
// Accounts
//=========================================================================================

/// A validated registration, ready to be inserted into the account store.
/// The password is already hashed; raw passwords never reach the store.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub password_hash: String,
}

/// Immutable log entry of one applied transform.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub technique: Technique,
    pub timestamp: DateTime<Utc>,
    pub source_filename: String,
}

/// A registered user together with their usage summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub password_hash: String,
    pub join_date: NaiveDate,
    pub enhancement_count: u64,
    pub enhancement_types: BTreeSet<Technique>,
    pub enhancement_history: Vec<UsageRecord>,
}

/// Usage count for one technique, as shown on the analytics view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechniqueCount {
    pub technique: Technique,
    pub count: u64,
}

/// One step of the cumulative activity timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelinePoint {
    pub timestamp: DateTime<Utc>,
    pub total: u64,
}

impl Account {
    /// Creates a fresh account with an empty usage summary.
    pub fn new(new_account: NewAccount, join_date: NaiveDate) -> Self {
        Self {
            email: new_account.email,
            first_name: new_account.first_name,
            last_name: new_account.last_name,
            date_of_birth: new_account.date_of_birth,
            password_hash: new_account.password_hash,
            join_date,
            enhancement_count: 0,
            enhancement_types: BTreeSet::new(),
            enhancement_history: Vec::new(),
        }
    }

    /// Appends a usage record and keeps the count and type set in step with it.
    pub fn record_usage(&mut self, technique: Technique, source_filename: &str, at: DateTime<Utc>) {
        self.enhancement_history.push(UsageRecord {
            technique,
            timestamp: at,
            source_filename: source_filename.to_string(),
        });
        self.enhancement_types.insert(technique);
        self.enhancement_count = self.enhancement_history.len() as u64;
    }

    /// Age in whole years as of `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let dob = self.date_of_birth;
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    /// The most recent `limit` usage records, newest first.
    pub fn recent_activity(&self, limit: usize) -> Vec<&UsageRecord> {
        self.enhancement_history.iter().rev().take(limit).collect()
    }

    /// Per-technique usage, most used first; ties are broken by catalog order.
    pub fn technique_counts(&self) -> Vec<TechniqueCount> {
        let mut counts: BTreeMap<Technique, u64> = BTreeMap::new();
        for record in &self.enhancement_history {
            *counts.entry(record.technique).or_default() += 1;
        }
        let mut counts: Vec<TechniqueCount> = counts
            .into_iter()
            .map(|(technique, count)| TechniqueCount { technique, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then(a.technique.cmp(&b.technique)));
        counts
    }

    /// Running total of enhancements, ordered by time.
    pub fn timeline(&self) -> Vec<TimelinePoint> {
        let mut stamps: Vec<DateTime<Utc>> =
            self.enhancement_history.iter().map(|r| r.timestamp).collect();
        stamps.sort();
        stamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| TimelinePoint {
                timestamp,
                total: i as u64 + 1,
            })
            .collect()
    }
}
