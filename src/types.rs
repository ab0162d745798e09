use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils;

/// Payout per winning category, in yen. `None` when no ticket won the category.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prize {
    pub straight: Option<i64>,
    #[serde(rename = "box")]
    pub box_prize: Option<i64>,
    pub set_straight: Option<i64>,
    pub set_box: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub draw_no: u32,
    pub date: String,
    pub digits: [u8; 4],
    pub winning_number: String,
    pub prize: Prize,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MinRecord {
    pub draw_no: u32,
    pub date: String,
    pub digits: [u8; 4],
}

impl From<&DrawRecord> for MinRecord {
    fn from(record: &DrawRecord) -> Self {
        MinRecord {
            draw_no: record.draw_no,
            date: record.date.clone(),
            digits: record.digits,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: String,
    pub schema: String,
    pub last_update: String,
    pub latest_draw_no: u32,
    pub latest_date: String,
    pub total_records: usize,
}

/// The four files published under `/api/v1/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Latest,
    AllMin,
    AllFull,
    Version,
}

impl Resource {
    /// Publish order: histories first, head pointers last.
    pub const ALL: [Resource; 4] = [
        Resource::AllFull,
        Resource::AllMin,
        Resource::Latest,
        Resource::Version,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Resource::Latest => "latest.json",
            Resource::AllMin => "numbers4_all_min.json",
            Resource::AllFull => "numbers4_all_full.json",
            Resource::Version => "version.json",
        }
    }

    /// Histories honour the compact flag; head files are always indented.
    pub fn is_history(self) -> bool {
        matches!(self, Resource::AllMin | Resource::AllFull)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(i64),
    Text(String),
}

/// A draw as the external generator emits it, before normalization.
///
/// Field aliases accept both the English keys and the column names of the
/// generator's CSV export (`回号`, `抽せん日`, `当せん番号`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RawDraw {
    #[serde(alias = "回号", alias = "round", alias = "draw_no")]
    pub draw: NumberOrText,
    #[serde(alias = "抽せん日")]
    pub date: String,
    #[serde(alias = "当せん番号")]
    pub winning_number: NumberOrText,
    #[serde(default)]
    pub straight_payout: Option<NumberOrText>,
    #[serde(default)]
    pub box_payout: Option<NumberOrText>,
    #[serde(default)]
    pub set_straight_payout: Option<NumberOrText>,
    #[serde(default)]
    pub set_box_payout: Option<NumberOrText>,
}

impl RawDraw {
    pub fn normalize(&self) -> Result<DrawRecord> {
        let draw_no = match &self.draw {
            NumberOrText::Number(n) => u32::try_from(*n).ok().filter(|n| *n > 0),
            NumberOrText::Text(label) => utils::parse_draw_label(label),
        }
        .ok_or_else(|| Error::invalid_draw(format!("{:?}", self.draw), "no draw number"))?;

        let context = format!("draw {draw_no}");

        let date = utils::normalize_draw_date(&self.date).ok_or_else(|| {
            Error::invalid_draw(&context, format!("unparsable date {:?}", self.date))
        })?;

        let winning_number = match &self.winning_number {
            NumberOrText::Number(n) => utils::winning_number_from_text(&n.to_string()),
            NumberOrText::Text(text) => utils::winning_number_from_text(text),
        }
        .ok_or_else(|| {
            Error::invalid_draw(
                &context,
                format!("winning number {:?} is not four digits", self.winning_number),
            )
        })?;

        let digits = utils::digits_from_winning_number(&winning_number).ok_or_else(|| {
            Error::invalid_draw(&context, format!("bad winning number {winning_number}"))
        })?;

        Ok(DrawRecord {
            draw_no,
            date,
            digits,
            winning_number,
            prize: Prize {
                straight: payout(&self.straight_payout),
                box_prize: payout(&self.box_payout),
                set_straight: payout(&self.set_straight_payout),
                set_box: payout(&self.set_box_payout),
            },
        })
    }
}

fn payout(value: &Option<NumberOrText>) -> Option<i64> {
    match value.as_ref()? {
        NumberOrText::Number(n) if *n >= 0 => Some(*n),
        NumberOrText::Number(_) => None,
        NumberOrText::Text(text) => utils::parse_payout_amount(text),
    }
}
