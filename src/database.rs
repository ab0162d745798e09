use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{DrawRecord, Prize};
use crate::utils;

/// Outcome of appending a batch of draws to the archive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppendSummary {
    pub appended: usize,
    pub filled: usize,
    pub unchanged: usize,
}

impl AppendSummary {
    pub fn changed(&self) -> bool {
        self.appended > 0 || self.filled > 0
    }
}

pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    create_database_with_connection(&conn)?;
    tracing::debug!(path = %path.display(), "archive opened");
    Ok(conn)
}

pub fn create_database_with_connection(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS draws (
            draw_no INTEGER PRIMARY KEY,
            draw_date TEXT NOT NULL,
            winning_number TEXT NOT NULL,
            straight INTEGER,
            box INTEGER,
            set_straight INTEGER,
            set_box INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

fn row_to_draw(row: &Row<'_>) -> rusqlite::Result<DrawRecord> {
    let winning_number: String = row.get(2)?;
    let digits = utils::digits_from_winning_number(&winning_number).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("stored winning number {winning_number:?} is not four digits").into(),
        )
    })?;
    Ok(DrawRecord {
        draw_no: row.get(0)?,
        date: row.get(1)?,
        digits,
        winning_number,
        prize: Prize {
            straight: row.get(3)?,
            box_prize: row.get(4)?,
            set_straight: row.get(5)?,
            set_box: row.get(6)?,
        },
    })
}

const SELECT_DRAW: &str = "SELECT draw_no, draw_date, winning_number, straight, box, set_straight, set_box
     FROM draws";

pub fn get_draw(conn: &Connection, draw_no: u32) -> Result<Option<DrawRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_DRAW} WHERE draw_no = ?1"))?;
    let draw = stmt.query_row([draw_no], row_to_draw).optional()?;
    Ok(draw)
}

pub fn get_all_draws(conn: &Connection) -> Result<Vec<DrawRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_DRAW} ORDER BY draw_no ASC"))?;
    let draw_iter = stmt.query_map([], row_to_draw)?;

    let mut draws = Vec::new();
    for draw in draw_iter {
        draws.push(draw?);
    }
    Ok(draws)
}

pub fn get_latest_draw(conn: &Connection) -> Result<Option<DrawRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_DRAW} ORDER BY draw_no DESC LIMIT 1"))?;
    let draw = stmt.query_row([], row_to_draw).optional()?;
    Ok(draw)
}

pub fn max_draw_no(conn: &Connection) -> Result<Option<u32>> {
    let max = conn.query_row("SELECT MAX(draw_no) FROM draws", [], |row| {
        row.get::<_, Option<u32>>(0)
    })?;
    Ok(max)
}

pub fn count_draws(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM draws", [], |row| row.get(0))?;
    Ok(count as usize)
}

fn check_record(record: &DrawRecord) -> Result<()> {
    let context = format!("draw {}", record.draw_no);
    if record.draw_no == 0 {
        return Err(Error::invalid_draw(context, "draw numbers start at 1"));
    }
    if !utils::is_iso_date(&record.date) {
        return Err(Error::invalid_draw(
            context,
            format!("date {:?} is not YYYY-MM-DD", record.date),
        ));
    }
    if record.digits.iter().any(|d| *d > 9) {
        return Err(Error::invalid_draw(context, "digit out of range"));
    }
    if utils::winning_number_from_digits(&record.digits) != record.winning_number {
        return Err(Error::invalid_draw(
            context,
            format!(
                "digits {:?} disagree with winning number {}",
                record.digits, record.winning_number
            ),
        ));
    }
    let prize = &record.prize;
    if [prize.straight, prize.box_prize, prize.set_straight, prize.set_box]
        .iter()
        .flatten()
        .any(|amount| *amount < 0)
    {
        return Err(Error::invalid_draw(context, "negative payout"));
    }
    Ok(())
}

fn merge_amount(existing: Option<i64>, incoming: Option<i64>) -> Option<Option<i64>> {
    match (existing, incoming) {
        (Some(a), Some(b)) if a != b => None,
        (Some(a), _) => Some(Some(a)),
        (None, b) => Some(b),
    }
}

/// Fills payouts that were unknown when the draw was first archived.
/// Returns `None` when `incoming` contradicts an already archived value.
fn merge_draw(existing: &DrawRecord, incoming: &DrawRecord) -> Option<DrawRecord> {
    if existing.date != incoming.date || existing.winning_number != incoming.winning_number {
        return None;
    }
    let (a, b) = (&existing.prize, &incoming.prize);
    Some(DrawRecord {
        prize: Prize {
            straight: merge_amount(a.straight, b.straight)?,
            box_prize: merge_amount(a.box_prize, b.box_prize)?,
            set_straight: merge_amount(a.set_straight, b.set_straight)?,
            set_box: merge_amount(a.set_box, b.set_box)?,
        },
        ..existing.clone()
    })
}

fn insert_draw(conn: &Connection, record: &DrawRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO draws (draw_no, draw_date, winning_number, straight, box, set_straight, set_box)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.draw_no,
            record.date,
            record.winning_number,
            record.prize.straight,
            record.prize.box_prize,
            record.prize.set_straight,
            record.prize.set_box,
        ],
    )?;
    Ok(())
}

fn update_prize(conn: &Connection, draw_no: u32, prize: &Prize) -> Result<()> {
    conn.execute(
        "UPDATE draws SET straight = ?2, box = ?3, set_straight = ?4, set_box = ?5
         WHERE draw_no = ?1",
        params![
            draw_no,
            prize.straight,
            prize.box_prize,
            prize.set_straight,
            prize.set_box,
        ],
    )?;
    Ok(())
}

/// Appends draws in a single transaction.
///
/// New draws must continue the sequence without gaps and may not be dated
/// before the draw they follow. Re-sending an archived
/// draw is a no-op unless it supplies payouts that were previously unknown;
/// any other difference is rejected and nothing from the batch is kept.
pub fn append_draws(conn: &mut Connection, records: &[DrawRecord]) -> Result<AppendSummary> {
    let mut sorted = records.to_vec();
    sorted.sort_by_key(|record| record.draw_no);

    let tx = conn.transaction()?;
    let mut next = max_draw_no(&tx)?.map_or(1, |max| max + 1);
    let mut summary = AppendSummary::default();

    for record in &sorted {
        check_record(record)?;

        match get_draw(&tx, record.draw_no)? {
            Some(existing) if existing == *record => summary.unchanged += 1,
            Some(existing) => {
                let merged = merge_draw(&existing, record).ok_or(Error::ImmutableDraw {
                    draw_no: record.draw_no,
                })?;
                if merged == existing {
                    summary.unchanged += 1;
                } else {
                    update_prize(&tx, merged.draw_no, &merged.prize)?;
                    tracing::info!(draw_no = merged.draw_no, "filled missing payouts");
                    summary.filled += 1;
                }
            }
            None => {
                if record.draw_no != next {
                    return Err(Error::DrawGap {
                        expected: next,
                        found: record.draw_no,
                    });
                }
                if let Some(previous) = get_draw(&tx, record.draw_no - 1)? {
                    if record.date < previous.date {
                        return Err(Error::DateRegression {
                            draw_no: record.draw_no,
                            date: record.date.clone(),
                            previous_no: previous.draw_no,
                            previous_date: previous.date,
                        });
                    }
                }
                insert_draw(&tx, record)?;
                next += 1;
                summary.appended += 1;
            }
        }
    }

    tx.commit()?;
    Ok(summary)
}

/// Seeds an empty archive from a previously published full history.
pub fn import_published(conn: &mut Connection, records: &[DrawRecord]) -> Result<usize> {
    if count_draws(conn)? > 0 {
        return Err(Error::Config(
            "import requires an empty archive; use ingest to add draws".to_string(),
        ));
    }
    let summary = append_draws(conn, records)?;
    Ok(summary.appended)
}
