//! Text reports and the import pipeline tail for the CLI.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use jobtrack_core::{EmailRecord, EmailRepository, NewEmail};
use jobtrack_fetch::{DateRange, SyncCounts, summary_line};

/// Rows shown at each end of a long listing.
const LISTING_EDGE: usize = 10;

fn write_row(out: &mut impl Write, email: &EmailRecord) -> Result<()> {
    writeln!(
        out,
        "  [{}] {} | {} | {}",
        email.id, email.send_date, email.subject, email.sender
    )?;
    Ok(())
}

/// Checks a `YYYY-MM` month.
pub fn parse_month(month: &str) -> Result<String> {
    let month = month.trim();
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .with_context(|| format!("invalid month '{month}', expected YYYY-MM"))?;
    Ok(month.to_string())
}

/// Totals, send-date bounds and the emails of `month`.
pub async fn stats(repo: &EmailRepository, month: &str, out: &mut impl Write) -> Result<()> {
    let stats = repo.stats().await?;
    writeln!(out, "Total emails: {}", stats.total)?;
    writeln!(out, "Earliest: {}", stats.earliest.as_deref().unwrap_or("-"))?;
    writeln!(out, "Latest:   {}", stats.latest.as_deref().unwrap_or("-"))?;

    let in_month = repo.with_send_date_prefix(&format!("{month}-")).await?;
    writeln!(out, "Emails in {month}: {}", in_month.len())?;
    for email in &in_month {
        write_row(out, email)?;
    }
    Ok(())
}

/// Emails sent within `range`, oldest first.
pub async fn range(repo: &EmailRepository, range: &DateRange, out: &mut impl Write) -> Result<()> {
    let emails = repo.between(range.start(), range.end()).await?;
    let [start, end] = range.to_args();
    writeln!(out, "Emails from {start} to {end}: {}", emails.len())?;
    for email in &emails {
        write_row(out, email)?;
    }
    Ok(())
}

/// Head and tail of `items`, with the number of elided rows between them.
fn excerpt<T>(items: &[T]) -> (&[T], &[T], usize) {
    if items.len() <= LISTING_EDGE {
        return (items, &[], 0);
    }
    let (head, rest) = items.split_at(LISTING_EDGE);
    if rest.len() <= LISTING_EDGE {
        return (head, rest, 0);
    }
    let elided = rest.len() - LISTING_EDGE;
    (head, &rest[elided..], elided)
}

/// All emails oldest first, eliding the middle of long listings.
pub async fn list(repo: &EmailRepository, out: &mut impl Write) -> Result<()> {
    let emails = repo.list_chronological().await?;
    writeln!(out, "Total emails: {}", emails.len())?;

    let (head, tail, elided) = excerpt(&emails);
    for email in head {
        write_row(out, email)?;
    }
    if elided > 0 {
        writeln!(out, "  ... {elided} more ...")?;
    }
    for email in tail {
        write_row(out, email)?;
    }
    Ok(())
}

/// Merges a JSON array of candidates and prints the summary line.
pub async fn import(repo: &EmailRepository, input: impl Read, out: &mut impl Write) -> Result<()> {
    let candidates: Vec<NewEmail> =
        serde_json::from_reader(input).context("input must be a JSON array of emails")?;
    if candidates.is_empty() {
        writeln!(out, "没有获取到任何邮件")?;
        return Ok(());
    }
    let report = repo.merge(&candidates).await?;
    writeln!(
        out,
        "{}",
        summary_line(SyncCounts::new(report.processed, report.inserted))
    )?;
    Ok(())
}

/// Validates the two CLI dates.
pub fn parse_range(start: &str, end: &str) -> Result<DateRange> {
    Ok(DateRange::parse(start, end)?)
}
