//! CSV export of normalized transactions.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use finlens_core::Transaction;
use serde::Serialize;

use crate::category_rules::categorize;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    date: String,
    direction: &'static str,
    amount: String,
    counterparty: &'a str,
    mode: &'a str,
    status: &'a str,
    category: &'static str,
    narration: &'a str,
    reference: &'a str,
}

impl<'a> ExportRow<'a> {
    fn new(txn: &'a Transaction, tz: Tz) -> Self {
        Self {
            date: txn
                .timestamp
                .map(|ts| ts.local_date(tz).to_string())
                .unwrap_or_default(),
            direction: txn.direction.as_str(),
            amount: format!("{:.2}", txn.amount),
            counterparty: &txn.counterparty,
            mode: &txn.mode,
            status: &txn.status,
            category: categorize(txn).map(|c| c.label()).unwrap_or(""),
            narration: &txn.narration,
            reference: txn.reference.as_deref().unwrap_or(""),
        }
    }
}

/// Write one row per transaction, with a header, dates in `tz`
pub fn write_csv<W: Write>(out: W, txns: &[Transaction], tz: Tz) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for txn in txns {
        wtr.serialize(ExportRow::new(txn, tz))
            .context("writing transaction row")?;
    }
    wtr.flush().context("flushing csv")?;
    Ok(())
}

pub fn export_csv(path: impl AsRef<Path>, txns: &[Transaction], tz: Tz) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_csv(file, txns, tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use finlens_core::Direction;

    #[test]
    fn test_rows_and_header() {
        let txns = vec![
            Transaction::new(1234.5, Direction::Debit)
                .with_mode("UPI")
                .with_narration("UPI/zomato, order 7")
                .with_date(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()),
            Transaction::new(10.0, Direction::Credit),
        ];
        let mut buf = Vec::new();
        write_csv(&mut buf, &txns, chrono_tz::Asia::Kolkata).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "date,direction,amount,counterparty,mode,status,category,narration,reference"
        );
        assert_eq!(
            lines[1],
            "2024-02-03,DEBIT,1234.50,Account Unknown,UPI,Success,UPI Payments,\"UPI/zomato, order 7\","
        );
        assert_eq!(lines[2], ",CREDIT,10.00,Account Unknown,Payment,Success,,,");
    }

    #[test]
    fn test_empty_export_writes_nothing() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[], chrono_tz::UTC).unwrap();
        assert!(buf.is_empty());
    }
}
