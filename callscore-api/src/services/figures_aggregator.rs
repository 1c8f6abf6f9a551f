//! Monthly figures for one rep
//!
//! Eligible rows are manual entries plus completed analyses not marked
//! analysis-only. A row belongs to the month its call date (or creation
//! time) falls in, seen from the viewer's UTC offset.
//!
//! - booked: in-month rows that are not re-analyses
//! - showed: booked rows whose result is not `no_show`
//! - qualified: showed rows marked qualified
//! - sales: every in-month row closed or with a deposit
//! - cash and revenue: sums over every in-month row

use callscore_common::{Result, YearMonth};
use chrono::FixedOffset;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db;
use crate::models::{CallResult, FigureRow, FiguresSummary};

/// `numerator / denominator` as a percentage with one decimal, halves
/// rounded up; 0 when the denominator is 0.
pub fn percent_one_decimal(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    (numerator / denominator * 1000.0 + 0.5).floor() / 10.0
}

/// Aggregate already-loaded rows
pub fn summarize(month: YearMonth, offset: FixedOffset, rows: &[FigureRow]) -> FiguresSummary {
    let mut summary = FiguresSummary::zeroed(month);

    for row in rows
        .iter()
        .filter(|row| row.is_eligible())
        .filter(|row| month.contains(row.attribution_date(), offset))
    {
        let showed = row.result.as_ref() != Some(&CallResult::NoShow);

        if row.original_call_id.is_none() {
            summary.calls_booked += 1;
            if showed {
                summary.calls_showed += 1;
                if row.qualified == Some(true) {
                    summary.calls_qualified += 1;
                }
            }
        }

        if row.result.as_ref().is_some_and(CallResult::is_sale) {
            summary.sales_made += 1;
        }

        summary.cash_collected += row.cash_collected.unwrap_or(0.0);
        summary.revenue_generated += row.revenue_generated.unwrap_or(0.0);
    }

    summary.close_rate = percent_one_decimal(summary.sales_made as f64, summary.calls_showed as f64);
    summary.show_rate = percent_one_decimal(summary.calls_showed as f64, summary.calls_booked as f64);
    summary.qualified_rate =
        percent_one_decimal(summary.calls_qualified as f64, summary.calls_showed as f64);
    summary.cash_collected_pct =
        percent_one_decimal(summary.cash_collected, summary.revenue_generated);

    summary
}

/// Figures for a rep and a month.
///
/// A database that lacks a column the query needs yields a zeroed summary
/// instead of an error.
pub async fn compute_figures(
    pool: &SqlitePool,
    user_id: &str,
    month: YearMonth,
    offset: FixedOffset,
) -> Result<FiguresSummary> {
    let rows = match db::calls::load_figure_rows(pool, user_id).await {
        Ok(rows) => rows,
        Err(e) if e.is_missing_column() => {
            warn!(user_id, month = %month, error = %e, "Calls table is missing figure columns, reporting zeros");
            return Ok(FiguresSummary::zeroed(month));
        }
        Err(e) => return Err(e),
    };

    let summary = summarize(month, offset, &rows);
    let (window_start, window_end) = month.bounds(offset);
    debug!(
        user_id,
        month = %month,
        window_start = %window_start,
        window_end = %window_end,
        booked = summary.calls_booked,
        sales = summary.sales_made,
        "Computed figures"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(percent_one_decimal(1.0, 3.0), 33.3);
        assert_eq!(percent_one_decimal(2.0, 3.0), 66.7);
        assert_eq!(percent_one_decimal(1.0, 8.0), 12.5);
        assert_eq!(percent_one_decimal(2.0, 1.0), 200.0);
        assert_eq!(percent_one_decimal(5.0, 0.0), 0.0);
    }
}
