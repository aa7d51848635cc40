use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use finlens_core::{
    ConsentStore, DurableBackend, PageMarker, Timestamp, Transaction, page_markers, page_slice,
    total_pages,
};
use finlens_finance::{
    AccountSelection, BackendClient, DashboardLoader, DashboardStats, Window, export_csv,
};
use finlens_ingest::{currency_symbol, format_currency};
use std::path::PathBuf;

const BAR_WIDTH: usize = 30;

pub struct TransactionsArgs {
    pub consent_id: String,
    pub page: usize,
    pub page_size: usize,
    pub csv: Option<PathBuf>,
}

pub async fn transactions(client: &BackendClient, args: TransactionsArgs, tz: Tz) -> Result<()> {
    let txns = client
        .transactions(&args.consent_id)
        .await
        .with_context(|| format!("fetching transactions for {}", args.consent_id))?;

    if let Some(path) = &args.csv {
        export_csv(path, &txns, tz)?;
        println!("Wrote {} transactions to {}", txns.len(), path.display());
        return Ok(());
    }

    if txns.is_empty() {
        println!("No transactions for this consent.");
        return Ok(());
    }

    let symbol = currency_symbol(&txns);
    let pages = total_pages(txns.len(), args.page_size);
    let now = Utc::now();
    println!(
        "{:<18} {:<28} {:<10} {:<10} {:>16}",
        "WHEN", "COUNTERPARTY", "MODE", "STATUS", "AMOUNT"
    );
    for t in page_slice(&txns, args.page, args.page_size) {
        println!(
            "{:<18} {:<28} {:<10} {:<10} {:>16}",
            when(t, now, tz),
            truncate(&t.counterparty, 28),
            truncate(&t.mode, 10),
            truncate(&t.status, 10),
            format!("{}{}", t.direction.sign(), format_currency(t.amount, &symbol)),
        );
    }
    println!(
        "\nPage {} of {} ({} transactions)  {}",
        args.page,
        pages,
        txns.len(),
        render_markers(&page_markers(args.page, pages), args.page)
    );
    Ok(())
}

fn when(t: &Transaction, now: DateTime<Utc>, tz: Tz) -> String {
    match t.display_time(now) {
        Timestamp::Date(d) => d.format("%d %b %Y").to_string(),
        Timestamp::Instant(i) => i.with_timezone(&tz).format("%d %b %Y %H:%M").to_string(),
    }
}

fn render_markers(markers: &[PageMarker], current: usize) -> String {
    markers
        .iter()
        .map(|m| match m {
            PageMarker::Page(p) if *p == current => format!("[{p}]"),
            PageMarker::Page(p) => p.to_string(),
            PageMarker::Ellipsis => "...".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub async fn dashboard<B: DurableBackend>(
    client: BackendClient,
    backend: &B,
    selection: AccountSelection,
    window: Window,
    tz: Tz,
) -> Result<()> {
    let store = ConsentStore::load(backend)?;
    let ids = selection.consent_ids(&store.active());
    if ids.is_empty() {
        println!("No active consents. Run: finlens consent create --mobile <number>");
        return Ok(());
    }

    let loader = DashboardLoader::new(client);
    let Some(accounts) = loader.load(&ids).await else {
        return Ok(());
    };
    let stats = finlens_finance::aggregate(&accounts, window, Utc::now(), tz);
    let symbol = currency_symbol(&accounts.concat());
    print!("{}", render_stats(&stats, &symbol));
    Ok(())
}

pub fn render_stats(stats: &DashboardStats, symbol: &str) -> String {
    let money = |v: f64| format_currency(v, symbol);
    let mut out = String::new();

    out.push_str(&format!("Total income     {}\n", money(stats.total_income)));
    out.push_str(&format!("Total spending   {}\n", money(stats.total_spending)));
    out.push_str(&format!("Net savings      {}\n", money(stats.net_savings)));
    out.push_str(&format!("Transactions     {}\n", stats.transaction_count));
    out.push_str(&format!("Top category     {}\n", stats.top_category_label()));

    if !stats.category_totals.is_empty() {
        out.push_str("\nSpending by category\n");
        let mut totals = stats.category_totals.clone();
        totals.sort_by(|a, b| b.total.total_cmp(&a.total));
        let max = totals.first().map(|t| t.total).unwrap_or(0.0);
        for t in &totals {
            out.push_str(&format!(
                "  {:<22} {:>14} {}\n",
                t.category.label(),
                money(t.total),
                bar(t.total, max)
            ));
        }
    }

    let title = match stats.window {
        Window::Weekly => "Last 7 days",
        Window::Monthly => "Last 30 days",
    };
    out.push_str(&format!("\n{title} (to {})\n", stats.anchor.format("%d %b %Y")));
    let max = stats
        .spending_trend
        .iter()
        .map(|b| b.income.max(b.expense))
        .fold(0.0, f64::max);
    for b in &stats.spending_trend {
        out.push_str(&format!(
            "  {:<7} in {:>12} {:<w$} out {:>12} {}\n",
            b.label,
            money(b.income),
            bar(b.income, max),
            money(b.expense),
            bar(b.expense, max),
            w = BAR_WIDTH
        ));
    }

    if !stats.top_expenses.is_empty() {
        out.push_str("\nMost spent\n");
        for (i, t) in stats.top_expenses.iter().enumerate() {
            let label = if t.narration.is_empty() {
                &t.counterparty
            } else {
                &t.narration
            };
            out.push_str(&format!("  {}. {:<32} {:>14}\n", i + 1, truncate(label, 32), money(t.amount)));
        }
    }
    out
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let n = ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize;
    "█".repeat(n.min(BAR_WIDTH))
}
