use std::env;
use std::path::PathBuf;

use tracing::info;

use sheet_invoicer::{
    ConfigStore, InvoiceService, JsonRowSource, MissingSummaryPolicy, PdfRenderer,
    helpers::export::StdinPrompt,
};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting sheet invoicer example");

    // Usage: standalone <config.json> <rows.json> [invoice-id]
    let mut args = env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config.json".to_string());
    let rows_path = args.next().unwrap_or_else(|| "rows.json".to_string());
    let invoice_filter = args.next();

    let mut service = InvoiceService::new(
        ConfigStore::new(config_path),
        Box::new(JsonRowSource::new(rows_path)),
        Box::new(PdfRenderer::default()),
    )
    .with_policy(MissingSummaryPolicy::Prompt(Box::new(StdinPrompt)))
    .with_output_dir(PathBuf::from("invoices"))
    .with_timesheet_export("invoices/timesheet.json");

    for path in service.process(invoice_filter.as_deref())? {
        println!("{}", path.display());
    }

    Ok(())
}

/*
Example rows.json, unformatted cell values (date-times as serial numbers):

[
  [45292.375, 45292.5, "INV1", "did work", "ISSUE-1"],
  ["", 45292.625, "", "more work", "ISSUE-1"]
]

The second row has no start, so it continues the first entry: the entry now
ends at 15:00 and its six hours are split between the two items.
*/
