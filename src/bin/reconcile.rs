use anyhow::{bail, Context};
use cccd_etl::adapters::spreadsheet::read_sheet;
use cccd_etl::core::reconcile::{reconcile, ColumnRef, ReconcileReport, ReconcileSpec};
use cccd_etl::utils::logger;
use cccd_etl::utils::validation::{validate_file_extensions, SHEET_EXTENSIONS};
use clap::Parser;
use std::path::Path;

#[derive(Parser)]
#[command(name = "reconcile")]
#[command(about = "Check the running total of a customs declaration (TKHQ) sheet")]
struct Args {
    /// Workbook (.xlsx, .xlsm, .xls, .ods) or .csv file
    #[arg(long)]
    file: String,

    /// Sheet name, defaults to the first sheet
    #[arg(long)]
    sheet: Option<String>,

    /// Column holding the amounts, as letters (E) or a 1-based number
    #[arg(long)]
    value_column: String,

    /// Column holding the declaration number
    #[arg(long)]
    key_column: Option<String>,

    /// Text of the row just above the first amount
    #[arg(long)]
    start_label: String,

    /// Text of the row holding the declared total
    #[arg(long)]
    end_label: Option<String>,

    /// Expected total, instead of the value on the end-label row
    #[arg(long)]
    expected: Option<f64>,

    /// Write the per-row report as CSV
    #[arg(long)]
    output: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    validate_file_extensions("file", &[args.file.clone()], SHEET_EXTENSIONS)?;

    let spec = ReconcileSpec {
        value_column: ColumnRef::parse(&args.value_column)?,
        key_column: args.key_column.as_deref().map(ColumnRef::parse).transpose()?,
        start_label: args.start_label.clone(),
        end_label: args.end_label.clone(),
        expected_total: args.expected,
    };

    let sheet = read_sheet(Path::new(&args.file), args.sheet.as_deref())
        .with_context(|| format!("failed to read {}", args.file))?;
    tracing::info!("📥 Sheet '{}' with {} rows", sheet.name, sheet.rows.len());

    let report = reconcile(&sheet.rows, sheet.first_row, &spec)?;

    if let Some(output) = &args.output {
        write_report(output, &report).with_context(|| format!("failed to write {}", output))?;
        tracing::info!("💾 Report saved to: {}", output);
    }

    print_summary(&report);

    match report.expected {
        Some(_) if report.is_balanced() => Ok(()),
        Some(_) => std::process::exit(2),
        None => bail!("no expected total: pass --expected or an --end-label row holding the total"),
    }
}

fn write_report(path: &str, report: &ReconcileReport) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["row", "key", "value", "running_total"])?;
    for row in &report.rows {
        writer.write_record([
            row.row.to_string(),
            row.key.clone(),
            format!("{:.2}", row.value),
            format!("{:.2}", row.running_total),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_summary(report: &ReconcileReport) {
    println!("📋 Reconciliation:");
    println!(
        "  Rows {} to {}: {} amounts",
        report.start_row + 1,
        report
            .end_row
            .map(|end| (end - 1).to_string())
            .unwrap_or_else(|| "end".to_string()),
        report.rows.len()
    );
    if !report.skipped_rows.is_empty() {
        println!("  ⚠️ Non-numeric rows skipped: {:?}", report.skipped_rows);
    }
    println!("  Running total: {:.2}", report.total);

    match (report.expected, report.difference) {
        (Some(expected), Some(difference)) => {
            println!("  Declared total: {:.2}", expected);
            if report.is_balanced() {
                println!("✅ Totals match");
            } else {
                println!("❌ Totals differ by {:.2}", difference);
            }
        }
        _ => println!("  Declared total: not found"),
    }
}
