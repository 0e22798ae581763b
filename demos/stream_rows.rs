//! Stream a large sheet into an xlsx file with flat memory use
//!
//! Run with: cargo run --release --example stream_rows -- [rows] [output]

use excelsplice::{CellValue, StreamWorkbook, WriteOptions};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let rows: u32 = match args.next() {
        Some(n) => n.parse()?,
        None => 1_000_000,
    };
    let output = args.next().unwrap_or_else(|| "stream_rows.xlsx".to_string());

    println!("Streaming {} rows into {}", rows, output);
    let start = Instant::now();

    let mut workbook = StreamWorkbook::with_options(WriteOptions::from_env());
    workbook.create_sheet("Orders")?;
    workbook.create_sheet("Summary")?;

    workbook.set_stream_source(move |sheet| {
        if sheet.sheet_name() == "Summary" {
            return Box::new(std::iter::once_with(move || {
                sheet
                    .create_row(0)?
                    .push("Total")
                    .push(CellValue::formula(format!("SUM(Orders!C2:C{})", rows + 1)));
                sheet.flush_rows()
            }));
        }

        Box::new((0..=rows).map(move |i| {
            let row = sheet.create_row(i)?;
            if i == 0 {
                row.push("Order").push("Customer").push("Amount").push("Paid");
            } else {
                row.push(i as f64)
                    .push(format!("Customer {}", i % 997))
                    .push((i % 1000) as f64 * 1.25)
                    .push(i % 3 != 0);
            }
            // Flush in batches of 100 rows per chunk
            if i % 100 == 0 || i == rows {
                sheet.flush_rows()
            } else {
                Ok(String::new())
            }
        }))
    });

    workbook.save(&output)?;

    let elapsed = start.elapsed();
    println!(
        "Done in {:.2?} ({:.0} rows/sec)",
        elapsed,
        rows as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
