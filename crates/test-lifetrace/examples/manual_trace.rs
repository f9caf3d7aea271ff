use lifetrace::{Format, GuardBuilder, Reporter, Snapshot};
use std::error::Error;
use std::io::Write;
use test_lifetrace::{init_logging, Account, Journal};

struct LeakSummary;

impl Reporter for LeakSummary {
    fn report(&self, snapshot: &Snapshot, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
        writeln!(out, "leaked: {}", snapshot.leaked())?;
        for row in &snapshot.live_objects {
            writeln!(out, "  {} {}", row.tag, row.addr)?;
        }
        Ok(())
    }
}

fn main() -> eyre::Result<()> {
    init_logging();

    let summary = std::env::var("LEAK_SUMMARY").is_ok();
    let builder = GuardBuilder::new("manual_trace").format(Format::Table);
    let builder = if summary {
        builder.reporter(Box::new(LeakSummary))
    } else {
        builder
    };
    let guard = builder.build();

    let mut journal = Journal::with_capacity(4);
    journal.post("Assets:Bank", 1_500);
    journal.post("Income:Salary", -1_500);

    let savings = Account::open("Assets:Savings", 0);

    println!("-- mid-run report --");
    lifetrace::report_memory(&mut std::io::stdout())?;
    println!("-- end of mid-run report --");

    drop(savings);
    std::mem::forget(journal);

    drop(guard);
    Ok(())
}
