use std::time::Duration;
use test_lifetrace::{init_logging, Journal};

#[cfg_attr(feature = "lifetrace", lifetrace::main)]
fn main() -> eyre::Result<()> {
    init_logging();

    let mut journal = Journal::new();

    for day in 0..3 {
        lifetrace::start_timer("ledger.parse");
        journal.post("Expenses:Coffee", -(day + 3));
        std::thread::sleep(Duration::from_millis(5));
        lifetrace::stop_timer("ledger.parse");

        lifetrace::debug_print!("ledger.parse", "parsed day {day}");
    }

    lifetrace::start_timer("ledger.report");
    let balance = journal.balance();
    lifetrace::stop_timer("ledger.report");

    lifetrace::finish_timer!("ledger.parse");
    lifetrace::finish_timer!("ledger.report");

    println!("balance {balance}");
    Ok(())
}
