use lifetrace::GuardBuilder;
use test_lifetrace::{init_logging, Account, Journal};

fn main() -> eyre::Result<()> {
    init_logging();

    // Traced before any guard exists
    let opening = Journal::with_capacity(1);

    let first = GuardBuilder::new("sessions::first").build();
    lifetrace::debug_print!("ledger.session", "first session");
    drop(opening);
    drop(first);

    let second = GuardBuilder::new("sessions::second").build();
    let closing = Account::open("Equity:Closing", 0);
    lifetrace::debug_print!("ledger.session", "second session, closing {}", closing.name);
    drop(closing);
    drop(second);

    println!("two sessions done");
    Ok(())
}
