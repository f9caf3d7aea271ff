use test_lifetrace::{init_logging, Account, Journal};

#[cfg_attr(feature = "lifetrace", lifetrace::main)]
fn main() -> eyre::Result<()> {
    init_logging();

    let cash = Account::open("Assets:Cash", 250);
    let bank = Account::open("Assets:Bank", 1_000);
    let audit = bank.clone();

    let mut journal = Journal::new();
    journal.post(&cash.name, -50);
    journal.post(&bank.name, 50);
    tracing::debug!(postings = journal.len(), "journal posted");

    // Never released, so it is still live when the report is written
    std::mem::forget(Account::open("Equity:Opening", 0));

    println!(
        "journal balance {} across {} postings, audit copy {}",
        journal.balance(),
        journal.len(),
        audit.name
    );

    Ok(())
}
