use lifetrace::Tracked;
use test_lifetrace::{init_logging, Account, Scratch};

#[cfg_attr(feature = "lifetrace", lifetrace::main(mode = "class"))]
fn main() -> eyre::Result<()> {
    init_logging();

    let mut scratch = Tracked::new(Scratch::default());
    scratch.buf.extend_from_slice(b"2024/01/01 * Opening balance");

    let accounts: Vec<_> = ["Assets:Bank", "Liabilities:Card", "Income:Salary"]
        .into_iter()
        .map(|name| Account::open(name, 0))
        .collect();

    // Internal objects stay out of the tables, even when they leak
    std::mem::forget(Tracked::new(Scratch::default()));
    std::mem::forget(Account::open("Expenses:Unknown", 0));

    println!("{} accounts, {} scratch bytes", accounts.len(), scratch.buf.len());

    Ok(())
}
