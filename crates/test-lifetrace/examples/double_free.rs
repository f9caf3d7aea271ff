use test_lifetrace::{init_logging, Journal};

#[cfg_attr(feature = "lifetrace", lifetrace::main)]
fn main() -> eyre::Result<()> {
    init_logging();

    let mut journal = Journal::new();
    journal.post("Assets:Bank", 10);

    // Runs the destructor bookkeeping once by hand, so the real drop below is the second one
    lifetrace::trace_dtor!(&*journal, Journal);
    println!("destroyed journal once");
    drop(journal);

    println!("unreachable with tracing enabled");
    Ok(())
}
