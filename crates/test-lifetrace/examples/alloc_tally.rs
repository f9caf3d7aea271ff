use lifetrace::Tracked;
use test_lifetrace::{init_logging, Posting};

#[cfg_attr(feature = "lifetrace", lifetrace::main(format = "json"))]
fn main() -> eyre::Result<()> {
    init_logging();

    let postings: Vec<Tracked<Posting>> = (0..32)
        .map(|i| {
            Tracked::new(Posting {
                account: format!("Expenses:Item{i}"),
                amount: i,
            })
        })
        .collect();

    let total: i64 = postings.iter().map(|posting| posting.amount).sum();
    std::hint::black_box(total);

    Ok(())
}
