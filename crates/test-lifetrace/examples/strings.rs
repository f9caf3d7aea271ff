use lifetrace::TracedString;
use test_lifetrace::init_logging;

#[cfg_attr(feature = "lifetrace", lifetrace::main(format = "table"))]
fn main() -> eyre::Result<()> {
    init_logging();

    let empty = TracedString::new();
    let payee = TracedString::from("Grocery Store");
    let memo = TracedString::from(String::from("weekly shopping"));
    let rule = TracedString::repeat(20, '-');
    let copy = payee.clone();
    let store = TracedString::tail(&payee, 8);
    let grocery = TracedString::substring(&payee, 0, 7);

    println!("{rule}");
    println!("{copy}: {memo} [{grocery}/{store}]{empty}");
    println!("{rule}");

    Ok(())
}
