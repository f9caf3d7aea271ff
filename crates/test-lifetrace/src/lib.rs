//! Small ledger model shared by the lifetrace examples.

use lifetrace::{Traced, TracedString, Tracked};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[derive(Debug, Clone, Traced)]
pub struct Account {
    pub name: TracedString,
    pub balance: i64,
}

impl Account {
    pub fn open(name: &str, balance: i64) -> Tracked<Account> {
        Tracked::with_signature(
            Account {
                name: TracedString::from(name),
                balance,
            },
            "&str, i64",
        )
    }
}

#[derive(Debug, Clone, Traced)]
pub struct Posting {
    pub account: String,
    pub amount: i64,
}

/// Parser scratch space. The leading underscore marks it as internal, so class
/// mode leaves it out of the report.
#[derive(Debug, Default, Traced)]
#[traced(tag = "_Scratch")]
pub struct Scratch {
    pub buf: Vec<u8>,
}

/// A journal traced by hand from its constructors and `Drop`.
///
/// Journals only ever live in a `Box`, so the traced address stays valid.
#[derive(Traced)]
pub struct Journal {
    postings: Vec<Tracked<Posting>>,
}

impl Journal {
    pub fn new() -> Box<Self> {
        let journal = Box::new(Self {
            postings: Vec::new(),
        });
        lifetrace::trace_ctor!(&*journal, Journal, "");
        journal
    }

    pub fn with_capacity(capacity: usize) -> Box<Self> {
        let journal = Box::new(Self {
            postings: Vec::with_capacity(capacity),
        });
        lifetrace::trace_ctor!(&*journal, Journal, "usize");
        journal
    }

    pub fn post(&mut self, account: &str, amount: i64) {
        self.postings.push(Tracked::with_signature(
            Posting {
                account: account.to_string(),
                amount,
            },
            "&str, i64",
        ));
    }

    pub fn balance(&self) -> i64 {
        self.postings.iter().map(|posting| posting.amount).sum()
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        lifetrace::trace_dtor!(self, Journal);
    }
}
