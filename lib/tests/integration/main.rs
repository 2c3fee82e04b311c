// main.rs

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::tests::IntegrationTest;

pub mod tests;

fn main() {
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").as_deref().unwrap_or("info"),
    );
    let fmt_layer = tracing_subscriber::fmt::Layer::default()
        .with_test_writer()
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    let mut failed = Vec::new();
    let total = inventory::iter::<IntegrationTest>.into_iter().count();
    for test in inventory::iter::<IntegrationTest> {
        let _span = tracing::info_span!("test", name = test.name).entered();
        match catch_unwind(AssertUnwindSafe(test.test_fn)) {
            Ok(Ok(())) => eprintln!("test {} ... ok", test.name),
            Ok(Err(err)) => {
                eprintln!("test {} ... FAILED\n{err:?}", test.name);
                failed.push(test.name);
            }
            Err(_) => {
                eprintln!("test {} ... panicked", test.name);
                failed.push(test.name);
            }
        }
    }

    eprintln!(
        "\n{} passed; {} failed",
        total - failed.len(),
        failed.len()
    );
    if !failed.is_empty() {
        for name in failed {
            eprintln!("    {name}");
        }
        std::process::exit(1);
    }
}
