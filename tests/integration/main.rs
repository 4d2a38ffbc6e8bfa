//! Integration tests. They need PostgreSQL (`DATABASE_URL`) and, for the API
//! tests, a running server; run with `cargo test -- --ignored`.

mod api_tests;
mod ledger_tests;
