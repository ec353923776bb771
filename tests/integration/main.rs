//! End-to-end pipeline tests against in-memory providers.

mod mock_market;
mod pipeline;
