pub mod core;
pub mod book;
pub mod snapshot;
pub mod exchange;
pub mod binance;
pub mod bybit;
pub mod okx;
pub mod dispatch;
pub mod publish;
pub mod cli;
