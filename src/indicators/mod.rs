//! Streaming indicators feeding the trailing-stop channels.

mod atr;
mod cross;
mod heikin_ashi;

pub use atr::AtrSupplier;
pub use cross::{crossover, crossunder};
pub use heikin_ashi::heikin_ashi_close;
