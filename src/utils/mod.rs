pub mod display;

pub use display::{print_banner, print_fatal};
