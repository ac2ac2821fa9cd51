#![allow(dead_code, unused_imports)]

pub mod strategies;
pub mod widgets;

pub use strategies::*;
pub use widgets::*;
