//! Request handlers, grouped by the component they front.

pub mod editor;
pub mod health;
pub mod proxy;
pub mod workflows;
