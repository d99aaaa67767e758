mod enter;

pub use enter::{EnterArgs, cmd_enter};
