mod common;
mod enter_tests;
