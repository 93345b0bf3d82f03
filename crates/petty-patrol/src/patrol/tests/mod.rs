mod common;
mod lifecycle;
mod persistence;
