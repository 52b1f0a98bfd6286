#![allow(dead_code)]

pub mod page;
