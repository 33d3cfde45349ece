#![forbid(unsafe_code)]

//! Picks the next short-form video to upload and remembers what already went
//! up. Local files are preferred; otherwise a fresh short is scraped from one
//! of the channels listed in the source catalog.

pub mod catalog;
pub mod config;
pub mod ledger;
pub mod media;
pub mod random;
pub mod scraper;
pub mod selector;
pub mod uploader;
