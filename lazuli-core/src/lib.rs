pub mod acquisition;
pub mod config;
pub mod output;
pub mod scrape;
