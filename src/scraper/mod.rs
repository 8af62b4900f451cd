//! Scraping components (C6 Assessor Scraper, C7 People-Search Scraper,
//! C8 Stealth Browser Factory).

pub mod assessor;
pub mod browser;
mod extension;
pub mod people_search;
