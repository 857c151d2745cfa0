pub use self::job::{RunSummary, ScrapeJob};
pub use self::scraper::{HistoryCursor, MessageScraper};
pub use self::windows::{plan_windows, ScrapeWindow, WindowKind};

pub mod job;
pub mod reconcile;
pub mod roll_filter;
pub mod scraper;
pub mod windows;
