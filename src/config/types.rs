use crate::browser::Locator;
use crate::state::{Direction, DirectionPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Hard ceiling on concurrent workers (browser processes)
pub const MAX_WORKERS: usize = 20;

/// Main configuration structure for kc-certcrawl
///
/// Every section has site defaults, so an empty file (or no file at all)
/// yields a usable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub browser: BrowserConfig,
    pub site: SiteConfig,
    pub schema: SchemaConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers (clamped to `MAX_WORKERS`)
    pub workers: usize,

    /// Rows rendered on one listing page
    pub page_size: usize,

    /// Sleep between navigation actions (milliseconds)
    pub politeness_delay_ms: u64,

    /// Upper bound for every element wait (seconds)
    pub wait_timeout_secs: u64,

    /// Visit every row of a page instead of the worker's single slot
    pub sweep: bool,

    /// Ordinals below this value walk in `below-split` direction
    pub direction_split: usize,

    /// Direction of the ordinals below `direction-split`
    pub below_split: Direction,

    /// How long an interrupted fleet waits for workers to release sessions (seconds)
    pub shutdown_grace_secs: u64,
}

impl CrawlerConfig {
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn direction_policy(&self) -> DirectionPolicy {
        DirectionPolicy::new(self.direction_split, self.below_split)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            page_size: 10,
            politeness_delay_ms: 2000,
            wait_timeout_secs: 10,
            sweep: false,
            direction_split: 10,
            below_split: Direction::Backward,
            shutdown_grace_secs: 30,
        }
    }
}

/// Rendering session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// WebDriver server every session connects to
    pub webdriver_url: String,

    /// Run Chrome without a window
    pub headless: bool,

    /// Outbound proxy passed to Chrome (`--proxy-server`)
    pub proxy: Option<String>,

    /// User agent override passed to Chrome (`--user-agent`)
    pub user_agent: Option<String>,

    /// Connection attempts before a session is given up
    pub connect_attempts: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            proxy: None,
            user_agent: None,
            connect_attempts: 3,
        }
    }
}

/// Listing site layout: entry URL and element locators
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Root URL of the certification listing
    pub listing_url: String,

    /// Clickable rows of the listing table
    pub rows: Locator,

    /// Cell inside a row holding the certificate number
    pub row_id_cell: Locator,

    /// The listing table itself (used to detect the listing re-rendered)
    pub listing: Locator,

    /// Content region of a detail page
    pub detail_content: Locator,

    /// Loading overlay shown while a listing page renders
    pub loading: Locator,

    /// Step one page forward
    pub next_page: Locator,

    /// Step one page backward
    pub previous_page: Locator,

    /// Jump to the last listing page
    pub last_page: Locator,

    /// Jump to the first page of the next ten-page block
    pub next_block: Locator,

    /// Jump to the first page of the current ten-page block
    pub block_first_page: Locator,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.safetykorea.kr/release/itemSearch".to_string(),
            rows: Locator::css("table.tb_list tr[onclick]"),
            row_id_cell: Locator::css("td:last-child"),
            listing: Locator::css(".tb_list"),
            detail_content: Locator::css(".contents_area"),
            loading: Locator::css("#loading"),
            next_page: Locator::xpath("//a[@title='다음 페이지']"),
            previous_page: Locator::xpath("//a[@title='이전 페이지']"),
            last_page: Locator::xpath("//a[@title='마지막 페이지']"),
            next_block: Locator::xpath("//a[@title='다음 10 페이지']"),
            block_first_page: Locator::xpath("//div[contains(@class,'paging')]//a[not(@title)][1]"),
        }
    }
}

/// Detail page schema: captions of the four record sections
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchemaConfig {
    /// Label of the certificate number inside the certification section
    pub id_label: String,

    pub certification_caption: String,
    pub product_caption: String,
    pub factories_caption: String,
    pub related_caption: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            id_label: "인증번호".to_string(),
            certification_caption: "인증정보 상세".to_string(),
            product_caption: "제품정보 상세".to_string(),
            factories_caption: "제조공장 상세".to_string(),
            related_caption: "연관 인증 번호 상세".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding one `<ordinal>.json` partition per worker
    pub directory: PathBuf,

    /// Directory holding one `worker_<ordinal>/` log folder per worker
    pub log_directory: PathBuf,

    /// Size at which a worker log file is rotated (bytes)
    pub log_max_bytes: u64,

    /// Rotated log files kept per worker
    pub log_retained: usize,
}

impl OutputConfig {
    /// Path of the partition owned by a worker
    pub fn partition_path(&self, ordinal: usize) -> PathBuf {
        self.directory.join(format!("{}.json", ordinal))
    }

    /// Log folder owned by a worker
    pub fn worker_log_dir(&self, ordinal: usize) -> PathBuf {
        self.log_directory.join(format!("worker_{}", ordinal))
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            log_directory: PathBuf::from("logs"),
            log_max_bytes: 10 * 1024 * 1024,
            log_retained: 5,
        }
    }
}
