//! Scripted in-memory navigator
//!
//! `SiteState` models a paginated listing with clickable rows, detail pages
//! and page controls. It answers the locators of `SiteConfig::default()`, and
//! records every click so tests can inspect what a worker did after the
//! navigator has been moved into it.

use async_trait::async_trait;
use kc_certcrawl::browser::{Locator, NavError, NavResult, PageNavigator, SessionFactory, WaitMode};
use kc_certcrawl::config::SiteConfig;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builds the markup of a detail page for a certificate number
pub fn detail_page(id: &str) -> String {
    format!(
        r#"<html><body><div class="contents_area">
<table><caption>인증정보 상세</caption>
  <tr><th>인증번호</th><td>{id}</td><th>인증상태</th><td>적합</td></tr>
</table>
<table><caption>제품정보 상세</caption>
  <tr><th>모델명</th><td>MODEL-{id}</td></tr>
</table>
<table><caption>제조공장 상세</caption>
  <tr><th>번호</th><th>제조공장</th><th>제조국</th></tr>
  <tr><td>1</td><td><a>PLANT {id}</a></td><td>한국</td></tr>
</table>
</div></body></html>"#
    )
}

/// Builds a listing of `pages` pages with `per_page` rows, ids `P<page>-R<row>`
pub fn listing(pages: usize, per_page: usize) -> Vec<Vec<String>> {
    (0..pages)
        .map(|page| (0..per_page).map(|row| format!("P{}-R{}", page, row)).collect())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Next,
    Previous,
    Last,
    NextBlock,
    BlockFirst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockElement {
    Row { page: usize, row: usize },
    Control(Control),
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Blank,
    Listing(usize),
    Detail { page: usize, row: usize },
}

/// Shared state of the scripted site
#[derive(Debug)]
pub struct SiteState {
    pub pages: Vec<Vec<String>>,
    location: Location,
    pub clicks: Vec<MockElement>,
    pub shut_down: bool,

    /// Row ids whose listing cell cannot be read (recoverable)
    pub unreadable_rows: HashSet<String>,

    /// Row ids whose detail page closes the window (fatal)
    pub closing_rows: HashSet<String>,

    /// Row ids whose detail page lacks a certificate number
    pub blank_details: HashSet<String>,

    /// Controls that never become clickable
    pub missing_controls: HashSet<Control>,

    /// The rows wait never completes
    pub hang_on_rows: bool,

    /// Number of upcoming `go_back` calls that fail (recoverable)
    pub failing_back: usize,

    /// How long `shutdown` takes before the session is gone
    pub shutdown_delay: Option<Duration>,
}

impl SiteState {
    pub fn new(pages: Vec<Vec<String>>) -> Self {
        Self {
            pages,
            location: Location::Blank,
            clicks: Vec::new(),
            shut_down: false,
            unreadable_rows: HashSet::new(),
            closing_rows: HashSet::new(),
            blank_details: HashSet::new(),
            missing_controls: HashSet::new(),
            hang_on_rows: false,
            failing_back: 0,
            shutdown_delay: None,
        }
    }

    pub fn control_clicks(&self, control: Control) -> usize {
        self.clicks
            .iter()
            .filter(|c| **c == MockElement::Control(control))
            .count()
    }

    pub fn row_clicks(&self) -> Vec<String> {
        self.clicks
            .iter()
            .filter_map(|c| match c {
                MockElement::Row { page, row } => Some(self.pages[*page][*row].clone()),
                _ => None,
            })
            .collect()
    }

    fn last_page(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    /// Target page of a control, or None when the control is not rendered
    fn control_target(&self, control: Control, page: usize) -> Option<usize> {
        if self.missing_controls.contains(&control) {
            return None;
        }
        match control {
            Control::Next => (page < self.last_page()).then_some(page + 1),
            Control::Previous => page.checked_sub(1),
            Control::Last => Some(self.last_page()),
            Control::NextBlock => {
                let target = (page / 10 + 1) * 10;
                (target <= self.last_page()).then_some(target)
            }
            Control::BlockFirst => Some(page / 10 * 10),
        }
    }
}

pub type SharedSite = Arc<Mutex<SiteState>>;

pub struct MockNavigator {
    site: SharedSite,
    locators: SiteConfig,
}

impl MockNavigator {
    pub fn new(site: SharedSite) -> Self {
        Self {
            site,
            locators: SiteConfig::default(),
        }
    }

    fn control_for(&self, locator: &Locator) -> Option<Control> {
        let l = &self.locators;
        if *locator == l.next_page {
            Some(Control::Next)
        } else if *locator == l.previous_page {
            Some(Control::Previous)
        } else if *locator == l.last_page {
            Some(Control::Last)
        } else if *locator == l.next_block {
            Some(Control::NextBlock)
        } else if *locator == l.block_first_page {
            Some(Control::BlockFirst)
        } else {
            None
        }
    }
}

fn timeout(locator: &Locator, after: Duration) -> NavError {
    NavError::Timeout {
        what: locator.to_string(),
        after,
    }
}

#[async_trait]
impl PageNavigator for MockNavigator {
    type Element = MockElement;

    async fn go(&mut self, _url: &str) -> NavResult<()> {
        let mut site = self.site.lock().unwrap();
        if site.shut_down {
            return Err(NavError::SessionClosed("invalid session id".to_string()));
        }
        site.location = Location::Listing(0);
        Ok(())
    }

    async fn wait(
        &mut self,
        locator: &Locator,
        mode: WaitMode,
        after: Duration,
    ) -> NavResult<Vec<MockElement>> {
        let hang = {
            let site = self.site.lock().unwrap();
            if site.shut_down {
                return Err(NavError::SessionClosed("invalid session id".to_string()));
            }
            site.hang_on_rows && *locator == self.locators.rows
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let site = self.site.lock().unwrap();
        let l = &self.locators;

        if *locator == l.loading {
            return match mode {
                WaitMode::Invisible => Ok(Vec::new()),
                _ => Err(timeout(locator, after)),
            };
        }

        if *locator == l.rows {
            return match site.location {
                Location::Listing(page) if !site.pages[page].is_empty() => {
                    let count = site.pages[page].len();
                    Ok((0..count).map(|row| MockElement::Row { page, row }).collect())
                }
                _ => Err(timeout(locator, after)),
            };
        }

        if *locator == l.listing {
            return match site.location {
                Location::Listing(_) => Ok(vec![MockElement::Content]),
                _ => Err(timeout(locator, after)),
            };
        }

        if *locator == l.detail_content {
            return match site.location {
                Location::Detail { .. } => Ok(vec![MockElement::Content]),
                _ => Err(timeout(locator, after)),
            };
        }

        if let Some(control) = self.control_for(locator) {
            return match site.location {
                Location::Listing(page) if site.control_target(control, page).is_some() => {
                    Ok(vec![MockElement::Control(control)])
                }
                _ => Err(timeout(locator, after)),
            };
        }

        Err(NavError::NotFound(locator.to_string()))
    }

    async fn click(&mut self, element: &MockElement) -> NavResult<()> {
        let mut site = self.site.lock().unwrap();
        if site.shut_down {
            return Err(NavError::SessionClosed("invalid session id".to_string()));
        }
        site.clicks.push(element.clone());

        match (element, site.location) {
            (MockElement::Row { page, row }, Location::Listing(current)) if *page == current => {
                let id = site.pages[*page][*row].clone();
                if site.closing_rows.contains(&id) {
                    site.shut_down = true;
                    return Err(NavError::from_driver_message(
                        "no such window: target window already closed",
                    ));
                }
                site.location = Location::Detail {
                    page: *page,
                    row: *row,
                };
                Ok(())
            }
            (MockElement::Control(control), Location::Listing(page)) => {
                match site.control_target(*control, page) {
                    Some(target) => {
                        site.location = Location::Listing(target);
                        Ok(())
                    }
                    None => Err(NavError::NotFound(format!("{:?}", control))),
                }
            }
            _ => Err(NavError::StaleElement(format!("{:?}", element))),
        }
    }

    async fn element_text(
        &mut self,
        element: &MockElement,
        _child: Option<&Locator>,
    ) -> NavResult<String> {
        let site = self.site.lock().unwrap();
        match element {
            MockElement::Row { page, row } => {
                let id = site.pages[*page][*row].clone();
                if site.unreadable_rows.contains(&id) {
                    Err(NavError::from_driver_message(
                        "no such element: Unable to locate element: td:last-child",
                    ))
                } else {
                    Ok(format!("  {}  ", id))
                }
            }
            other => Err(NavError::NotFound(format!("{:?}", other))),
        }
    }

    async fn current_markup(&mut self) -> NavResult<String> {
        let site = self.site.lock().unwrap();
        match site.location {
            Location::Detail { page, row } => {
                let id = &site.pages[page][row];
                if site.blank_details.contains(id) {
                    Ok("<html><body><div class=\"contents_area\"></div></body></html>".to_string())
                } else {
                    Ok(detail_page(id))
                }
            }
            _ => Ok("<html><body><table class=\"tb_list\"></table></body></html>".to_string()),
        }
    }

    async fn go_back(&mut self) -> NavResult<()> {
        let mut site = self.site.lock().unwrap();
        if site.shut_down {
            return Err(NavError::SessionClosed("invalid session id".to_string()));
        }
        if site.failing_back > 0 {
            site.failing_back -= 1;
            return Err(NavError::Driver("unknown error: history navigation failed".to_string()));
        }
        if let Location::Detail { page, .. } = site.location {
            site.location = Location::Listing(page);
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> NavResult<()> {
        let delay = self.site.lock().unwrap().shutdown_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.site.lock().unwrap().shut_down = true;
        Ok(())
    }
}

/// Hands out one scripted site per worker ordinal
pub struct MockFactory {
    pub sites: Vec<SharedSite>,
    pub refused: HashSet<usize>,
}

impl MockFactory {
    pub fn new(sites: Vec<SharedSite>) -> Self {
        Self {
            sites,
            refused: HashSet::new(),
        }
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    type Navigator = MockNavigator;

    async fn open(&self, ordinal: usize) -> NavResult<MockNavigator> {
        if self.refused.contains(&ordinal) {
            return Err(NavError::Driver("session not available".to_string()));
        }
        let site = self
            .sites
            .get(ordinal)
            .cloned()
            .ok_or_else(|| NavError::Driver(format!("no site for worker {}", ordinal)))?;
        Ok(MockNavigator::new(site))
    }
}
