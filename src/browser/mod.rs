//! Browser module: the page rendering service boundary
//!
//! The crawl worker never talks to a browser directly. It drives a
//! `PageNavigator`, which this module defines and implements on top of a
//! WebDriver session.

mod navigator;
mod webdriver;

pub use navigator::{Locator, NavError, NavResult, PageNavigator, SessionFactory, WaitMode};
pub use webdriver::{chrome_args, WebDriverFactory, WebDriverNavigator};
