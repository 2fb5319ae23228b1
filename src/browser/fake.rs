//! Scripted in-memory session for tests.
//!
//! Pages are declared up front; clicking or submitting on the configured
//! "advance" selector moves to the next page, mimicking navigation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{PageSession, ResultBlock, SessionError};
use crate::selectors::SerpSelectors;

/// One scripted page state.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub url: String,
    pub title: String,
    pub present: HashSet<String>,
    pub texts: HashMap<String, String>,
    pub attrs: HashMap<(String, String), String>,
    pub blocks: Vec<ResultBlock>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_present(mut self, css: &str) -> Self {
        self.present.insert(css.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_text(mut self, css: &str, text: &str) -> Self {
        self.present.insert(css.to_string());
        self.texts.insert(css.to_string(), text.to_string());
        self
    }

    pub fn with_attr(mut self, css: &str, attr: &str, value: &str) -> Self {
        self.present.insert(css.to_string());
        self.attrs
            .insert((css.to_string(), attr.to_string()), value.to_string());
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<ResultBlock>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// Scripted session, recording every call it receives.
pub struct FakeSession {
    pages: Vec<FakePage>,
    current: AtomicUsize,
    advance_on: HashSet<String>,
    presence_countdown: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<String>>,
    typed: Mutex<String>,
}

impl FakeSession {
    pub fn single(page: FakePage) -> Self {
        Self::with_pages(vec![page])
    }

    pub fn with_pages(pages: Vec<FakePage>) -> Self {
        assert!(!pages.is_empty(), "FakeSession needs at least one page");
        Self {
            pages,
            current: AtomicUsize::new(0),
            advance_on: HashSet::new(),
            presence_countdown: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            typed: Mutex::new(String::new()),
        }
    }

    /// Clicking or submitting on this selector advances to the next page.
    pub fn advance_on(mut self, css: &str) -> Self {
        self.advance_on.insert(css.to_string());
        self
    }

    /// Report `css` as present for the next `count` presence checks, then
    /// absent. Used to script a CAPTCHA marker disappearing mid-wait.
    pub fn countdown(self, css: &str, count: usize) -> Self {
        self.presence_countdown
            .lock()
            .unwrap()
            .insert(css.to_string(), count);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn typed(&self) -> String {
        self.typed.lock().unwrap().clone()
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    fn page(&self) -> FakePage {
        let index = self
            .current
            .load(Ordering::Relaxed)
            .min(self.pages.len() - 1);
        self.pages[index].clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }

    fn maybe_advance(&self, css: &str) {
        if self.advance_on.contains(css) {
            let next = (self.current.load(Ordering::Relaxed) + 1).min(self.pages.len() - 1);
            self.current.store(next, Ordering::Relaxed);
        }
    }

    fn require_present(&self, css: &str) -> Result<(), SessionError> {
        if self.page().present.contains(css) {
            Ok(())
        } else {
            Err(SessionError::ElementNotFound(css.to_string()))
        }
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.record(format!("goto {}", url));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.page().url)
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok(self.page().title)
    }

    async fn back(&self) -> Result<(), SessionError> {
        self.record("back".to_string());
        Ok(())
    }

    async fn is_present(&self, css: &str) -> Result<bool, SessionError> {
        let mut countdown = self.presence_countdown.lock().unwrap();
        if let Some(remaining) = countdown.get_mut(css) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(true);
            }
            return Ok(false);
        }
        Ok(self.page().present.contains(css))
    }

    async fn wait_for(&self, css: &str, _timeout: Duration) -> Result<bool, SessionError> {
        self.is_present(css).await
    }

    async fn text_of(&self, css: &str) -> Result<Option<String>, SessionError> {
        Ok(self.page().texts.get(css).cloned())
    }

    async fn attr_of(&self, css: &str, attr: &str) -> Result<Option<String>, SessionError> {
        Ok(self
            .page()
            .attrs
            .get(&(css.to_string(), attr.to_string()))
            .cloned())
    }

    async fn clear(&self, css: &str) -> Result<(), SessionError> {
        self.require_present(css)?;
        self.record(format!("clear {}", css));
        self.typed.lock().unwrap().clear();
        Ok(())
    }

    async fn type_text(&self, css: &str, text: &str) -> Result<(), SessionError> {
        self.require_present(css)?;
        self.typed.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn press_enter(&self, css: &str) -> Result<(), SessionError> {
        self.require_present(css)?;
        self.record(format!("enter {}", css));
        self.maybe_advance(css);
        Ok(())
    }

    async fn click(&self, css: &str) -> Result<(), SessionError> {
        self.require_present(css)?;
        self.record(format!("click {}", css));
        self.maybe_advance(css);
        Ok(())
    }

    async fn click_js(&self, css: &str) -> Result<(), SessionError> {
        self.require_present(css)?;
        self.record(format!("click_js {}", css));
        self.maybe_advance(css);
        Ok(())
    }

    async fn collect_results(
        &self,
        _serp: &SerpSelectors,
    ) -> Result<Vec<ResultBlock>, SessionError> {
        self.record("collect_results".to_string());
        Ok(self.page().blocks)
    }

    async fn click_result_link(
        &self,
        _serp: &SerpSelectors,
        index: usize,
    ) -> Result<(), SessionError> {
        if index >= self.page().blocks.len() {
            return Err(SessionError::ElementNotFound(format!("result[{}]", index)));
        }
        self.record(format!("click_result {}", index));
        Ok(())
    }
}
