//! Style sheet tracker.
//!
//! Maps each style sheet URL in the live page to its remote handle so a
//! CSS document can be pushed into the page without a reload.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::inspector::WeakInspector;
use crate::protocol::{Command, CssCommand, EventKind, ParsedEvent, StyleSheetHeader};

use super::{Agent, AgentContext, AgentKind, Listeners};

// ============================================================================
// Helpers
// ============================================================================

/// Strips the query string and fragment from `url`.
#[must_use]
pub fn canonical_url(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

/// Sheet cache plus a generation counter.
///
/// Every fetch takes a ticket from the counter and `unload` bumps it, so
/// only the newest fetch of a still-loaded agent may replace the cache.
#[derive(Default)]
struct SheetCache {
    sheets: Mutex<FxHashMap<String, StyleSheetHeader>>,
    generation: AtomicU64,
}

type Sheets = Arc<SheetCache>;

impl SheetCache {
    fn ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.sheets.lock().clear();
    }

    fn record(&self, header: StyleSheetHeader) {
        if let Some((url, header)) = keyed(header) {
            self.sheets.lock().insert(url, header);
        }
    }

    /// Replaces the cache if `ticket` is still current.
    fn commit(&self, ticket: u64, headers: Vec<StyleSheetHeader>) -> bool {
        let mut sheets = self.sheets.lock();
        if self.generation.load(Ordering::SeqCst) != ticket {
            return false;
        }
        sheets.clear();
        sheets.extend(headers.into_iter().filter_map(keyed));
        true
    }
}

fn keyed(header: StyleSheetHeader) -> Option<(String, StyleSheetHeader)> {
    if header.source_url.is_empty() {
        return None;
    }
    let url = canonical_url(&header.source_url).to_string();
    debug!(url = %url, style_sheet_id = %header.style_sheet_id, "Style sheet added");
    Some((url, header))
}

async fn fetch_all(inspector: WeakInspector, sheets: Sheets, ticket: u64) -> Result<()> {
    let Some(inspector) = inspector.upgrade() else {
        return Ok(());
    };
    let result = inspector
        .send(&Command::Css(CssCommand::GetAllStyleSheets))
        .await?;
    let headers: Vec<StyleSheetHeader> = match result.get("headers") {
        Some(headers) => serde_json::from_value(headers.clone())?,
        None => Vec::new(),
    };

    if !sheets.commit(ticket, headers) {
        debug!("Discarding superseded style sheet list");
    }
    Ok(())
}

// ============================================================================
// CssAgent
// ============================================================================

/// Tracks the style sheets of the live page by URL.
pub struct CssAgent {
    ctx: AgentContext,
    sheets: Sheets,
    listeners: Listeners,
    loaded: AtomicBool,
}

impl CssAgent {
    /// Creates an unloaded agent.
    #[must_use]
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            sheets: Arc::default(),
            listeners: Listeners::default(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Returns the sheet loaded from `url`, ignoring query and fragment.
    #[must_use]
    pub fn style_for_url(&self, url: &str) -> Option<StyleSheetHeader> {
        self.sheets.sheets.lock().get(canonical_url(url)).cloned()
    }

    /// Returns every tracked sheet URL, sorted.
    #[must_use]
    pub fn style_sheet_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.sheets.sheets.lock().keys().cloned().collect();
        urls.sort_unstable();
        urls
    }

    /// Reads the text the live page currently has for the sheet at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotLoaded`] before `load()`,
    /// [`Error::UrlNotMapped`] if no sheet is tracked for `url`, or the
    /// call's error.
    pub async fn style_sheet_text(&self, url: &str) -> Result<String> {
        self.ensure_loaded()?;
        let header = self
            .style_for_url(url)
            .ok_or_else(|| Error::url_not_mapped(url))?;
        let result = self
            .ctx
            .inspector()
            .send(&Command::Css(CssCommand::GetStyleSheetText {
                style_sheet_id: header.style_sheet_id,
            }))
            .await?;
        Ok(result
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Replaces the live sheet for `doc` with the document's text.
    ///
    /// A document with no matching sheet is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotLoaded`] before `load()`, or the call's
    /// error.
    pub async fn reload_document(&self, doc: &dyn Document) -> Result<()> {
        self.set_text(&doc.url(), doc.text()).await
    }

    /// Empties the live sheet for a document that was deleted.
    ///
    /// # Errors
    ///
    /// Same as [`reload_document`](Self::reload_document).
    pub async fn reload_deleted_document(&self, doc: &dyn Document) -> Result<()> {
        self.set_text(&doc.url(), String::new()).await
    }

    async fn set_text(&self, url: &str, text: String) -> Result<()> {
        self.ensure_loaded()?;
        let Some(header) = self.style_for_url(url) else {
            error!(url = %url, "No style sheet loaded for document");
            return Ok(());
        };
        debug!(url = %url, style_sheet_id = %header.style_sheet_id, "Replacing style sheet text");
        self.ctx
            .inspector()
            .send(&Command::Css(CssCommand::SetStyleSheetText {
                style_sheet_id: header.style_sheet_id,
                text,
            }))
            .await
            .map(drop)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(Error::AgentNotLoaded { agent: "css" })
        }
    }
}

#[async_trait]
impl Agent for CssAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Css
    }

    async fn load(&self) -> Result<()> {
        let inspector = self.ctx.inspector();

        let sheets = Arc::clone(&self.sheets);
        let weak = inspector.downgrade();
        self.listeners
            .on(inspector, EventKind::PageLoadEventFired, move |_| {
                let (weak, sheets) = (weak.clone(), Arc::clone(&sheets));
                let ticket = sheets.ticket();
                tokio::spawn(async move {
                    if let Err(e) = fetch_all(weak, sheets, ticket).await {
                        warn!(error = %e, "Failed to refetch style sheets");
                    }
                });
            });

        let sheets = Arc::clone(&self.sheets);
        self.listeners
            .on(inspector, EventKind::CssStyleSheetAdded, move |event| {
                if let ParsedEvent::CssStyleSheetAdded { header } = event.parse() {
                    sheets.record(header);
                }
            });

        let sheets = Arc::clone(&self.sheets);
        self.listeners
            .on(inspector, EventKind::CssStyleSheetRemoved, move |event| {
                if let ParsedEvent::CssStyleSheetRemoved { style_sheet_id } = event.parse() {
                    sheets
                        .sheets
                        .lock()
                        .retain(|_, header| header.style_sheet_id != style_sheet_id);
                }
            });

        let loaded = async {
            inspector.send(&Command::Css(CssCommand::Enable)).await?;
            let ticket = self.sheets.ticket();
            fetch_all(inspector.downgrade(), Arc::clone(&self.sheets), ticket).await
        }
        .await;

        if let Err(e) = loaded {
            self.listeners.clear(inspector);
            self.sheets.invalidate();
            return Err(e);
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) {
        self.listeners.clear(self.ctx.inspector());
        self.sheets.invalidate();
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================
