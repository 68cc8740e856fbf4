// src/extract/early_stop.rs
// Early-stop scanner over a paged listing in descending recency order.
//
// Paging stops as soon as an item is BOTH older than the window floor AND
// already known. The double condition is deliberate: platform ordering is
// only approximately newest-first, so stopping on age alone (or on a known
// id alone) could cut off an out-of-order but still-new item. Worst-case
// page requests are O(new items + 1 page), independent of channel history.

use std::future::Future;

use anyhow::Result;

use crate::item::{RawItem, RunWindow};
use crate::state::KnownIdIndex;

/// Hard ceiling per source, a backstop against pathological non-monotonic
/// ordering where the stop condition never fires.
pub const MAX_PAGES_PER_SOURCE: usize = 10;

/// One page of a source listing.
pub struct Page {
    pub items: Vec<RawItem>,
    pub next_cursor: Option<String>,
}

/// Scan pages until the stop condition fires, the listing ends, or the page
/// ceiling is reached. Items outside the window that are *not* yet known are
/// skipped without stopping the scan.
pub async fn scan_paged<F, Fut>(
    mut fetch_page: F,
    window: &RunWindow,
    known: &KnownIdIndex,
) -> Result<Vec<RawItem>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page>>,
{
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES_PER_SOURCE {
        let page = fetch_page(cursor.take()).await?;
        let mut stop = false;

        for item in page.items {
            let old = window.is_before_floor(item.published_at);
            if old && known.contains(&item.canonical_id()) {
                stop = true;
                break;
            }
            if old {
                // Out-of-window but unknown: not ingested, not a stop signal.
                continue;
            }
            out.push(item);
        }

        if stop {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(out)
}
