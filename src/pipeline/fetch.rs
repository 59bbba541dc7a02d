//! Abstract listing source
//!
//! The upstream API (auth, HTTP, rate limits) stays behind the
//! [`ListingSource`] trait: the pipeline only ever sees pages of raw
//! records and an opaque cursor. The shipped implementation reads JSONL
//! drop files written by the out-of-band fetcher, one file per
//! organization, paged by line offset.

use super::types::RawListingRecord;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// One page of raw records plus the cursor for the next page.
///
/// `next_cursor = None` means the source is exhausted for this sync.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub records: Vec<RawListingRecord>,
    pub next_cursor: Option<String>,
}

/// Paginated provider of raw adoption records for one organization.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the page at `cursor` (`None` = first page).
    async fn fetch_page(
        &self,
        organization_id: &str,
        cursor: Option<String>,
    ) -> Result<ListingPage, Box<dyn std::error::Error>>;
}

/// JSONL drop-file source.
///
/// Expects `<drop_dir>/<organization_id>.jsonl` with one raw record per
/// line. The cursor is the line offset of the next unread line, so a
/// restarted sync resumes exactly where the previous page ended. Lines
/// that are not valid JSON become empty records and surface through the
/// reconciler's failure list rather than vanishing.
pub struct JsonlListingSource {
    drop_dir: PathBuf,
    page_size: usize,
}

impl JsonlListingSource {
    pub fn new(drop_dir: impl AsRef<Path>, page_size: usize) -> Self {
        Self {
            drop_dir: drop_dir.as_ref().to_path_buf(),
            page_size: page_size.max(1),
        }
    }

    fn file_for(&self, organization_id: &str) -> PathBuf {
        self.drop_dir.join(format!("{}.jsonl", organization_id))
    }
}

#[async_trait]
impl ListingSource for JsonlListingSource {
    async fn fetch_page(
        &self,
        organization_id: &str,
        cursor: Option<String>,
    ) -> Result<ListingPage, Box<dyn std::error::Error>> {
        let path = self.file_for(organization_id);

        if !path.exists() {
            log::debug!("No drop file for {}: {}", organization_id, path.display());
            return Ok(ListingPage {
                records: Vec::new(),
                next_cursor: None,
            });
        }

        let offset: usize = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| format!("invalid cursor '{}' for {}", c, organization_id))?,
            None => 0,
        };

        let content = fs::read_to_string(&path)?;
        let mut records = Vec::new();
        let mut consumed = 0;
        let mut exhausted = true;

        for (line_no, line) in content.lines().enumerate().skip(offset) {
            if consumed == self.page_size {
                exhausted = false;
                break;
            }
            if line.trim().is_empty() {
                consumed += 1;
                continue;
            }

            let record = match serde_json::from_str::<RawListingRecord>(line) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!(
                        "⚠️  Unparseable line {} in {}: {}",
                        line_no + 1,
                        path.display(),
                        e
                    );
                    RawListingRecord::default()
                }
            };
            records.push(record);
            consumed += 1;
        }

        let next_cursor = if exhausted {
            None
        } else {
            Some((offset + consumed).to_string())
        };

        Ok(ListingPage {
            records,
            next_cursor,
        })
    }
}
