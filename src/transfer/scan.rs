use futures_util::Stream;
use futures_util::stream::try_unfold;
use tracing::debug;

use crate::error::Error;
use crate::store::{ContinuationToken, ScanPage, TableStore};

/// Lazy cursor over the pages of a table scan
///
/// Each call to [`next_page`](Scanner::next_page) issues one `Scan` request.
/// The cursor ends on the first page without a continuation token and keeps
/// returning `None` afterwards; a fresh scan needs a fresh `Scanner`.
#[derive(Debug)]
pub struct Scanner<'a, S: TableStore + ?Sized> {
    store: &'a S,
    table: String,
    page_size: usize,
    next: Option<ContinuationToken>,
    exhausted: bool,
    pages: usize,
}

impl<'a, S: TableStore + ?Sized> Scanner<'a, S> {
    /// Start a scan of `table`, requesting `page_size` items per page
    pub fn new(store: &'a S, table: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            table: table.into(),
            page_size: page_size.max(1),
            next: None,
            exhausted: false,
            pages: 0,
        }
    }

    /// Fetch the next page, `None` once the scan is complete
    ///
    /// A failed request leaves the cursor where it was, so the call can be
    /// repeated.
    pub async fn next_page(&mut self) -> Result<Option<ScanPage>, Error> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .store
            .scan(&self.table, self.page_size, self.next.clone())
            .await?;

        self.pages += 1;
        self.exhausted = page.is_last();
        self.next = page.next.clone();

        debug!(
            table = %self.table,
            page = self.pages,
            items = page.items.len(),
            last = self.exhausted,
            "Scanned page"
        );

        Ok(Some(page))
    }

    /// Whether the final page has been returned
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Turn the cursor into a stream of pages
    pub fn into_stream(self) -> impl Stream<Item = Result<ScanPage, Error>> + 'a {
        try_unfold(self, |mut scanner| async move {
            let page = scanner.next_page().await?;
            Ok::<_, Error>(page.map(|page| (page, scanner)))
        })
    }
}

/// Approximate item count of `table` as reported by `DescribeTable`
///
/// The store refreshes this figure periodically, so it may lag recent
/// writes. Only suitable for progress sizing and sanity checks.
pub async fn approximate_count<S>(store: &S, table: &str) -> Result<u64, Error>
where
    S: TableStore + ?Sized,
{
    Ok(store.describe_table(table).await?.item_count)
}
