//! Lazy traversal of paged listings.

use std::future::Future;

use async_stream::try_stream;
use futures::stream::Stream;
use tracing::debug;

use crate::error::Result;

/// One fetched page: its items and the URL of the next page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

/// Create a stream of items from a page-fetching function.
///
/// Starts at `first` and follows each page's `next` URL until a page has none.
/// Every item of a page is yielded before the next page is requested,
/// so nothing is fetched ahead of the consumer.
/// A failed fetch is yielded as the last element of the stream.
pub fn follow_next_links<T, Fut>(
    first: String,
    fetch: impl Fn(String) -> Fut,
) -> impl Stream<Item = Result<T>>
where
    Fut: Future<Output = Result<Page<T>>>,
{
    try_stream! {
        let mut next = Some(first);
        let mut page_number = 0;

        while let Some(url) = next.take() {
            page_number += 1;
            debug!(page_number, %url, "fetching page");
            let page = fetch(url).await?;

            next = page.next;
            for item in page.items {
                yield item;
            }
        }
    }
}
