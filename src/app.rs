use serde::Serialize;
use tracing::info;

use crate::domain::{DestinationPath, PageUrl, TransferTask};
use crate::error::SyncError;
use crate::http::PageSource;
use crate::links;
use crate::plan;
use crate::transfer::{self, ContentSource, ExecuteOptions, ObjectSink, ProgressSink, RunSummary};

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub page_url: PageUrl,
    pub destination: DestinationPath,
    pub options: ExecuteOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub page_url: String,
    pub destination: String,
    pub summary: RunSummary,
}

pub struct App<P: PageSource, C: ContentSource, S: ObjectSink> {
    pages: P,
    source: C,
    sink: S,
}

impl<P: PageSource, C: ContentSource, S: ObjectSink> App<P, C, S> {
    pub fn new(pages: P, source: C, sink: S) -> Self {
        Self {
            pages,
            source,
            sink,
        }
    }

    /// Fetches the listing page and derives one task per discovered link.
    pub fn plan(
        &self,
        page_url: &PageUrl,
        destination: &DestinationPath,
    ) -> Result<Vec<TransferTask>, SyncError> {
        let document = self.pages.fetch_page(page_url)?;
        let references = links::collect(&document, page_url.as_url());
        info!(url = %page_url, links = references.len(), "collected file links");
        Ok(plan::plan(&references, &destination.as_uri()))
    }

    /// Only a failure to fetch the listing page is an error; per-file
    /// failures are recorded in the returned summary.
    pub fn sync(
        &self,
        request: &SyncRequest,
        progress: &dyn ProgressSink,
    ) -> Result<SyncReport, SyncError> {
        info!(
            mode = %request.options.mode,
            url = %request.page_url,
            destination = %request.destination,
            "starting sync"
        );
        let tasks = self.plan(&request.page_url, &request.destination)?;
        let summary =
            transfer::execute_with(&tasks, &request.options, &self.source, &self.sink, progress);

        Ok(SyncReport {
            page_url: request.page_url.to_string(),
            destination: request.destination.as_uri(),
            summary,
        })
    }
}
