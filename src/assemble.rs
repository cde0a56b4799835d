//! Document stage: join embedding and analysis records into index documents

use crate::config::DocumentSettings;
use crate::error::Result;
use crate::metrics::{BatchStats, BatchSummary, ItemOutcome};
use crate::models::{timestamp_now, OpenSearchDocument, VideoAnalysis, VideoEmbeddings};
use crate::poller::{ensure_not_cancelled, CancelSignal};
use crate::store::{self, has_extension, RECORD_EXTENSION};
use tracing::info;

pub struct DocumentAssembler {
    settings: DocumentSettings,
    cancel: Option<CancelSignal>,
}

impl DocumentAssembler {
    pub fn new(settings: DocumentSettings) -> Self {
        Self {
            settings,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Assemble one document per analysis record. A missing embeddings
    /// counterpart ends the run with `NotFound`.
    pub async fn run(&self) -> Result<BatchSummary> {
        let mut stats = BatchStats::new("documents");

        for file_name in store::list_file_names(&self.settings.analyses_dir).await? {
            if !has_extension(&file_name, RECORD_EXTENSION) {
                info!("Skipping {}, not a JSON file", file_name);
                continue;
            }
            ensure_not_cancelled(&self.cancel, &file_name)?;
            self.assemble(&file_name).await?;
            stats.record(ItemOutcome::Written);
        }

        Ok(stats.finish())
    }

    /// Load, merge and write the document for one record file name.
    pub async fn assemble(&self, file_name: &str) -> Result<OpenSearchDocument> {
        info!("Generating OpenSearch document for: {}", file_name);

        let embeddings: VideoEmbeddings =
            store::read_record(&self.settings.embeddings_dir.join(file_name)).await?;
        embeddings.validate()?;
        let analysis: VideoAnalysis =
            store::read_record(&self.settings.analyses_dir.join(file_name)).await?;
        analysis.validate()?;

        let document = OpenSearchDocument::merge(embeddings, analysis, timestamp_now())?;

        let output = self.settings.documents_dir.join(file_name);
        store::write_record(&output, &document).await?;
        info!("OpenSearch document written to: {}", output.display());
        Ok(document)
    }
}
