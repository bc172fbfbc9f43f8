use std::{path::PathBuf, time::SystemTime};

use futures::Stream;
use time::OffsetDateTime;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use super::record::TopicRecord;
use crate::pipeline::{Envelope, PipelineError, Source, TopicMessage};

/// Replays an NDJSON file of topic records, one record per line.
///
/// Lines that are not records are reported upstream and skipped; an I/O
/// failure ends the stream.
pub struct NdjsonReplaySource {
    path: PathBuf,
}

impl NdjsonReplaySource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<TopicMessage> for NdjsonReplaySource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<TopicMessage>, PipelineError>> + Send>> {
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = File::open(&path).await;
            if let Err(e) = &file {
                yield Err(PipelineError::Source(format!("failed to open replay file: {e}")));
            }

            if let Ok(file) = file {
                let mut lines = BufReader::new(file).lines();
                let mut line_no: u64 = 0;

                loop {
                    let line = match lines.next_line().await {
                        Ok(Some(line)) => line,
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(PipelineError::Source(format!("failed to read replay line: {e}")));
                            break;
                        }
                    };
                    line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<TopicRecord>(&line) {
                        Ok(record) => yield Ok(Envelope {
                            payload: record.into_message(OffsetDateTime::now_utc()),
                            received_at: SystemTime::now(),
                        }),
                        Err(e) => {
                            metrics::counter!("replay_parse_errors_total").increment(1);
                            yield Err(PipelineError::Source(format!("line {line_no}: not a topic record: {e}")));
                        }
                    }
                }
            }
        };

        Box::pin(s)
    }
}
