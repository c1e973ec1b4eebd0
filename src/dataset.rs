// dataset.rs
//
// Resumable retrieval of one function's logged data over a time window.
// A DataSet is driven by repeated `load_more` calls: the first call
// downloads and parses the stream manifest and computes the per-stream
// previews plus the running summary; each following call detail-loads one
// stream (optionally prefetching a batch of upcoming streams in a single
// combined request) until `get_progress` reports 100.

use crate::constants::LOGGER_ENDPOINT;
use crate::error::{DatalogError, Result};
use crate::manifest::LogManifest;
use crate::stream::{split_row, DataStream};
use crate::transport::Transport;
use crate::types::Measure;
use tracing::{debug, warn};

pub struct DataSet {
    function_id: String,
    unit: String,
    /// Requested window in UTC milliseconds; 0 means unbounded on that
    /// side. Refined to the observed data extent after the first load.
    start_time_ms: i64,
    end_time_ms: i64,
    calibration: Vec<f64>,
    bulk_load: u32,
    streams: Vec<DataStream>,
    /// -1 = manifest not yet parsed, 0..N = index of the next stream to
    /// detail-load, N = done.
    progress: i32,
    preview: Vec<Measure>,
    measures: Vec<Measure>,
    summary: Measure,
}

impl DataSet {
    /// Creates a data set for `function_id` over `[start_time_ms,
    /// end_time_ms)`; either bound may be 0 for "unbounded". Nothing is
    /// downloaded until the first [`load_more`](Self::load_more).
    pub fn new(function_id: impl Into<String>, start_time_ms: i64, end_time_ms: i64) -> Self {
        Self {
            function_id: function_id.into(),
            unit: String::new(),
            start_time_ms,
            end_time_ms,
            calibration: Vec::new(),
            bulk_load: 0,
            streams: Vec::new(),
            progress: -1,
            preview: Vec::new(),
            measures: Vec::new(),
            summary: Measure::invalid(),
        }
    }

    pub fn get_function_id(&self) -> &str {
        &self.function_id
    }

    /// Sensor unit, known after the first load.
    pub fn get_unit(&self) -> &str {
        &self.unit
    }

    pub fn get_calibration(&self) -> &[f64] {
        &self.calibration
    }

    /// Effective window start in UTC seconds (0 while unbounded and not
    /// yet refined by the first load).
    pub fn get_start_time_utc(&self) -> i64 {
        self.start_time_ms / 1000
    }

    /// Effective window end in UTC seconds.
    pub fn get_end_time_utc(&self) -> i64 {
        self.end_time_ms / 1000
    }

    /// Summary measure over all previews; `Measure::invalid()` when the
    /// set holds no data.
    pub fn get_summary(&self) -> Measure {
        self.summary
    }

    /// One preview measure per stream, in stream order.
    pub fn get_preview(&self) -> &[Measure] {
        &self.preview
    }

    /// All detailed measures loaded so far, in stream order.
    pub fn get_measures(&self) -> &[Measure] {
        &self.measures
    }

    /// Loading progress percentage: 0 before the manifest is parsed, 100
    /// once every stream was detail-loaded, otherwise a value in [1, 99]
    /// that increases monotonically with the stream cursor.
    pub fn get_progress(&self) -> i32 {
        if self.progress < 0 {
            return 0;
        }
        let stream_count = self.streams.len() as i32;
        if self.progress >= stream_count {
            return 100;
        }
        (1 + (1 + self.progress) * 98) / (1 + stream_count)
    }

    /// Performs one loading step and returns the new progress percentage.
    /// A failed step is retried exactly once before the error propagates.
    pub async fn load_more<T: Transport>(&mut self, transport: &T) -> Result<i32> {
        match self.load_step(transport).await {
            Ok(pct) => Ok(pct),
            Err(first) => {
                warn!(error = %first, "load step failed, retrying once");
                self.load_step(transport).await
            }
        }
    }

    async fn load_step<T: Transport>(&mut self, transport: &T) -> Result<i32> {
        if self.progress < 0 {
            let data = transport.download(&self.manifest_url()).await?;
            self.parse(&data)?;
            self.aggregate(transport).await?;
            // the set only becomes loadable once previews exist; a failed
            // first step re-parses from scratch
            self.progress = 0;
            return Ok(self.get_progress());
        }

        let idx = self.progress as usize;
        if idx >= self.streams.len() {
            return Ok(100);
        }

        if !self.streams[idx].was_loaded() {
            if self.bulk_load > 1 {
                self.prefetch_bulk(idx, transport).await?;
            }
            if !self.streams[idx].was_loaded() {
                let data = transport.download(&self.streams[idx].url()).await?;
                self.streams[idx].parse_stream(&data)?;
            }
        }

        Ok(self.process_more(self.progress))
    }

    /// Converts the decoded rows of the stream at index `progress` into
    /// detailed measures and advances the cursor. A call whose `progress`
    /// does not match the current cursor is discarded, so a duplicated
    /// completion cannot append measures twice.
    pub fn process_more(&mut self, progress: i32) -> i32 {
        if progress < 0 || progress != self.progress {
            debug!(
                cursor = self.progress,
                reported = progress,
                "stale load result discarded"
            );
            return self.get_progress();
        }
        let idx = progress as usize;
        if idx >= self.streams.len() {
            return 100;
        }

        let detailed = measures_from_rows(
            &self.streams[idx],
            self.start_time_ms,
            self.end_time_ms,
            true,
        );
        debug!(stream = idx, measures = detailed.len(), "stream processed");
        self.measures.extend(detailed);
        self.progress += 1;
        self.get_progress()
    }

    /// Recomputes the detailed measures for the stream a preview `measure`
    /// was built from. Returns an empty list when no stream starts at the
    /// measure's start time. Unlike the detail loader, rows with a NaN
    /// average are kept.
    pub async fn get_measures_at<T: Transport>(
        &mut self,
        measure: &Measure,
        transport: &T,
    ) -> Result<Vec<Measure>> {
        let start_ms = (measure.get_start_time_utc() * 1000.0).round() as i64;
        let idx = match self
            .streams
            .iter()
            .position(|s| s.start_time_ms() == start_ms)
        {
            Some(idx) => idx,
            None => return Ok(Vec::new()),
        };

        if !self.streams[idx].was_loaded() {
            let data = transport.download(&self.streams[idx].url()).await?;
            self.streams[idx].parse_stream(&data)?;
        }

        Ok(measures_from_rows(
            &self.streams[idx],
            self.start_time_ms,
            self.end_time_ms,
            false,
        ))
    }

    fn manifest_url(&self) -> String {
        let mut url = format!("{}?id={}", LOGGER_ENDPOINT, self.function_id);
        if self.start_time_ms != 0 {
            url.push_str(&format!("&from={}", self.start_time_ms / 1000));
        }
        if self.end_time_ms != 0 {
            url.push_str(&format!("&to={}", self.end_time_ms / 1000));
        }
        url
    }

    /// Parses the manifest and rebuilds the stream list, keeping only
    /// streams whose extent intersects the requested window.
    fn parse(&mut self, data: &[u8]) -> Result<()> {
        if is_empty_object(data) {
            return Err(DatalogError::VersionMismatch);
        }
        let manifest: LogManifest = serde_json::from_slice(data)?;
        if manifest.id != self.function_id {
            warn!(
                requested = %self.function_id,
                reported = %manifest.id,
                "manifest reports a different function id"
            );
        }

        self.unit = manifest.unit.clone();
        self.bulk_load = manifest.bulk;
        self.calibration = manifest.calibration();
        self.streams = Vec::new();
        self.preview = Vec::new();
        self.measures = Vec::new();

        for entry in &manifest.streams {
            let stream = DataStream::new(&self.function_id, entry);
            let stream_start = stream.start_time_ms();
            let stream_end = stream_start + stream.duration_ms();
            let intersects = (self.end_time_ms == 0 || stream_start < self.end_time_ms)
                && (self.start_time_ms == 0 || stream_end > self.start_time_ms);
            if intersects {
                self.streams.push(stream);
            }
        }

        debug!(
            function = %self.function_id,
            streams = self.streams.len(),
            dropped = manifest.streams.len() - self.streams.len(),
            "manifest parsed"
        );
        Ok(())
    }

    /// Builds one preview measure per stream and folds them into the
    /// overall summary. Streams lying entirely inside the window use their
    /// reported summary directly; partially overlapping streams are
    /// downloaded and scanned row by row.
    async fn aggregate<T: Transport>(&mut self, transport: &T) -> Result<()> {
        let req_start = self.start_time_ms;
        let req_end = self.end_time_ms;

        let mut preview = Vec::with_capacity(self.streams.len());
        let mut glob_min = f64::INFINITY;
        let mut glob_max = f64::NEG_INFINITY;
        let mut glob_start_ms = i64::MAX;
        let mut glob_end_ms = i64::MIN;
        let mut total_avg = 0.0;
        let mut total_time_ms = 0.0;

        for stream in &mut self.streams {
            let stream_start = stream.start_time_ms();
            let stream_end = stream_start + stream.duration_ms();
            let inside = (req_start == 0 || stream_start >= req_start)
                && (req_end == 0 || stream_end <= req_end);

            let measure = if inside {
                // fast path: the stream's own reported summary is exact
                Measure::new(
                    stream_start as f64 / 1000.0,
                    stream_end as f64 / 1000.0,
                    stream.min_value(),
                    stream.avg_value(),
                    stream.max_value(),
                )
            } else {
                if !stream.was_loaded() {
                    let data = transport.download(&stream.url()).await?;
                    stream.parse_stream(&data)?;
                }
                preview_from_rows(stream, req_start, req_end)
            };

            // degenerate (inverted) previews carry no observed data and
            // are kept out of the global fold
            let dur_ms = (measure.get_end_time_utc() - measure.get_start_time_utc()) * 1000.0;
            if dur_ms > 0.0 && !measure.get_avg_value().is_nan() {
                total_avg += measure.get_avg_value() * dur_ms;
                total_time_ms += dur_ms;
                glob_min = glob_min.min(measure.get_min_value());
                glob_max = glob_max.max(measure.get_max_value());
                let m_start = (measure.get_start_time_utc() * 1000.0).round() as i64;
                let m_end = (measure.get_end_time_utc() * 1000.0).round() as i64;
                glob_start_ms = glob_start_ms.min(m_start);
                glob_end_ms = glob_end_ms.max(m_end);
            }
            preview.push(measure);
        }

        self.preview = preview;
        if total_time_ms > 0.0 {
            if self.start_time_ms == 0 {
                self.start_time_ms = glob_start_ms;
            }
            if self.end_time_ms == 0 {
                self.end_time_ms = glob_end_ms;
            }
            self.summary = Measure::new(
                glob_start_ms as f64 / 1000.0,
                glob_end_ms as f64 / 1000.0,
                glob_min,
                total_avg / total_time_ms,
                glob_max,
            );
            debug!(
                start_ms = glob_start_ms,
                end_ms = glob_end_ms,
                "summary computed"
            );
        } else {
            self.summary = Measure::invalid();
        }
        Ok(())
    }

    /// Issues one combined request for up to `bulk_load` consecutive
    /// not-yet-loaded streams sharing the current stream's base URL,
    /// starting with the current stream itself. Blobs that cannot be
    /// matched or decoded are skipped; those streams are fetched
    /// individually on their own turn.
    async fn prefetch_bulk<T: Transport>(&mut self, idx: usize, transport: &T) -> Result<()> {
        let base_url = self.streams[idx].base_url().to_string();
        let mut picks: Vec<(usize, String)> = Vec::new();
        for j in idx..self.streams.len() {
            if picks.len() >= self.bulk_load as usize {
                break;
            }
            let stream = &self.streams[j];
            if stream.base_url() != base_url || stream.was_loaded() {
                break;
            }
            picks.push((j, stream.url_suffix().to_string()));
        }
        if picks.len() < 2 {
            // nothing to combine; the caller falls back to a single fetch
            return Ok(());
        }

        let suffixes: Vec<&str> = picks.iter().map(|(_, s)| s.as_str()).collect();
        let url = format!("{}&utc={}", base_url, suffixes.join(","));
        debug!(streams = picks.len(), "bulk prefetch");

        let data = transport.download(&url).await?;
        let blocks: Vec<serde_json::Value> = serde_json::from_slice(&data).map_err(|_| {
            DatalogError::io_error("bulk response is not an array of stream blocks", "prefetch")
        })?;

        for (k, (j, suffix)) in picks.iter().enumerate() {
            let block = match blocks.get(k) {
                Some(block) => block,
                None => {
                    warn!(suffix = %suffix, "bulk response short, stream left unloaded");
                    continue;
                }
            };
            if let Err(e) = self.streams[*j].parse_block(block) {
                warn!(suffix = %suffix, error = %e, "bulk block undecodable, stream left unloaded");
            }
        }
        Ok(())
    }
}

/// Scans a partially overlapping stream's rows and condenses the portion
/// inside `[req_start, req_end)` into one preview measure. With no
/// contributing row the result is the degenerate inverted
/// `[stream end, stream start)` measure with average 0.
fn preview_from_rows(stream: &DataStream, req_start: i64, req_end: i64) -> Measure {
    let stream_start = stream.start_time_ms();
    let stream_end = stream_start + stream.duration_ms();
    let (fitv, itv) = row_intervals_ms(stream);

    let mut min_val = f64::INFINITY;
    let mut max_val = f64::NEG_INFINITY;
    let mut start_ms = stream_end;
    let mut end_ms = stream_start;
    let mut total_avg = 0.0;
    let mut total_time = 0.0;

    let mut tim = stream_start;
    for (i, row) in stream.data_rows().iter().enumerate() {
        let dt = if i == 0 { fitv } else { itv };
        let row_end = tim + dt;
        if row_end > req_start && (req_end == 0 || tim < req_end) {
            let (row_min, row_avg, row_max) = split_row(row);
            // every contributing row marks observed extent; only the
            // average accumulation skips NaN rows (f64::min/max already
            // ignore NaN operands)
            start_ms = start_ms.min(tim);
            end_ms = end_ms.max(row_end);
            min_val = min_val.min(row_min);
            max_val = max_val.max(row_max);
            if !row_avg.is_nan() {
                total_avg += row_avg * dt as f64;
                total_time += dt as f64;
            }
        }
        tim = row_end;
    }

    let avg = if total_time > 0.0 {
        total_avg / total_time
    } else {
        0.0
    };
    Measure::new(
        start_ms as f64 / 1000.0,
        end_ms as f64 / 1000.0,
        min_val,
        avg,
        max_val,
    )
}

/// Converts a loaded stream's rows into detailed measures for the rows
/// intersecting `[req_start, req_end)`. The first timestamp never starts
/// below one first-interval unit. `drop_nan_avg` selects the detail-load
/// behavior; the measure-window extractor keeps NaN rows.
fn measures_from_rows(
    stream: &DataStream,
    req_start: i64,
    req_end: i64,
    drop_nan_avg: bool,
) -> Vec<Measure> {
    let (fitv, itv) = row_intervals_ms(stream);
    let mut tim = stream.start_time_ms();
    if tim < fitv {
        tim = fitv;
    }

    let mut out = Vec::new();
    for (i, row) in stream.data_rows().iter().enumerate() {
        let dt = if i == 0 { fitv } else { itv };
        let row_end = tim + dt;
        if row_end > req_start && (req_end == 0 || tim < req_end) {
            let (row_min, row_avg, row_max) = split_row(row);
            if !drop_nan_avg || !row_avg.is_nan() {
                out.push(Measure::new(
                    tim as f64 / 1000.0,
                    row_end as f64 / 1000.0,
                    row_min,
                    row_avg,
                    row_max,
                ));
            }
        }
        tim = row_end;
    }
    out
}

/// Rounded (first, steady) row intervals in milliseconds; a zero first
/// interval falls back to the steady one.
fn row_intervals_ms(stream: &DataStream) -> (i64, i64) {
    let itv = (stream.sample_interval() * 1000.0).round() as i64;
    let mut fitv = (stream.first_sample_interval() * 1000.0).round() as i64;
    if fitv == 0 {
        fitv = itv;
    }
    (fitv, itv)
}

fn is_empty_object(data: &[u8]) -> bool {
    let trimmed = data
        .iter()
        .filter(|b| !b.is_ascii_whitespace())
        .copied()
        .collect::<Vec<u8>>();
    trimmed == b"{}"
}
