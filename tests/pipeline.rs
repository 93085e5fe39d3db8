//! Integration tests for the review pipeline.
//!
//! The scoring service and the PDF renderer are replaced by in-process fakes
//! injected through `ReviewConfig`, so these tests need no network access,
//! no API key and no pdfium library.

use async_trait::async_trait;
use futures::StreamExt;
use rubric_review::{
    parse_csv, read_csv_file, review_file, review_stream, review_sync, review_table,
    review_to_file, CancellationToken, Category, CategoryScore, ColumnMapping, NormalizeError,
    ProgressState, ReferenceNormalizer, ReviewConfig, ReviewError, ReviewProgressCallback,
    RowError, RowLimit, RubricResult, RubricScorer, RunStatus, ScoreError, Table,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Scores every image the same way; images whose reference contains `fail`
/// get a service error. Optionally cancels the run's token on its Nth call.
#[derive(Default)]
struct FakeScorer {
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, String)>>,
    cancel_on_call: Option<usize>,
}

impl FakeScorer {
    fn cancelling_on(call: usize) -> Self {
        Self {
            cancel_on_call: Some(call),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn poster_rubric() -> RubricResult {
    let mut rubric = RubricResult::default()
        .with(
            Category::CompositionLayout,
            CategoryScore::new(Some(8), Some("balanced")),
        )
        .with(Category::ColourUsage, CategoryScore::new(Some(6), Some("")));
    for c in &Category::ALL[2..] {
        rubric.set(*c, CategoryScore::new(Some(7), None));
    }
    rubric
}

#[async_trait]
impl RubricScorer for FakeScorer {
    async fn score(
        &self,
        image_url: &str,
        brief: &str,
        cancel: &CancellationToken,
    ) -> Result<RubricResult, ScoreError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen
            .lock()
            .unwrap()
            .push((image_url.to_string(), brief.to_string()));

        if self.cancel_on_call == Some(n) {
            cancel.cancel();
        }
        if image_url.contains("fail") {
            return Err(ScoreError::Api {
                status: 500,
                body: "upstream exploded".into(),
            });
        }
        Ok(poster_rubric())
    }
}

/// Turns `*.pdf` into a fixed data URL, except references containing `broken`.
struct FakeNormalizer;

#[async_trait]
impl ReferenceNormalizer for FakeNormalizer {
    async fn normalize(&self, reference: &str) -> Result<String, NormalizeError> {
        if !rubric_review::is_document_reference(reference) {
            return Ok(reference.to_string());
        }
        if reference.contains("broken") {
            return Err(NormalizeError::RenderFailed {
                reference: reference.to_string(),
                detail: "no pages".into(),
            });
        }
        Ok("data:image/png;base64,iVBORw0KGgo=".to_string())
    }
}

#[derive(Default)]
struct RecordingCallback {
    started: Mutex<Vec<usize>>,
    progress: Mutex<Vec<ProgressState>>,
    errors: Mutex<Vec<String>>,
    finished: Mutex<Option<(ProgressState, RunStatus)>>,
}

impl ReviewProgressCallback for RecordingCallback {
    fn on_run_start(&self, total_rows: usize) {
        self.started.lock().unwrap().push(total_rows);
    }
    fn on_row_complete(&self, progress: ProgressState, _total_score: Option<u32>) {
        self.progress.lock().unwrap().push(progress);
    }
    fn on_row_error(&self, progress: ProgressState, error: &str) {
        self.progress.lock().unwrap().push(progress);
        self.errors.lock().unwrap().push(error.to_string());
    }
    fn on_run_complete(&self, progress: ProgressState, status: RunStatus) {
        *self.finished.lock().unwrap() = Some((progress, status));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn sheet(csv: &str) -> Table {
    parse_csv(csv.as_bytes()).unwrap()
}

fn five_rows() -> Table {
    sheet(
        "image_url,brief\n\
         a.png,one\n\
         b.png,two\n\
         c.png,three\n\
         d.png,four\n\
         e.png,five\n",
    )
}

fn config_with(scorer: Arc<FakeScorer>) -> rubric_review::ReviewConfigBuilder {
    ReviewConfig::builder()
        .api_key("sk-test")
        .scorer(scorer)
        .normalizer(Arc::new(FakeNormalizer))
}

// ── Row limit ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn processes_min_of_limit_and_rows() {
    for (limit, expected) in [
        (RowLimit::First(3), 3),
        (RowLimit::First(5), 5),
        (RowLimit::First(50), 5),
        (RowLimit::All, 5),
    ] {
        let scorer = Arc::new(FakeScorer::default());
        let config = config_with(scorer.clone()).limit(limit).build().unwrap();

        let outcome = review_table(five_rows(), &config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), expected, "{limit:?}");
        assert_eq!(outcome.progress, ProgressState { done: expected, total: expected });
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.stats.input_rows, 5);
        assert_eq!(outcome.stats.selected_rows, expected);
        assert_eq!(scorer.calls(), expected);
    }
}

#[tokio::test]
async fn rows_are_processed_in_input_order() {
    let scorer = Arc::new(FakeScorer::default());
    let config = config_with(scorer.clone()).build().unwrap();

    let outcome = review_table(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap();

    let indices: Vec<usize> = outcome.rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, [0, 1, 2, 3, 4]);
    let seen = scorer.seen.lock().unwrap();
    assert_eq!(seen[0], ("a.png".to_string(), "one".to_string()));
    assert_eq!(seen[4], ("e.png".to_string(), "five".to_string()));
}

// ── Per-row outcomes ─────────────────────────────────────────────────────────

#[tokio::test]
async fn scored_row_matches_poster_scenario() {
    let scorer = Arc::new(FakeScorer::default());
    let config = config_with(scorer).build().unwrap();
    let table = sheet("image_url,brief\npic.jpg,poster for sale\n");

    let outcome = review_table(table, &config, CancellationToken::new())
        .await
        .unwrap();
    let row = &outcome.rows[0].row;

    assert_eq!(row.get("Review"), Some("Composition & Layout: balanced"));
    assert_eq!(row.get("Total Score"), Some("63"));
    assert_eq!(row.get("Average Score"), Some("7.00"));
    assert_eq!(row.get("Colour Usage Score"), Some("6"));
    assert_eq!(outcome.rows[0].total_score, Some(63));

    let keys: Vec<&str> = row.keys().collect();
    assert_eq!(&keys[..3], ["image_url", "brief", "Review"]);
    assert_eq!(keys[3], "Composition & Layout Score");
    assert_eq!(keys.last(), Some(&"Average Score"));
}

#[tokio::test]
async fn blank_image_reference_is_recorded_without_scoring() {
    let scorer = Arc::new(FakeScorer::default());
    let config = config_with(scorer.clone()).build().unwrap();
    let table = sheet("image_url,brief\na.png,x\n   ,y\nc.png,z\n");

    let outcome = review_table(table, &config, CancellationToken::new())
        .await
        .unwrap();

    let blank = &outcome.rows[1];
    assert_eq!(blank.error, Some(RowError::MissingImageUrl));
    assert_eq!(blank.row.get("error"), Some("Missing image URL"));
    assert!(!blank.row.contains_key("Review"));
    assert_eq!(outcome.progress.done, 3);
    assert_eq!(scorer.calls(), 2);
}

#[tokio::test]
async fn one_bad_row_does_not_stop_the_run() {
    let scorer = Arc::new(FakeScorer::default());
    let config = config_with(scorer.clone()).build().unwrap();
    let table = sheet(
        "image_url\n\
         ok.png\n\
         fail.png\n\
         broken.pdf\n\
         flyer.pdf\n",
    );

    let outcome = review_table(table, &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.stats.succeeded_rows, 2);
    assert_eq!(outcome.stats.failed_rows, 2);

    let service = &outcome.rows[1].row;
    assert_eq!(service.get("error"), Some("OpenAI error 500: upstream exploded"));
    assert_eq!(service.get("Review"), Some(""));

    let render = &outcome.rows[2].row;
    assert!(render
        .get("error")
        .unwrap()
        .starts_with("Failed to render PDF to image:"));
    assert_eq!(render.get("Review"), Some(""));

    assert!(outcome.rows[3].is_success());
    // broken.pdf never reached the scorer
    assert_eq!(scorer.calls(), 3);
    let seen = scorer.seen.lock().unwrap();
    assert!(seen[2].0.starts_with("data:image/png;base64,"));
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_after_second_row_keeps_two_results() {
    let scorer = Arc::new(FakeScorer::cancelling_on(2));
    let config = config_with(scorer.clone()).build().unwrap();

    let outcome = review_table(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(outcome.progress, ProgressState { done: 2, total: 5 });
    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert!(outcome.was_cancelled());
    assert_eq!(scorer.calls(), 2);
}

#[tokio::test]
async fn cancel_during_last_row_still_completes() {
    let scorer = Arc::new(FakeScorer::cancelling_on(5));
    let config = config_with(scorer).build().unwrap();

    let outcome = review_table(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.rows.len(), 5);
    assert_eq!(outcome.status, RunStatus::Completed);
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_image_column_never_starts() {
    let scorer = Arc::new(FakeScorer::default());
    let callback = Arc::new(RecordingCallback::default());
    let config = config_with(scorer.clone())
        .columns(ColumnMapping::new("image"))
        .progress_callback(callback.clone())
        .build()
        .unwrap();

    let err = review_table(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(err, ReviewError::InvalidImageColumn { ref column, .. } if column == "image"));
    assert_eq!(scorer.calls(), 0);
    assert!(callback.started.lock().unwrap().is_empty());
}

#[tokio::test]
async fn credential_is_checked_before_everything_else() {
    let scorer = Arc::new(FakeScorer::default());
    let config = ReviewConfig::builder()
        .scorer(scorer.clone())
        .columns(ColumnMapping::new("nope"))
        .build()
        .unwrap();

    let err = review_table(sheet("image_url\n"), &config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::MissingApiKey));

    let config = config_with(scorer.clone()).build().unwrap();
    let err = review_table(sheet("image_url\n"), &config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::EmptyInput));

    let config = config_with(scorer.clone())
        .limit(RowLimit::First(0))
        .build()
        .unwrap();
    let err = review_table(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::InvalidLimit { requested: 0 }));
    assert_eq!(scorer.calls(), 0);
}

// ── Progress callbacks ───────────────────────────────────────────────────────

#[tokio::test]
async fn progress_is_reported_after_every_row() {
    let callback = Arc::new(RecordingCallback::default());
    let config = config_with(Arc::new(FakeScorer::default()))
        .limit(RowLimit::First(4))
        .progress_callback(callback.clone())
        .build()
        .unwrap();
    let table = sheet("image_url\na.png\nfail.png\n\nc.png\n,\ne.png\n");

    review_table(table, &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*callback.started.lock().unwrap(), [4]);
    let done: Vec<usize> = callback.progress.lock().unwrap().iter().map(|p| p.done).collect();
    assert_eq!(done, [1, 2, 3, 4]);
    assert!(callback.progress.lock().unwrap().iter().all(|p| p.total == 4));
    assert_eq!(
        *callback.errors.lock().unwrap(),
        ["OpenAI error 500: upstream exploded", "Missing image URL"]
    );
    assert_eq!(
        *callback.finished.lock().unwrap(),
        Some((ProgressState { done: 4, total: 4 }, RunStatus::Completed))
    );
}

// ── Streaming API ────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_one_event_per_row() {
    let config = config_with(Arc::new(FakeScorer::default())).build().unwrap();
    let stream = review_stream(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stream.limit(), 5);

    let events: Vec<_> = stream.collect().await;
    let done: Vec<usize> = events.iter().map(|e| e.progress.done).collect();
    assert_eq!(done, [1, 2, 3, 4, 5]);
    assert!(events.iter().all(|e| e.result.is_success()));
}

#[tokio::test]
async fn consumer_can_cancel_between_rows() {
    let scorer = Arc::new(FakeScorer::default());
    let config = config_with(scorer.clone()).build().unwrap();
    let cancel = CancellationToken::new();
    let mut stream = review_stream(five_rows(), &config, cancel.clone())
        .await
        .unwrap();

    let first = stream.next().await.unwrap();
    assert_eq!(first.progress, ProgressState { done: 1, total: 5 });
    cancel.cancel();

    assert!(stream.next().await.is_none());
    assert_eq!(scorer.calls(), 1);
}

#[tokio::test]
async fn stream_does_nothing_until_polled() {
    let scorer = Arc::new(FakeScorer::default());
    let config = config_with(scorer.clone()).build().unwrap();
    let stream = review_stream(five_rows(), &config, CancellationToken::new())
        .await
        .unwrap();
    drop(stream);
    assert_eq!(scorer.calls(), 0);
}

// ── Lenient rubric parsing ───────────────────────────────────────────────────

/// Collects formatted log lines so a test can assert on them.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn invalid_rubric_fields_are_dropped_with_a_warning() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let content = r#"{
        "typography": {"score": 14, "notes": "tight kerning"},
        "creativity": {"score": 8, "notes": 42},
        "colourUsage": "great"
    }"#;
    let rubric = tracing::subscriber::with_default(subscriber, || {
        RubricResult::from_json_str(content).unwrap()
    });

    assert_eq!(
        rubric.get(Category::Typography),
        &CategoryScore::new(None, Some("tight kerning"))
    );
    assert_eq!(
        rubric.get(Category::Creativity),
        &CategoryScore::new(Some(8), None)
    );
    assert_eq!(rubric.get(Category::ColourUsage), &CategoryScore::default());

    let logs = logs.contents();
    assert_eq!(logs.matches("WARN").count(), 3, "{logs}");
    assert!(logs.contains("'typography' has invalid score 14"), "{logs}");
    assert!(logs.contains("'creativity' has non-text notes (a number)"), "{logs}");
    assert!(logs.contains("'colourUsage' is a string instead of an object"), "{logs}");
}

// ── Files ────────────────────────────────────────────────────────────────────

fn write_input(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("input.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn export_round_trips_through_the_csv_reader() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        &dir,
        "image_url,brief\n\
         a.png,\"Sale, 50% off\"\n\
         b.png,\"He said \"\"bold\"\"\nsecond line\"\n",
    );
    let output = dir.path().join("out").join("results.csv");
    let config = config_with(Arc::new(FakeScorer::default())).build().unwrap();

    let outcome = review_to_file(&input, &output, &config, CancellationToken::new())
        .await
        .unwrap();

    let reread = read_csv_file(&output).unwrap();
    assert_eq!(reread.rows, outcome.output_rows());
    assert_eq!(reread.rows[0].get("brief"), Some("Sale, 50% off"));
    assert_eq!(
        reread.rows[1].get("brief"),
        Some("He said \"bold\"\nsecond line")
    );
    assert_eq!(&reread.fields[..3], ["image_url", "brief", "Review"]);
}

#[tokio::test]
async fn export_header_accumulates_across_rows() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("results.csv");
    let config = config_with(Arc::new(FakeScorer::default())).build().unwrap();

    // The first row only gains `error`; the scored second row adds the rest.
    let input = write_input(&dir, "image_url\n\" \"\nb.png\n");
    let outcome = review_to_file(&input, &output, &config, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.rows.len(), 2);

    let text = std::fs::read_to_string(&output).unwrap();
    let header = text.lines().next().unwrap();
    assert!(header.starts_with("image_url,error,Review,Composition & Layout Score"));
    assert!(header.ends_with("Total Score,Average Score"));
}

#[tokio::test]
async fn review_file_reports_unreadable_input() {
    let config = config_with(Arc::new(FakeScorer::default())).build().unwrap();
    let err = review_file("/no/such/sheet.csv", &config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::CsvRead { .. }));
    assert!(!err.is_validation());
}

#[test]
fn sync_wrapper_runs_a_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, "image_url,brief\na.png,x\nb.png,y\n");
    let config = config_with(Arc::new(FakeScorer::default())).build().unwrap();

    let outcome = review_sync(&input, &config).unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.rows.len(), 2);
}
