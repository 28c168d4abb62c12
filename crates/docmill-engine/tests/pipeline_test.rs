//! End-to-end pipeline tests through the orchestrator: plain-text inputs
//! exercise classification, extraction, normalization, chunking, and
//! statistics without any external converter tools.

use std::sync::Arc;

use docmill_engine::{
    standard_registry, ApiKeyRecord, ChunkStrategy, ConversionOptions, ConversionRequest,
    ConversionWorker, HeuristicTokenizer, JobState, MemoryJobStore, Orchestrator,
    OrchestratorConfig, RateLimiter, WorkerConfig, WorkerEvent,
};

fn orchestrator() -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        Arc::new(standard_registry()),
        Arc::new(MemoryJobStore::new()),
        Arc::new(RateLimiter::new()),
        Arc::new(HeuristicTokenizer),
        OrchestratorConfig::default(),
    ))
}

fn text_request(data: &str, options: ConversionOptions) -> ConversionRequest {
    ConversionRequest {
        api_key: ApiKeyRecord::default(),
        filename: "input.txt".to_string(),
        declared_mime: "text/plain".to_string(),
        data: data.as_bytes().to_vec(),
        options,
    }
}

#[tokio::test]
async fn test_scenario_single_page_250_words_no_chunking() {
    // 250 words of plain text, strategy `none`: exactly 1 chunk, 1 page,
    // 250 words.
    let words: Vec<String> = (0..250).map(|i| format!("word{}", i)).collect();
    let text = words.join(" ");

    let options = ConversionOptions {
        chunk_strategy: ChunkStrategy::None,
        ..Default::default()
    };
    let job = orchestrator()
        .convert_sync(text_request(&text, options))
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Completed);
    let output = job.output.unwrap();
    assert_eq!(output.stats.total_pages, 1);
    assert_eq!(output.stats.total_words, 250);
    assert_eq!(output.stats.total_chunks, 1);
    assert_eq!(output.chunks[0].text, text);
    assert_eq!(output.chunks[0].source_pages, vec![1]);
}

#[tokio::test]
async fn test_scenario_fixed_2400_chars_three_overlapping_chunks() {
    // 2400 characters, fixed 1000/100: chunks at [0,1000), [900,1900),
    // [1800,2400), each successive pair sharing exactly 100 characters.
    let text: String = ('a'..='x').cycle().take(2400).collect();

    let options = ConversionOptions {
        chunk_strategy: ChunkStrategy::Fixed,
        chunk_size: 1000,
        chunk_overlap: 100,
        ..Default::default()
    };
    let job = orchestrator()
        .convert_sync(text_request(&text, options))
        .await
        .unwrap();

    let output = job.output.unwrap();
    assert_eq!(output.stats.total_chunks, 3);

    let chars: Vec<char> = text.chars().collect();
    let slice = |range: std::ops::Range<usize>| -> String { chars[range].iter().collect() };
    assert_eq!(output.chunks[0].text, slice(0..1000));
    assert_eq!(output.chunks[1].text, slice(900..1900));
    assert_eq!(output.chunks[2].text, slice(1800..2400));

    for pair in output.chunks.windows(2) {
        let tail: String = pair[0]
            .text
            .chars()
            .skip(pair[0].text.chars().count() - 100)
            .collect();
        let head: String = pair[1].text.chars().take(100).collect();
        assert_eq!(tail, head, "adjacent chunks must share exactly the overlap");
    }
}

#[tokio::test]
async fn test_scenario_unlisted_extension_no_job_no_quota() {
    // A `.xyz` upload is rejected before admission: UNSUPPORTED_FORMAT,
    // no job record, no quota consumed.
    let orch = orchestrator();
    let req = ConversionRequest {
        api_key: ApiKeyRecord::default(),
        filename: "mystery.xyz".to_string(),
        declared_mime: "application/octet-stream".to_string(),
        data: b"????".to_vec(),
        options: ConversionOptions::default(),
    };

    let err = orch.convert_sync(req).await.unwrap_err();
    assert_eq!(err.code(), "UNSUPPORTED_FORMAT");
    assert_eq!(orch.limiter().tracked_keys(), 0);
}

#[tokio::test]
async fn test_scenario_61st_request_in_minute_rejected() {
    // rpm=60: the 61st request in one minute window is rejected with
    // retry_after ≤ 60 and the 60 prior successes are unaffected.
    let orch = orchestrator();
    let key = ApiKeyRecord {
        id: "rpm-key".to_string(),
        rpm: 60,
        rpd: 1000,
    };

    let mut completed = Vec::new();
    for _ in 0..60 {
        let mut req = text_request("hello world", ConversionOptions::default());
        req.api_key = key.clone();
        let job = orch.convert_sync(req).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        completed.push(job.id);
    }

    let mut req = text_request("hello world", ConversionOptions::default());
    req.api_key = key.clone();
    let err = orch.convert_sync(req).await.unwrap_err();
    assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");
    assert!(err.retry_after().unwrap() <= 60);

    // Prior jobs remain completed and queryable
    for id in completed {
        let job = orch.store().get(id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }
}

#[tokio::test]
async fn test_semantic_markdown_document() {
    let text = "# Title\n\nIntro paragraph with some words.\n\n## Details\n\nBody paragraph one.\n\nBody paragraph two.";
    let options = ConversionOptions {
        chunk_strategy: ChunkStrategy::Semantic,
        ..Default::default()
    };
    let job = orchestrator()
        .convert_sync(text_request(text, options))
        .await
        .unwrap();

    let output = job.output.unwrap();
    // Heading transitions force chunk boundaries
    assert!(output.stats.total_chunks >= 2);
    assert!(output.chunks[0].text.starts_with("Title"));
    // Statistics consistency
    let token_sum: usize = output.chunks.iter().map(|c| c.token_count).sum();
    assert_eq!(output.stats.total_tokens, token_sum);
    let word_sum: usize = output.pages.iter().map(|p| p.word_count).sum();
    assert_eq!(output.stats.total_words, word_sum);
}

#[tokio::test]
async fn test_structured_csv_through_pipeline_isolates_table() {
    let orch = orchestrator();
    let req = ConversionRequest {
        api_key: ApiKeyRecord::default(),
        filename: "people.csv".to_string(),
        declared_mime: "text/csv".to_string(),
        data: b"name,age\nAlice,30\nBob,25\n".to_vec(),
        options: ConversionOptions {
            chunk_strategy: ChunkStrategy::Semantic,
            ..Default::default()
        },
    };
    let job = orch.convert_sync(req).await.unwrap();
    let output = job.output.unwrap();

    // The table is the page's only element, isolated into its own chunk
    assert_eq!(output.stats.total_chunks, 1);
    assert!(output.chunks[0].text.contains("Alice"));
    assert!(output.pages[0].elements[0].cells.is_some());
}

#[tokio::test]
async fn test_extract_tables_false_demotes_cells() {
    let orch = orchestrator();
    let req = ConversionRequest {
        api_key: ApiKeyRecord::default(),
        filename: "people.csv".to_string(),
        declared_mime: "text/csv".to_string(),
        data: b"name,age\nAlice,30\n".to_vec(),
        options: ConversionOptions {
            extract_tables: false,
            ..Default::default()
        },
    };
    let job = orch.convert_sync(req).await.unwrap();
    let output = job.output.unwrap();
    assert!(output.pages[0].elements[0].cells.is_none());
    assert!(output.pages[0].text.contains("Alice"));
}

#[tokio::test]
async fn test_async_path_through_worker() {
    let orch = orchestrator();
    let worker = ConversionWorker::new(orch.clone(), WorkerConfig::default());
    let handle = worker.start();
    let mut events = handle.events();

    let job = orch
        .submit(text_request(
            "background conversion input",
            ConversionOptions::default(),
        ))
        .await
        .unwrap();
    assert_eq!(job.state, JobState::Submitted);

    handle.submitter().submit(job.id).await.unwrap();

    // Wait for the completion event for this job
    let mut completed = false;
    for _ in 0..32 {
        match tokio::time::timeout(std::time::Duration::from_secs(5), events.recv()).await {
            Ok(Ok(WorkerEvent::JobCompleted { job_id })) if job_id == job.id => {
                completed = true;
                break;
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    assert!(completed, "worker should emit JobCompleted");

    let finished = orch.store().get(job.id).await.unwrap().unwrap();
    assert_eq!(finished.state, JobState::Completed);
    assert!(finished.output.is_some());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_conversions_for_different_documents_run_in_parallel() {
    let orch = orchestrator();
    let mut handles = Vec::new();
    for i in 0..8 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let text = format!("document number {} body text", i);
            orch.convert_sync(text_request(&text, ConversionOptions::default()))
                .await
        }));
    }
    for handle in handles {
        let job = handle.await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
    }
}

#[tokio::test]
async fn test_processing_time_is_recorded() {
    let job = orchestrator()
        .convert_sync(text_request("quick", ConversionOptions::default()))
        .await
        .unwrap();
    let stats = job.output.unwrap().stats;
    // Wall-clock elapsed is injected by the orchestrator; sub-second here
    assert!(stats.processing_ms < 60_000);
}
