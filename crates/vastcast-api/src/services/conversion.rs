//! VAST to CTV video conversion pipeline.
//!
//! Strictly sequential per request: load the VAST text, extract the
//! manifest, derive the brand, resolve the clickthrough, plan the
//! composition, generate the QR code and render. Every step before the
//! render is a local early return; the render maps its terminal state onto
//! a [`PipelineError`].

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::Instrument;

use vastcast_media::{
    generate_qr_code, plan_composition, CompositionLayout, CompositionPlan, CompositionText,
    EngineLocation, RenderExecutor, RenderInputs, RenderJob, RenderOutcome,
};
use vastcast_models::{AdManifest, ArtifactNames, BrandName, BrandRule, ResolvedDestination};
use vastcast_resolver::ClickthroughResolver;
use vastcast_vast::{extract_manifest, VastFetcher, VastSource};

use crate::config::ConversionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{conversion_span, record_job_id, ConversionLogger};
use crate::metrics;
use crate::security::{guarded_vast_fetcher, validate_vast_url};

/// Everything known about a conversion before the encoder runs.
#[derive(Debug, Clone)]
pub struct PreparedConversion {
    pub names: ArtifactNames,
    pub manifest: AdManifest,
    pub brand: BrandName,
    pub brand_rule: BrandRule,
    pub destination: ResolvedDestination,
    /// Destination as drawn on screen
    pub display_url: String,
    pub plan: CompositionPlan,
}

/// A finished conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub prepared: PreparedConversion,
    pub qr_code_path: PathBuf,
    pub video_path: PathBuf,
    pub log_path: PathBuf,
    pub render_elapsed: Duration,
}

/// Runs conversions against a fixed encoder and configuration.
#[derive(Clone)]
pub struct ConversionPipeline {
    config: ConversionConfig,
    fetcher: VastFetcher,
    resolver: ClickthroughResolver,
    executor: RenderExecutor,
    layout: CompositionLayout,
}

impl ConversionPipeline {
    pub fn new(
        config: ConversionConfig,
        fetcher: VastFetcher,
        resolver: ClickthroughResolver,
        executor: RenderExecutor,
    ) -> Self {
        Self {
            config,
            fetcher,
            resolver,
            executor,
            layout: CompositionLayout::default(),
        }
    }

    /// Build the production pipeline: HTTP fetcher and resolver, plus an
    /// encoder located once here.
    pub fn from_config(config: ConversionConfig) -> PipelineResult<Self> {
        let engine = EngineLocation::discover(config.ffmpeg_path.clone());
        let fetcher = guarded_vast_fetcher(config.fetch_timeout)?;
        let resolver = ClickthroughResolver::http(config.resolve_timeout, config.max_redirects)
            .map_err(|e| PipelineError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(config, fetcher, resolver, RenderExecutor::new(engine)))
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn engine(&self) -> &EngineLocation {
        self.executor.engine()
    }

    /// Produce the VAST text for a source. Remote URLs are validated first.
    pub async fn load(&self, source: VastSource) -> PipelineResult<String> {
        if let VastSource::Remote(url) = &source {
            validate_vast_url(url)
                .into_result()
                .map_err(PipelineError::InvalidInput)?;
        }
        Ok(source.load(&self.fetcher).await?)
    }

    /// Extract, derive, resolve and plan. No files are written.
    pub async fn prepare(&self, xml: &str) -> PipelineResult<PreparedConversion> {
        let manifest = extract_manifest(xml)?;
        let (brand, brand_rule) = BrandName::derive(&manifest.title);
        let names = ArtifactNames::generate(&brand);
        record_job_id(&names.job_id);
        let logger = ConversionLogger::new(&names.job_id, "prepare");

        logger.log_progress(&format!("brand '{brand}' from rule {brand_rule}"));

        let destination = self.resolver.resolve(&manifest.raw_clickthrough_url).await;
        if destination.is_resolved() {
            metrics::record_resolution("resolved");
        } else {
            metrics::record_resolution("degraded");
            logger.log_warning("clickthrough not resolved past the raw URL");
        }

        let text = CompositionText::new(brand.as_str(), destination.display_source())
            .with_cta(self.config.cta_text.clone())
            .with_font(self.config.font.clone());
        let plan = plan_composition(&text, &self.layout);
        let display_url = vastcast_media::display_url(destination.display_source());

        Ok(PreparedConversion {
            names,
            manifest,
            brand,
            brand_rule,
            destination,
            display_url,
            plan,
        })
    }

    /// Write the QR code and run the encoder.
    pub async fn render(&self, prepared: PreparedConversion) -> PipelineResult<ConversionOutput> {
        let logger = ConversionLogger::new(&prepared.names.job_id, "render");
        let output_dir = &self.config.output_dir;
        tokio::fs::create_dir_all(output_dir).await?;

        if tokio::fs::metadata(&self.config.background_image).await.is_err() {
            return Err(PipelineError::internal(format!(
                "background image not found: {}",
                self.config.background_image.display()
            )));
        }

        let qr_code_path = generate_qr_code(
            &prepared.manifest.raw_clickthrough_url,
            output_dir.join(&prepared.names.qr_code),
        )
        .await?;
        logger.log_progress(&format!("QR code written to {}", qr_code_path.display()));

        let inputs = RenderInputs {
            background: self.config.background_image.clone(),
            qr_code: qr_code_path.clone(),
            ad_video: prepared.manifest.media_file_url.clone(),
        };
        let job = RenderJob::composition(
            &inputs,
            &prepared.plan,
            &self.config.encoding,
            output_dir.join(&prepared.names.video),
            output_dir.join(&prepared.names.log),
        )
        .with_timeout(self.config.render_timeout);

        let started = Instant::now();
        let outcome = self.executor.execute(&job).await;
        let elapsed = started.elapsed();
        metrics::record_render(outcome.state().as_str(), elapsed.as_secs_f64());

        match outcome {
            RenderOutcome::Succeeded {
                output_path,
                log_path,
                elapsed,
            } => Ok(ConversionOutput {
                prepared,
                qr_code_path,
                video_path: output_path,
                log_path,
                render_elapsed: elapsed,
            }),
            RenderOutcome::Failed {
                reason,
                exit_code,
                diagnostics,
                ..
            } => {
                logger.log_error(&format!("{reason} (exit code {exit_code:?})"));
                Err(PipelineError::EncodeFailed {
                    reason: reason.to_string(),
                    exit_code,
                    diagnostics: diagnostics.excerpt(),
                })
            }
            RenderOutcome::TimedOut {
                timeout,
                diagnostics,
                ..
            } => {
                logger.log_error(&format!("timed out after {}s", timeout.as_secs()));
                Err(PipelineError::EncodeTimedOut {
                    timeout_secs: timeout.as_secs(),
                    diagnostics: diagnostics.excerpt(),
                })
            }
            RenderOutcome::EngineUnavailable { reason, .. } => {
                logger.log_error(&reason);
                Err(PipelineError::EngineUnavailable(reason))
            }
        }
    }

    /// Run a full conversion inside one `conversion` span.
    pub async fn convert(&self, source: VastSource) -> PipelineResult<ConversionOutput> {
        let span = conversion_span(source.kind());
        async move {
            let xml = self.load(source).await?;
            let prepared = self.prepare(&xml).await?;

            let logger = ConversionLogger::new(&prepared.names.job_id, "convert");
            logger.log_start(&format!("title='{}'", prepared.manifest.title));
            let output = self.render(prepared).await?;
            logger.log_completion(&format!(
                "{} in {}ms",
                output.video_path.display(),
                output.render_elapsed.as_millis()
            ));
            Ok(output)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;
    use vastcast_media::FilterOp;
    use vastcast_resolver::{RedirectFollower, Resolution};
    use vastcast_vast::DEFAULT_FETCH_TIMEOUT;

    const VAST: &str = r#"<VAST version="3.0"><Ad><InLine>
        <AdTitle>250415_OMD_The Home Depot_HD Home Awareness Q2'25</AdTitle>
        <MediaFile type="video/mp4">https://cdn.example/ad.mp4</MediaFile>
        <ClickThrough>https://track.example/c?click=https%3A%2F%2Fgo.homedepot.example%2Fspring</ClickThrough>
    </InLine></Ad></VAST>"#;

    struct FixedFollower(&'static str);

    #[async_trait]
    impl RedirectFollower for FixedFollower {
        async fn follow(&self, _url: &str) -> Resolution {
            Resolution::Resolved(self.0.to_string())
        }
    }

    fn pipeline(config: ConversionConfig, engine: EngineLocation) -> ConversionPipeline {
        ConversionPipeline::new(
            config,
            VastFetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap(),
            ClickthroughResolver::new(Arc::new(FixedFollower("https://www.homedepot.example/spring-sale"))),
            RenderExecutor::new(engine),
        )
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    fn config_in(dir: &TempDir) -> ConversionConfig {
        let background = dir.path().join("background.jpg");
        std::fs::write(&background, b"jpeg").unwrap();
        ConversionConfig {
            output_dir: dir.path().join("generated"),
            background_image: background,
            ..ConversionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_prepare_is_deterministic_except_names() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at("/nonexistent/ffmpeg"));

        let first = pipeline.prepare(VAST).await.unwrap();
        let second = pipeline.prepare(VAST).await.unwrap();

        assert_eq!(first.plan, second.plan);
        assert_eq!(first.destination, second.destination);
        assert_eq!(first.brand, second.brand);
        assert_ne!(first.names.job_id, second.names.job_id);
        assert_ne!(first.names.video, second.names.video);
    }

    #[tokio::test]
    async fn test_prepare_derives_fields() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at("/nonexistent/ffmpeg"));

        let prepared = pipeline.prepare(VAST).await.unwrap();

        assert_eq!(prepared.brand.as_str(), "The Home Depot");
        assert_eq!(prepared.brand_rule, BrandRule::OmdSegment);
        assert_eq!(prepared.destination.embedded.as_deref(), Some("https://go.homedepot.example/spring"));
        assert_eq!(prepared.destination.resolved, "https://www.homedepot.example/spring-sale");
        assert_eq!(prepared.display_url, "www.homedepot.example/spring-sale");
        assert!(prepared.names.video.starts_with("output_The_Home_Depot_"));

        match prepared.plan.operations().last() {
            Some(FilterOp::DrawText { layers, .. }) => {
                assert_eq!(layers[0].text, "The Home Depot");
                assert_eq!(layers[1].text, "www.homedepot.example/spring-sale");
                assert_eq!(layers[2].text, "SCAN QR CODE FOR MORE.");
            }
            other => panic!("unexpected final op: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extraction_errors_stop_before_render() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at("/nonexistent/ffmpeg"));

        let err = pipeline
            .convert(VastSource::Pasted("<VAST><Ad>".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
        assert!(!dir.path().join("generated").exists());
    }

    #[tokio::test]
    async fn test_blocked_remote_source() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at("/nonexistent/ffmpeg"));

        let url = url::Url::parse("http://169.254.169.254/latest/meta-data/").unwrap();
        let err = pipeline.load(VastSource::Remote(url)).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_engine_is_reported() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at(dir.path().join("no-ffmpeg")));

        let err = pipeline
            .convert(VastSource::Pasted(VAST.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EngineUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_conversion_with_stand_in_engine() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let engine_path = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &engine_path,
            "#!/bin/sh\nfor last; do :; done\nprintf 'mp4' > \"$last\"\necho done >&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&engine_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pipeline = pipeline(config_in(&dir), EngineLocation::at(&engine_path));
        let output = pipeline
            .convert(VastSource::Pasted(VAST.to_string()))
            .await
            .unwrap();

        assert!(output.video_path.exists());
        assert!(output.qr_code_path.exists());
        let log = std::fs::read_to_string(&output.log_path).unwrap();
        assert!(log.contains("-map [final_output] -map 2:a?"));
        assert!(log.contains("https://cdn.example/ad.mp4"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoder_failure_carries_diagnostics() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let engine_path = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &engine_path,
            "#!/bin/sh\necho 'Server returned 404 Not Found' >&2\nexit 8\n",
        )
        .unwrap();
        std::fs::set_permissions(&engine_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let pipeline = pipeline(config_in(&dir), EngineLocation::at(&engine_path));
        match pipeline.convert(VastSource::Pasted(VAST.to_string())).await {
            Err(PipelineError::EncodeFailed { exit_code, diagnostics, .. }) => {
                assert_eq!(exit_code, Some(8));
                assert!(diagnostics.contains("404 Not Found"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_span_covers_input_loading() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at("/nonexistent/ffmpeg"));
        let (logs, _guard) = capture_logs();

        let url = url::Url::parse("http://169.254.169.254/latest/meta-data/").unwrap();
        let err = pipeline.convert(VastSource::Remote(url)).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));

        let lines = logs.lines();
        assert!(
            lines
                .iter()
                .any(|l| l.contains("conversion{source=remote}") && l.contains("Blocked VAST URL")),
            "{lines:#?}"
        );
    }

    #[tokio::test]
    async fn test_span_carries_job_id_from_preparation() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(config_in(&dir), EngineLocation::at(dir.path().join("no-ffmpeg")));
        let (logs, _guard) = capture_logs();

        let err = pipeline
            .convert(VastSource::Pasted(VAST.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EngineUnavailable(_)));

        let lines = logs.lines();
        let brand_line = lines
            .iter()
            .find(|l| l.contains("brand 'The Home Depot'"))
            .unwrap_or_else(|| panic!("{lines:#?}"));
        assert!(brand_line.contains("conversion{source=pasted job_id="), "{brand_line}");
        assert!(lines
            .iter()
            .filter(|l| l.contains("Conversion error"))
            .all(|l| l.contains("conversion{source=pasted job_id=")));
    }
}
