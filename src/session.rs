use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use image::imageops;

use crate::config::EditorConfig;
use crate::error::{FilmError, Result};
use crate::export::{self, EncodedImage, ExportFormat};
use crate::presets::FilmPreset;
use crate::processing::{PipelineOptions, transform_seeded};
use crate::state::{FilmParameters, ParamField};
use crate::worker::{PreviewWorker, RenderHandle};

/// Tracks whether a render is owed and when it may start.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    /// Render needed but not yet kicked off.
    needs_process: bool,
    /// Set by slider-style edits; `None` means the render is due right away.
    last_slider_change: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            needs_process: false,
            last_slider_change: None,
        }
    }

    /// Continuous edit: restarts the quiet window.
    pub fn touch(&mut self, now: Instant) {
        self.needs_process = true;
        self.last_slider_change = Some(now);
    }

    /// Discrete edit (preset click, reset): due on the next check.
    pub fn mark_immediate(&mut self) {
        self.needs_process = true;
        self.last_slider_change = None;
    }

    pub fn is_pending(&self) -> bool {
        self.needs_process
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.needs_process
            && self
                .last_slider_change
                .map(|t| now.saturating_duration_since(t) >= self.window)
                .unwrap_or(true)
    }

    /// Time left before [`Debouncer::ready`] turns true, if anything is pending.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        if !self.needs_process {
            return None;
        }
        Some(
            self.last_slider_change
                .map(|t| self.window.saturating_sub(now.saturating_duration_since(t)))
                .unwrap_or(Duration::ZERO),
        )
    }

    fn clear(&mut self) {
        self.needs_process = false;
        self.last_slider_change = None;
    }
}

/// Current parameters plus validation on every write. Does not render.
#[derive(Debug, Clone, Default)]
pub struct ParameterSession {
    params: FilmParameters,
    preset: Option<&'static str>,
}

impl ParameterSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &FilmParameters {
        &self.params
    }

    /// Id of the preset last applied, until something is edited by hand.
    pub fn active_preset(&self) -> Option<&'static str> {
        self.preset
    }

    /// Replaces every field with the preset's values.
    pub fn apply_preset(&mut self, preset: &FilmPreset) {
        self.params = preset.params;
        self.preset = Some(preset.id);
        tracing::debug!(preset = preset.id, "preset applied");
    }

    /// Sets one field, returning the value stored after clamping.
    ///
    /// A rejected value leaves the session untouched.
    pub fn set_field(&mut self, field: ParamField, value: f32) -> Result<f32> {
        let stored = self.params.set(field, value)?;
        self.preset = None;
        Ok(stored)
    }

    pub fn reset(&mut self) {
        self.params = FilmParameters::default();
        self.preset = None;
    }
}

/// One open image: parameters, debounced preview rendering and export.
pub struct EditSession {
    source_path: Option<PathBuf>,
    /// Native-resolution original, only touched by export.
    source: Arc<RgbaImage>,
    /// Downscaled working copy used for previews.
    preview: Arc<RgbaImage>,
    controls: ParameterSession,
    debounce: Debouncer,
    options: PipelineOptions,
    seed: u64,
    generation: u64,
    in_flight: Option<RenderHandle>,
    output: Option<RgbaImage>,
    worker: PreviewWorker,
}

impl EditSession {
    pub fn open(path: &Path, config: &EditorConfig) -> Result<Self> {
        let img = export::open_image(path)?;
        tracing::info!(path = %path.display(), width = img.width(), height = img.height(), "opened image");
        let mut session = Self::from_image(img, config);
        session.source_path = Some(path.to_path_buf());
        Ok(session)
    }

    /// Starts a session on an already decoded image. The first [`poll`]
    /// renders the identity preview.
    ///
    /// [`poll`]: EditSession::poll
    pub fn from_image(img: RgbaImage, config: &EditorConfig) -> Self {
        let preview = match export::fit_long_edge(img.width(), img.height(), config.preview_max_edge) {
            Some((w, h)) => imageops::thumbnail(&img, w, h),
            None => img.clone(),
        };
        let seed = config.grain_seed.unwrap_or_else(rand::random);
        let mut debounce = Debouncer::new(config.debounce());
        debounce.mark_immediate();
        Self {
            source_path: None,
            source: Arc::new(img),
            preview: Arc::new(preview),
            controls: ParameterSession::new(),
            debounce,
            options: config.pipeline_options(),
            seed,
            generation: 0,
            in_flight: None,
            output: None,
            worker: PreviewWorker::spawn(),
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    pub fn preview_source(&self) -> &RgbaImage {
        &self.preview
    }

    pub fn params(&self) -> &FilmParameters {
        self.controls.params()
    }

    pub fn controls(&self) -> &ParameterSession {
        &self.controls
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Last committed preview render.
    pub fn output(&self) -> Option<&RgbaImage> {
        self.output.as_ref()
    }

    pub fn is_rendering(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Time until the next preview may be submitted; see [`Debouncer::remaining`].
    pub fn next_render_in(&self, now: Instant) -> Option<Duration> {
        self.debounce.remaining(now)
    }

    pub fn apply_preset(&mut self, preset: &FilmPreset) {
        self.controls.apply_preset(preset);
        self.generation += 1;
        self.debounce.mark_immediate();
    }

    /// Slider edit: the preview waits for the debounce window to pass.
    pub fn set_field(&mut self, field: ParamField, value: f32, now: Instant) -> Result<f32> {
        let stored = self.controls.set_field(field, value)?;
        self.generation += 1;
        self.debounce.touch(now);
        Ok(stored)
    }

    pub fn reset(&mut self) {
        self.controls.reset();
        self.generation += 1;
        self.debounce.mark_immediate();
    }

    /// Collects a finished render and submits a new one when due.
    ///
    /// Returns `true` when a new preview was committed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut committed = false;
        if let Some(result) = self.in_flight.as_ref().and_then(RenderHandle::try_take) {
            if let Some(handle) = self.in_flight.take() {
                committed = self.commit(handle.generation(), result);
            }
        }
        if self.debounce.ready(now) {
            self.submit();
        }
        committed
    }

    /// Blocks until the in-flight preview, if any, finishes and commits it.
    pub fn wait_pending(&mut self) -> bool {
        match self.in_flight.take() {
            Some(handle) => {
                let generation = handle.generation();
                self.commit(generation, handle.wait())
            }
            None => false,
        }
    }

    fn submit(&mut self) {
        self.debounce.clear();
        // Replacing the handle drops interest in any older render.
        self.in_flight = Some(self.worker.submit(
            self.generation,
            Arc::clone(&self.preview),
            *self.controls.params(),
            self.options,
            self.seed,
        ));
    }

    fn commit(&mut self, generation: u64, result: Result<RgbaImage>) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "discarding stale preview");
            return false;
        }
        match result {
            Ok(img) => {
                self.output = Some(img);
                true
            }
            Err(FilmError::Superseded) => false,
            Err(err) => {
                tracing::warn!(%err, generation, "preview render failed");
                false
            }
        }
    }

    /// Runs the pipeline on the native-resolution source with the current
    /// parameters and seed.
    pub fn render_full(&mut self) -> Result<RgbaImage> {
        let started = Instant::now();
        let out = transform_seeded(&self.source, self.controls.params(), &self.options, self.seed)?;
        tracing::info!(
            width = out.width(),
            height = out.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "full resolution render"
        );
        Ok(out)
    }

    /// Renders at full resolution and encodes it.
    ///
    /// JPEG goes through the size-capped quality ladder; lossless formats
    /// ignore `max_bytes`. Pending preview work is left as it was.
    pub fn export(&mut self, format: ExportFormat, max_bytes: u64) -> Result<EncodedImage> {
        let full = self.render_full()?;
        if format.is_lossless() {
            export::encode(&full, format, 1.0)
        } else {
            export::encode_with_limit(&full, max_bytes)
        }
    }

    /// Exports in `format` and writes the bytes to `path`.
    ///
    /// An over-limit JPEG is still written; the error is returned afterwards
    /// so the caller can report it.
    pub fn export_to_path(
        &mut self,
        path: &Path,
        format: ExportFormat,
        max_bytes: u64,
    ) -> Result<EncodedImage> {
        match self.export(format, max_bytes) {
            Ok(encoded) => {
                encoded.write_to(path)?;
                Ok(encoded)
            }
            Err(FilmError::EncodeOverLimit { limit, best }) => {
                best.write_to(path)?;
                Err(FilmError::EncodeOverLimit { limit, best })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use image::{ImageBuffer, Rgba, RgbaImage};

    use crate::config::EditorConfig;
    use crate::error::FilmError;
    use crate::export::{self, ExportFormat};
    use crate::presets;
    use crate::processing::transform_seeded;
    use crate::state::{FilmParameters, ParamField};

    use super::{Debouncer, EditSession, ParameterSession};

    fn gradient(w: u32, h: u32) -> RgbaImage {
        ImageBuffer::from_fn(w, h, |x, y| {
            Rgba([(x * 255 / w.max(1)) as u8, (y * 255 / h.max(1)) as u8, 100, 255])
        })
    }

    fn config() -> EditorConfig {
        EditorConfig {
            grain_seed: Some(7),
            debounce_ms: 150,
            ..EditorConfig::default()
        }
    }

    #[test]
    fn debouncer_waits_for_quiet_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(150));
        assert!(!d.ready(t0));
        d.touch(t0);
        assert!(d.is_pending());
        assert!(!d.ready(t0 + Duration::from_millis(100)));
        d.touch(t0 + Duration::from_millis(100));
        assert!(!d.ready(t0 + Duration::from_millis(200)));
        assert_eq!(
            d.remaining(t0 + Duration::from_millis(200)),
            Some(Duration::from_millis(50))
        );
        assert!(d.ready(t0 + Duration::from_millis(250)));
    }

    #[test]
    fn discrete_change_is_ready_immediately() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.touch(t0);
        d.mark_immediate();
        assert!(d.ready(t0));
        assert_eq!(d.remaining(t0), Some(Duration::ZERO));
    }

    #[test]
    fn preset_replaces_all_fields_and_edit_clears_it() {
        let mut s = ParameterSession::new();
        s.set_field(ParamField::Blur, 12.0).unwrap();
        let trix = presets::lookup("tri-x-400").unwrap();
        s.apply_preset(trix);
        assert_eq!(*s.params(), trix.params);
        assert_eq!(s.active_preset(), Some("tri-x-400"));
        s.set_field(ParamField::Grain, 10.0).unwrap();
        assert_eq!(s.active_preset(), None);
        assert_eq!(s.params().grain, 10.0);
    }

    #[test]
    fn set_field_clamps_and_rejects_nan() {
        let mut s = ParameterSession::new();
        assert_eq!(s.set_field(ParamField::Exposure, 500.0).unwrap(), 200.0);
        let before = *s.params();
        let err = s.set_field(ParamField::Contrast, f32::NAN).unwrap_err();
        assert!(matches!(err, FilmError::InvalidParameter { field: "contrast", .. }));
        assert_eq!(*s.params(), before);
    }

    #[test]
    fn reset_returns_to_identity() {
        let mut s = ParameterSession::new();
        s.apply_preset(presets::lookup("hp5-plus").unwrap());
        s.reset();
        assert!(s.params().is_identity());
        assert_eq!(s.active_preset(), None);
    }

    #[test]
    fn preview_is_downscaled_to_configured_edge() {
        let cfg = EditorConfig {
            preview_max_edge: 40,
            ..config()
        };
        let session = EditSession::from_image(gradient(100, 50), &cfg);
        assert_eq!(session.preview_source().dimensions(), (40, 20));
        assert_eq!(session.source().dimensions(), (100, 50));
    }

    #[test]
    fn first_poll_renders_identity_preview() {
        let mut session = EditSession::from_image(gradient(12, 8), &config());
        assert!(!session.poll(Instant::now()));
        assert!(session.is_rendering());
        assert!(session.wait_pending());
        let expected = transform_seeded(
            session.preview_source(),
            &FilmParameters::default(),
            &config().pipeline_options(),
            7,
        )
        .unwrap();
        assert_eq!(session.output(), Some(&expected));
    }

    #[test]
    fn slider_edit_waits_for_debounce() {
        let t0 = Instant::now();
        let mut session = EditSession::from_image(gradient(12, 8), &config());
        session.poll(t0);
        session.wait_pending();

        session.set_field(ParamField::Exposure, 150.0, t0).unwrap();
        session.poll(t0 + Duration::from_millis(50));
        assert!(!session.is_rendering());

        session.poll(t0 + Duration::from_millis(200));
        assert!(session.is_rendering());
        assert!(session.wait_pending());
        let expected = transform_seeded(
            session.preview_source(),
            session.params(),
            &config().pipeline_options(),
            7,
        )
        .unwrap();
        assert_eq!(session.output(), Some(&expected));
    }

    #[test]
    fn stale_render_is_not_committed() {
        let t0 = Instant::now();
        let mut session = EditSession::from_image(gradient(12, 8), &config());
        session.poll(t0);
        // Parameters change while the first render is in flight.
        session.set_field(ParamField::Contrast, 60.0, t0).unwrap();
        assert!(!session.wait_pending());
        assert!(session.output().is_none());

        let generation = session.generation();
        assert!(!session.commit(generation - 1, Ok(gradient(12, 8))));
        assert!(session.commit(generation, Ok(gradient(12, 8))));
    }

    #[test]
    fn newest_parameters_win_after_burst() {
        let t0 = Instant::now();
        let mut session = EditSession::from_image(gradient(16, 16), &config());
        for (i, value) in [60.0, 90.0, 130.0, 170.0].into_iter().enumerate() {
            let now = t0 + Duration::from_millis(20 * i as u64);
            session.set_field(ParamField::Exposure, value, now).unwrap();
            session.poll(now);
        }
        session.poll(t0 + Duration::from_secs(1));
        session.wait_pending();
        let expected_params = FilmParameters {
            exposure: 170.0,
            ..FilmParameters::default()
        };
        let expected = transform_seeded(
            session.preview_source(),
            &expected_params,
            &config().pipeline_options(),
            7,
        )
        .unwrap();
        assert_eq!(session.output(), Some(&expected));
    }

    #[test]
    fn export_runs_at_native_resolution() {
        let cfg = EditorConfig {
            preview_max_edge: 16,
            ..config()
        };
        let mut session = EditSession::from_image(gradient(64, 32), &cfg);
        session.apply_preset(presets::lookup("tri-x-400").unwrap());
        let encoded = session.export(ExportFormat::Png, 0).unwrap();
        let decoded = export::decode(&encoded.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
        assert_eq!(decoded, session.render_full().unwrap());
    }

    #[test]
    fn export_leaves_pending_preview_untouched() {
        let t0 = Instant::now();
        let mut session = EditSession::from_image(gradient(8, 8), &config());
        session.set_field(ParamField::Grain, 20.0, t0).unwrap();
        session.export(ExportFormat::Jpeg, u64::MAX).unwrap();
        assert!(session.next_render_in(t0).is_some());
    }

    #[test]
    fn export_to_path_writes_file() {
        let dir = std::env::temp_dir().join(format!("monos-session-test-{}", std::process::id()));
        let path = dir.join("out.png");
        let mut session = EditSession::from_image(gradient(10, 6), &config());
        let encoded = session.export_to_path(&path, ExportFormat::Png, u64::MAX).unwrap();
        assert_eq!(encoded.format, ExportFormat::Png);
        assert_eq!(std::fs::read(&path).unwrap(), encoded.bytes);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn export_to_path_uses_requested_format_over_extension() {
        let dir = std::env::temp_dir().join(format!("monos-session-fmt-{}", std::process::id()));
        let path = dir.join("out.jpg");
        let mut session = EditSession::from_image(gradient(10, 6), &config());
        let encoded = session.export_to_path(&path, ExportFormat::Png, u64::MAX).unwrap();
        assert_eq!(encoded.format, ExportFormat::Png);
        let written = std::fs::read(&path).unwrap();
        assert_eq!(
            image::guess_format(&written).unwrap(),
            image::ImageFormat::Png
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn over_limit_export_is_still_written() {
        let dir = std::env::temp_dir().join(format!("monos-session-cap-{}", std::process::id()));
        let path = dir.join("capped.jpg");
        let mut session = EditSession::from_image(gradient(48, 32), &config());
        session.apply_preset(presets::lookup("delta-3200").unwrap());
        let err = session.export_to_path(&path, ExportFormat::Jpeg, 10).unwrap_err();
        let FilmError::EncodeOverLimit { limit, best } = err else {
            panic!("expected over-limit export, got {err:?}");
        };
        assert_eq!(limit, 10);
        assert_eq!(best.quality, 0.5);
        assert_eq!(std::fs::read(&path).unwrap(), best.bytes);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
