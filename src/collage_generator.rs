use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinSet;

use crate::cell_effects::{finish_cell, FinishStyle};
use crate::collage_types::{
    CollageError, CollageResult, CompositionResult, FitMode, ImageLoadError, LayoutCell,
    LayoutPlan, OutputFormat, PhotoRef,
};
use crate::fit_resolver::resolve;
use crate::image_loader::{DecodedImage, ImageSource};
use crate::layout::{select_layout, template_layout};
use crate::placeholder::{draw_placeholder, PlaceholderStyle};
use crate::surface::Surface;

/// Rendering knobs that stay fixed across compositions.
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    /// Oversampling factor applied to every non-empty collage
    pub output_scale: u32,
    pub padding: f32,
    pub format: OutputFormat,
    pub max_concurrent_loads: usize,
    pub finish: FinishStyle,
    pub placeholder: PlaceholderStyle,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            output_scale: 2,
            padding: 20.0,
            format: OutputFormat::Png,
            max_concurrent_loads: num_cpus::get(),
            finish: FinishStyle::default(),
            placeholder: PlaceholderStyle::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutChoice {
    /// Arrangement picked from the photo count
    #[default]
    Auto,
    /// Named template from `layout::templates`
    Template(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionRequest {
    pub width: u32,
    pub height: u32,
    pub fit_mode: FitMode,
    pub layout: LayoutChoice,
    /// Overrides the composer's default output format
    pub format: Option<OutputFormat>,
}

impl CompositionRequest {
    pub fn new(width: u32, height: u32, fit_mode: FitMode) -> Self {
        Self {
            width,
            height,
            fit_mode,
            layout: LayoutChoice::Auto,
            format: None,
        }
    }

    pub fn with_template(mut self, id: impl Into<String>) -> Self {
        self.layout = LayoutChoice::Template(id.into());
        self
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared flag used to abandon an in-flight composition.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle returned by [`CompositionTracker::begin`].
#[derive(Debug, Clone)]
pub struct TrackedComposition {
    key: String,
    generation: u64,
    token: CancelToken,
}

impl TrackedComposition {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

/// Latest-wins bookkeeping: starting a composition for a key cancels the one
/// already running for it.
#[derive(Debug, Default)]
pub struct CompositionTracker {
    active: Mutex<HashMap<String, (u64, CancelToken)>>,
    generation: AtomicU64,
}

impl CompositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, key: &str) -> TrackedComposition {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let token = CancelToken::new();

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, previous)) = active.insert(key.to_string(), (generation, token.clone())) {
            debug!("Superseding running composition for {}", key);
            previous.cancel();
        }

        TrackedComposition {
            key: key.to_string(),
            generation,
            token,
        }
    }

    /// Forgets the composition unless a newer one already replaced it.
    pub fn finish(&self, tracked: &TrackedComposition) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active
            .get(&tracked.key)
            .is_some_and(|(generation, _)| *generation == tracked.generation)
        {
            active.remove(&tracked.key);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

type LoadOutcome = Result<DecodedImage, ImageLoadError>;

/// Composes ordered photos into one collage image.
pub struct CollageComposer {
    source: Arc<dyn ImageSource>,
    settings: ComposerSettings,
}

impl CollageComposer {
    pub fn new(source: Arc<dyn ImageSource>, settings: ComposerSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    pub async fn compose(
        &self,
        photos: &[PhotoRef],
        width: u32,
        height: u32,
        fit_mode: FitMode,
    ) -> CollageResult<CompositionResult> {
        self.compose_with(
            photos,
            &CompositionRequest::new(width, height, fit_mode),
            &CancelToken::new(),
        )
        .await
    }

    /// Full composition pipeline.
    ///
    /// Photos are placed in input order, one per cell. Loads run concurrently
    /// but cells are drawn strictly in plan order. A photo that fails to load
    /// becomes a placeholder and its id is reported in `failed`.
    pub async fn compose_with(
        &self,
        photos: &[PhotoRef],
        request: &CompositionRequest,
        cancel: &CancelToken,
    ) -> CollageResult<CompositionResult> {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 {
            return Err(CollageError::InvalidGeometry(format!(
                "collage must have positive size, got {}x{}",
                width, height
            )));
        }
        if cancel.is_cancelled() {
            return Err(CollageError::Cancelled);
        }

        let format = request.format.unwrap_or(self.settings.format);

        if photos.is_empty() {
            return self.compose_empty(width, height, format).await;
        }

        let plan = match &request.layout {
            LayoutChoice::Auto => select_layout(
                photos.len(),
                width as f32,
                height as f32,
                self.settings.padding,
            )?,
            LayoutChoice::Template(id) => {
                template_layout(id, width as f32, height as f32, self.settings.padding)?
            }
        };
        let placed = plan.placed(photos.len());
        if placed < photos.len() {
            debug!(
                "Layout {:?} has {} slots, dropping {} trailing photos",
                plan.kind,
                plan.slot_count(),
                photos.len() - placed
            );
        }

        let mut surface = Surface::new(width, height, self.settings.output_scale)?;
        surface.paint_backdrop()?;

        let (surface, failed) = self
            .draw_cells(surface, &photos[..placed], &plan, request.fit_mode, cancel)
            .await?;

        let bytes = tokio::task::spawn_blocking(move || surface.encode(format))
            .await
            .map_err(|e| CollageError::Encoding(format!("encoder task failed: {}", e)))??;

        info!(
            "Composed {}x{} collage: {} photos placed, {} failed",
            width,
            height,
            placed,
            failed.len()
        );

        Ok(CompositionResult {
            bytes,
            format,
            width,
            height,
            scale: self.settings.output_scale,
            placed,
            failed,
        })
    }

    /// No photos: the textured empty state at the nominal size.
    async fn compose_empty(
        &self,
        width: u32,
        height: u32,
        format: OutputFormat,
    ) -> CollageResult<CompositionResult> {
        let bytes = tokio::task::spawn_blocking(move || {
            let mut surface = Surface::new(width, height, 1)?;
            surface.paint_empty_state()?;
            surface.encode(format)
        })
        .await
        .map_err(|e| CollageError::Encoding(format!("encoder task failed: {}", e)))??;

        debug!("Composed empty {}x{} collage", width, height);

        Ok(CompositionResult {
            bytes,
            format,
            width,
            height,
            scale: 1,
            placed: 0,
            failed: Vec::new(),
        })
    }

    async fn draw_cells(
        &self,
        mut surface: Surface,
        photos: &[PhotoRef],
        plan: &LayoutPlan,
        fit_mode: FitMode,
        cancel: &CancelToken,
    ) -> CollageResult<(Surface, Vec<String>)> {
        let limit = self.settings.max_concurrent_loads.max(1);
        let mut loads = JoinSet::new();
        let mut task_slots = HashMap::new();
        let mut queue = photos.iter().cloned().enumerate();

        for (index, photo) in queue.by_ref().take(limit) {
            self.spawn_load(&mut loads, &mut task_slots, index, photo);
        }

        let mut ready: BTreeMap<usize, LoadOutcome> = BTreeMap::new();
        let mut failed = Vec::new();
        let mut next = 0;

        while next < photos.len() {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Composition cancelled with {} of {} cells drawn", next, photos.len());
                    return Err(CollageError::Cancelled);
                }
                joined = loads.join_next_with_id() => joined,
            };

            match joined {
                Some(Ok((_, (index, outcome)))) => {
                    ready.insert(index, outcome);
                }
                Some(Err(e)) => {
                    let Some(index) = task_slots.get(&e.id()).copied() else {
                        continue;
                    };
                    ready.insert(
                        index,
                        Err(ImageLoadError::Unreachable(format!("load task failed: {}", e))),
                    );
                }
                // Every load was joined but some cell never got a result
                None => {
                    return Err(CollageError::Surface(format!(
                        "load for cell {} never completed",
                        next
                    )))
                }
            }
            if let Some((index, photo)) = queue.next() {
                self.spawn_load(&mut loads, &mut task_slots, index, photo);
            }

            while let Some(outcome) = ready.remove(&next) {
                let photo = &photos[next];
                let image = match outcome {
                    Ok(image) => Some(image),
                    Err(e) => {
                        warn!("Failed to load photo {} ({}): {}", photo.id, photo.source, e);
                        failed.push(photo.id.clone());
                        None
                    }
                };

                let (drawn, placed_photo) = self
                    .draw_cell(surface, plan.cells[next], image, fit_mode)
                    .await?;
                surface = drawn;
                if placed_photo == Some(false) {
                    failed.push(photo.id.clone());
                }
                next += 1;

                if cancel.is_cancelled() {
                    return Err(CollageError::Cancelled);
                }
            }
        }

        Ok((surface, failed))
    }

    fn spawn_load(
        &self,
        loads: &mut JoinSet<(usize, LoadOutcome)>,
        task_slots: &mut HashMap<tokio::task::Id, usize>,
        index: usize,
        photo: PhotoRef,
    ) {
        let source = Arc::clone(&self.source);
        let handle = loads.spawn(async move { (index, source.load(&photo).await) });
        task_slots.insert(handle.id(), index);
    }

    /// Draws one cell on the blocking pool and hands the surface back.
    ///
    /// The flag is `Some(true)` when the photo was drawn and `Some(false)`
    /// when drawing it failed and the placeholder took its place. It is
    /// `None` when there was no photo to begin with.
    async fn draw_cell(
        &self,
        mut surface: Surface,
        cell: LayoutCell,
        image: Option<DecodedImage>,
        fit_mode: FitMode,
    ) -> CollageResult<(Surface, Option<bool>)> {
        let finish = self.settings.finish;
        let placeholder = self.settings.placeholder.clone();

        let (surface, outcome) = tokio::task::spawn_blocking(move || {
            let rect = cell.rect();
            let drawn = image.as_ref().map(|image| {
                resolve(image.natural_width, image.natural_height, rect, fit_mode).and_then(|fit| {
                    finish_cell(&mut surface, rect, cell.rounding, &finish, |scope| {
                        scope.draw_image(image, &fit)
                    })
                })
            });

            let placed_photo = match drawn {
                Some(Ok(())) => return (surface, Ok(Some(true))),
                Some(Err(e)) => {
                    warn!("Failed to draw photo into cell {:?}: {}", rect, e);
                    Some(false)
                }
                None => None,
            };

            let outcome = finish_cell(&mut surface, rect, cell.rounding, &finish, |scope| {
                draw_placeholder(scope, &placeholder)
            })
            .map(|_| placed_photo);
            (surface, outcome)
        })
        .await
        .map_err(|e| CollageError::Surface(format!("draw task failed: {}", e)))?;

        Ok((surface, outcome?))
    }
}
