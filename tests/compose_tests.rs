use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use photo_calendar::collage_generator::{
    CancelToken, CollageComposer, ComposerSettings, CompositionRequest,
};
use photo_calendar::collage_types::{
    CollageError, FitMode, ImageLoadError, OutputFormat, PhotoRef, SourceLocator,
};
use photo_calendar::image_loader::{DecodedImage, ImageLoader, ImageSource};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0xe2, 0xe8, 0xf0, 255]);

/// In-memory source with per-photo delays; unknown ids fail to load.
#[derive(Default)]
struct MemorySource {
    images: HashMap<String, (RgbaImage, Duration)>,
}

impl MemorySource {
    fn with(mut self, id: &str, color: Rgba<u8>, width: u32, height: u32) -> Self {
        self.images.insert(
            id.to_string(),
            (RgbaImage::from_pixel(width, height, color), Duration::ZERO),
        );
        self
    }

    fn delayed(mut self, id: &str, color: Rgba<u8>, delay: Duration) -> Self {
        self.images
            .insert(id.to_string(), (RgbaImage::from_pixel(64, 48, color), delay));
        self
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    async fn load(&self, photo: &PhotoRef) -> Result<DecodedImage, ImageLoadError> {
        let Some((pixels, delay)) = self.images.get(&photo.id) else {
            return Err(ImageLoadError::Corrupt(format!("no such photo {}", photo.id)));
        };
        tokio::time::sleep(*delay).await;
        DecodedImage::from_rgba(pixels.clone())
    }
}

fn photo(id: &str) -> PhotoRef {
    PhotoRef::new(id, SourceLocator::Url(format!("memory://{}", id)), id)
}

fn composer(source: MemorySource) -> CollageComposer {
    CollageComposer::new(Arc::new(source), ComposerSettings::default())
}

fn decode(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory(bytes).unwrap()
}

fn png_bytes(color: Rgba<u8>, width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, color))
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn test_empty_collage_has_exact_target_size() {
    // GIVEN: no photos
    let composer = composer(MemorySource::default());

    // WHEN: composing
    let result = composer.compose(&[], 400, 300, FitMode::Cover).await.unwrap();

    // THEN: the payload is exactly the nominal size with no oversampling
    let img = decode(&result.bytes);
    assert_eq!(img.dimensions(), (400, 300));
    assert_eq!(result.scale, 1);
    assert_eq!(result.placed, 0);
    assert!(result.failed.is_empty());
}

#[tokio::test]
async fn test_single_photo_spans_padded_area() {
    // GIVEN: one red photo
    let composer = composer(MemorySource::default().with("red", RED, 400, 300));

    // WHEN: composing an 800x600 collage
    let result = composer
        .compose(&[photo("red")], 800, 600, FitMode::Cover)
        .await
        .unwrap();

    // THEN: output is oversampled 2x
    let img = decode(&result.bytes).to_rgba8();
    assert_eq!(img.dimensions(), (1600, 1200));
    assert_eq!((result.pixel_width(), result.pixel_height()), (1600, 1200));

    // AND the photo fills the 760x560 padded area
    assert_eq!(*img.get_pixel(800, 600), RED);
    assert_eq!(*img.get_pixel(2 * 80, 2 * 300), RED);
    assert_eq!(*img.get_pixel(2 * 720, 2 * 300), RED);
    // AND the padding shows the backdrop
    assert_ne!(*img.get_pixel(2 * 10, 2 * 300), RED);
}

#[tokio::test]
async fn test_failed_photo_becomes_placeholder() {
    // GIVEN: a photo that cannot be decoded followed by a good one
    let composer = composer(MemorySource::default().with("good", BLUE, 300, 300));
    let photos = [photo("bad"), photo("good")];

    // WHEN: composing
    let result = composer
        .compose(&photos, 800, 600, FitMode::Cover)
        .await
        .unwrap();

    // THEN: the composition still succeeds and reports the failure
    assert_eq!(result.placed, 2);
    assert_eq!(result.failed, vec!["bad".to_string()]);

    // AND the left cell holds the placeholder, the right cell the photo
    let img = decode(&result.bytes).to_rgba8();
    assert_eq!(*img.get_pixel(2 * 70, 2 * 300), PLACEHOLDER_FILL);
    assert_eq!(*img.get_pixel(2 * 600, 2 * 300), BLUE);
}

#[tokio::test]
async fn test_composition_is_deterministic() {
    let composer = composer(
        MemorySource::default()
            .with("a", RED, 120, 80)
            .with("b", BLUE, 80, 120)
            .with("c", RED, 50, 50),
    );
    let photos = [photo("a"), photo("b"), photo("c")];

    let first = composer.compose(&photos, 400, 300, FitMode::Contain).await.unwrap();
    let second = composer.compose(&photos, 400, 300, FitMode::Contain).await.unwrap();

    assert_eq!(first.bytes, second.bytes);
}

#[tokio::test]
async fn test_out_of_order_loads_draw_in_plan_order() {
    // GIVEN: loads that complete in reverse order
    let slow_first = MemorySource::default()
        .delayed("a", RED, Duration::from_millis(60))
        .delayed("b", BLUE, Duration::from_millis(30))
        .delayed("c", RED, Duration::ZERO)
        .delayed("d", BLUE, Duration::ZERO);
    let in_order = MemorySource::default()
        .delayed("a", RED, Duration::ZERO)
        .delayed("b", BLUE, Duration::ZERO)
        .delayed("c", RED, Duration::ZERO)
        .delayed("d", BLUE, Duration::ZERO);
    let photos = [photo("a"), photo("b"), photo("c"), photo("d")];

    let sequential = CollageComposer::new(
        Arc::new(in_order),
        ComposerSettings {
            max_concurrent_loads: 1,
            ..ComposerSettings::default()
        },
    );

    // WHEN: composing with concurrent and with sequential loading
    let concurrent = composer(slow_first)
        .compose(&photos, 400, 300, FitMode::Cover)
        .await
        .unwrap();
    let sequential = sequential
        .compose(&photos, 400, 300, FitMode::Cover)
        .await
        .unwrap();

    // THEN: the pixels are identical
    assert_eq!(concurrent.bytes, sequential.bytes);
}

#[tokio::test]
async fn test_cancelled_composition_returns_no_output() {
    // GIVEN: a photo that takes far too long to load
    let composer = composer(MemorySource::default().delayed("slow", RED, Duration::from_secs(30)));
    let token = CancelToken::new();
    let request = CompositionRequest::new(400, 300, FitMode::Cover);

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    // WHEN: the token is cancelled mid-load
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        composer.compose_with(&[photo("slow")], &request, &token),
    )
    .await
    .expect("cancellation should abandon the pending load");

    // THEN: the caller gets a cancellation error instead of a partial image
    assert!(matches!(result, Err(CollageError::Cancelled)));
}

#[tokio::test]
async fn test_already_cancelled_token() {
    let composer = composer(MemorySource::default().with("a", RED, 10, 10));
    let token = CancelToken::new();
    token.cancel();

    let result = composer
        .compose_with(&[photo("a")], &CompositionRequest::new(100, 100, FitMode::Cover), &token)
        .await;

    assert!(matches!(result, Err(CollageError::Cancelled)));
}

#[tokio::test]
async fn test_invalid_dimensions() {
    let composer = composer(MemorySource::default().with("a", RED, 10, 10));

    let zero = composer.compose(&[photo("a")], 0, 600, FitMode::Cover).await;
    let too_small = composer.compose(&[photo("a")], 30, 30, FitMode::Cover).await;

    assert!(matches!(zero, Err(CollageError::InvalidGeometry(_))));
    assert!(matches!(too_small, Err(CollageError::InvalidGeometry(_))));
}

#[tokio::test]
async fn test_contain_mode_letterboxes() {
    // GIVEN: a 2:1 photo in a 760x560 cell
    let composer = composer(MemorySource::default().with("wide", RED, 200, 100));

    let result = composer
        .compose(&[photo("wide")], 800, 600, FitMode::Contain)
        .await
        .unwrap();

    // THEN: it is 760x380 centred vertically, leaving bands above and below
    let img = decode(&result.bytes).to_rgba8();
    assert_eq!(*img.get_pixel(2 * 400, 2 * 300), RED);
    assert_ne!(*img.get_pixel(2 * 400, 2 * 60), RED);
    assert_ne!(*img.get_pixel(2 * 400, 2 * 550), RED);
}

#[tokio::test]
async fn test_named_template() {
    let source = MemorySource::default()
        .with("a", RED, 10, 10)
        .with("b", BLUE, 10, 10)
        .with("c", RED, 10, 10)
        .with("d", BLUE, 10, 10)
        .with("e", RED, 10, 10);
    let composer = composer(source);
    let photos = [photo("a"), photo("b"), photo("c"), photo("d"), photo("e")];

    let request = CompositionRequest::new(600, 600, FitMode::Cover).with_template("grid-2x2");
    let result = composer
        .compose_with(&photos, &request, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(result.placed, 4);

    let unknown = CompositionRequest::new(600, 600, FitMode::Cover).with_template("collage-9000");
    assert!(matches!(
        composer.compose_with(&photos, &unknown, &CancelToken::new()).await,
        Err(CollageError::UnknownTemplate(_))
    ));
}

#[tokio::test]
async fn test_jpeg_output() {
    let composer = composer(MemorySource::default().with("a", RED, 10, 10));
    let mut request = CompositionRequest::new(200, 200, FitMode::Cover);
    request.format = Some(OutputFormat::Jpeg);

    let result = composer
        .compose_with(&[photo("a")], &request, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(result.format, OutputFormat::Jpeg);
    assert_eq!(image::guess_format(&result.bytes).unwrap(), ImageFormat::Jpeg);
    assert!(result.to_data_uri().starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_default_loader_reads_files_and_bytes() {
    // GIVEN: one photo on disk and one in memory
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blue.png");
    std::fs::write(&path, png_bytes(BLUE, 40, 40)).unwrap();

    let composer = CollageComposer::new(Arc::new(ImageLoader::new()), ComposerSettings::default());
    let photos = [
        PhotoRef::from_path("disk", &path),
        PhotoRef::from_bytes("memory", png_bytes(RED, 40, 40), "red.png"),
        PhotoRef::from_path("missing", dir.path().join("nope.png")),
    ];

    // WHEN: composing with the default loader
    let result = composer
        .compose(&photos, 600, 400, FitMode::Cover)
        .await
        .unwrap();

    // THEN: only the missing file is reported
    assert_eq!(result.failed, vec!["missing".to_string()]);
    assert_eq!(result.placed, 3);
}
