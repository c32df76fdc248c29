//! Cover-image pipeline: resize/reformat the uploaded artwork and push it
//! to the store under its content hash.

use crate::adapters::fs::ScopedDir;
use crate::error::{Error, Result};
use crate::ports::storage::{upload_if_absent, ObjectStorePort};
use image::imageops::FilterType;
use std::io::BufWriter;
use std::path::Path;

pub const COVER_WIDTH: u32 = 640;
pub const COVER_HEIGHT: u32 = 360;
pub const COVER_JPEG_QUALITY: u8 = 80;

fn render_cover(source: &Path, destination: &Path) -> Result<()> {
    let img = image::open(source).map_err(|e| Error::CoverImage(e.to_string()))?;
    // drop any alpha channel; JPEG carries none
    let resized = img
        .resize_to_fill(COVER_WIDTH, COVER_HEIGHT, FilterType::Lanczos3)
        .to_rgb8();

    let file = std::fs::File::create(destination)?;
    let mut writer = BufWriter::new(file);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, COVER_JPEG_QUALITY);
    encoder
        .encode_image(&resized)
        .map_err(|e| Error::CoverImage(e.to_string()))?;
    Ok(())
}

/// Resize the cover to 640x360 JPEG and upload it as
/// `{cover_prefix}/{cover_hash}/cover.jpg`. Returns the remote key.
pub async fn process_and_upload_cover<S: ObjectStorePort>(
    storage: &S,
    tmp_root: &Path,
    cover_prefix: &str,
    source: &Path,
    cover_hash: &str,
) -> Result<String> {
    let workdir = ScopedDir::create(tmp_root, cover_hash).await?;
    let processed = workdir.path().join("cover.jpg");

    // image decoding/encoding is CPU-bound, keep it off the runtime
    let src = source.to_path_buf();
    let dst = processed.clone();
    tokio::task::spawn_blocking(move || render_cover(&src, &dst))
        .await
        .map_err(|e| Error::CoverImage(format!("cover worker failed: {}", e)))??;

    let key = format!("{}/{}/cover.jpg", cover_prefix, cover_hash);
    upload_if_absent(storage, &processed, &key).await?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::storage::MockObjectStorePort;
    use tempfile::tempdir;

    fn write_source_image(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("source.png");
        let img = image::RgbImage::from_pixel(32, 32, image::Rgb([200, 30, 30]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_cover_is_rendered_and_uploaded_under_hash_key() {
        let tmp = tempdir().unwrap();
        let source = write_source_image(tmp.path());

        let mut storage = MockObjectStorePort::new();
        storage.expect_exists().times(1).returning(|_| Ok(false));
        storage
            .expect_upload()
            .times(1)
            .withf(|local, key| {
                // the processed jpeg must exist at upload time
                let meta = std::fs::metadata(local).unwrap();
                meta.len() > 0 && key == "covers/deadbeef/cover.jpg"
            })
            .returning(|_, _| Ok(()));

        let key = process_and_upload_cover(&storage, tmp.path(), "covers", &source, "deadbeef")
            .await
            .unwrap();
        assert_eq!(key, "covers/deadbeef/cover.jpg");
    }

    #[tokio::test]
    async fn test_rendered_cover_has_target_dimensions() {
        let tmp = tempdir().unwrap();
        let source = write_source_image(tmp.path());
        let out = tmp.path().join("cover.jpg");

        render_cover(&source, &out).unwrap();

        let rendered = image::open(&out).unwrap();
        assert_eq!(rendered.width(), COVER_WIDTH);
        assert_eq!(rendered.height(), COVER_HEIGHT);
    }

    #[tokio::test]
    async fn test_unreadable_source_is_a_cover_error() {
        let tmp = tempdir().unwrap();
        let storage = MockObjectStorePort::new();

        let result = process_and_upload_cover(
            &storage,
            tmp.path(),
            "covers",
            &tmp.path().join("missing.png"),
            "deadbeef",
        )
        .await;
        assert!(matches!(result, Err(Error::CoverImage(_))));
    }
}
